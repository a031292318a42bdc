//! Ambient building blocks shared by every pocket-ssot command
//!
//! - **config**: pocket-ssot.toml discovery, parsing and validation
//! - **context**: Shared context (config, store, pipeline) built once in main.rs
//! - **error**: Error types with contextual help messages and exit codes
//! - **logging**: `tracing` subscriber setup

pub mod config;
pub mod context;
pub mod error;
pub mod logging;
