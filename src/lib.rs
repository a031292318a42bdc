//! pocket-ssot: a file-backed single source of truth for configuration entities
//!
//! Entities live in collections and are published through release channels:
//! ordered pipelines of `template` and `shell` steps rendered against entity data.
//!
//! - [`store`]: per-key YAML record store with atomic writes and per-path locking
//! - [`fields`]: canonical entity field maps
//! - [`model`]: persisted record types
//! - [`release`]: release pipeline, step executor and store-backed release service
//! - [`core`]: configuration, errors, logging and shared context
//! - [`commands`]: the `ssot` command implementations

pub mod commands;
pub mod core;
pub mod fields;
pub mod model;
pub mod release;
pub mod store;
pub mod utils;
