//! Integration tests for pocket-ssot
//!
//! Each test works on its own temporary store directory.

mod helpers;
mod test_cli;
mod test_pipeline;
mod test_store;
