//! Shared runtime context: build once, pass everywhere
//!
//! # Architecture
//!
//! ```text
//! main.rs:
//!   SsotContext::build() -> &SsotContext
//!   |
//!   v
//! commands/list.rs, release.rs, etc:
//!   fn run_*(ctx: &SsotContext, ...)
//! ```
//!
//! The store owns the per-path lock table, so every command must go through the
//! one `Store` held here rather than opening its own.

use crate::core::config::SsotConfig;
use crate::core::error::{ResultExt, SsotResult};
use crate::release::{ExecutorOptions, HandlebarsRenderer, Pipeline, StepExecutor};
use crate::store::Store;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Everything a command needs: configuration, the record store and the release pipeline
pub struct SsotContext {
  /// Effective configuration (file, env and CLI overrides applied)
  pub config: Arc<SsotConfig>,

  /// The record store rooted at `config.store.base_dir`
  pub store: Store,

  /// Release pipeline wired with the handlebars renderer
  pub pipeline: Pipeline,
}

impl SsotContext {
  /// Load configuration from `dir` (or `config_path`), apply the `--store`
  /// override, and open the store.
  pub fn build(dir: &Path, config_path: Option<&Path>, store_override: Option<PathBuf>) -> SsotResult<Self> {
    let mut config = SsotConfig::load(dir, config_path)?;
    if let Some(base_dir) = store_override {
      config.store.base_dir = base_dir;
    }
    Self::from_config(config)
  }

  /// Open the store and build the pipeline for an already-loaded configuration
  pub fn from_config(config: SsotConfig) -> SsotResult<Self> {
    config.validate()?;

    let store = Store::open(&config.store.base_dir, &config.store.extension)
      .with_context(|| format!("Failed to open store at {}", config.store.base_dir.display()))?;

    let executor = StepExecutor::new(
      Arc::new(HandlebarsRenderer::new()),
      ExecutorOptions::from(&config.release),
    );

    Ok(Self {
      config: Arc::new(config),
      store,
      pipeline: Pipeline::new(executor),
    })
  }
}
