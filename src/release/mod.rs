//! Release execution engine
//!
//! A release runs a channel's steps against one collection and a list of its
//! entities and yields an ordered trail of [`StepResult`](crate::model::StepResult)s.
//!
//! # Core Invariants
//!
//! 1. **Steps run in ascending `order`**
//!    - Ties keep their position in the channel
//!    - Every step config is parsed before the first step runs
//!
//! 2. **The first failed step halts the pipeline**
//!    - Per-entity failures fail their parent step
//!    - Nothing already written is rolled back
//!
//! 3. **Step failures are data, not errors**
//!    - Configuration, render and execution faults become failed results
//!    - Only the record store can make a release call return `Err`
//!
//! # Architecture
//!
//! - [`config`]: typed step configs parsed from the opaque channel YAML
//! - [`render`]: template rendering behind [`TemplateRenderer`]
//! - [`shell`]: external command execution with drained streams and a timeout
//! - [`executor`]: runs one step, fanning out over entities when asked
//! - [`pipeline`]: orders steps and aggregates results
//! - [`service`]: store-backed release and field-callback operations

pub mod config;
pub mod executor;
pub mod pipeline;
pub mod render;
pub mod service;
pub mod shell;

pub use config::StepConfig;
pub use executor::{ExecutorOptions, StepExecutor};
pub use pipeline::Pipeline;
pub use render::{HandlebarsRenderer, TemplateRenderer};

use std::fmt;

/// Category of a step failure, recorded in result meta as `exception`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
  /// Step config is unusable; fatal to the whole pipeline
  ConfigurationError,
  /// A template failed to parse or render
  RenderError,
  /// Filesystem or process fault while executing a step
  ExecutionError,
}

impl FailureKind {
  pub fn as_str(self) -> &'static str {
    match self {
      FailureKind::ConfigurationError => "ConfigurationError",
      FailureKind::RenderError => "RenderError",
      FailureKind::ExecutionError => "ExecutionError",
    }
  }
}

impl fmt::Display for FailureKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A fault raised while preparing or running a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
  pub kind: FailureKind,
  pub message: String,
}

impl StepFailure {
  pub fn configuration(message: impl Into<String>) -> Self {
    Self {
      kind: FailureKind::ConfigurationError,
      message: message.into(),
    }
  }

  pub fn render(message: impl Into<String>) -> Self {
    Self {
      kind: FailureKind::RenderError,
      message: message.into(),
    }
  }

  pub fn execution(message: impl Into<String>) -> Self {
    Self {
      kind: FailureKind::ExecutionError,
      message: message.into(),
    }
  }
}

impl fmt::Display for StepFailure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.message)
  }
}

impl std::error::Error for StepFailure {}

/// Result type for step-internal operations
pub type StepOutcome<T> = Result<T, StepFailure>;
