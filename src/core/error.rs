//! Error types for pocket-ssot with contextual messages and exit codes
//!
//! Every error carried to the CLI boundary is categorized so it maps to an
//! exit code, and most carry a short help line for the operator.
//!
//! Release step failures are deliberately NOT represented here: the pipeline
//! turns them into `StepResult`s (see `release::StepFailure`). Only store and
//! configuration faults propagate as `SsotError`.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Exit codes for the `ssot` binary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
  /// User error (config, invalid args, unknown records)
  User = 1,
  /// System error (I/O, corrupt store files)
  System = 2,
  /// A release ran but did not succeed
  Validation = 3,
}

impl ExitCode {
  /// Convert to i32 for process exit
  pub fn as_i32(self) -> i32 {
    self as i32
  }
}

/// Main error type for pocket-ssot
#[derive(Debug)]
pub enum SsotError {
  /// Configuration errors
  Config(ConfigError),

  /// Record store errors
  Store(StoreError),

  /// A referenced record does not exist
  NotFound { kind: String, id: String },

  /// A release was executed and at least one step failed
  ReleaseFailed { release_id: String },

  /// I/O errors
  Io(io::Error),

  /// Generic error with message and optional context
  Message {
    message: String,
    context: Option<String>,
    help: Option<String>,
  },
}

impl SsotError {
  /// Create a simple error message
  pub fn message(msg: impl Into<String>) -> Self {
    SsotError::Message {
      message: msg.into(),
      context: None,
      help: None,
    }
  }

  /// Create an error with help text
  pub fn with_help(msg: impl Into<String>, help: impl Into<String>) -> Self {
    SsotError::Message {
      message: msg.into(),
      context: None,
      help: Some(help.into()),
    }
  }

  /// Shorthand for a missing record
  pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
    SsotError::NotFound {
      kind: kind.into(),
      id: id.into(),
    }
  }

  /// Add context to an existing error
  pub fn context(self, ctx: impl Into<String>) -> Self {
    let ctx_str = ctx.into();
    match self {
      SsotError::Message { message, context, help } => SsotError::Message {
        message,
        context: Some(context.map(|c| format!("{}\n{}", ctx_str, c)).unwrap_or(ctx_str)),
        help,
      },
      SsotError::Io(e) => SsotError::Message {
        message: format!("I/O error: {}", e),
        context: Some(ctx_str),
        help: None,
      },
      _ => self,
    }
  }

  /// Get the appropriate exit code for this error
  pub fn exit_code(&self) -> ExitCode {
    match self {
      SsotError::Config(_) => ExitCode::User,
      SsotError::Store(e) => e.exit_code(),
      SsotError::NotFound { .. } => ExitCode::User,
      SsotError::ReleaseFailed { .. } => ExitCode::Validation,
      SsotError::Io(_) => ExitCode::System,
      SsotError::Message { .. } => ExitCode::User,
    }
  }

  /// Get contextual help message for this error
  pub fn help_message(&self) -> Option<String> {
    match self {
      SsotError::Config(e) => e.help_message(),
      SsotError::Store(e) => e.help_message(),
      SsotError::NotFound { kind, .. } => Some(format!("List available records with `ssot list {}`.", kind)),
      SsotError::ReleaseFailed { release_id } => Some(format!(
        "Inspect the full step trail with `ssot show release {}`.",
        release_id
      )),
      SsotError::Message { help, .. } => help.clone(),
      _ => None,
    }
  }
}

impl fmt::Display for SsotError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SsotError::Config(e) => write!(f, "{}", e),
      SsotError::Store(e) => write!(f, "{}", e),
      SsotError::NotFound { kind, id } => write!(f, "{} '{}' not found", kind, id),
      SsotError::ReleaseFailed { release_id } => write!(f, "Release {} failed", release_id),
      SsotError::Io(e) => write!(f, "I/O error: {}", e),
      SsotError::Message { message, context, .. } => {
        write!(f, "{}", message)?;
        if let Some(ctx) = context {
          write!(f, "\n{}", ctx)?;
        }
        Ok(())
      }
    }
  }
}

impl std::error::Error for SsotError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      SsotError::Io(e) => Some(e),
      SsotError::Store(StoreError::Io { source, .. }) => Some(source),
      _ => None,
    }
  }
}

impl From<io::Error> for SsotError {
  fn from(err: io::Error) -> Self {
    SsotError::Io(err)
  }
}

impl From<StoreError> for SsotError {
  fn from(err: StoreError) -> Self {
    SsotError::Store(err)
  }
}

impl From<ConfigError> for SsotError {
  fn from(err: ConfigError) -> Self {
    SsotError::Config(err)
  }
}

impl From<String> for SsotError {
  fn from(msg: String) -> Self {
    SsotError::message(msg)
  }
}

impl From<&str> for SsotError {
  fn from(msg: &str) -> Self {
    SsotError::message(msg)
  }
}

impl From<toml_edit::de::Error> for SsotError {
  fn from(err: toml_edit::de::Error) -> Self {
    SsotError::message(format!("TOML deserialization error: {}", err))
  }
}

impl From<serde_json::Error> for SsotError {
  fn from(err: serde_json::Error) -> Self {
    SsotError::message(format!("JSON error: {}", err))
  }
}

impl From<serde_yaml::Error> for SsotError {
  fn from(err: serde_yaml::Error) -> Self {
    SsotError::message(format!("YAML error: {}", err))
  }
}

/// Configuration-related errors
#[derive(Debug)]
pub enum ConfigError {
  /// Explicitly requested config file does not exist
  NotFound { path: PathBuf },

  /// A value is present but unusable
  InvalidValue { field: String, reason: String },

  /// Missing required field
  MissingField { field: String },
}

impl ConfigError {
  fn help_message(&self) -> Option<String> {
    match self {
      ConfigError::NotFound { .. } => {
        Some("Drop --config to fall back to pocket-ssot.toml discovery and built-in defaults.".to_string())
      }
      ConfigError::InvalidValue { field, .. } => Some(format!("Fix `{}` in pocket-ssot.toml.", field)),
      ConfigError::MissingField { .. } => None,
    }
  }
}

impl fmt::Display for ConfigError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ConfigError::NotFound { path } => write!(f, "Config file not found: {}", path.display()),
      ConfigError::InvalidValue { field, reason } => {
        write!(f, "Invalid config value for {}: {}", field, reason)
      }
      ConfigError::MissingField { field } => write!(f, "Missing required field in config: {}", field),
    }
  }
}

/// Record store errors
#[derive(Debug)]
pub enum StoreError {
  /// A record with the same key already exists at the target path
  DuplicateKey { dataset: String, key: String },

  /// Key cannot be used as a file name
  InvalidKey { dataset: String, key: String },

  /// Record belongs to a partitioned dataset but carries no partition value
  MissingPartition { dataset: String, key: String },

  /// A stored file could not be decoded
  Decode { path: PathBuf, reason: String },

  /// A record could not be encoded
  Encode { dataset: String, reason: String },

  /// Record does not belong in the dataset it was written to
  WrongDataset { dataset: String, key: String, expected: String },

  /// Record changed on disk between locate and commit of a move
  Conflict { dataset: String, key: String },

  /// Filesystem fault
  Io { path: PathBuf, source: io::Error },
}

impl StoreError {
  /// Wrap an I/O error with the path it happened on
  pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
    StoreError::Io {
      path: path.into(),
      source,
    }
  }

  /// True when the error is a duplicate key rejection
  pub fn is_duplicate_key(&self) -> bool {
    matches!(self, StoreError::DuplicateKey { .. })
  }

  fn exit_code(&self) -> ExitCode {
    match self {
      StoreError::DuplicateKey { .. }
      | StoreError::InvalidKey { .. }
      | StoreError::MissingPartition { .. }
      | StoreError::WrongDataset { .. }
      | StoreError::Conflict { .. } => ExitCode::User,
      StoreError::Decode { .. } | StoreError::Encode { .. } | StoreError::Io { .. } => ExitCode::System,
    }
  }

  fn help_message(&self) -> Option<String> {
    match self {
      StoreError::DuplicateKey { .. } => Some("Pick a different id or update the existing record.".to_string()),
      StoreError::Conflict { .. } => Some("Another writer changed the record; retry the command.".to_string()),
      StoreError::Decode { path, .. } => Some(format!("Fix or remove the malformed file {}", path.display())),
      StoreError::Io { source, .. } if source.kind() == io::ErrorKind::PermissionDenied => {
        Some("Check that the store directory is writable by this user.".to_string())
      }
      _ => None,
    }
  }
}

impl fmt::Display for StoreError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      StoreError::DuplicateKey { dataset, key } => write!(f, "Item '{}' already exists in {}", key, dataset),
      StoreError::InvalidKey { dataset, key } => write!(f, "Invalid key '{}' for {}", key, dataset),
      StoreError::MissingPartition { dataset, key } => {
        write!(f, "Record '{}' in {} has no owning id to file it under", key, dataset)
      }
      StoreError::WrongDataset { dataset, key, expected } => {
        write!(f, "Record '{}' cannot be stored in {}; it belongs in {}", key, dataset, expected)
      }
      StoreError::Decode { path, reason } => write!(f, "Failed to decode {}: {}", path.display(), reason),
      StoreError::Encode { dataset, reason } => write!(f, "Failed to encode record for {}: {}", dataset, reason),
      StoreError::Conflict { dataset, key } => write!(f, "Record '{}' in {} was modified concurrently", key, dataset),
      StoreError::Io { path, source } => write!(f, "I/O error on {}: {}", path.display(), source),
    }
  }
}

impl std::error::Error for StoreError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      StoreError::Io { source, .. } => Some(source),
      _ => None,
    }
  }
}

/// Result type alias for pocket-ssot
pub type SsotResult<T> = Result<T, SsotError>;

/// Result type alias for the record store
pub type StoreResult<T> = Result<T, StoreError>;

/// Helper trait to add context to Results
pub trait ResultExt<T> {
  /// Add context to an error result
  fn context(self, ctx: impl Into<String>) -> SsotResult<T>;

  /// Add context using a closure (lazy evaluation)
  fn with_context<F>(self, f: F) -> SsotResult<T>
  where
    F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
  E: Into<SsotError>,
{
  fn context(self, ctx: impl Into<String>) -> SsotResult<T> {
    self.map_err(|e| e.into().context(ctx))
  }

  fn with_context<F>(self, f: F) -> SsotResult<T>
  where
    F: FnOnce() -> String,
  {
    self.map_err(|e| e.into().context(f()))
  }
}

/// Pretty-print an error to stderr with help text
pub fn print_error(error: &SsotError) {
  eprintln!("\n❌ {}\n", error);

  if let Some(help) = error.help_message() {
    eprintln!("💡 Help: {}\n", help);
  }
}
