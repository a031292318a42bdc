use crate::core::error::{ConfigError, ResultExt, SsotError, SsotResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides `store.base_dir`
pub const STORE_DIR_ENV: &str = "POCKET_SSOT_STORE";

/// Configuration for pocket-ssot
/// Searched in order: pocket-ssot.toml, .pocket-ssot.toml, .config/pocket-ssot.toml, /etc/pocket-ssot/pocket-ssot.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SsotConfig {
  #[serde(default)]
  pub store: StoreConfig,
  #[serde(default)]
  pub release: ReleaseConfig,
  #[serde(default)]
  pub log: LogConfig,
}

/// Where and how records are persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
  /// Root directory of the record store (default: /var/lib/pocket-ssot)
  #[serde(default = "default_base_dir")]
  pub base_dir: PathBuf,

  /// File extension for record files, `yaml` or `yml` (default: yaml)
  #[serde(default = "default_extension")]
  pub extension: String,
}

fn default_base_dir() -> PathBuf {
  PathBuf::from("/var/lib/pocket-ssot")
}

fn default_extension() -> String {
  "yaml".to_string()
}

impl Default for StoreConfig {
  fn default() -> Self {
    Self {
      base_dir: default_base_dir(),
      extension: default_extension(),
    }
  }
}

/// Release engine tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseConfig {
  /// Shell used for `shell` steps (default: /bin/bash, cmd on Windows)
  #[serde(default = "default_shell")]
  pub shell: String,

  /// Kill shell steps that run longer than this many seconds (default: no limit)
  #[serde(default)]
  pub shell_timeout_secs: Option<u64>,

  /// Upper bound on entities processed concurrently in a fan-out step (default: 1)
  #[serde(default = "default_max_parallel")]
  pub max_parallel_entities: usize,
}

fn default_shell() -> String {
  if cfg!(windows) {
    "cmd".to_string()
  } else {
    "/bin/bash".to_string()
  }
}

fn default_max_parallel() -> usize {
  1
}

impl Default for ReleaseConfig {
  fn default() -> Self {
    Self {
      shell: default_shell(),
      shell_timeout_secs: None,
      max_parallel_entities: default_max_parallel(),
    }
  }
}

impl ReleaseConfig {
  /// Shell timeout as a Duration, if one is configured
  pub fn shell_timeout(&self) -> Option<Duration> {
    self.shell_timeout_secs.map(Duration::from_secs)
  }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
  /// Default `tracing` filter directive, overridden by POCKET_SSOT_LOG (default: warn)
  #[serde(default = "default_log_filter")]
  pub filter: String,
}

fn default_log_filter() -> String {
  "warn".to_string()
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      filter: default_log_filter(),
    }
  }
}

impl SsotConfig {
  /// Find config file in search order
  pub fn find_config_path(dir: &Path) -> Option<PathBuf> {
    let candidates = vec![
      dir.join("pocket-ssot.toml"),
      dir.join(".pocket-ssot.toml"),
      dir.join(".config").join("pocket-ssot.toml"),
      PathBuf::from("/etc/pocket-ssot/pocket-ssot.toml"),
    ];

    candidates.into_iter().find(|p| p.exists())
  }

  /// Load config for the given working directory.
  ///
  /// An explicit path must exist. Without one, the search order above is used and a
  /// missing file yields defaults. `POCKET_SSOT_STORE` is applied last.
  pub fn load(dir: &Path, explicit: Option<&Path>) -> SsotResult<Self> {
    let path = match explicit {
      Some(path) if !path.exists() => {
        return Err(SsotError::Config(ConfigError::NotFound {
          path: path.to_path_buf(),
        }));
      }
      Some(path) => Some(path.to_path_buf()),
      None => Self::find_config_path(dir),
    };

    let mut config = match path {
      Some(path) => Self::from_file(&path)?,
      None => Self::default(),
    };

    if let Ok(base_dir) = std::env::var(STORE_DIR_ENV)
      && !base_dir.trim().is_empty()
    {
      config.store.base_dir = PathBuf::from(base_dir);
    }

    config.validate()?;
    Ok(config)
  }

  /// Parse a single config file
  pub fn from_file(path: &Path) -> SsotResult<Self> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read config from {}", path.display()))?;
    Self::from_toml(&content).with_context(|| format!("Failed to parse config from {}", path.display()))
  }

  /// Parse config from TOML text
  pub fn from_toml(content: &str) -> SsotResult<Self> {
    Ok(toml_edit::de::from_str(content)?)
  }

  /// Validate value ranges
  pub fn validate(&self) -> SsotResult<()> {
    let ext = self.store.extension.trim().trim_start_matches('.');
    if ext != "yaml" && ext != "yml" {
      return Err(SsotError::Config(ConfigError::InvalidValue {
        field: "store.extension".to_string(),
        reason: format!("'{}' is not one of 'yaml', 'yml'", self.store.extension),
      }));
    }

    if self.release.max_parallel_entities == 0 {
      return Err(SsotError::Config(ConfigError::InvalidValue {
        field: "release.max_parallel_entities".to_string(),
        reason: "must be at least 1".to_string(),
      }));
    }

    if self.release.shell_timeout_secs == Some(0) {
      return Err(SsotError::Config(ConfigError::InvalidValue {
        field: "release.shell_timeout_secs".to_string(),
        reason: "must be positive; omit it to disable the timeout".to_string(),
      }));
    }

    if self.release.shell.trim().is_empty() {
      return Err(SsotError::Config(ConfigError::MissingField {
        field: "release.shell".to_string(),
      }));
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults_when_empty() {
    let config = SsotConfig::from_toml("").unwrap();
    assert_eq!(config.store.base_dir, PathBuf::from("/var/lib/pocket-ssot"));
    assert_eq!(config.store.extension, "yaml");
    assert_eq!(config.release.max_parallel_entities, 1);
    assert!(config.release.shell_timeout().is_none());
    assert!(config.validate().is_ok());
  }

  #[test]
  fn test_parse_full_config() {
    let config = SsotConfig::from_toml(
      r#"
[store]
base_dir = "/srv/ssot"
extension = "yml"

[release]
shell = "/bin/sh"
shell_timeout_secs = 30
max_parallel_entities = 4

[log]
filter = "pocket_ssot=debug"
"#,
    )
    .unwrap();
    assert_eq!(config.store.base_dir, PathBuf::from("/srv/ssot"));
    assert_eq!(config.store.extension, "yml");
    assert_eq!(config.release.shell, "/bin/sh");
    assert_eq!(config.release.shell_timeout(), Some(Duration::from_secs(30)));
    assert_eq!(config.release.max_parallel_entities, 4);
    assert_eq!(config.log.filter, "pocket_ssot=debug");
  }

  #[test]
  fn test_validation_rejects_zero_parallelism() {
    let mut config = SsotConfig::default();
    config.release.max_parallel_entities = 0;
    assert!(config.validate().is_err());
  }

  #[test]
  fn test_validation_rejects_zero_timeout() {
    let mut config = SsotConfig::default();
    config.release.shell_timeout_secs = Some(0);
    assert!(config.validate().is_err());
  }

  #[test]
  fn test_validation_rejects_unknown_extension() {
    let mut config = SsotConfig::default();
    config.store.extension = "json".to_string();
    assert!(config.validate().is_err());
  }

  #[test]
  fn test_explicit_missing_path_is_error() {
    let dir = tempfile::TempDir::new().unwrap();
    let missing = dir.path().join("nope.toml");
    let err = SsotConfig::load(dir.path(), Some(&missing)).unwrap_err();
    assert!(matches!(err, SsotError::Config(ConfigError::NotFound { .. })));
  }

  #[test]
  fn test_load_reads_discovered_file() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(
      dir.path().join("pocket-ssot.toml"),
      "[release]\nmax_parallel_entities = 2\n",
    )
    .unwrap();
    let config = SsotConfig::from_file(&dir.path().join("pocket-ssot.toml")).unwrap();
    assert_eq!(config.release.max_parallel_entities, 2);
  }
}
