//! Tracing subscriber setup for the `ssot` binary
//!
//! Library code only emits `tracing` events; installing a subscriber is the
//! binary's job. `POCKET_SSOT_LOG` wins over the configured default filter.

use tracing_subscriber::EnvFilter;

/// Environment variable holding a `tracing` filter directive
pub const LOG_ENV: &str = "POCKET_SSOT_LOG";

/// Build the filter: `POCKET_SSOT_LOG` if set and valid, else `default_filter`, else `warn`
pub fn build_filter(default_filter: &str) -> EnvFilter {
  EnvFilter::try_from_env(LOG_ENV)
    .or_else(|_| EnvFilter::try_new(default_filter))
    .unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Install the global fmt subscriber. Logs go to stderr so command output stays parseable.
///
/// Safe to call more than once; later calls are ignored.
pub fn init(default_filter: &str) {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(build_filter(default_filter))
    .with_writer(std::io::stderr)
    .with_target(false)
    .try_init();
}
