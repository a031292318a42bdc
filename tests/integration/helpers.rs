//! Test helpers for integration tests

use anyhow::{Context, Result};
use pocket_ssot::model::{Collection, Entity, ReleaseChannel, ReleaseChannelStep};
use pocket_ssot::store::{Dataset, Store};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// A throwaway store directory plus a scratch directory for release output
pub struct TestStore {
  _root: TempDir,
  /// Store base directory
  pub path: PathBuf,
  /// Where template steps write their files
  pub out: PathBuf,
}

impl TestStore {
  /// Create an empty store layout
  pub fn new() -> Result<Self> {
    let root = TempDir::new()?;
    let path = root.path().join("store");
    let out = root.path().join("out");
    std::fs::create_dir_all(&path)?;
    std::fs::create_dir_all(&out)?;
    Ok(Self { _root: root, path, out })
  }

  /// Open a `Store` on this directory
  pub fn open(&self) -> Result<Store> {
    Store::open(&self.path, "yaml").context("Failed to open test store")
  }

  /// Seed a channel, a collection wired to it, and entities with a `port` field
  pub fn seed(&self, steps: Vec<ReleaseChannelStep>, entity_names: &[&str]) -> Result<(Collection, Vec<Entity>)> {
    let store = self.open()?;

    let mut channel = ReleaseChannel::new("deploy");
    channel.id = "rc1".to_string();
    channel.steps = steps;
    store.insert_record(&Dataset::release_channels(), &channel)?;

    let mut collection = Collection::new("web");
    collection.id = "c1".to_string();
    collection.release_channel_collection = channel.id.clone();
    collection.release_channel_entity = channel.id.clone();
    store.insert_record(&Dataset::collections(), &collection)?;

    let mut entities = Vec::new();
    for (i, name) in entity_names.iter().enumerate() {
      let mut entity = Entity::new(*name, "c1").with_field("port", serde_json::json!(8000 + i));
      entity.id = format!("e-{}", name);
      store.insert_record(&Dataset::entities(), &entity)?;
      entities.push(entity);
    }

    Ok((collection, entities))
  }

  /// Check if a file exists under the store directory
  pub fn file_exists(&self, path: &str) -> bool {
    self.path.join(path).exists()
  }

  /// Read a file from the output directory
  pub fn read_out(&self, path: &str) -> Result<String> {
    Ok(std::fs::read_to_string(self.out.join(path))?)
  }
}

/// Build a channel step from a JSON config
pub fn step(name: &str, step_type: &str, order: i64, config: serde_json::Value) -> ReleaseChannelStep {
  let config = serde_yaml::to_value(config).unwrap_or(serde_yaml::Value::Null);
  ReleaseChannelStep::new(name, step_type, order, config)
}

/// Run the ssot binary against a store; returns output regardless of exit status
pub fn ssot(store: &Path, args: &[&str]) -> Result<Output> {
  let bin = env!("CARGO_BIN_EXE_ssot");

  Command::new(bin)
    .current_dir(store)
    .arg("--store")
    .arg(store)
    .args(args)
    .env_remove("POCKET_SSOT_STORE")
    .env_remove("POCKET_SSOT_LOG")
    .output()
    .context("Failed to run ssot")
}

/// Run the ssot binary and require success
pub fn run_ssot(store: &Path, args: &[&str]) -> Result<Output> {
  let output = ssot(store, args)?;

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    anyhow::bail!(
      "ssot command failed: ssot {}\nstdout: {}\nstderr: {}",
      args.join(" "),
      stdout,
      stderr
    );
  }

  Ok(output)
}

/// Stdout of a command as a string
pub fn stdout(output: &Output) -> String {
  String::from_utf8_lossy(&output.stdout).into_owned()
}
