//! CLI commands for ssot
//!
//! ## Inspection
//! - **list**: List records of one kind, optionally filtered by collection
//! - **show**: Print one record as YAML (or JSON)
//!
//! ## Editing
//! - **create**: Create collections, entities and release channels
//! - **set-field**: Set one entity field from a loosely typed value
//!
//! ## Releases
//! - **release**: Run a collection or entity release and record the outcome
//!
//! All commands accept `&SsotContext` so they share one store (and one lock table).

pub mod create;
pub mod list;
pub mod release;
pub mod set_field;
pub mod show;

pub use create::{run_create_channel, run_create_collection, run_create_entity};
pub use list::run_list;
pub use release::{run_release_collection, run_release_entity};
pub use set_field::run_set_field;
pub use show::run_show;

use crate::core::context::SsotContext;
use crate::core::error::{SsotError, SsotResult};
use crate::store::{Dataset, Record};
use clap::ValueEnum;
use serde::Serialize;

/// Record kinds addressable from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RecordKind {
  #[value(alias = "collection")]
  Collections,
  #[value(alias = "entity")]
  Entities,
  #[value(alias = "channel", alias = "release-channels")]
  Channels,
  #[value(alias = "policy")]
  Policies,
  #[value(alias = "release")]
  Releases,
}

impl RecordKind {
  /// Singular label used in messages
  pub fn label(self) -> &'static str {
    match self {
      RecordKind::Collections => "collection",
      RecordKind::Entities => "entity",
      RecordKind::Channels => "channel",
      RecordKind::Policies => "policy",
      RecordKind::Releases => "release",
    }
  }

  /// Datasets holding this kind
  pub fn datasets(self) -> Vec<Dataset> {
    match self {
      RecordKind::Collections => vec![Dataset::collections()],
      RecordKind::Entities => vec![Dataset::entities()],
      RecordKind::Channels => vec![Dataset::release_channels()],
      RecordKind::Policies => vec![Dataset::policies()],
      RecordKind::Releases => vec![Dataset::collection_releases(), Dataset::entity_releases()],
    }
  }
}

/// Resolve an id-or-name to a record id, or fail with NotFound
pub(crate) fn resolve_id<T: Record>(
  ctx: &SsotContext,
  dataset: &Dataset,
  kind: RecordKind,
  id_or_name: &str,
) -> SsotResult<String> {
  ctx
    .store
    .resolve_id::<T>(dataset, id_or_name)?
    .ok_or_else(|| SsotError::not_found(kind.label(), id_or_name))
}

/// Print a value as pretty JSON
pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> SsotResult<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

/// Print a value as YAML
pub(crate) fn print_yaml<T: Serialize + ?Sized>(value: &T) -> SsotResult<()> {
  print!("{}", serde_yaml::to_string(value)?);
  Ok(())
}
