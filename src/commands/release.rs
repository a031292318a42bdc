//! `ssot release`
//!
//! Runs a release through the store-backed service and prints the outcome.
//! A release that ran but failed still gets recorded; the command then exits
//! with the validation exit code.

use crate::commands::{RecordKind, print_json, resolve_id};
use crate::core::context::SsotContext;
use crate::core::error::{SsotError, SsotResult};
use crate::model::{Collection, Entity, ReleaseChannel, ReleaseRecord};
use crate::release::service;
use crate::store::Dataset;

/// Release a collection through its collection-level channel
pub fn run_release_collection(ctx: &SsotContext, collection: &str, channel: Option<String>, json: bool) -> SsotResult<()> {
  let collection_id = resolve_id::<Collection>(ctx, &Dataset::collections(), RecordKind::Collections, collection)?;
  let channel_id = resolve_channel(ctx, channel)?;
  let record = service::release_collection(&ctx.store, &ctx.pipeline, &collection_id, channel_id.as_deref())?;
  report(&record, json)
}

/// Release a single entity through its collection's entity-level channel
pub fn run_release_entity(ctx: &SsotContext, entity: &str, channel: Option<String>, json: bool) -> SsotResult<()> {
  let entity_id = resolve_id::<Entity>(ctx, &Dataset::entities(), RecordKind::Entities, entity)?;
  let channel_id = resolve_channel(ctx, channel)?;
  let record = service::release_entity(&ctx.store, &ctx.pipeline, &entity_id, channel_id.as_deref())?;
  report(&record, json)
}

fn resolve_channel(ctx: &SsotContext, channel: Option<String>) -> SsotResult<Option<String>> {
  channel
    .map(|c| resolve_id::<ReleaseChannel>(ctx, &Dataset::release_channels(), RecordKind::Channels, &c))
    .transpose()
}

fn report(record: &ReleaseRecord, json: bool) -> SsotResult<()> {
  if json {
    print_json(record)?;
  } else {
    print_release(record);
  }

  if record.status {
    Ok(())
  } else {
    Err(SsotError::ReleaseFailed {
      release_id: record.id.clone(),
    })
  }
}

fn print_release(record: &ReleaseRecord) {
  let (icon, label) = if record.status { ("✅", "done") } else { ("❌", "failed") };
  println!("{} {}  {}", icon, label, record.id);
  println!("   {}", record.name);
  println!();

  for result in &record.results {
    let mark = if result.status { "✓" } else { "✗" };
    let detail = if result.status {
      result.output.as_deref().unwrap_or("").lines().next().unwrap_or("")
    } else {
      result.error.as_deref().unwrap_or("")
    };
    println!("   {} {:<20} {}", mark, result.name, detail);
  }

  let errors = record.errors();
  if !errors.is_empty() {
    println!();
    println!("   Errors:");
    for error in errors {
      println!("   - {}", error);
    }
  }
}
