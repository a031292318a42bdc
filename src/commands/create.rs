//! `ssot create`

use crate::commands::{RecordKind, resolve_id};
use crate::core::context::SsotContext;
use crate::core::error::{ResultExt, SsotError, SsotResult};
use crate::model::{Collection, Entity, ReleaseChannel};
use crate::release::service::parse_callback_value;
use crate::store::{Dataset, Record};
use std::fs;
use std::path::Path;

/// Create a collection, optionally wiring its release channels
pub fn run_create_collection(
  ctx: &SsotContext,
  name: &str,
  id: Option<String>,
  collection_channel: Option<String>,
  entity_channel: Option<String>,
) -> SsotResult<()> {
  ensure_unique_name::<Collection>(ctx, &Dataset::collections(), RecordKind::Collections, name)?;

  let mut collection = Collection::new(name.trim());
  if let Some(id) = id {
    collection.id = id;
  }
  if let Some(channel) = collection_channel {
    collection.release_channel_collection = resolve_channel(ctx, &channel)?;
  }
  if let Some(channel) = entity_channel {
    collection.release_channel_entity = resolve_channel(ctx, &channel)?;
  }

  ctx.store.insert_record(&Dataset::collections(), &collection)?;
  println!("✅ Created collection '{}' ({})", collection.name, collection.id);
  Ok(())
}

/// Create an entity inside a collection. Fields are `key=value`; values parse like callback bodies.
pub fn run_create_entity(
  ctx: &SsotContext,
  name: &str,
  collection: &str,
  id: Option<String>,
  fields: &[String],
) -> SsotResult<()> {
  let collection_id = resolve_id::<Collection>(ctx, &Dataset::collections(), RecordKind::Collections, collection)?;

  let mut entity = Entity::new(name.trim(), collection_id);
  if let Some(id) = id {
    entity.id = id;
  }
  for raw in fields {
    let (key, value) = raw
      .split_once('=')
      .filter(|(k, _)| !k.trim().is_empty())
      .ok_or_else(|| SsotError::with_help(format!("Invalid field '{}'", raw), "Fields are written as key=value."))?;
    entity.fields.insert(key.trim().to_string(), parse_callback_value(value));
  }

  ctx.store.insert_record(&Dataset::entities(), &entity)?;
  println!(
    "✅ Created entity '{}' ({}) in collection {}",
    entity.name, entity.id, entity.collection_id
  );
  Ok(())
}

/// Create a release channel, optionally loading its steps from a YAML file
pub fn run_create_channel(ctx: &SsotContext, name: &str, id: Option<String>, from: Option<&Path>) -> SsotResult<()> {
  ensure_unique_name::<ReleaseChannel>(ctx, &Dataset::release_channels(), RecordKind::Channels, name)?;

  let mut channel = match from {
    Some(path) => {
      let text = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
      let mut loaded: ReleaseChannel =
        serde_yaml::from_str(&text).with_context(|| format!("Failed to parse channel from {}", path.display()))?;
      // Always mint a fresh id unless one is given explicitly.
      loaded.id = ReleaseChannel::default().id;
      loaded
    }
    None => ReleaseChannel::default(),
  };
  channel.name = name.trim().to_string();
  if let Some(id) = id {
    channel.id = id;
  }

  ctx.store.insert_record(&Dataset::release_channels(), &channel)?;
  println!(
    "✅ Created release channel '{}' ({}) with {} steps",
    channel.name,
    channel.id,
    channel.steps.len()
  );
  Ok(())
}

fn resolve_channel(ctx: &SsotContext, id_or_name: &str) -> SsotResult<String> {
  resolve_id::<ReleaseChannel>(ctx, &Dataset::release_channels(), RecordKind::Channels, id_or_name)
}

fn ensure_unique_name<T: Record>(ctx: &SsotContext, dataset: &Dataset, kind: RecordKind, name: &str) -> SsotResult<()> {
  let name = name.trim();
  if name.is_empty() {
    return Err(SsotError::message(format!("A {} needs a non-empty name", kind.label())));
  }
  let wanted = name.to_lowercase();
  let clash: Option<T> = ctx
    .store
    .find(dataset, |r: &T| r.name().is_some_and(|n| n.to_lowercase() == wanted))?;
  if let Some(existing) = clash {
    return Err(SsotError::with_help(
      format!("A {} named '{}' already exists ({})", kind.label(), name, existing.id()),
      "Names must be unique (case-insensitive) so they can be used in place of ids.",
    ));
  }
  Ok(())
}
