//! Store-backed release operations
//!
//! These wrap the [`Pipeline`] with everything a caller does around a run:
//! resolve the collection, channel and entities from the store, build the
//! [`ReleaseRecord`] and persist it. The field callback lives here too because it
//! is the write path external release tooling uses to report values back.

use crate::core::error::{SsotError, SsotResult};
use crate::fields::FieldMap;
use crate::model::{Collection, Entity, ReleaseChannel, ReleaseRecord};
use crate::release::pipeline::Pipeline;
use crate::store::{Dataset, Store};
use chrono::{SecondsFormat, Utc};
use serde_json::Value;

/// Run the collection-level channel of `collection_id` over all of its entities.
///
/// `channel_override` replaces the collection's `releaseChannelCollection`.
pub fn release_collection(
  store: &Store,
  pipeline: &Pipeline,
  collection_id: &str,
  channel_override: Option<&str>,
) -> SsotResult<ReleaseRecord> {
  let collection = load_collection(store, collection_id)?;
  let channel_id = pick_channel(channel_override, &collection.release_channel_collection).ok_or_else(|| {
    SsotError::with_help(
      format!("Collection '{}' has no collection release channel", collection.name),
      "Set releaseChannelCollection on the collection or pass --channel.",
    )
  })?;
  let channel = load_channel(store, channel_id)?;

  let entities: Vec<Entity> = store.list_where(&Dataset::entities(), |e: &Entity| e.collection_id == collection.id)?;
  let results = pipeline.run_channel(&collection, &channel, &entities);

  let name = format!("{} / {} / {}", collection.name, channel.name, timestamp());
  let record = ReleaseRecord::new(name, &collection.id, None, &channel.id, results);
  store.insert_record(&Dataset::collection_releases(), &record)?;

  tracing::info!(release = %record.id, status = record.status, "recorded collection release");
  Ok(record)
}

/// Run the entity-level channel of the entity's collection against that entity alone.
///
/// `channel_override` replaces the collection's `releaseChannelEntity`.
pub fn release_entity(
  store: &Store,
  pipeline: &Pipeline,
  entity_id: &str,
  channel_override: Option<&str>,
) -> SsotResult<ReleaseRecord> {
  let entity: Entity = store
    .find_by_id(&Dataset::entities(), entity_id)?
    .ok_or_else(|| SsotError::not_found("entity", entity_id))?;
  let collection = load_collection(store, &entity.collection_id)?;
  let channel_id = pick_channel(channel_override, &collection.release_channel_entity).ok_or_else(|| {
    SsotError::with_help(
      format!("Collection '{}' has no entity release channel", collection.name),
      "Set releaseChannelEntity on the collection or pass --channel.",
    )
  })?;
  let channel = load_channel(store, channel_id)?;

  let results = pipeline.run_channel(&collection, &channel, std::slice::from_ref(&entity));

  let name = format!(
    "{} / {} / {} / {}",
    collection.name,
    channel.name,
    entity.display_name(),
    timestamp()
  );
  let record = ReleaseRecord::new(name, &collection.id, Some(entity.id.clone()), &channel.id, results);
  store.insert_record(&Dataset::entity_releases(), &record)?;

  tracing::info!(release = %record.id, entity = %entity.id, status = record.status, "recorded entity release");
  Ok(record)
}

/// Insert or overwrite one field on an entity. Returns the updated field map.
pub fn set_entity_field(store: &Store, entity_id: &str, field: &str, value: Value) -> SsotResult<FieldMap> {
  if entity_id.trim().is_empty() || field.trim().is_empty() {
    return Err(SsotError::message("Missing entity id or field name"));
  }

  let entity: Entity = store
    .find_by_id(&Dataset::entities(), entity_id)?
    .ok_or_else(|| SsotError::not_found("entity", entity_id))?;
  if entity.collection_id.trim().is_empty() {
    return Err(SsotError::message(format!("Entity '{}' has no collection", entity_id)));
  }
  load_collection(store, &entity.collection_id)?;

  let mut fields = FieldMap::new();
  let updated = store.update_by_id(&Dataset::entities(), entity_id, |e: &mut Entity| {
    e.fields.insert(field.to_string(), value);
    fields = e.fields.clone();
  })?;
  if !updated {
    return Err(SsotError::not_found("entity", entity_id));
  }

  tracing::debug!(entity = entity_id, field, "set entity field");
  Ok(fields)
}

/// Interpret a loosely typed callback body as a field value.
///
/// - empty (after trimming) → `""`
/// - JSON object with a `value` key → that value
/// - any other JSON document → the parsed value
/// - anything else → the trimmed text
pub fn parse_callback_value(body: &str) -> Value {
  let body = body.trim();
  if body.is_empty() {
    return Value::String(String::new());
  }
  match serde_json::from_str::<Value>(body) {
    Ok(Value::Object(mut map)) if map.contains_key("value") => map.remove("value").unwrap_or(Value::Null),
    Ok(parsed) => parsed,
    Err(_) => Value::String(body.to_string()),
  }
}

fn load_collection(store: &Store, id: &str) -> SsotResult<Collection> {
  store
    .find_by_id(&Dataset::collections(), id)?
    .ok_or_else(|| SsotError::not_found("collection", id))
}

fn load_channel(store: &Store, id: &str) -> SsotResult<ReleaseChannel> {
  store
    .find_by_id(&Dataset::release_channels(), id)?
    .ok_or_else(|| SsotError::not_found("channel", id))
}

fn pick_channel<'a>(explicit: Option<&'a str>, configured: &'a str) -> Option<&'a str> {
  explicit
    .map(str::trim)
    .filter(|id| !id.is_empty())
    .or(Some(configured.trim()).filter(|id| !id.is_empty()))
}

fn timestamp() -> String {
  Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
