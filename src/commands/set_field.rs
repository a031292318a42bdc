//! `ssot set-field`

use crate::commands::{RecordKind, print_json, resolve_id};
use crate::core::context::SsotContext;
use crate::core::error::SsotResult;
use crate::fields::display_value;
use crate::model::Entity;
use crate::release::service::{parse_callback_value, set_entity_field};
use crate::store::Dataset;
use serde_json::json;

/// Set one field on an entity. `raw_value` is interpreted like a callback body:
/// JSON when it parses (`{"value": x}` unwraps to `x`), plain text otherwise.
pub fn run_set_field(ctx: &SsotContext, entity: &str, field: &str, raw_value: &str, json: bool) -> SsotResult<()> {
  let entity_id = resolve_id::<Entity>(ctx, &Dataset::entities(), RecordKind::Entities, entity)?;
  let value = parse_callback_value(raw_value);
  set_entity_field(&ctx.store, &entity_id, field, value.clone())?;

  if json {
    return print_json(&json!({
      "success": true,
      "entityId": entity_id,
      "field": field,
      "value": value,
    }));
  }
  println!("✅ {}.{} = {}", entity_id, field, display_value(&value));
  Ok(())
}
