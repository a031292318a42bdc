//! `ssot show`

use crate::commands::{RecordKind, print_json, print_yaml, resolve_id};
use crate::core::context::SsotContext;
use crate::core::error::{SsotError, SsotResult};
use crate::model::{Collection, Entity, Policy, ReleaseChannel, ReleaseRecord};
use crate::store::{Dataset, Record};
use serde::Serialize;

/// Run the show command. Records are matched by id, then by case-insensitive name.
pub fn run_show(ctx: &SsotContext, kind: RecordKind, id_or_name: &str, json: bool) -> SsotResult<()> {
  match kind {
    RecordKind::Collections => show_one::<Collection>(ctx, &Dataset::collections(), kind, id_or_name, json),
    RecordKind::Entities => show_one::<Entity>(ctx, &Dataset::entities(), kind, id_or_name, json),
    RecordKind::Channels => show_one::<ReleaseChannel>(ctx, &Dataset::release_channels(), kind, id_or_name, json),
    RecordKind::Policies => show_one::<Policy>(ctx, &Dataset::policies(), kind, id_or_name, json),
    RecordKind::Releases => {
      // Release names embed timestamps, so only ids are accepted here.
      for dataset in kind.datasets() {
        if let Some(record) = ctx.store.find_by_id::<ReleaseRecord>(&dataset, id_or_name)? {
          return emit(&record, json);
        }
      }
      Err(SsotError::not_found(kind.label(), id_or_name))
    }
  }
}

fn show_one<T: Record>(
  ctx: &SsotContext,
  dataset: &Dataset,
  kind: RecordKind,
  id_or_name: &str,
  json: bool,
) -> SsotResult<()> {
  let id = resolve_id::<T>(ctx, dataset, kind, id_or_name)?;
  let record: T = ctx
    .store
    .find_by_id(dataset, &id)?
    .ok_or_else(|| SsotError::not_found(kind.label(), id_or_name))?;
  emit(&record, json)
}

fn emit<T: Serialize>(record: &T, json: bool) -> SsotResult<()> {
  if json { print_json(record) } else { print_yaml(record) }
}
