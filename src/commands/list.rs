//! `ssot list`

use crate::commands::{RecordKind, print_json, resolve_id};
use crate::core::context::SsotContext;
use crate::core::error::SsotResult;
use crate::model::{Collection, Entity, Policy, ReleaseChannel, ReleaseRecord};
use crate::store::Dataset;

/// Run the list command
pub fn run_list(ctx: &SsotContext, kind: RecordKind, collection: Option<String>, json: bool) -> SsotResult<()> {
  let collection_id = match collection {
    Some(c) => Some(resolve_id::<Collection>(
      ctx,
      &Dataset::collections(),
      RecordKind::Collections,
      &c,
    )?),
    None => None,
  };
  let in_collection = |id: &str| collection_id.as_deref().is_none_or(|wanted| wanted == id);
  let store = &ctx.store;

  match kind {
    RecordKind::Collections => {
      let items: Vec<Collection> = store.list_where(&Dataset::collections(), |c: &Collection| in_collection(&c.id))?;
      if json {
        return print_json(&items);
      }
      print_header("Collections", items.len());
      for c in &items {
        println!(
          "  {}  {}  (collection channel: {}, entity channel: {})",
          c.id,
          c.name,
          or_dash(&c.release_channel_collection),
          or_dash(&c.release_channel_entity)
        );
      }
    }
    RecordKind::Entities => {
      let items: Vec<Entity> = store.list_where(&Dataset::entities(), |e: &Entity| in_collection(&e.collection_id))?;
      if json {
        return print_json(&items);
      }
      print_header("Entities", items.len());
      for e in &items {
        println!("  {}  {}  [{}] {} fields", e.id, e.display_name(), e.collection_id, e.fields.len());
      }
    }
    RecordKind::Channels => {
      let items: Vec<ReleaseChannel> = store.list(&Dataset::release_channels())?;
      if json {
        return print_json(&items);
      }
      print_header("Release channels", items.len());
      for ch in &items {
        println!("  {}  {}  {} steps", ch.id, ch.name, ch.steps.len());
      }
    }
    RecordKind::Policies => {
      let items: Vec<Policy> = store.list(&Dataset::policies())?;
      if json {
        return print_json(&items);
      }
      print_header("Policies", items.len());
      for p in &items {
        println!("  {}  {}  {} fields", p.id, p.name, p.fields.len());
      }
    }
    RecordKind::Releases => {
      let mut items: Vec<ReleaseRecord> = Vec::new();
      for dataset in kind.datasets() {
        items.extend(store.list_where(&dataset, |r: &ReleaseRecord| in_collection(&r.collection_id))?);
      }
      items.sort_by(|a, b| a.created_at.cmp(&b.created_at));
      if json {
        return print_json(&items);
      }
      print_header("Releases", items.len());
      for r in &items {
        let icon = if r.status { "✅" } else { "❌" };
        println!("  {} {}  {}", icon, r.id, r.name);
      }
    }
  }

  Ok(())
}

fn print_header(title: &str, count: usize) {
  println!("📋 {} ({})", title, count);
  if count == 0 {
    println!("  (none)");
  }
}

fn or_dash(value: &str) -> &str {
  if value.trim().is_empty() { "-" } else { value }
}
