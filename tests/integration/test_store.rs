//! Tests for the record store on disk

use crate::helpers::*;
use anyhow::Result;
use pocket_ssot::model::{Collection, Entity, ReleaseRecord, StepResult};
use pocket_ssot::store::{Dataset, Store, tmp_path};
use serde_json::json;
use std::sync::Arc;
use std::thread;

#[test]
fn test_records_survive_reopen() -> Result<()> {
  let ts = TestStore::new()?;
  ts.seed(vec![], &["api", "db"])?;

  let store = ts.open()?;
  let entities: Vec<Entity> = store.list(&Dataset::entities())?;
  assert_eq!(entities.len(), 2);
  assert!(ts.file_exists("entities/c1/e-api.yaml"));
  assert!(ts.file_exists("collections/c1.yaml"));
  assert!(ts.file_exists("release-channels/rc1.yaml"));

  Ok(())
}

#[test]
fn test_reads_hand_written_legacy_entity() -> Result<()> {
  let ts = TestStore::new()?;
  let dir = ts.path.join("entities/c1");
  std::fs::create_dir_all(&dir)?;
  std::fs::write(
    dir.join("legacy.yaml"),
    r#"id: legacy
name: old-api
collectionId: c1
fields:
  - Key: port
    Value: 9000
  - Key: tls
    Value: true
"#,
  )?;

  let store = ts.open()?;
  let entity: Entity = store
    .find_by_id(&Dataset::entities(), "legacy")?
    .expect("legacy entity should load");
  assert_eq!(entity.fields.get("port"), Some(&json!(9000)));
  assert_eq!(entity.fields.get("tls"), Some(&json!(true)));

  // Rewriting stores the canonical map shape.
  store.update_by_id(&Dataset::entities(), "legacy", |e: &mut Entity| e.name = "api".to_string())?;
  let text = std::fs::read_to_string(dir.join("legacy.yaml"))?;
  assert!(text.contains("port: 9000"));
  assert!(!text.contains("Key:"));

  Ok(())
}

#[test]
fn test_other_extension_files_are_ignored() -> Result<()> {
  let ts = TestStore::new()?;
  let dir = ts.path.join("collections");
  std::fs::create_dir_all(&dir)?;
  std::fs::write(dir.join("notes.txt"), "not a record")?;
  std::fs::write(dir.join("c1.yml"), "id: c1\nname: web\n")?;

  let yaml_store = ts.open()?;
  assert!(yaml_store.list::<Collection>(&Dataset::collections())?.is_empty());

  let yml_store = Store::open(&ts.path, "yml")?;
  let found: Vec<Collection> = yml_store.list(&Dataset::collections())?;
  assert_eq!(found.len(), 1);
  assert_eq!(found[0].name, "web");

  Ok(())
}

#[test]
fn test_crash_before_rename_keeps_original() -> Result<()> {
  let ts = TestStore::new()?;
  ts.seed(vec![], &["api"])?;
  let path = ts.path.join("entities/c1/e-api.yaml");
  let before = std::fs::read(&path)?;

  std::fs::write(tmp_path(&path), "id: e-api\nname: torn")?;

  let store = ts.open()?;
  let entity: Entity = store.find_by_id(&Dataset::entities(), "e-api")?.expect("entity");
  assert_eq!(entity.name, "api");
  assert_eq!(std::fs::read(&path)?, before);

  // The next successful write replaces the stale temp file.
  store.update_by_id(&Dataset::entities(), "e-api", |e: &mut Entity| e.name = "api2".to_string())?;
  assert!(!tmp_path(&path).exists());

  Ok(())
}

#[test]
fn test_parallel_writers_on_distinct_keys() -> Result<()> {
  let ts = TestStore::new()?;
  let store = Arc::new(ts.open()?);

  let handles: Vec<_> = (0..16)
    .map(|i| {
      let store = Arc::clone(&store);
      thread::spawn(move || {
        let mut record = ReleaseRecord::new(
          format!("run {}", i),
          "c1",
          Some(format!("e{}", i % 4)),
          "rc1",
          vec![StepResult::success("s", "ok")],
        );
        record.id = format!("r{}", i);
        store.insert_record(&Dataset::entity_releases(), &record)
      })
    })
    .collect();

  for handle in handles {
    handle.join().expect("writer thread panicked")?;
  }

  let all: Vec<ReleaseRecord> = store.list(&Dataset::entity_releases())?;
  assert_eq!(all.len(), 16);
  let for_e0: Vec<ReleaseRecord> = store.list_where(&Dataset::entity_releases(), |r: &ReleaseRecord| {
    r.entity_id.as_deref() == Some("e0")
  })?;
  assert_eq!(for_e0.len(), 4);
  assert!(ts.file_exists("releases/entities/e0/r0.yaml"));

  Ok(())
}
