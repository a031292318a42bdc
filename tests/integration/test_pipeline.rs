//! End-to-end release scenarios through the pipeline and the release service

use crate::helpers::*;
use anyhow::Result;
use pocket_ssot::model::{Collection, ReleaseChannel, ReleaseRecord};
use pocket_ssot::release::service::{release_collection, release_entity, set_entity_field};
use pocket_ssot::release::{ExecutorOptions, HandlebarsRenderer, Pipeline, StepExecutor};
use pocket_ssot::store::Dataset;
use serde_json::json;
use std::sync::Arc;

fn pipeline() -> Pipeline {
  Pipeline::new(StepExecutor::new(
    Arc::new(HandlebarsRenderer::new()),
    ExecutorOptions::default(),
  ))
}

#[test]
fn test_fan_out_template_writes_per_entity_files() -> Result<()> {
  let ts = TestStore::new()?;
  let steps = vec![step(
    "render",
    "template",
    1,
    json!({
      "template": "Hello {{entity.Name}}",
      "path": format!("{}/{{{{entity.Name}}}}.txt", ts.out.display()),
      "eachEntity": true
    }),
  )];
  let (collection, entities) = ts.seed(steps.clone(), &["a", "b"])?;

  let results = pipeline().run(&collection, &ReleaseChannel::new("deploy"), &entities, &steps);

  assert_eq!(ts.read_out("a.txt")?, "Hello a");
  assert_eq!(ts.read_out("b.txt")?, "Hello b");
  assert_eq!(results.len(), 3);
  assert_eq!(results[2].output.as_deref(), Some("wrote 2 files"));
  assert!(results.iter().all(|r| r.status));

  Ok(())
}

#[test]
fn test_steps_follow_order_not_position() -> Result<()> {
  let ts = TestStore::new()?;
  let write_step = |name: &str, order: i64| {
    step(
      name,
      "template",
      order,
      json!({"template": name, "path": ts.out.join(format!("{}.txt", order)).display().to_string()}),
    )
  };
  let steps = vec![write_step("third", 30), write_step("first", 10), write_step("second", 20)];
  let (collection, entities) = ts.seed(steps.clone(), &["a"])?;

  let results = pipeline().run(&collection, &ReleaseChannel::new("deploy"), &entities, &steps);
  let names: Vec<_> = results.iter().map(|r| r.name.as_str()).collect();
  assert_eq!(names, vec!["first", "second", "third"]);
  assert_eq!(ts.read_out("20.txt")?, "second");

  Ok(())
}

#[cfg(unix)]
#[test]
fn test_failing_shell_step_blocks_later_steps() -> Result<()> {
  let ts = TestStore::new()?;
  let marker = ts.out.join("after.txt");
  let steps = vec![
    step("fail", "shell", 1, json!({"shell": "exit 3"})),
    step(
      "after",
      "template",
      2,
      json!({"template": "x", "path": marker.display().to_string()}),
    ),
  ];
  let (collection, entities) = ts.seed(steps.clone(), &["a"])?;

  let results = pipeline().run(&collection, &ReleaseChannel::new("deploy"), &entities, &steps);
  assert_eq!(results.len(), 1);
  assert!(!results[0].status);
  assert!(results[0].error.as_deref().unwrap_or_default().contains('3'));
  assert_eq!(results[0].output.as_deref(), Some("ok"));
  assert!(!marker.exists());

  Ok(())
}

#[cfg(unix)]
#[test]
fn test_collection_release_records_shell_and_template_steps() -> Result<()> {
  let ts = TestStore::new()?;
  let steps = vec![
    step(
      "hosts",
      "template",
      1,
      json!({
        "template": "{{#each entities}}{{this.Name}}:{{this.Fields.port}}\n{{/each}}",
        "path": ts.out.join("hosts.txt").display().to_string()
      }),
    ),
    step(
      "count",
      "shell",
      2,
      json!({"shell": "wc -l < hosts.txt | tr -d ' '", "workdir": ts.out.display().to_string()}),
    ),
  ];
  ts.seed(steps, &["api", "db"])?;
  let store = ts.open()?;

  let record = release_collection(&store, &pipeline(), "c1", None)?;
  assert!(record.status, "release failed: {:?}", record.errors());
  assert_eq!(ts.read_out("hosts.txt")?, "api:8000\ndb:8001\n");
  assert_eq!(record.results.len(), 2);
  assert_eq!(record.results[1].output.as_deref(), Some("2\n"));

  let stored: Vec<ReleaseRecord> = store.list(&Dataset::collection_releases())?;
  assert_eq!(stored.len(), 1);
  assert!(ts.file_exists(&format!("releases/collections/c1/{}.yaml", record.id)));

  Ok(())
}

#[cfg(unix)]
#[test]
fn test_callback_value_feeds_next_entity_release() -> Result<()> {
  let ts = TestStore::new()?;
  let steps = vec![step(
    "echo",
    "shell",
    1,
    json!({"shell": "printf '%s' \"$VERSION\"", "env": {"VERSION": "{{entity.Fields.version}}"}, "eachEntity": true}),
  )];
  ts.seed(steps, &["api"])?;
  let store = ts.open()?;

  set_entity_field(&store, "e-api", "version", json!("1.2.3"))?;
  let record = release_entity(&store, &pipeline(), "e-api", None)?;

  assert!(record.status);
  assert_eq!(record.results[0].output.as_deref(), Some("1.2.3"));
  assert_eq!(record.results[1].output.as_deref(), Some("ran 1 commands"));
  assert_eq!(record.entity_id.as_deref(), Some("e-api"));

  Ok(())
}

#[test]
fn test_invalid_step_records_single_failure() -> Result<()> {
  let ts = TestStore::new()?;
  let steps = vec![
    step("ok", "template", 1, json!({"template": "x", "path": ts.out.join("ok.txt").display().to_string()})),
    step("bad", "template", 2, json!({"path": "/tmp/missing-template"})),
  ];
  ts.seed(steps, &["a"])?;
  let store = ts.open()?;

  let record = release_collection(&store, &pipeline(), "c1", None)?;
  assert!(!record.status);
  assert_eq!(record.results.len(), 1);
  assert_eq!(record.errors(), vec!["template step missing config.template"]);
  assert!(!ts.out.join("ok.txt").exists());

  // Failed releases are persisted like successful ones.
  let collection: Collection = store.find_by_id(&Dataset::collections(), "c1")?.expect("collection");
  let stored: Vec<ReleaseRecord> = store.list_where(&Dataset::collection_releases(), |r: &ReleaseRecord| {
    r.collection_id == collection.id
  })?;
  assert_eq!(stored.len(), 1);

  Ok(())
}
