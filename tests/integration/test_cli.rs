//! Tests for the `ssot` binary

use crate::helpers::*;
use anyhow::Result;
use serde_json::{Value, json};

#[test]
fn test_create_and_list_records() -> Result<()> {
  let ts = TestStore::new()?;

  run_ssot(&ts.path, &["create", "channel", "files", "--id", "rc1"])?;
  run_ssot(
    &ts.path,
    &["create", "collection", "Web", "--id", "c1", "--collection-channel", "files"],
  )?;
  run_ssot(
    &ts.path,
    &["create", "entity", "api", "--collection", "web", "--id", "e1", "--field", "port=8080", "--field", "env=prod"],
  )?;

  let listed: Value = serde_json::from_str(&stdout(&run_ssot(&ts.path, &["list", "entities", "--json"])?))?;
  let entities = listed.as_array().expect("array");
  assert_eq!(entities.len(), 1);
  assert_eq!(entities[0]["collectionId"], json!("c1"));
  assert_eq!(entities[0]["fields"], json!({"port": 8080, "env": "prod"}));

  let collection: Value = serde_json::from_str(&stdout(&run_ssot(&ts.path, &["show", "collection", "WEB", "--json"])?))?;
  assert_eq!(collection["releaseChannelCollection"], json!("rc1"));

  let text = stdout(&run_ssot(&ts.path, &["list", "collections"])?);
  assert!(text.contains("c1"));
  assert!(text.contains("Web"));

  Ok(())
}

#[test]
fn test_duplicate_name_is_user_error() -> Result<()> {
  let ts = TestStore::new()?;
  run_ssot(&ts.path, &["create", "collection", "web"])?;

  let output = ssot(&ts.path, &["create", "collection", "WEB"])?;
  assert_eq!(output.status.code(), Some(1));
  assert!(String::from_utf8_lossy(&output.stderr).contains("already exists"));

  Ok(())
}

#[test]
fn test_show_unknown_record_fails() -> Result<()> {
  let ts = TestStore::new()?;
  let output = ssot(&ts.path, &["show", "entity", "ghost"])?;
  assert_eq!(output.status.code(), Some(1));
  assert!(String::from_utf8_lossy(&output.stderr).contains("entity 'ghost' not found"));

  Ok(())
}

#[test]
fn test_set_field_parses_values() -> Result<()> {
  let ts = TestStore::new()?;
  ts.seed(vec![], &["api"])?;

  run_ssot(&ts.path, &["set-field", "api", "replicas", "3"])?;
  run_ssot(&ts.path, &["set-field", "e-api", "owner", r#"{"value": "team-a"}"#])?;
  run_ssot(&ts.path, &["set-field", "api", "note", "just text"])?;

  let entity: Value = serde_json::from_str(&stdout(&run_ssot(&ts.path, &["show", "entity", "e-api", "--json"])?))?;
  assert_eq!(entity["fields"]["replicas"], json!(3));
  assert_eq!(entity["fields"]["owner"], json!("team-a"));
  assert_eq!(entity["fields"]["note"], json!("just text"));
  assert_eq!(entity["fields"]["port"], json!(8000));

  Ok(())
}

#[test]
fn test_release_collection_from_cli() -> Result<()> {
  let ts = TestStore::new()?;
  ts.seed(
    vec![step(
      "render",
      "template",
      1,
      json!({
        "template": "{{entity.Name}} listens on {{entity.Fields.port}}",
        "path": format!("{}/{{{{entity.Name}}}}.conf", ts.out.display()),
        "eachEntity": true
      }),
    )],
    &["api", "db"],
  )?;

  let output = run_ssot(&ts.path, &["release", "collection", "web"])?;
  let text = stdout(&output);
  assert!(text.contains("done"));
  assert!(text.contains("wrote 2 files"));
  assert_eq!(ts.read_out("db.conf")?, "db listens on 8001");

  let releases: Value = serde_json::from_str(&stdout(&run_ssot(&ts.path, &["list", "releases", "--json"])?))?;
  assert_eq!(releases.as_array().map(Vec::len), Some(1));
  assert_eq!(releases[0]["status"], json!(true));
  assert_eq!(releases[0]["entityId"], Value::Null);

  Ok(())
}

#[cfg(unix)]
#[test]
fn test_failed_release_exits_with_validation_code() -> Result<()> {
  let ts = TestStore::new()?;
  ts.seed(vec![step("boom", "shell", 1, json!({"shell": "echo nope >&2; exit 4"}))], &["api"])?;

  let output = ssot(&ts.path, &["release", "entity", "api", "--json"])?;
  assert_eq!(output.status.code(), Some(3));

  let record: Value = serde_json::from_str(&stdout(&output))?;
  assert_eq!(record["status"], json!(false));
  assert_eq!(record["entityId"], json!("e-api"));
  assert_eq!(record["results"][0]["error"], json!("shell command failed (exit 4)"));
  assert_eq!(record["results"][0]["output"], json!("nope\n"));

  let id = record["id"].as_str().expect("release id");
  let shown = run_ssot(&ts.path, &["show", "release", id])?;
  assert!(stdout(&shown).contains("exit 4"));

  Ok(())
}

#[test]
fn test_config_file_sets_store_location() -> Result<()> {
  let ts = TestStore::new()?;
  let config_dir = tempfile::TempDir::new()?;
  let config = config_dir.path().join("pocket-ssot.toml");
  std::fs::write(
    &config,
    format!("[store]\nbase_dir = \"{}\"\nextension = \"yml\"\n", ts.path.display()),
  )?;

  let output = std::process::Command::new(env!("CARGO_BIN_EXE_ssot"))
    .current_dir(config_dir.path())
    .args(["create", "collection", "via-config", "--id", "cfg1"])
    .env_remove("POCKET_SSOT_STORE")
    .output()?;
  assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
  assert!(ts.file_exists("collections/cfg1.yml"));

  Ok(())
}

#[test]
fn test_invalid_config_is_user_error() -> Result<()> {
  let ts = TestStore::new()?;
  let config = ts.out.join("bad.toml");
  std::fs::write(&config, "[release]\nmax_parallel_entities = 0\n")?;

  let output = ssot(&ts.path, &["--config", &config.display().to_string(), "list", "collections"])?;
  assert_eq!(output.status.code(), Some(1));
  assert!(String::from_utf8_lossy(&output.stderr).contains("max_parallel_entities"));

  Ok(())
}

#[test]
fn test_create_channel_from_yaml_file() -> Result<()> {
  let ts = TestStore::new()?;
  let definition = ts.out.join("channel.yaml");
  std::fs::write(
    &definition,
    r#"id: ignored
name: will-be-replaced
steps:
  - name: render
    type: template
    order: 2
    config:
      template: "{{entity.Name}}"
      path: /tmp/never-written
  - name: announce
    type: shell
    order: 1
    config:
      shell: echo hi
"#,
  )?;

  run_ssot(
    &ts.path,
    &["create", "channel", "files", "--from", &definition.display().to_string()],
  )?;

  let channel: Value = serde_json::from_str(&stdout(&run_ssot(&ts.path, &["show", "channel", "files", "--json"])?))?;
  assert_ne!(channel["id"], json!("ignored"));
  assert_eq!(channel["name"], json!("files"));
  assert_eq!(channel["steps"].as_array().map(Vec::len), Some(2));
  assert_eq!(channel["steps"][1]["config"]["shell"], json!("echo hi"));

  Ok(())
}
