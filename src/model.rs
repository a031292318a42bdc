//! Records persisted in the store and exchanged with the release engine
//!
//! Field names serialize in camelCase to stay readable alongside files written by
//! earlier pocket-ssot versions.

use crate::fields::{self, FieldMap};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn new_id() -> String {
  uuid::Uuid::new_v4().to_string()
}

/// Named grouping of entities sharing policies and release channels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Collection {
  pub id: String,
  pub name: String,
  pub allow_extra_fields: bool,
  pub policies: Vec<String>,
  /// Channel used by collection-level releases
  pub release_channel_collection: String,
  /// Channel used by entity-level releases
  pub release_channel_entity: String,
  pub created_at: DateTime<Utc>,
}

impl Default for Collection {
  fn default() -> Self {
    Self {
      id: new_id(),
      name: String::new(),
      allow_extra_fields: true,
      policies: Vec::new(),
      release_channel_collection: String::new(),
      release_channel_entity: String::new(),
      created_at: Utc::now(),
    }
  }
}

impl Collection {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      ..Default::default()
    }
  }
}

/// A configuration record with free-form fields, owned by one collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Entity {
  pub id: String,
  pub name: String,
  #[serde(deserialize_with = "fields::deserialize")]
  pub fields: FieldMap,
  pub collection_id: String,
  pub created_at: DateTime<Utc>,
}

impl Default for Entity {
  fn default() -> Self {
    Self {
      id: new_id(),
      name: String::new(),
      fields: FieldMap::new(),
      collection_id: String::new(),
      created_at: Utc::now(),
    }
  }
}

impl Entity {
  pub fn new(name: impl Into<String>, collection_id: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      collection_id: collection_id.into(),
      ..Default::default()
    }
  }

  /// Builder-style field setter
  pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
    self.fields.insert(name.into(), value);
    self
  }

  /// Template-facing projection of this entity
  pub fn view(&self) -> EntityView<'_> {
    EntityView {
      id: &self.id,
      name: &self.name,
      collection_id: &self.collection_id,
      fields: &self.fields,
    }
  }

  /// Name for display, falling back to the id
  pub fn display_name(&self) -> &str {
    if self.name.trim().is_empty() { &self.id } else { &self.name }
  }
}

/// What templates see as `entity` / `entities[]`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct EntityView<'a> {
  pub id: &'a str,
  pub name: &'a str,
  pub collection_id: &'a str,
  pub fields: &'a FieldMap,
}

/// Field-schema definition. Carried as metadata only; nothing validates against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Policy {
  pub id: String,
  pub name: String,
  pub fields: Vec<PolicyField>,
  pub created_at: DateTime<Utc>,
}

impl Default for Policy {
  fn default() -> Self {
    Self {
      id: new_id(),
      name: String::new(),
      fields: Vec::new(),
      created_at: Utc::now(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PolicyField {
  pub name: String,
  pub label: String,
  #[serde(rename = "type")]
  pub field_type: String,
  pub order: i64,
  pub config: serde_yaml::Value,
}

impl Default for PolicyField {
  fn default() -> Self {
    Self {
      name: String::new(),
      label: String::new(),
      field_type: String::new(),
      order: 0,
      config: serde_yaml::Value::Mapping(serde_yaml::Mapping::new()),
    }
  }
}

/// An ordered set of steps describing how a collection or entity is released
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReleaseChannel {
  pub id: String,
  pub name: String,
  pub allow_extra_fields: bool,
  /// Stored order is not execution order; `ReleaseChannelStep::order` is
  pub steps: Vec<ReleaseChannelStep>,
  pub created_at: DateTime<Utc>,
}

impl Default for ReleaseChannel {
  fn default() -> Self {
    Self {
      id: new_id(),
      name: String::new(),
      allow_extra_fields: false,
      steps: Vec::new(),
      created_at: Utc::now(),
    }
  }
}

impl ReleaseChannel {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      ..Default::default()
    }
  }

  pub fn with_step(mut self, step: ReleaseChannelStep) -> Self {
    self.steps.push(step);
    self
  }
}

/// One pipeline step; `config` stays opaque until the pipeline parses it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReleaseChannelStep {
  pub name: String,
  #[serde(rename = "type")]
  pub step_type: String,
  pub order: i64,
  pub config: serde_yaml::Value,
  pub created_at: DateTime<Utc>,
}

impl Default for ReleaseChannelStep {
  fn default() -> Self {
    Self {
      name: String::new(),
      step_type: String::new(),
      order: 0,
      config: serde_yaml::Value::Mapping(serde_yaml::Mapping::new()),
      created_at: Utc::now(),
    }
  }
}

impl ReleaseChannelStep {
  pub fn new(name: impl Into<String>, step_type: impl Into<String>, order: i64, config: serde_yaml::Value) -> Self {
    Self {
      name: name.into(),
      step_type: step_type.into(),
      order,
      config,
      ..Default::default()
    }
  }

  /// Name shown in results: the step name, or its type when unnamed
  pub fn display_name(&self) -> &str {
    if self.name.trim().is_empty() {
      &self.step_type
    } else {
      &self.name
    }
  }
}

/// Outcome of one step, or of one entity inside a fan-out step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
  pub name: String,
  pub status: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub output: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub meta: Option<Value>,
  #[serde(default = "Utc::now")]
  pub created_at: DateTime<Utc>,
}

impl StepResult {
  pub fn success(name: impl Into<String>, output: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      status: true,
      error: None,
      output: Some(output.into()),
      meta: None,
      created_at: Utc::now(),
    }
  }

  pub fn failure(name: impl Into<String>, error: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      status: false,
      error: Some(error.into()),
      output: None,
      meta: None,
      created_at: Utc::now(),
    }
  }

  pub fn with_output(mut self, output: impl Into<String>) -> Self {
    self.output = Some(output.into());
    self
  }

  pub fn with_meta(mut self, meta: Value) -> Self {
    self.meta = Some(meta);
    self
  }
}

/// Persisted outcome of one pipeline run. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseRecord {
  pub id: String,
  pub name: String,
  pub collection_id: String,
  /// `None` for collection-level releases
  #[serde(default)]
  pub entity_id: Option<String>,
  pub release_channel_id: String,
  pub status: bool,
  #[serde(default)]
  pub results: Vec<StepResult>,
  #[serde(default = "Utc::now")]
  pub created_at: DateTime<Utc>,
}

impl ReleaseRecord {
  /// Wrap pipeline results; status is true only when every result succeeded
  pub fn new(
    name: impl Into<String>,
    collection_id: impl Into<String>,
    entity_id: Option<String>,
    release_channel_id: impl Into<String>,
    results: Vec<StepResult>,
  ) -> Self {
    let status = results.iter().all(|r| r.status);
    Self {
      id: new_id(),
      name: name.into(),
      collection_id: collection_id.into(),
      entity_id,
      release_channel_id: release_channel_id.into(),
      status,
      results,
      created_at: Utc::now(),
    }
  }

  pub fn is_entity_release(&self) -> bool {
    self.entity_id.is_some()
  }

  /// Errors of every failed result, in order
  pub fn errors(&self) -> Vec<&str> {
    self
      .results
      .iter()
      .filter(|r| !r.status)
      .filter_map(|r| r.error.as_deref())
      .filter(|e| !e.is_empty())
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_collection_yaml_uses_camel_case() {
    let mut collection = Collection::new("web");
    collection.release_channel_collection = "rc1".to_string();
    let yaml = serde_yaml::to_string(&collection).unwrap();
    assert!(yaml.contains("releaseChannelCollection: rc1"));
    assert!(yaml.contains("allowExtraFields: true"));
  }

  #[test]
  fn test_entity_decodes_legacy_fields() {
    let entity: Entity = serde_yaml::from_str(
      r#"
id: e1
name: api
collectionId: c1
fields:
  - Key: port
    Value: 8080
"#,
    )
    .unwrap();
    assert_eq!(entity.fields.get("port"), Some(&json!(8080)));
    assert_eq!(entity.collection_id, "c1");
  }

  #[test]
  fn test_entity_missing_fields_defaults_empty() {
    let entity: Entity = serde_yaml::from_str("id: e1\nname: api\ncollectionId: c1\n").unwrap();
    assert!(entity.fields.is_empty());
  }

  #[test]
  fn test_entity_view_keys() {
    let entity = Entity::new("api", "c1").with_field("port", json!(80));
    let view = serde_json::to_value(entity.view()).unwrap();
    assert_eq!(view["Name"], json!("api"));
    assert_eq!(view["CollectionId"], json!("c1"));
    assert_eq!(view["Fields"]["port"], json!(80));
    assert!(view.get("Id").is_some());
  }

  #[test]
  fn test_step_display_name_falls_back_to_type() {
    let step = ReleaseChannelStep::new("  ", "shell", 1, serde_yaml::Value::Null);
    assert_eq!(step.display_name(), "shell");
  }

  #[test]
  fn test_release_record_status_and_errors() {
    let ok = ReleaseRecord::new("r", "c1", None, "rc1", vec![StepResult::success("a", "ok")]);
    assert!(ok.status);
    assert!(!ok.is_entity_release());

    let failed = ReleaseRecord::new(
      "r",
      "c1",
      Some("e1".to_string()),
      "rc1",
      vec![StepResult::success("a", "ok"), StepResult::failure("b", "boom")],
    );
    assert!(!failed.status);
    assert_eq!(failed.errors(), vec!["boom"]);
  }

  #[test]
  fn test_step_result_omits_empty_optionals() {
    let yaml = serde_yaml::to_string(&StepResult::success("a", "ok")).unwrap();
    assert!(!yaml.contains("error"));
    assert!(!yaml.contains("meta"));
  }
}
