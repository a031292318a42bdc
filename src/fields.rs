//! Entity field normalization
//!
//! Entity fields reach us in several decoded shapes: a proper string-keyed map,
//! a YAML mapping with non-string keys, or the legacy list of `{Key, Value}`
//! records written by older tooling. Everything downstream works on a single
//! ordered [`FieldMap`].
//!
//! Normalization is total and idempotent. Legacy shapes are decoded once, in
//! [`deserialize`], when a record is read.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Number, Value};

/// Canonical entity field map: ordered, string-keyed, JSON-valued
pub type FieldMap = Map<String, Value>;

/// Normalize an already-decoded JSON value.
///
/// - objects are canonical and returned as-is
/// - arrays are treated as the legacy `{Key, Value}` list
/// - everything else yields an empty map
pub fn normalize(raw: &Value) -> FieldMap {
  match raw {
    Value::Object(map) => map.clone(),
    Value::Array(items) => from_key_value_list(items.iter().filter_map(json_pair)),
    _ => FieldMap::new(),
  }
}

/// Normalize a loosely typed YAML value.
///
/// Mapping keys are coerced to strings; entries whose key is blank after coercion
/// are dropped. Sequences are treated as the legacy `{Key, Value}` list.
pub fn normalize_yaml(raw: &serde_yaml::Value) -> FieldMap {
  match untag(raw) {
    serde_yaml::Value::Mapping(mapping) => {
      let mut out = FieldMap::new();
      for (k, v) in mapping {
        let key = coerce_key(k);
        if key.trim().is_empty() {
          continue;
        }
        out.insert(key, yaml_to_json(v));
      }
      out
    }
    serde_yaml::Value::Sequence(items) => from_key_value_list(items.iter().filter_map(yaml_pair)),
    _ => FieldMap::new(),
  }
}

/// Serde adapter for `Entity::fields`: accepts any shape, stores the canonical map
pub fn deserialize<'de, D>(deserializer: D) -> Result<FieldMap, D::Error>
where
  D: Deserializer<'de>,
{
  let raw = serde_yaml::Value::deserialize(deserializer)?;
  Ok(normalize_yaml(&raw))
}

/// Convert a YAML value into its JSON equivalent.
///
/// Tags are stripped, mapping keys coerced like field keys, non-finite floats become null.
pub fn yaml_to_json(value: &serde_yaml::Value) -> Value {
  match value {
    serde_yaml::Value::Null => Value::Null,
    serde_yaml::Value::Bool(b) => Value::Bool(*b),
    serde_yaml::Value::Number(n) => {
      if let Some(i) = n.as_i64() {
        Value::Number(i.into())
      } else if let Some(u) = n.as_u64() {
        Value::Number(u.into())
      } else {
        n.as_f64().and_then(Number::from_f64).map(Value::Number).unwrap_or(Value::Null)
      }
    }
    serde_yaml::Value::String(s) => Value::String(s.clone()),
    serde_yaml::Value::Sequence(items) => Value::Array(items.iter().map(yaml_to_json).collect()),
    serde_yaml::Value::Mapping(mapping) => Value::Object(
      mapping
        .iter()
        .map(|(k, v)| (coerce_key(k), yaml_to_json(v)))
        .collect(),
    ),
    serde_yaml::Value::Tagged(tagged) => yaml_to_json(&tagged.value),
  }
}

/// String form of a scalar used as a map key or string config value.
///
/// Strings are returned verbatim, numbers and booleans via display, everything else is empty.
pub fn coerce_key(key: &serde_yaml::Value) -> String {
  match untag(key) {
    serde_yaml::Value::String(s) => s.clone(),
    serde_yaml::Value::Number(n) => n.to_string(),
    serde_yaml::Value::Bool(b) => b.to_string(),
    _ => String::new(),
  }
}

/// Display form of a JSON scalar, used when a string is expected
pub fn display_value(value: &Value) -> String {
  match value {
    Value::Null => String::new(),
    Value::String(s) => s.clone(),
    Value::Bool(b) => b.to_string(),
    Value::Number(n) => n.to_string(),
    other => other.to_string(),
  }
}

fn untag(value: &serde_yaml::Value) -> &serde_yaml::Value {
  match value {
    serde_yaml::Value::Tagged(tagged) => untag(&tagged.value),
    other => other,
  }
}

fn from_key_value_list(pairs: impl Iterator<Item = (String, Value)>) -> FieldMap {
  let mut out = FieldMap::new();
  for (key, value) in pairs {
    if key.trim().is_empty() {
      continue;
    }
    out.insert(key, value);
  }
  out
}

fn json_pair(item: &Value) -> Option<(String, Value)> {
  let obj = item.as_object()?;
  let key = obj.get("Key").or_else(|| obj.get("key"))?;
  let value = obj.get("Value").or_else(|| obj.get("value"))?;
  match key {
    Value::Object(_) | Value::Array(_) => None,
    scalar => Some((display_value(scalar), value.clone())),
  }
}

fn yaml_pair(item: &serde_yaml::Value) -> Option<(String, Value)> {
  let mapping = untag(item).as_mapping()?;
  let key = mapping.get("Key").or_else(|| mapping.get("key"))?;
  let value = mapping.get("Value").or_else(|| mapping.get("value"))?;
  Some((coerce_key(key), yaml_to_json(value)))
}
