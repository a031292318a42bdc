//! Typed step configuration
//!
//! Channel steps carry an opaque YAML `config`. It is parsed once, before the
//! pipeline runs anything, into a [`StepConfig`]; a step that cannot be parsed
//! stops the release before any side effect happens.

use crate::fields::coerce_key;
use crate::model::ReleaseChannelStep;
use crate::release::{StepFailure, StepOutcome};
use serde_yaml::Value;

/// Parsed configuration of one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepConfig {
  Template(TemplateStep),
  Shell(ShellStep),
  /// Unsupported step type; runs as a successful no-op
  Unknown(String),
}

/// `template` step: render `template` and write it to the rendered `path`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateStep {
  pub template: String,
  pub path: String,
  pub each_entity: bool,
}

/// `shell` step: run the rendered `shell` command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellStep {
  pub shell: String,
  pub workdir: Option<String>,
  /// Key and value are both templates, in config order
  pub env: Vec<(String, String)>,
  pub each_entity: bool,
}

impl StepConfig {
  /// Parse a channel step. Only `template` and `shell` configs are inspected.
  pub fn parse(step: &ReleaseChannelStep) -> StepOutcome<Self> {
    let cfg = ConfigMap::from_value(&step.config)
      .ok_or_else(|| StepFailure::configuration("step config is missing or not an object/map"))?;

    match step.step_type.as_str() {
      "template" => {
        let path = cfg.string("path");
        let template = cfg.string("template");
        if path.trim().is_empty() {
          return Err(StepFailure::configuration("template step missing config.path"));
        }
        if template.trim().is_empty() {
          return Err(StepFailure::configuration("template step missing config.template"));
        }
        Ok(StepConfig::Template(TemplateStep {
          template,
          path,
          each_entity: cfg.flag("eachEntity"),
        }))
      }
      "shell" => {
        let shell = cfg.string("shell");
        if shell.trim().is_empty() {
          return Err(StepFailure::configuration("shell step missing config.shell"));
        }
        let workdir = Some(cfg.string("workdir")).filter(|w| !w.trim().is_empty());
        Ok(StepConfig::Shell(ShellStep {
          shell,
          workdir,
          env: cfg.env()?,
          each_entity: cfg.flag("eachEntity"),
        }))
      }
      other => Ok(StepConfig::Unknown(other.to_string())),
    }
  }

  pub fn each_entity(&self) -> bool {
    match self {
      StepConfig::Template(t) => t.each_entity,
      StepConfig::Shell(s) => s.each_entity,
      StepConfig::Unknown(_) => false,
    }
  }
}

/// String-keyed view over a YAML mapping
struct ConfigMap<'a> {
  entries: Vec<(String, &'a Value)>,
}

impl<'a> ConfigMap<'a> {
  fn from_value(value: &'a Value) -> Option<Self> {
    let mapping = match value {
      Value::Mapping(m) => m,
      Value::Tagged(tagged) => return Self::from_value(&tagged.value),
      _ => return None,
    };
    let entries = mapping
      .iter()
      .map(|(k, v)| (coerce_key(k), v))
      .filter(|(k, _)| !k.trim().is_empty())
      .collect();
    Some(Self { entries })
  }

  fn get(&self, key: &str) -> Option<&'a Value> {
    self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| *v)
  }

  /// Scalar as a string; missing or non-scalar values are empty
  fn string(&self, key: &str) -> String {
    self.get(key).map(coerce_key).unwrap_or_default()
  }

  /// `true`/`false` booleans or strings (any case); anything else is false
  fn flag(&self, key: &str) -> bool {
    match self.get(key) {
      Some(Value::Bool(b)) => *b,
      Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
      Some(Value::Tagged(tagged)) => matches!(&tagged.value, Value::Bool(true)),
      _ => false,
    }
  }

  fn env(&self) -> StepOutcome<Vec<(String, String)>> {
    let Some(raw) = self.get("env") else {
      return Ok(Vec::new());
    };
    if raw.is_null() {
      return Ok(Vec::new());
    }
    let map = ConfigMap::from_value(raw).ok_or_else(|| StepFailure::configuration("shell step config.env must be a map"))?;
    Ok(
      map
        .entries
        .into_iter()
        .map(|(k, v)| (k, coerce_key(v)))
        .collect(),
    )
  }
}
