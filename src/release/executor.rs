//! Single-step execution
//!
//! [`StepExecutor::execute`] runs one parsed step and returns every result it
//! produced: per-entity children first (fan-out only), then the parent summary.
//! It never fails; faults are folded into a failed parent carrying
//! `meta.exception`.

use crate::core::config::ReleaseConfig;
use crate::model::{Collection, Entity, StepResult};
use crate::release::config::{ShellStep, StepConfig, TemplateStep};
use crate::release::render::TemplateRenderer;
use crate::release::shell::{self, ShellCommand};
use crate::release::{StepFailure, StepOutcome};
use crate::utils::resolve_output_path;
use rayon::prelude::*;
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Knobs for step execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorOptions {
  /// Shell executable for `shell` steps
  pub shell: String,
  /// Kill shell commands running longer than this
  pub shell_timeout: Option<Duration>,
  /// Upper bound on entities processed at once in fan-out steps (1 = sequential)
  pub max_parallel_entities: usize,
}

impl Default for ExecutorOptions {
  fn default() -> Self {
    Self::from(&ReleaseConfig::default())
  }
}

impl From<&ReleaseConfig> for ExecutorOptions {
  fn from(config: &ReleaseConfig) -> Self {
    Self {
      shell: config.shell.clone(),
      shell_timeout: config.shell_timeout(),
      max_parallel_entities: config.max_parallel_entities.max(1),
    }
  }
}

/// Executes template and shell steps
pub struct StepExecutor {
  renderer: Arc<dyn TemplateRenderer>,
  options: ExecutorOptions,
  pool: Option<rayon::ThreadPool>,
}

impl std::fmt::Debug for StepExecutor {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("StepExecutor")
      .field("options", &self.options)
      .field("parallel", &self.pool.is_some())
      .finish_non_exhaustive()
  }
}

impl StepExecutor {
  pub fn new(renderer: Arc<dyn TemplateRenderer>, options: ExecutorOptions) -> Self {
    let pool = if options.max_parallel_entities > 1 {
      match rayon::ThreadPoolBuilder::new()
        .num_threads(options.max_parallel_entities)
        .thread_name(|i| format!("ssot-fanout-{}", i))
        .build()
      {
        Ok(pool) => Some(pool),
        Err(e) => {
          tracing::warn!(error = %e, "could not build fan-out pool, running entities sequentially");
          None
        }
      }
    } else {
      None
    };

    Self {
      renderer,
      options,
      pool,
    }
  }

  pub fn options(&self) -> &ExecutorOptions {
    &self.options
  }

  /// Run one step. Children (if any) come first, the parent summary last.
  pub fn execute(&self, name: &str, config: &StepConfig, collection: &Collection, entities: &[Entity]) -> Vec<StepResult> {
    let outcome = match config {
      StepConfig::Template(step) => self.run_template(name, step, collection, entities),
      StepConfig::Shell(step) => self.run_shell(name, step, collection, entities),
      StepConfig::Unknown(step_type) => Ok(vec![
        StepResult::success(name, "skipped (unsupported step type)").with_meta(json!({ "type": step_type })),
      ]),
    };

    match outcome {
      Ok(results) => results,
      Err(failure) => vec![failed_step(name, &failure)],
    }
  }

  // ---------------------------------------------------------------------------
  // template
  // ---------------------------------------------------------------------------

  fn run_template(
    &self,
    name: &str,
    step: &TemplateStep,
    collection: &Collection,
    entities: &[Entity],
  ) -> StepOutcome<Vec<StepResult>> {
    let collection_value = collection_value(collection)?;

    if !step.each_entity {
      let context = all_entities_context(&collection_value, entities);
      let (path, bytes) = self.render_and_write(step, &context)?;
      return Ok(vec![
        StepResult::success(name, format!("wrote {} bytes to {}", bytes, path.display()))
          .with_meta(json!({ "path": path.display().to_string() })),
      ]);
    }

    require_entities(entities)?;

    let mut results = self.for_each_entity(entities, |entity| {
      let context = entity_context(&collection_value, entity);
      match self.render_and_write(step, &context) {
        Ok((path, bytes)) => StepResult::success(name, format!("wrote {} bytes to {}", bytes, path.display())).with_meta(
          json!({ "eachEntity": true, "entityId": entity.id, "path": path.display().to_string() }),
        ),
        Err(failure) => StepResult::failure(name, failure.message).with_meta(json!({ "eachEntity": true, "entityId": entity.id })),
      }
    });

    let written = results.iter().filter(|r| r.status).count();
    let failures: Vec<Value> = entities
      .iter()
      .zip(&results)
      .filter(|(_, r)| !r.status)
      .map(|(entity, r)| json!({ "entityId": entity.id, "error": r.error }))
      .collect();

    let parent = if failures.is_empty() {
      StepResult::success(name, format!("wrote {} files", written)).with_meta(json!({ "eachEntity": true, "written": written }))
    } else {
      StepResult::failure(name, format!("wrote {} files, {} failures", written, failures.len()))
        .with_meta(json!({ "eachEntity": true, "written": written, "failures": failures }))
    };
    results.push(parent);
    Ok(results)
  }

  /// Render path and body, then write the file. Returns the path and byte count.
  fn render_and_write(&self, step: &TemplateStep, context: &Value) -> StepOutcome<(PathBuf, usize)> {
    let raw_path = self.renderer.render("path", &step.path, context)?;
    let path = resolve_output_path(&raw_path).map_err(|e| StepFailure::execution(e.to_string()))?;
    let content = self.renderer.render("template", &step.template, context)?;
    write_file(&path, &content)?;
    tracing::debug!(path = %path.display(), bytes = content.len(), "rendered template");
    Ok((path, content.len()))
  }

  // ---------------------------------------------------------------------------
  // shell
  // ---------------------------------------------------------------------------

  fn run_shell(&self, name: &str, step: &ShellStep, collection: &Collection, entities: &[Entity]) -> StepOutcome<Vec<StepResult>> {
    let collection_value = collection_value(collection)?;

    if !step.each_entity {
      let context = all_entities_context(&collection_value, entities);
      let result = self.run_command(name, step, &context, json!({ "eachEntity": false }))?;
      return Ok(vec![result]);
    }

    require_entities(entities)?;

    let mut results = self.for_each_entity(entities, |entity| {
      let context = entity_context(&collection_value, entity);
      let base = json!({ "eachEntity": true, "entityId": entity.id });
      self
        .run_command(name, step, &context, base)
        .unwrap_or_else(|failure| {
          StepResult::failure(name, failure.message).with_meta(json!({ "eachEntity": true, "entityId": entity.id }))
        })
    });

    let success = results.iter().filter(|r| r.status).count();
    let failures: Vec<Value> = entities
      .iter()
      .zip(&results)
      .filter(|(_, r)| !r.status)
      .map(|(entity, r)| json!({ "entityId": entity.id, "error": r.error, "output": r.output }))
      .collect();

    let parent = if failures.is_empty() {
      StepResult::success(name, format!("ran {} commands", success)).with_meta(json!({ "eachEntity": true, "success": success }))
    } else {
      StepResult::failure(name, format!("ran {} commands, {} failures", entities.len(), failures.len()))
        .with_meta(json!({ "eachEntity": true, "success": success, "failures": failures }))
    };
    results.push(parent);
    Ok(results)
  }

  /// Render and run one command. A nonzero exit is a failed result, not an `Err`.
  fn run_command(&self, name: &str, step: &ShellStep, context: &Value, base: Value) -> StepOutcome<StepResult> {
    let command = self.renderer.render("shell", &step.shell, context)?;
    let workdir = match &step.workdir {
      Some(template) => Some(self.renderer.render("workdir", template, context)?).filter(|w| !w.trim().is_empty()),
      None => None,
    };
    let mut env = Vec::with_capacity(step.env.len());
    for (key, value) in &step.env {
      env.push((
        self.renderer.render("envKey", key, context)?,
        self.renderer.render("envVal", value, context)?,
      ));
    }

    let output = shell::run(&ShellCommand {
      program: &self.options.shell,
      command: &command,
      workdir: workdir.as_deref().map(Path::new),
      env: &env,
      timeout: self.options.shell_timeout,
    })?;

    let meta = json!({
      "shell": command,
      "shellSource": step.shell,
      "stdout": output.stdout,
      "stderr": output.stderr,
      "workdir": workdir,
      "workdirSource": step.workdir,
      "envRendered": env.iter().map(|(k, v)| format!("{}={}", k, v)).collect::<Vec<_>>(),
      "exitCode": output.exit_code,
      "base": base,
    });

    let result = match output.error_message(self.options.shell_timeout) {
      None => StepResult::success(name, output.combined()),
      Some(error) => StepResult::failure(name, error).with_output(output.combined()),
    };
    Ok(result.with_meta(meta))
  }

  // ---------------------------------------------------------------------------
  // fan-out
  // ---------------------------------------------------------------------------

  /// Map every entity to a result, keeping entity order. Runs on the fan-out pool
  /// when one is configured.
  fn for_each_entity<F>(&self, entities: &[Entity], f: F) -> Vec<StepResult>
  where
    F: Fn(&Entity) -> StepResult + Sync,
  {
    match &self.pool {
      Some(pool) if entities.len() > 1 => pool.install(|| entities.par_iter().map(&f).collect()),
      _ => entities.iter().map(f).collect(),
    }
  }
}

/// Failed parent for a step that could not run to completion
pub(crate) fn failed_step(name: &str, failure: &StepFailure) -> StepResult {
  StepResult::failure(name, failure.message.clone()).with_meta(json!({ "exception": failure.kind.as_str() }))
}

fn require_entities(entities: &[Entity]) -> StepOutcome<()> {
  if entities.is_empty() {
    return Err(StepFailure::configuration("eachEntity is true but entities is empty"));
  }
  Ok(())
}

fn collection_value(collection: &Collection) -> StepOutcome<Value> {
  serde_json::to_value(collection).map_err(|e| StepFailure::execution(format!("failed to encode collection: {}", e)))
}

fn entity_context(collection: &Value, entity: &Entity) -> Value {
  json!({ "collection": collection, "entity": entity.view() })
}

fn all_entities_context(collection: &Value, entities: &[Entity]) -> Value {
  let views: Vec<_> = entities.iter().map(Entity::view).collect();
  json!({ "collection": collection, "entities": views })
}

fn write_file(path: &Path, content: &str) -> StepOutcome<()> {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent)
      .map_err(|e| StepFailure::execution(format!("failed to create directory {}: {}", parent.display(), e)))?;
  }
  fs::write(path, content).map_err(|e| StepFailure::execution(format!("failed to write {}: {}", path.display(), e)))
}
