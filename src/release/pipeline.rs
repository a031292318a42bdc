//! Pipeline orchestration: order steps, run them, stop at the first failure

use crate::model::{Collection, Entity, ReleaseChannel, ReleaseChannelStep, StepResult};
use crate::release::config::StepConfig;
use crate::release::executor::StepExecutor;
use serde_json::json;

/// Runs a channel's steps in order against a collection and its entities
#[derive(Debug)]
pub struct Pipeline {
  executor: StepExecutor,
}

impl Pipeline {
  pub fn new(executor: StepExecutor) -> Self {
    Self { executor }
  }

  pub fn executor(&self) -> &StepExecutor {
    &self.executor
  }

  /// Run `steps` and return every result in the order produced.
  ///
  /// Steps are sorted by `order` (stable). All configs are parsed first; if any
  /// is invalid nothing runs and the only result is the failure of the first
  /// invalid step. Otherwise processing stops after the first failed parent.
  pub fn run(
    &self,
    collection: &Collection,
    channel: &ReleaseChannel,
    entities: &[Entity],
    steps: &[ReleaseChannelStep],
  ) -> Vec<StepResult> {
    let mut ordered: Vec<&ReleaseChannelStep> = steps.iter().collect();
    ordered.sort_by_key(|s| s.order);

    tracing::info!(
      collection = %collection.id,
      channel = %channel.id,
      steps = ordered.len(),
      entities = entities.len(),
      "starting release pipeline"
    );

    let mut plan = Vec::with_capacity(ordered.len());
    for step in &ordered {
      match StepConfig::parse(step) {
        Ok(config) => plan.push((step.display_name(), config)),
        Err(failure) => {
          tracing::warn!(step = step.display_name(), error = %failure, "invalid step config, nothing will run");
          return vec![
            StepResult::failure(step.display_name(), failure.message.clone())
              .with_meta(json!({ "stepType": step.step_type, "exception": failure.kind.as_str() })),
          ];
        }
      }
    }

    let mut results = Vec::new();
    for (name, config) in &plan {
      let step_results = self.executor.execute(name, config, collection, entities);
      let halted = step_results.last().is_some_and(|parent| !parent.status);

      match step_results.last() {
        Some(parent) if parent.status => tracing::debug!(step = name, output = parent.output.as_deref(), "step succeeded"),
        Some(parent) => tracing::warn!(step = name, error = parent.error.as_deref(), "step failed"),
        None => {}
      }

      results.extend(step_results);
      if halted {
        tracing::warn!(step = name, "halting pipeline after failed step");
        break;
      }
    }

    tracing::info!(results = results.len(), ok = results.iter().all(|r| r.status), "release pipeline finished");
    results
  }

  /// Run a channel's own steps
  pub fn run_channel(&self, collection: &Collection, channel: &ReleaseChannel, entities: &[Entity]) -> Vec<StepResult> {
    self.run(collection, channel, entities, &channel.steps)
  }
}
