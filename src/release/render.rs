//! Template rendering
//!
//! The engine only needs "turn this template text plus this data into a string",
//! so rendering sits behind [`TemplateRenderer`]. The shipped implementation uses
//! handlebars with HTML escaping turned off: rendered output lands in config
//! files and shell commands, not web pages.

use crate::release::{StepFailure, StepOutcome};
use handlebars::Handlebars;
use serde_json::Value;

/// Renders template text against a JSON context
pub trait TemplateRenderer: Send + Sync {
  /// `name` identifies the template in error messages (`path`, `shell`, `envKey`, ...)
  fn render(&self, name: &str, template: &str, context: &Value) -> StepOutcome<String>;
}

/// Handlebars-backed renderer
///
/// Templates address the context directly: `{{entity.Name}}`,
/// `{{entity.Fields.port}}`, `{{#each entities}}{{this.Name}}{{/each}}`,
/// `{{collection.name}}`. `{{json entity.Fields}}` dumps a value as JSON.
pub struct HandlebarsRenderer {
  registry: Handlebars<'static>,
}

impl HandlebarsRenderer {
  pub fn new() -> Self {
    let mut registry = Handlebars::new();
    registry.register_escape_fn(handlebars::no_escape);
    registry.register_helper("json", Box::new(json_helper));
    Self { registry }
  }
}

impl Default for HandlebarsRenderer {
  fn default() -> Self {
    Self::new()
  }
}

impl std::fmt::Debug for HandlebarsRenderer {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("HandlebarsRenderer").finish_non_exhaustive()
  }
}

impl TemplateRenderer for HandlebarsRenderer {
  fn render(&self, name: &str, template: &str, context: &Value) -> StepOutcome<String> {
    // Compile separately so syntax errors and data errors read differently.
    handlebars::Template::compile(template)
      .map_err(|e| StepFailure::render(format!("{} template parse error: {}", name, e)))?;

    self
      .registry
      .render_template(template, context)
      .map_err(|e| StepFailure::render(format!("{} template render error: {}", name, e)))
  }
}

fn json_helper(
  h: &handlebars::Helper,
  _: &Handlebars,
  _: &handlebars::Context,
  _: &mut handlebars::RenderContext,
  out: &mut dyn handlebars::Output,
) -> handlebars::HelperResult {
  if let Some(v) = h.param(0) {
    out.write(&serde_json::to_string(v.value()).unwrap_or_default())?;
  }
  Ok(())
}
