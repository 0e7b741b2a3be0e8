//! Template interpolation for pipeline configuration
//!
//! Handles `{{ variable }}` interpolation in YAML configuration values.
//! Supports `{{ env.NAME }}` for environment variables and
//! `{{ partition.id }}` for destination table names.

use crate::error::{Error, Result};
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Regex for matching template variables: {{ variable.path }}
static TEMPLATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_]*)*)\s*\}\}").unwrap()
});

/// Context for template interpolation
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    /// Environment variables visible to `{{ env.* }}`
    pub env: HashMap<String, String>,
    /// Current partition values
    pub partition: Value,
}

impl TemplateContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context holding the current process environment.
    ///
    /// Variables whose name or value is not valid UTF-8 are skipped.
    pub fn from_env() -> Self {
        let env = std::env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
            .collect();
        Self {
            env,
            ..Default::default()
        }
    }

    /// Set a single environment value
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set partition values
    pub fn set_partition(&mut self, partition: Value) -> &mut Self {
        self.partition = partition;
        self
    }

    /// Look up a variable path (e.g. "env.API_PASSWORD")
    fn get(&self, path: &str) -> Option<String> {
        let parts: Vec<&str> = path.split('.').collect();
        match parts.as_slice() {
            ["env", name] => self.env.get(*name).cloned(),
            ["partition", rest @ ..] => {
                let mut current = &self.partition;
                for part in rest {
                    current = current.as_object()?.get(*part)?;
                }
                Some(value_to_string(current))
            }
            _ => None,
        }
    }
}

/// Render a template string with the given context
///
/// Every undefined variable is reported in a single error.
pub fn render(template: &str, ctx: &TemplateContext) -> Result<String> {
    let mut result = template.to_string();
    let mut errors = Vec::new();

    for cap in TEMPLATE_REGEX.captures_iter(template) {
        let full_match = &cap[0];
        let var_path = &cap[1];

        match ctx.get(var_path) {
            Some(value) => {
                result = result.replace(full_match, &value);
            }
            None => errors.push(var_path.to_string()),
        }
    }

    if errors.is_empty() {
        Ok(result)
    } else {
        Err(Error::config(format!(
            "Undefined template variable(s): {}",
            errors.join(", ")
        )))
    }
}

/// Substitute only `{{ env.* }}` variables, leaving other templates in place
///
/// Missing environment variables are still an error.
pub fn render_env(template: &str, ctx: &TemplateContext) -> Result<String> {
    let mut result = template.to_string();
    let mut errors = Vec::new();

    for cap in TEMPLATE_REGEX.captures_iter(template) {
        let var_path = &cap[1];
        if !var_path.starts_with("env.") {
            continue;
        }
        match ctx.get(var_path) {
            Some(value) => result = result.replace(&cap[0], &value),
            None => errors.push(var_path.to_string()),
        }
    }

    if errors.is_empty() {
        Ok(result)
    } else {
        Err(Error::config(format!(
            "Undefined environment variable(s): {}",
            errors.join(", ")
        )))
    }
}

/// Check if a string contains template variables
pub fn has_templates(s: &str) -> bool {
    TEMPLATE_REGEX.is_match(s)
}

/// Convert a JSON value to a string for template substitution
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

/// Render `{{ env.* }}` in every string of a YAML document
///
/// Used on the raw configuration before it is deserialized, so secrets can
/// live in the environment instead of the file. Other variables (such as
/// `partition.id`) are kept for later rendering.
pub fn render_yaml(value: &serde_yaml::Value, ctx: &TemplateContext) -> Result<serde_yaml::Value> {
    use serde_yaml::Value as Yaml;

    match value {
        Yaml::String(s) if has_templates(s) => Ok(Yaml::String(render_env(s, ctx)?)),
        Yaml::Sequence(items) => items
            .iter()
            .map(|item| render_yaml(item, ctx))
            .collect::<Result<Vec<_>>>()
            .map(Yaml::Sequence),
        Yaml::Mapping(map) => {
            let mut rendered = serde_yaml::Mapping::new();
            for (k, v) in map {
                rendered.insert(k.clone(), render_yaml(v, ctx)?);
            }
            Ok(Yaml::Mapping(rendered))
        }
        _ => Ok(value.clone()),
    }
}
