//! Template validation and filesystem loading

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::error::{WorkflowError, WorkflowResult};
use crate::types::{StepSpec, TemplateDefinition};

/// Check a definition and return its steps sorted by order.
///
/// A template needs a name and at least one step, and step orders must be
/// contiguous from 1 once sorted.
pub fn validate_definition(definition: &TemplateDefinition) -> WorkflowResult<Vec<StepSpec>> {
    if definition.name.trim().is_empty() {
        return Err(WorkflowError::invalid_input("template name is required"));
    }
    if definition.steps.is_empty() {
        return Err(WorkflowError::invalid_input(format!(
            "template '{}' has no steps",
            definition.name
        )));
    }

    let mut steps = definition.steps.clone();
    steps.sort_by_key(|s| s.order);

    for (index, step) in steps.iter().enumerate() {
        let expected = index as u32 + 1;
        if step.order != expected {
            return Err(WorkflowError::invalid_input(format!(
                "template '{}' step orders must be contiguous from 1, found {} where {} was expected",
                definition.name, step.order, expected
            )));
        }
        if step.name.trim().is_empty() {
            return Err(WorkflowError::invalid_input(format!(
                "template '{}' step {} has no name",
                definition.name, step.order
            )));
        }
    }

    Ok(steps)
}

/// Parse a single template file (`.yaml`, `.yml`, or `.json`)
pub fn load_definition_file(path: &Path) -> Result<TemplateDefinition> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read template file: {}", path.display()))?;

    let definition = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML template: {}", path.display()))?,
        _ => serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse JSON template: {}", path.display()))?,
    };

    Ok(definition)
}

/// Load every template definition in a directory.
///
/// Invalid files are logged as warnings and skipped. A missing directory
/// yields no templates.
pub fn load_definitions_dir(path: &Path) -> Result<Vec<TemplateDefinition>> {
    let mut definitions = Vec::new();

    if !path.exists() {
        debug!("Templates directory does not exist: {}", path.display());
        return Ok(definitions);
    }

    let entries = fs::read_dir(path)
        .with_context(|| format!("Failed to read templates directory: {}", path.display()))?;

    let mut files: Vec<_> = entries
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .is_some_and(|e| e == "yaml" || e == "yml" || e == "json")
        })
        .collect();
    files.sort();

    for file_path in files {
        match load_definition_file(&file_path) {
            Ok(definition) => {
                debug!(
                    "Loaded template definition: {} from {}",
                    definition.name,
                    file_path.display()
                );
                definitions.push(definition);
            }
            Err(e) => {
                warn!(
                    "Failed to load template from {}: {:#}",
                    file_path.display(),
                    e
                );
            }
        }
    }

    Ok(definitions)
}
