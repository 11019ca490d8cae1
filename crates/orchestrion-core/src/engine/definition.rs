//! Workflow definition validation and filesystem operations.
//!
//! All structural checks a definition must pass before any execution is
//! created live here, along with YAML load/save for definition files on disk.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use orchestrion_types::condition::Condition;
use orchestrion_types::workflow::{StepDefinition, Workflow};
use thiserror::Error;

use super::graph::ExecutionGraph;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can occur during workflow definition and graph operations.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// YAML/JSON parse failure.
    #[error("parse error: {0}")]
    ParseError(String),

    /// Structural validation failure.
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Filesystem I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Dependency graph contains a cycle.
    #[error("cycle detected: {0}")]
    CycleDetected(String),

    /// A step references a dependency ID not present in the step list.
    #[error("unknown dependency: {0}")]
    UnknownDependency(String),

    /// A step carries a type tag with no registered handler.
    #[error("unknown step type: '{0}'")]
    UnknownStepType(String),

    /// Runtime execution failure.
    #[error("execution error: {0}")]
    ExecutionError(String),
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate the structural constraints shared by drafts and stored workflows.
///
/// Checks:
/// - Name is non-empty and contains only alphanumeric characters and hyphens
/// - At least one step exists
/// - All step IDs are unique and step type tags are non-empty
/// - Per-attempt timeouts are > 0
/// - Dependencies reference existing steps and form an acyclic graph
/// - `StepStatusIs` conditions reference existing steps
pub fn validate_structure(name: &str, steps: &[StepDefinition]) -> Result<(), WorkflowError> {
    if name.is_empty() {
        return Err(WorkflowError::ValidationError(
            "workflow name must not be empty".to_string(),
        ));
    }
    if !name.chars().all(|c| c.is_alphanumeric() || c == '-') {
        return Err(WorkflowError::ValidationError(format!(
            "workflow name '{name}' contains invalid characters (only alphanumeric and hyphens allowed)"
        )));
    }

    if steps.is_empty() {
        return Err(WorkflowError::ValidationError(
            "workflow must have at least one step".to_string(),
        ));
    }

    let mut seen_ids = HashSet::new();
    for step in steps {
        if !seen_ids.insert(step.id.as_str()) {
            return Err(WorkflowError::ValidationError(format!(
                "duplicate step ID: '{}'",
                step.id
            )));
        }
        if step.step_type.is_empty() {
            return Err(WorkflowError::ValidationError(format!(
                "step '{}' has an empty type tag",
                step.id
            )));
        }
        if step.timeout_secs == 0 {
            return Err(WorkflowError::ValidationError(format!(
                "step '{}' timeout must be > 0",
                step.id
            )));
        }
    }

    // Dependency references and acyclicity
    ExecutionGraph::build(steps)?;

    // Condition step references must be valid
    for step in steps {
        for referenced in step.conditions.iter().flat_map(referenced_steps) {
            if !seen_ids.contains(referenced.as_str()) {
                return Err(WorkflowError::ValidationError(format!(
                    "step '{}' has a condition referencing unknown step '{}'",
                    step.id, referenced
                )));
            }
        }
    }

    Ok(())
}

/// Validate a stored workflow definition.
pub fn validate_workflow(workflow: &Workflow) -> Result<(), WorkflowError> {
    validate_structure(&workflow.name, &workflow.steps)
}

/// Collect every step ID referenced by a condition tree.
fn referenced_steps(condition: &Condition) -> Vec<String> {
    match condition {
        Condition::StepStatusIs { step, .. } => vec![step.clone()],
        Condition::All { conditions } | Condition::Any { conditions } => {
            conditions.iter().flat_map(referenced_steps).collect()
        }
        Condition::ContextEquals { .. } | Condition::ContextIn { .. } => vec![],
    }
}

// ---------------------------------------------------------------------------
// Definition files
// ---------------------------------------------------------------------------

/// Parse a YAML string into a validated [`Workflow`].
pub fn parse_workflow_yaml(yaml: &str) -> Result<Workflow, WorkflowError> {
    let workflow: Workflow =
        serde_yaml_ng::from_str(yaml).map_err(|e| WorkflowError::ParseError(e.to_string()))?;
    validate_workflow(&workflow)?;
    Ok(workflow)
}

/// Serialize a [`Workflow`] to a YAML string.
pub fn serialize_workflow_yaml(workflow: &Workflow) -> Result<String, WorkflowError> {
    serde_yaml_ng::to_string(workflow).map_err(|e| WorkflowError::ParseError(e.to_string()))
}

/// Load a workflow definition from a YAML file.
pub fn load_workflow_file(path: &Path) -> Result<Workflow, WorkflowError> {
    let content = std::fs::read_to_string(path)?;
    parse_workflow_yaml(&content)
}

/// Save a workflow definition to a YAML file, creating parent directories.
pub fn save_workflow_file(path: &Path, workflow: &Workflow) -> Result<(), WorkflowError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serialize_workflow_yaml(workflow)?)?;
    Ok(())
}

/// Discover workflow definition files (`.yaml`/`.yml`) under `base_dir`.
///
/// Files that fail to parse or validate are logged and skipped; they may not
/// be workflow files at all.
pub fn discover_workflows(base_dir: &Path) -> Result<Vec<(PathBuf, Workflow)>, WorkflowError> {
    let mut found = Vec::new();
    if !base_dir.exists() {
        return Ok(found);
    }

    let mut pending = vec![base_dir.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("yaml") | Some("yml")
            ) {
                match load_workflow_file(&path) {
                    Ok(workflow) => found.push((path, workflow)),
                    Err(_) => {
                        tracing::warn!(?path, "skipping unparseable workflow file");
                    }
                }
            }
        }
    }
    Ok(found)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
