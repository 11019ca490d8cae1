//! Execution context: the state that flows through one workflow run.
//!
//! The context is passed by value (cloned) into each dispatch batch and
//! merged back by the orchestrator after the batch joins, so step handlers
//! never share a mutable view. Size guards keep runaway step outputs from
//! growing the context without bound.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use super::definition::WorkflowError;

/// Maximum size of a single step output (1 MB).
pub const MAX_STEP_OUTPUT_SIZE: usize = 1_048_576;

/// Maximum total size of all context data (10 MB).
pub const MAX_CONTEXT_SIZE: usize = 10_485_760;

/// Mutable execution state: seeded variables plus accumulated step outputs.
///
/// Only the orchestrator writes to a context (single-writer rule); batch
/// tasks receive a clone. Handler writes come back as `context_patch` entries
/// and are applied in dispatch order after the batch joins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Name of the workflow being executed.
    pub workflow_name: String,
    /// The execution this context belongs to.
    pub execution_id: Uuid,
    /// Caller-seeded variables, plus handler patches merged after each batch.
    pub variables: HashMap<String, Value>,
    /// Outputs of completed steps, keyed by step ID.
    pub step_outputs: HashMap<String, Value>,
}

impl ExecutionContext {
    /// Create a context seeded with the caller-provided variables.
    pub fn new(workflow_name: String, execution_id: Uuid, seed: HashMap<String, Value>) -> Self {
        Self {
            workflow_name,
            execution_id,
            variables: seed,
            step_outputs: HashMap::new(),
        }
    }

    /// Read a context variable.
    pub fn variable(&self, key: &str) -> Option<&Value> {
        self.variables.get(key)
    }

    /// Write a context variable. Returns `true` if the key already existed.
    pub fn set_variable(&mut self, key: String, value: Value) -> bool {
        self.variables.insert(key, value).is_some()
    }

    /// Read the output of a completed step.
    pub fn step_output(&self, step_id: &str) -> Option<&Value> {
        self.step_outputs.get(step_id)
    }

    /// Store the output of a completed step.
    ///
    /// Outputs larger than [`MAX_STEP_OUTPUT_SIZE`] are replaced by a marker
    /// object noting the truncation. Exceeding [`MAX_CONTEXT_SIZE`] in total
    /// is an error.
    pub fn set_step_output(&mut self, step_id: &str, output: Value) -> Result<(), WorkflowError> {
        let serialized = serde_json::to_string(&output)
            .map_err(|e| WorkflowError::ExecutionError(e.to_string()))?;

        if serialized.len() > MAX_STEP_OUTPUT_SIZE {
            tracing::warn!(
                step_id,
                size = serialized.len(),
                max = MAX_STEP_OUTPUT_SIZE,
                "step output exceeds size limit, truncating"
            );
            self.step_outputs.insert(
                step_id.to_string(),
                json!({
                    "_truncated": true,
                    "_original_size": serialized.len(),
                }),
            );
        } else {
            self.step_outputs.insert(step_id.to_string(), output);
        }

        let total = self.total_size();
        if total > MAX_CONTEXT_SIZE {
            return Err(WorkflowError::ExecutionError(format!(
                "total context size ({total} bytes) exceeds maximum ({MAX_CONTEXT_SIZE} bytes)"
            )));
        }
        Ok(())
    }

    /// Total serialized size of variables and step outputs in bytes.
    pub fn total_size(&self) -> usize {
        self.variables
            .values()
            .chain(self.step_outputs.values())
            .map(|v| serde_json::to_string(v).map(|s| s.len()).unwrap_or(0))
            .sum()
    }

    /// Snapshot the context as JSON for the execution record.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(json!({}))
    }

    /// Restore a context from an execution record snapshot.
    pub fn from_json(value: Value) -> Result<Self, WorkflowError> {
        serde_json::from_value(value)
            .map_err(|e| WorkflowError::ParseError(format!("failed to restore context: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
