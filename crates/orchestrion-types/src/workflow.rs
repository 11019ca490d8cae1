//! Workflow domain types for Orchestrion.
//!
//! Defines the canonical representation for workflow definitions (the
//! immutable pipeline shape) and the execution tracking types
//! (`WorkflowExecution`, `StepResult`) that record run-time state.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::condition::Condition;

// ---------------------------------------------------------------------------
// Step Definition
// ---------------------------------------------------------------------------

/// A single step in the workflow DAG.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDefinition {
    /// User-defined step ID (e.g. "run-tests"). Unique within a workflow.
    pub id: String,
    /// Human-readable step name.
    pub name: String,
    /// Open tag selecting a handler from the registry (e.g. "http_call").
    #[serde(rename = "type")]
    pub step_type: String,
    /// Opaque configuration payload, interpreted only by the handler.
    #[serde(default)]
    pub config: HashMap<String, Value>,
    /// Step IDs that must reach a terminal success state first (DAG edges).
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Per-attempt timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Number of retries after the initial attempt.
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    /// Fixed delay between attempts in seconds.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    /// Predicates evaluated before dispatch; all must hold or the step is skipped.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_delay_secs() -> u64 {
    60
}

// ---------------------------------------------------------------------------
// Trigger Descriptor
// ---------------------------------------------------------------------------

/// How a workflow can be triggered.
///
/// Opaque to the engine: trigger ingestion (manual, scheduled, webhook) lives
/// outside and merely calls `start`. Descriptors are carried on the
/// definition so external trigger machinery can read them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerDescriptor {
    /// Trigger kind tag (e.g. "manual", "scheduled", "webhook").
    #[serde(rename = "type")]
    pub trigger_type: String,
    /// Trigger-specific configuration, never interpreted by the engine.
    #[serde(default)]
    pub config: HashMap<String, Value>,
}

// ---------------------------------------------------------------------------
// Workflow definition
// ---------------------------------------------------------------------------

/// An immutable named pipeline definition.
///
/// Created once through the definition surface, then only ever read by the
/// engine. All mutable run-time state lives in [`WorkflowExecution`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    /// UUIDv7 assigned on creation.
    pub id: Uuid,
    /// Human-readable workflow name.
    pub name: String,
    /// Optional longer description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Ordered list of step definitions forming the workflow DAG.
    pub steps: Vec<StepDefinition>,
    /// Trigger descriptors (opaque to the engine).
    #[serde(default)]
    pub triggers: Vec<TriggerDescriptor>,
    /// Whether this workflow may be started.
    #[serde(default = "default_is_active")]
    pub is_active: bool,
    /// When the definition was created.
    pub created_at: DateTime<Utc>,
    /// When the definition was last updated.
    pub updated_at: DateTime<Utc>,
}

fn default_is_active() -> bool {
    true
}

/// The caller-supplied part of a workflow definition.
///
/// `WorkflowEngine::create_workflow` validates a draft and promotes it into a
/// stored [`Workflow`] with an assigned ID and timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDraft {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub steps: Vec<StepDefinition>,
    #[serde(default)]
    pub triggers: Vec<TriggerDescriptor>,
}

impl Workflow {
    /// Promote a draft into a full definition with a fresh ID and timestamps.
    pub fn from_draft(draft: WorkflowDraft) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            name: draft.name,
            description: draft.description,
            steps: draft.steps,
            triggers: draft.triggers,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Look up a step definition by its ID.
    pub fn step(&self, step_id: &str) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| s.id == step_id)
    }
}

// ---------------------------------------------------------------------------
// Execution status
// ---------------------------------------------------------------------------

/// Overall status of a workflow execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    Paused,
}

impl ExecutionStatus {
    /// Whether this status is final (the execution will not progress further).
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled
        )
    }
}

/// Terminal status of an individual step within an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Completed,
    Failed,
    Skipped,
}

// ---------------------------------------------------------------------------
// Step result
// ---------------------------------------------------------------------------

/// Outcome of one step within an execution.
///
/// Terminal: once recorded, the step will not be retried or re-evaluated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    /// Terminal step status.
    pub status: StepStatus,
    /// Arbitrary output payload produced by the handler.
    #[serde(default)]
    pub output: Value,
    /// Error message, present iff the step failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// How many times the handler was invoked (0 for skipped steps).
    pub attempts: u32,
    /// When the first attempt started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the terminal result was produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl StepResult {
    /// A successful result with the handler's output.
    pub fn completed(output: Value, attempts: u32) -> Self {
        Self {
            status: StepStatus::Completed,
            output,
            error: None,
            attempts,
            started_at: None,
            completed_at: Some(Utc::now()),
        }
    }

    /// A hard failure after all allowed attempts.
    pub fn failed(error: impl Into<String>, attempts: u32) -> Self {
        Self {
            status: StepStatus::Failed,
            output: Value::Null,
            error: Some(error.into()),
            attempts,
            started_at: None,
            completed_at: Some(Utc::now()),
        }
    }

    /// A skip (condition not met, or upstream dependency failed).
    pub fn skipped(reason: impl Into<String>) -> Self {
        let reason: String = reason.into();
        Self {
            status: StepStatus::Skipped,
            output: serde_json::json!({ "reason": reason }),
            error: None,
            attempts: 0,
            started_at: None,
            completed_at: Some(Utc::now()),
        }
    }

    /// Whether the step reached a terminal success state (completed or skipped).
    pub fn is_success(&self) -> bool {
        matches!(self.status, StepStatus::Completed | StepStatus::Skipped)
    }
}

// ---------------------------------------------------------------------------
// Workflow execution (run-time record)
// ---------------------------------------------------------------------------

/// One run of a workflow. Created when a trigger fires; mutated only by the
/// orchestrator; retained after completion for audit until purged externally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecution {
    /// UUIDv7 execution ID.
    pub id: Uuid,
    /// ID of the workflow definition being executed.
    pub workflow_id: Uuid,
    /// Current execution status.
    pub status: ExecutionStatus,
    /// When the execution was created.
    pub started_at: DateTime<Utc>,
    /// When the execution reached a terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Most recently dispatched step (informational).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    /// JSON snapshot of the execution context (seeded variables + outputs).
    pub context: Value,
    /// Terminal results keyed by step ID.
    #[serde(default)]
    pub step_results: HashMap<String, StepResult>,
    /// Error message if the execution failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl WorkflowExecution {
    /// Create a fresh `Pending` execution record.
    pub fn new(workflow_id: Uuid, context: Value) -> Self {
        Self {
            id: Uuid::now_v7(),
            workflow_id,
            status: ExecutionStatus::Pending,
            started_at: Utc::now(),
            completed_at: None,
            current_step: None,
            context,
            step_results: HashMap::new(),
            error_message: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
