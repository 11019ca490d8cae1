//! Execution record store trait.

use orchestrion_types::error::StoreError;
use orchestrion_types::workflow::{ExecutionStatus, StepResult, WorkflowExecution};
use uuid::Uuid;

/// Storage interface for run-time execution state.
///
/// Implementations must serialize writes to a single execution record, since
/// step results for one batch can be recorded in quick succession. Records
/// are retained after completion for audit/history until purged externally.
pub trait ExecutionStore: Send + Sync {
    /// Create (or replace) an execution record.
    fn put(
        &self,
        execution: &WorkflowExecution,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Get an execution record by its UUID.
    fn get(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<WorkflowExecution>, StoreError>> + Send;

    /// List executions of a workflow, most recent first, up to `limit`.
    fn list_by_workflow(
        &self,
        workflow_id: &Uuid,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<Vec<WorkflowExecution>, StoreError>> + Send;

    /// Update an execution's status, optionally its error message and
    /// context snapshot. Implementations stamp `completed_at` when `status`
    /// is terminal.
    fn update_status(
        &self,
        id: &Uuid,
        status: ExecutionStatus,
        error: Option<&str>,
        context: Option<&serde_json::Value>,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Record a step's terminal result and set `current_step`.
    fn record_step_result(
        &self,
        id: &Uuid,
        step_id: &str,
        result: &StepResult,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;
}
