//! In-memory execution record store.

use chrono::Utc;
use dashmap::DashMap;
use orchestrion_core::store::ExecutionStore;
use orchestrion_types::error::StoreError;
use orchestrion_types::workflow::{ExecutionStatus, StepResult, WorkflowExecution};
use serde_json::Value;
use uuid::Uuid;

/// Execution store keyed by execution ID.
///
/// `DashMap::get_mut` takes an exclusive lock on the record, so concurrent
/// writes to one execution are serialized. Records stay in the map after
/// completion until purged externally.
#[derive(Default)]
pub struct MemoryExecutionStore {
    executions: DashMap<Uuid, WorkflowExecution>,
}

impl MemoryExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ExecutionStore for MemoryExecutionStore {
    async fn put(&self, execution: &WorkflowExecution) -> Result<(), StoreError> {
        self.executions.insert(execution.id, execution.clone());
        Ok(())
    }

    async fn get(&self, id: &Uuid) -> Result<Option<WorkflowExecution>, StoreError> {
        Ok(self.executions.get(id).map(|e| e.clone()))
    }

    async fn list_by_workflow(
        &self,
        workflow_id: &Uuid,
        limit: u32,
    ) -> Result<Vec<WorkflowExecution>, StoreError> {
        let mut matching: Vec<WorkflowExecution> = self
            .executions
            .iter()
            .filter(|e| e.workflow_id == *workflow_id)
            .map(|e| e.value().clone())
            .collect();
        matching.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        matching.truncate(limit as usize);
        Ok(matching)
    }

    async fn update_status(
        &self,
        id: &Uuid,
        status: ExecutionStatus,
        error: Option<&str>,
        context: Option<&Value>,
    ) -> Result<(), StoreError> {
        let mut record = self.executions.get_mut(id).ok_or(StoreError::NotFound)?;
        record.status = status;
        if let Some(message) = error {
            record.error_message = Some(message.to_string());
        }
        if let Some(snapshot) = context {
            record.context = snapshot.clone();
        }
        if status.is_terminal() && record.completed_at.is_none() {
            record.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn record_step_result(
        &self,
        id: &Uuid,
        step_id: &str,
        result: &StepResult,
    ) -> Result<(), StoreError> {
        let mut record = self.executions.get_mut(id).ok_or(StoreError::NotFound)?;
        record.step_results.insert(step_id.to_string(), result.clone());
        record.current_step = Some(step_id.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
