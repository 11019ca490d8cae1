//! In-memory workflow definition store.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use orchestrion_core::store::WorkflowStore;
use orchestrion_types::error::StoreError;
use orchestrion_types::workflow::Workflow;
use uuid::Uuid;

/// Definition store keyed by workflow ID. Definitions are immutable, so a
/// second `put` with the same ID is a conflict.
#[derive(Default)]
pub struct MemoryWorkflowStore {
    workflows: DashMap<Uuid, Workflow>,
}

impl MemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WorkflowStore for MemoryWorkflowStore {
    async fn put(&self, workflow: &Workflow) -> Result<(), StoreError> {
        match self.workflows.entry(workflow.id) {
            Entry::Occupied(_) => Err(StoreError::Conflict(format!(
                "workflow {} already exists",
                workflow.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(workflow.clone());
                Ok(())
            }
        }
    }

    async fn get(&self, id: &Uuid) -> Result<Option<Workflow>, StoreError> {
        Ok(self.workflows.get(id).map(|w| w.clone()))
    }

    async fn list(&self) -> Result<Vec<Workflow>, StoreError> {
        Ok(self.workflows.iter().map(|e| e.value().clone()).collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
