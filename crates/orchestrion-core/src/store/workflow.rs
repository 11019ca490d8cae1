//! Workflow definition store trait.

use orchestrion_types::error::StoreError;
use orchestrion_types::workflow::Workflow;
use uuid::Uuid;

/// Storage interface for workflow definitions.
///
/// Definitions are immutable once created (versioning happens by storing a
/// new definition), so there is no update operation.
///
/// Uses native async fn in traits (RPITIT), consistent with the project's
/// Rust 2024 edition approach.
pub trait WorkflowStore: Send + Sync {
    /// Store a definition. Fails with `Conflict` if the ID already exists.
    fn put(
        &self,
        workflow: &Workflow,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Get a definition by its UUID.
    fn get(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Workflow>, StoreError>> + Send;

    /// List all stored definitions (unordered).
    fn list(&self) -> impl std::future::Future<Output = Result<Vec<Workflow>, StoreError>> + Send;
}
