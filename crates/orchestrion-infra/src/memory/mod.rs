//! In-memory store implementations backed by `DashMap`.
//!
//! Per-key locking in `DashMap` serializes writes to a single execution
//! record, which is the concurrency guarantee the `ExecutionStore` contract
//! requires.

pub mod execution;
pub mod workflow;

pub use execution::MemoryExecutionStore;
pub use workflow::MemoryWorkflowStore;
