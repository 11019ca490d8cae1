//! The scheduling loop: ready set -> concurrent batch -> join -> repeat.
//!
//! Each round, the orchestrator computes the ready set (steps whose every
//! dependency reached a terminal success state), dispatches it as one
//! concurrent batch via `tokio::JoinSet`, and joins the whole batch before
//! the next round. A failed step is not fatal by itself: its transitive
//! dependents are pruned (recorded `Skipped`), independent branches keep
//! running, and the execution finishes `Failed` once no work remains.
//!
//! Cancellation and pause are cooperative: the flags are checked between
//! batches, never mid-step, so in-flight steps finish naturally and their
//! results are still recorded.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use orchestrion_types::error::StoreError;
use orchestrion_types::workflow::{
    ExecutionStatus, StepDefinition, StepResult, StepStatus, Workflow,
};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::store::ExecutionStore;

use super::context::ExecutionContext;
use super::definition::WorkflowError;
use super::graph::ExecutionGraph;
use super::registry::HandlerRegistry;
use super::step_executor::{ExecutedStep, StepExecutor};

// ---------------------------------------------------------------------------
// ExecutionSignals
// ---------------------------------------------------------------------------

/// Cooperative control flags for one execution.
///
/// `cancel` drives the execution to `Cancelled`; `pause` to `Paused`. Both
/// stop new batches from being dispatched without interrupting in-flight
/// steps.
#[derive(Debug, Clone, Default)]
pub struct ExecutionSignals {
    cancel: CancellationToken,
    pause: CancellationToken,
}

impl ExecutionSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Request a pause.
    pub fn pause(&self) {
        self.pause.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_paused(&self) -> bool {
        self.pause.is_cancelled()
    }
}

// ---------------------------------------------------------------------------
// ExecutorError
// ---------------------------------------------------------------------------

/// Errors surfaced by the orchestrator and the engine facade.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// Definition, graph, or context error.
    #[error("workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// No definition with this ID exists.
    #[error("workflow not found: {0}")]
    WorkflowNotFound(Uuid),

    /// The definition exists but is deactivated.
    #[error("workflow '{0}' is not active")]
    WorkflowInactive(String),

    /// No execution record with this ID exists.
    #[error("execution not found: {0}")]
    ExecutionNotFound(Uuid),
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Owns one execution's scheduling loop. Generic over `E: ExecutionStore`
/// for storage flexibility; the orchestrator task is the single writer for
/// its execution record.
pub struct Orchestrator<E: ExecutionStore> {
    store: Arc<E>,
    executor: Arc<StepExecutor>,
}

impl<E: ExecutionStore + 'static> Orchestrator<E> {
    pub fn new(store: Arc<E>, registry: Arc<HandlerRegistry>) -> Self {
        Self {
            store,
            executor: Arc::new(StepExecutor::new(registry)),
        }
    }

    /// Drive one execution to a terminal (or paused) status.
    ///
    /// Returns the final status plus an error message for failed executions.
    /// The caller (the engine facade) writes the final status to the store.
    pub async fn run(
        &self,
        workflow: &Workflow,
        graph: &ExecutionGraph,
        execution_id: Uuid,
        ctx: &mut ExecutionContext,
        signals: &ExecutionSignals,
    ) -> Result<(ExecutionStatus, Option<String>), ExecutorError> {
        self.store
            .update_status(&execution_id, ExecutionStatus::Running, None, Some(&ctx.to_json()))
            .await?;

        let steps: HashMap<&str, &StepDefinition> =
            workflow.steps.iter().map(|s| (s.id.as_str(), s)).collect();
        let total = workflow.steps.len();

        // Terminal bookkeeping: attempted covers every step with a recorded
        // result; completed is the success/skip subset that unblocks
        // dependents; failed drives pruning and the final status.
        let mut attempted: HashSet<String> = HashSet::new();
        let mut completed: HashSet<String> = HashSet::new();
        let mut failed: HashSet<String> = HashSet::new();
        let mut results: HashMap<String, StepResult> = HashMap::new();

        loop {
            if signals.is_cancelled() {
                tracing::info!(execution_id = %execution_id, "execution cancelled, stopping dispatch");
                return Ok((ExecutionStatus::Cancelled, Some("cancelled by caller".to_string())));
            }
            if signals.is_paused() {
                tracing::info!(execution_id = %execution_id, "execution paused, stopping dispatch");
                return Ok((ExecutionStatus::Paused, None));
            }

            let ready = graph.ready_steps(&attempted, &completed);
            if ready.is_empty() {
                if attempted.len() == total {
                    break;
                }
                let mut blocked: Vec<&str> = workflow
                    .steps
                    .iter()
                    .map(|s| s.id.as_str())
                    .filter(|id| !attempted.contains(*id))
                    .collect();
                blocked.sort_unstable();
                let message = format!(
                    "execution stalled: steps [{}] can never become ready",
                    blocked.join(", ")
                );
                tracing::error!(execution_id = %execution_id, message = message.as_str(), "execution stalled");
                return Ok((ExecutionStatus::Failed, Some(message)));
            }

            tracing::debug!(
                execution_id = %execution_id,
                batch_size = ready.len(),
                steps = ?ready,
                "dispatching batch"
            );

            let mut join_set = JoinSet::new();
            for step_id in &ready {
                let step = steps[step_id.as_str()].clone();
                let executor = Arc::clone(&self.executor);
                let batch_ctx = ctx.clone();
                let prior = results.clone();
                join_set.spawn(async move {
                    let executed = executor.execute(&step, &batch_ctx, &prior).await;
                    (step.id, executed)
                });
            }

            // A batch is complete only when every step in it reports a
            // terminal result; arrival order within the batch is arbitrary.
            let mut batch: HashMap<String, ExecutedStep> = HashMap::new();
            while let Some(joined) = join_set.join_next().await {
                let (step_id, executed) = joined.map_err(|e| {
                    WorkflowError::ExecutionError(format!("step task join error: {e}"))
                })?;
                batch.insert(step_id, executed);
            }

            // Merge results back in dispatch order (single-writer rule).
            let mut patched_keys: HashSet<String> = HashSet::new();
            for step_id in &ready {
                let Some(executed) = batch.remove(step_id) else {
                    continue;
                };

                if executed.result.status == StepStatus::Completed {
                    ctx.set_step_output(step_id, executed.result.output.clone())?;
                }
                for (key, value) in executed.context_patch {
                    if !patched_keys.insert(key.clone()) {
                        tracing::warn!(
                            step_id = step_id.as_str(),
                            key = key.as_str(),
                            "overlapping context write within one batch, last write wins"
                        );
                    }
                    ctx.set_variable(key, value);
                }

                self.record(execution_id, step_id, &executed.result).await?;
                attempted.insert(step_id.clone());
                match executed.result.status {
                    StepStatus::Completed | StepStatus::Skipped => {
                        completed.insert(step_id.clone());
                    }
                    StepStatus::Failed => {
                        failed.insert(step_id.clone());
                    }
                }
                results.insert(step_id.clone(), executed.result);
            }

            // Prune every transitive dependent of a step that just failed:
            // they can never become ready, and recording them Skipped keeps
            // the execution record complete for operators.
            for failed_id in ready.iter().filter(|id| failed.contains(*id)) {
                let mut pruned: Vec<String> = graph
                    .transitive_dependents(failed_id)
                    .into_iter()
                    .filter(|id| !attempted.contains(id))
                    .collect();
                pruned.sort_unstable();

                for step_id in pruned {
                    tracing::info!(
                        execution_id = %execution_id,
                        step_id = step_id.as_str(),
                        upstream = failed_id.as_str(),
                        "pruning dependent of failed step"
                    );
                    let result =
                        StepResult::skipped(format!("upstream dependency '{failed_id}' failed"));
                    self.record(execution_id, &step_id, &result).await?;
                    attempted.insert(step_id.clone());
                    results.insert(step_id, result);
                }
            }

            self.store
                .update_status(&execution_id, ExecutionStatus::Running, None, Some(&ctx.to_json()))
                .await?;
        }

        if failed.is_empty() {
            Ok((ExecutionStatus::Completed, None))
        } else {
            let mut failed_ids: Vec<&str> = failed.iter().map(String::as_str).collect();
            failed_ids.sort_unstable();
            let message = format!(
                "{} step(s) failed: {}",
                failed_ids.len(),
                failed_ids.join(", ")
            );
            Ok((ExecutionStatus::Failed, Some(message)))
        }
    }

    async fn record(
        &self,
        execution_id: Uuid,
        step_id: &str,
        result: &StepResult,
    ) -> Result<(), ExecutorError> {
        self.store
            .record_step_result(&execution_id, step_id, result)
            .await?;
        tracing::debug!(
            execution_id = %execution_id,
            step_id,
            status = ?result.status,
            attempts = result.attempts,
            "recorded step result"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
