//! The `WorkflowEngine` facade: the library surface callers consume.
//!
//! Triggers (external) call [`WorkflowEngine::start`]; the orchestration loop
//! runs on a spawned tokio task per execution, so `start` returns the
//! `Pending` record immediately. Dependency graphs are built once per
//! workflow and cached, since definitions are immutable.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use orchestrion_types::workflow::{Workflow, WorkflowDraft, WorkflowExecution};
use serde_json::Value;
use uuid::Uuid;

use crate::store::{ExecutionStore, WorkflowStore};

use super::context::ExecutionContext;
use super::definition::{WorkflowError, validate_structure};
use super::graph::ExecutionGraph;
use super::orchestrator::{ExecutionSignals, ExecutorError, Orchestrator};
use super::registry::{HandlerRegistry, StepHandler};

/// The workflow orchestration engine.
///
/// Generic over the two store ports so callers pick the backing technology;
/// everything else (registry, graph cache, per-execution control signals) is
/// owned here.
pub struct WorkflowEngine<W, E> {
    workflows: Arc<W>,
    executions: Arc<E>,
    registry: Arc<HandlerRegistry>,
    graphs: DashMap<Uuid, Arc<ExecutionGraph>>,
    signals: Arc<DashMap<Uuid, ExecutionSignals>>,
}

impl<W, E> WorkflowEngine<W, E>
where
    W: WorkflowStore + 'static,
    E: ExecutionStore + 'static,
{
    pub fn new(workflows: W, executions: E) -> Self {
        Self {
            workflows: Arc::new(workflows),
            executions: Arc::new(executions),
            registry: Arc::new(HandlerRegistry::new()),
            graphs: DashMap::new(),
            signals: Arc::new(DashMap::new()),
        }
    }

    /// The handler registry, for bulk registration helpers.
    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Register a handler for a step type tag. Called once at startup by
    /// each external collaborator.
    pub fn register_handler<T: StepHandler + 'static>(
        &self,
        step_type: impl Into<String>,
        handler: T,
    ) {
        self.registry.register(step_type, handler);
    }

    /// Validate a draft and store it as an immutable workflow definition.
    ///
    /// Rejects structural problems (cycles, unknown dependencies, duplicate
    /// IDs) and step types with no registered handler, so bad definitions
    /// never reach an execution.
    pub async fn create_workflow(&self, draft: WorkflowDraft) -> Result<Workflow, ExecutorError> {
        validate_structure(&draft.name, &draft.steps)?;
        for step in &draft.steps {
            if !self.registry.contains(&step.step_type) {
                return Err(WorkflowError::UnknownStepType(step.step_type.clone()).into());
            }
        }

        let workflow = Workflow::from_draft(draft);
        let graph = Arc::new(ExecutionGraph::build(&workflow.steps)?);

        self.workflows.put(&workflow).await?;
        self.graphs.insert(workflow.id, graph);

        tracing::info!(
            workflow = workflow.name.as_str(),
            id = %workflow.id,
            steps = workflow.steps.len(),
            "workflow created"
        );
        Ok(workflow)
    }

    /// Start an execution of a stored workflow.
    ///
    /// Persists a `Pending` record and returns it immediately; the
    /// scheduling loop proceeds asynchronously on its own task. Only graph
    /// and store errors surface synchronously here -- step failures are
    /// absorbed into the execution record.
    pub async fn start(
        &self,
        workflow_id: &Uuid,
        seed: HashMap<String, Value>,
    ) -> Result<WorkflowExecution, ExecutorError> {
        let workflow = self
            .workflows
            .get(workflow_id)
            .await?
            .ok_or(ExecutorError::WorkflowNotFound(*workflow_id))?;
        if !workflow.is_active {
            return Err(ExecutorError::WorkflowInactive(workflow.name.clone()));
        }

        let graph = match self.graphs.get(workflow_id) {
            Some(cached) => Arc::clone(cached.value()),
            None => {
                let built = Arc::new(ExecutionGraph::build(&workflow.steps)?);
                self.graphs.insert(*workflow_id, Arc::clone(&built));
                built
            }
        };

        let mut execution = WorkflowExecution::new(workflow.id, Value::Null);
        let ctx = ExecutionContext::new(workflow.name.clone(), execution.id, seed);
        execution.context = ctx.to_json();
        self.executions.put(&execution).await?;

        let signals = ExecutionSignals::new();
        self.signals.insert(execution.id, signals.clone());

        tracing::info!(
            execution_id = %execution.id,
            workflow = workflow.name.as_str(),
            "starting workflow execution"
        );

        let store = Arc::clone(&self.executions);
        let registry = Arc::clone(&self.registry);
        let signal_map = Arc::clone(&self.signals);
        let execution_id = execution.id;
        let mut task_ctx = ctx;

        tokio::spawn(async move {
            let orchestrator = Orchestrator::new(Arc::clone(&store), registry);
            let outcome = orchestrator
                .run(&workflow, &graph, execution_id, &mut task_ctx, &signals)
                .await;

            match outcome {
                Ok((status, error)) => {
                    if let Err(e) = store
                        .update_status(&execution_id, status, error.as_deref(), Some(&task_ctx.to_json()))
                        .await
                    {
                        tracing::error!(
                            execution_id = %execution_id,
                            error = %e,
                            "failed to record final execution status"
                        );
                    }
                    tracing::info!(
                        execution_id = %execution_id,
                        workflow = workflow.name.as_str(),
                        status = ?status,
                        "workflow execution finished"
                    );
                }
                Err(e) => {
                    let message = e.to_string();
                    let _ = store
                        .update_status(
                            &execution_id,
                            orchestrion_types::workflow::ExecutionStatus::Failed,
                            Some(&message),
                            Some(&task_ctx.to_json()),
                        )
                        .await;
                    tracing::error!(
                        execution_id = %execution_id,
                        error = message.as_str(),
                        "workflow execution aborted"
                    );
                }
            }
            signal_map.remove(&execution_id);
        });

        Ok(execution)
    }

    /// Get the current record of an execution (in-flight or historical).
    pub async fn get_status(&self, execution_id: &Uuid) -> Result<WorkflowExecution, ExecutorError> {
        self.executions
            .get(execution_id)
            .await?
            .ok_or(ExecutorError::ExecutionNotFound(*execution_id))
    }

    /// List an execution history for a workflow, most recent first.
    pub async fn list_executions(
        &self,
        workflow_id: &Uuid,
        limit: u32,
    ) -> Result<Vec<WorkflowExecution>, ExecutorError> {
        Ok(self.executions.list_by_workflow(workflow_id, limit).await?)
    }

    /// Request cooperative cancellation of a running execution.
    ///
    /// In-flight steps finish naturally and their results are recorded; no
    /// further batches are dispatched. Returns `false` if the execution is
    /// not running.
    pub fn cancel(&self, execution_id: &Uuid) -> bool {
        match self.signals.get(execution_id) {
            Some(signals) => {
                signals.cancel();
                true
            }
            None => false,
        }
    }

    /// Request a cooperative pause of a running execution.
    pub fn pause(&self, execution_id: &Uuid) -> bool {
        match self.signals.get(execution_id) {
            Some(signals) => {
                signals.pause();
                true
            }
            None => false,
        }
    }
}
