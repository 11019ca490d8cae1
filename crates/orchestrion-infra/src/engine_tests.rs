//! End-to-end engine tests: `WorkflowEngine` wired to the in-memory stores.
//!
//! Step handlers here are test doubles standing in for the external
//! collaborators (generation service, test runner, deployer).

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use orchestrion_core::engine::definition::WorkflowError;
use orchestrion_core::engine::context::ExecutionContext;
use orchestrion_core::engine::orchestrator::ExecutorError;
use orchestrion_core::engine::registry::{HandlerOutput, StepError, StepHandler};
use orchestrion_core::engine::service::WorkflowEngine;
use orchestrion_core::engine::templates;
use orchestrion_types::condition::Condition;
use orchestrion_types::workflow::{
    ExecutionStatus, StepDefinition, StepStatus, Workflow, WorkflowDraft,
};
use serde_json::json;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::memory::{MemoryExecutionStore, MemoryWorkflowStore};

type TestEngine = WorkflowEngine<MemoryWorkflowStore, MemoryExecutionStore>;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Records every invocation; fails steps whose ID is in `failing`.
struct CountingHandler {
    calls: Arc<Mutex<Vec<String>>>,
    failing: HashSet<String>,
}

impl StepHandler for CountingHandler {
    async fn execute(
        &self,
        step: &StepDefinition,
        _ctx: &ExecutionContext,
    ) -> Result<HandlerOutput, StepError> {
        self.calls.lock().unwrap().push(step.id.clone());
        if self.failing.contains(&step.id) {
            return Err(StepError::ExecutionFailed(format!("step '{}' broke", step.id)));
        }
        Ok(HandlerOutput::value(json!({ "done": step.id })))
    }
}

fn engine_with_counting(failing: Vec<&str>) -> (TestEngine, Arc<Mutex<Vec<String>>>) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let engine = WorkflowEngine::new(MemoryWorkflowStore::new(), MemoryExecutionStore::new());
    engine.register_handler(
        "work",
        CountingHandler {
            calls: Arc::clone(&calls),
            failing: failing.into_iter().map(String::from).collect(),
        },
    );
    (engine, calls)
}

fn step(id: &str, dependencies: Vec<&str>) -> StepDefinition {
    StepDefinition {
        id: id.to_string(),
        name: id.to_string(),
        step_type: "work".to_string(),
        config: HashMap::new(),
        dependencies: dependencies.into_iter().map(String::from).collect(),
        timeout_secs: 5,
        retry_count: 0,
        retry_delay_secs: 0,
        conditions: vec![],
    }
}

fn draft(name: &str, steps: Vec<StepDefinition>) -> WorkflowDraft {
    WorkflowDraft {
        name: name.to_string(),
        description: None,
        steps,
        triggers: vec![],
    }
}

async fn wait_for_terminal(
    engine: &TestEngine,
    execution_id: &Uuid,
) -> orchestrion_types::workflow::WorkflowExecution {
    for _ in 0..500 {
        let execution = engine.get_status(execution_id).await.unwrap();
        if execution.status.is_terminal() {
            return execution;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("execution never reached a terminal status");
}

// ---------------------------------------------------------------------------
// Creation-time rejection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_cyclic_workflow_rejected_before_any_execution() {
    let (engine, _) = engine_with_counting(vec![]);

    let err = engine
        .create_workflow(draft("cyclic", vec![step("a", vec!["b"]), step("b", vec!["a"])]))
        .await
        .unwrap_err();
    assert!(
        matches!(err, ExecutorError::Workflow(WorkflowError::CycleDetected(_))),
        "got: {err}"
    );
}

#[tokio::test]
async fn test_unregistered_step_type_rejected_at_creation() {
    let (engine, _) = engine_with_counting(vec![]);

    let mut unregistered = step("a", vec![]);
    unregistered.step_type = "quantum_compile".to_string();

    let err = engine
        .create_workflow(draft("typed", vec![unregistered]))
        .await
        .unwrap_err();
    assert!(
        matches!(err, ExecutorError::Workflow(WorkflowError::UnknownStepType(_))),
        "got: {err}"
    );
}

#[tokio::test]
async fn test_start_unknown_workflow_is_not_found() {
    let (engine, _) = engine_with_counting(vec![]);
    let err = engine.start(&Uuid::now_v7(), HashMap::new()).await.unwrap_err();
    assert!(matches!(err, ExecutorError::WorkflowNotFound(_)), "got: {err}");
}

#[tokio::test]
async fn test_start_inactive_workflow_is_rejected() {
    use orchestrion_core::store::WorkflowStore;

    let workflows = MemoryWorkflowStore::new();
    let mut wf = Workflow::from_draft(draft("dormant", vec![step("a", vec![])]));
    wf.is_active = false;
    workflows.put(&wf).await.unwrap();

    let engine = WorkflowEngine::new(workflows, MemoryExecutionStore::new());
    let err = engine.start(&wf.id, HashMap::new()).await.unwrap_err();
    assert!(matches!(err, ExecutorError::WorkflowInactive(_)), "got: {err}");
}

#[tokio::test]
async fn test_get_status_unknown_execution_is_not_found() {
    let (engine, _) = engine_with_counting(vec![]);
    let err = engine.get_status(&Uuid::now_v7()).await.unwrap_err();
    assert!(matches!(err, ExecutorError::ExecutionNotFound(_)), "got: {err}");
}

// ---------------------------------------------------------------------------
// Happy path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_start_returns_pending_then_completes() {
    // {A, B} -> C: one batch of two, then C; three results at the end.
    let (engine, calls) = engine_with_counting(vec![]);
    let wf = engine
        .create_workflow(draft(
            "diamond",
            vec![step("a", vec![]), step("b", vec![]), step("c", vec!["a", "b"])],
        ))
        .await
        .unwrap();

    let started = engine.start(&wf.id, HashMap::new()).await.unwrap();
    assert_eq!(started.status, ExecutionStatus::Pending, "start returns immediately");

    let finished = wait_for_terminal(&engine, &started.id).await;
    assert_eq!(finished.status, ExecutionStatus::Completed);
    assert!(finished.completed_at.is_some());
    assert!(finished.error_message.is_none());
    assert_eq!(finished.step_results.len(), 3);
    assert!(finished.step_results.values().all(|r| r.status == StepStatus::Completed));

    // C ran strictly after the first batch.
    let order = calls.lock().unwrap();
    assert_eq!(order.len(), 3);
    assert_eq!(order[2], "c");

    // The final context snapshot carries every step output.
    let outputs = &finished.context["step_outputs"];
    assert_eq!(outputs["c"]["done"], json!("c"));
}

#[tokio::test]
async fn test_seed_context_reaches_handlers() {
    struct SeedReader;
    impl StepHandler for SeedReader {
        async fn execute(
            &self,
            _step: &StepDefinition,
            ctx: &ExecutionContext,
        ) -> Result<HandlerOutput, StepError> {
            match ctx.variable("environment") {
                Some(env) => Ok(HandlerOutput::value(json!({ "deployed_to": env }))),
                None => Err(StepError::ExecutionFailed("seed variable missing".to_string())),
            }
        }
    }

    let engine = WorkflowEngine::new(MemoryWorkflowStore::new(), MemoryExecutionStore::new());
    engine.register_handler("work", SeedReader);
    let wf = engine
        .create_workflow(draft("seeded", vec![step("deploy", vec![])]))
        .await
        .unwrap();

    let seed = HashMap::from([("environment".to_string(), json!("staging"))]);
    let started = engine.start(&wf.id, seed).await.unwrap();

    let finished = wait_for_terminal(&engine, &started.id).await;
    assert_eq!(finished.status, ExecutionStatus::Completed);
    assert_eq!(
        finished.step_results["deploy"].output["deployed_to"],
        json!("staging")
    );
}

// ---------------------------------------------------------------------------
// Failure handling
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_failed_branch_is_pruned_and_independents_complete() {
    // B fails after 2 retries (3 invocations); C is pruned, never invoked;
    // A and the independent D still complete; final status is Failed with
    // every step's result visible.
    let (engine, calls) = engine_with_counting(vec!["b"]);

    let mut flaky = step("b", vec![]);
    flaky.retry_count = 2;
    let wf = engine
        .create_workflow(draft(
            "split",
            vec![step("a", vec![]), flaky, step("c", vec!["a", "b"]), step("d", vec![])],
        ))
        .await
        .unwrap();

    let started = engine.start(&wf.id, HashMap::new()).await.unwrap();
    let finished = wait_for_terminal(&engine, &started.id).await;

    assert_eq!(finished.status, ExecutionStatus::Failed);
    assert!(finished.error_message.as_deref().unwrap().contains("b"));

    assert_eq!(finished.step_results.len(), 4, "every step has a visible result");
    assert_eq!(finished.step_results["a"].status, StepStatus::Completed);
    assert_eq!(finished.step_results["b"].status, StepStatus::Failed);
    assert_eq!(finished.step_results["b"].attempts, 3);
    assert_eq!(finished.step_results["c"].status, StepStatus::Skipped);
    assert_eq!(finished.step_results["d"].status, StepStatus::Completed);

    let calls = calls.lock().unwrap();
    assert_eq!(calls.iter().filter(|id| *id == "b").count(), 3);
    assert!(!calls.contains(&"c".to_string()), "pruned handler never invoked");
}

#[tokio::test]
async fn test_false_condition_skips_without_invocation() {
    let (engine, calls) = engine_with_counting(vec![]);

    let mut gated = step("gated", vec![]);
    gated.conditions = vec![Condition::ContextEquals {
        key: "enabled".to_string(),
        value: json!(true),
    }];
    let wf = engine
        .create_workflow(draft("conditional", vec![gated]))
        .await
        .unwrap();

    let started = engine.start(&wf.id, HashMap::new()).await.unwrap();
    let finished = wait_for_terminal(&engine, &started.id).await;

    assert_eq!(finished.status, ExecutionStatus::Completed);
    assert_eq!(finished.step_results["gated"].status, StepStatus::Skipped);
    assert!(calls.lock().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_cancel_records_in_flight_batch_and_stops() {
    // The gate step blocks until released. Cancelling while it is in flight
    // still records its result; the dependent step is never dispatched.
    struct GateHandler {
        started: Arc<Notify>,
        release: Arc<Notify>,
        calls: Arc<Mutex<Vec<String>>>,
    }
    impl StepHandler for GateHandler {
        async fn execute(
            &self,
            step: &StepDefinition,
            _ctx: &ExecutionContext,
        ) -> Result<HandlerOutput, StepError> {
            self.calls.lock().unwrap().push(step.id.clone());
            if step.id == "gate" {
                self.started.notify_one();
                self.release.notified().await;
            }
            Ok(HandlerOutput::value(json!("done")))
        }
    }

    let started_signal = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let calls = Arc::new(Mutex::new(Vec::new()));

    let engine = WorkflowEngine::new(MemoryWorkflowStore::new(), MemoryExecutionStore::new());
    engine.register_handler(
        "work",
        GateHandler {
            started: Arc::clone(&started_signal),
            release: Arc::clone(&release),
            calls: Arc::clone(&calls),
        },
    );

    let wf = engine
        .create_workflow(draft("gated", vec![step("gate", vec![]), step("after", vec!["gate"])]))
        .await
        .unwrap();
    let execution = engine.start(&wf.id, HashMap::new()).await.unwrap();

    // Wait until the first batch is in flight, then cancel and release it.
    started_signal.notified().await;
    assert!(engine.cancel(&execution.id));
    release.notify_one();

    let finished = wait_for_terminal(&engine, &execution.id).await;
    assert_eq!(finished.status, ExecutionStatus::Cancelled);
    assert_eq!(
        finished.step_results["gate"].status,
        StepStatus::Completed,
        "in-flight step finishes naturally and its result is recorded"
    );
    assert!(!finished.step_results.contains_key("after"));
    assert_eq!(calls.lock().unwrap().as_slice(), ["gate"]);
}

#[tokio::test]
async fn test_cancel_unknown_or_finished_execution_is_false() {
    let (engine, _) = engine_with_counting(vec![]);
    assert!(!engine.cancel(&Uuid::now_v7()));

    let wf = engine
        .create_workflow(draft("tiny", vec![step("a", vec![])]))
        .await
        .unwrap();
    let execution = engine.start(&wf.id, HashMap::new()).await.unwrap();
    wait_for_terminal(&engine, &execution.id).await;

    assert!(!engine.cancel(&execution.id), "finished executions cannot be cancelled");
}

// ---------------------------------------------------------------------------
// History & templates
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_execution_history_lists_most_recent_first() {
    let (engine, _) = engine_with_counting(vec![]);
    let wf = engine
        .create_workflow(draft("repeated", vec![step("a", vec![])]))
        .await
        .unwrap();

    let first = engine.start(&wf.id, HashMap::new()).await.unwrap();
    wait_for_terminal(&engine, &first.id).await;
    let second = engine.start(&wf.id, HashMap::new()).await.unwrap();
    wait_for_terminal(&engine, &second.id).await;

    let history = engine.list_executions(&wf.id, 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, second.id);
}

#[tokio::test]
async fn test_full_stack_template_runs_to_completion() {
    struct StubHandler;
    impl StepHandler for StubHandler {
        async fn execute(
            &self,
            step: &StepDefinition,
            _ctx: &ExecutionContext,
        ) -> Result<HandlerOutput, StepError> {
            Ok(HandlerOutput::value(json!({ "stub": step.step_type })))
        }
    }

    let engine = WorkflowEngine::new(MemoryWorkflowStore::new(), MemoryExecutionStore::new());
    crate::handlers::register_builtin_handlers(engine.registry());
    for tag in ["ai_generation", "code_review", "testing", "deployment"] {
        engine.register_handler(tag, StubHandler);
    }

    let wf = engine
        .create_workflow(templates::full_stack_pipeline())
        .await
        .unwrap();
    let execution = engine.start(&wf.id, HashMap::new()).await.unwrap();
    let finished = wait_for_terminal(&engine, &execution.id).await;

    assert_eq!(finished.status, ExecutionStatus::Completed);
    assert_eq!(finished.step_results.len(), 6);
    assert_eq!(
        finished.step_results["notify-team"].status,
        StepStatus::Completed
    );
}
