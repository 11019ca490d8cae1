//! Single-step execution with per-attempt timeout and fixed-delay retry.
//!
//! The executor owns no execution state and never writes to a store: it takes
//! a step, a context snapshot, and the prior results, and returns a terminal
//! [`StepResult`]. Recording is the orchestrator's job, which keeps this
//! component independently testable.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use orchestrion_types::workflow::{StepDefinition, StepResult};
use serde_json::Value;

use super::condition::conditions_met;
use super::context::ExecutionContext;
use super::registry::HandlerRegistry;

/// A terminal step result together with the handler's context writes.
#[derive(Debug)]
pub struct ExecutedStep {
    pub result: StepResult,
    pub context_patch: HashMap<String, Value>,
}

impl ExecutedStep {
    fn bare(result: StepResult) -> Self {
        Self {
            result,
            context_patch: HashMap::new(),
        }
    }
}

/// Runs one step through its handler under the step's timeout/retry policy.
pub struct StepExecutor {
    registry: Arc<HandlerRegistry>,
}

impl StepExecutor {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self { registry }
    }

    /// Execute a step to a terminal result.
    ///
    /// 1. Conditions unsatisfied -> `Skipped`, handler never invoked.
    /// 2. No registered handler -> `Failed` immediately, no retries.
    /// 3. Otherwise the handler runs under a `timeout_secs` deadline; errors
    ///    and timeouts are transient and retried after `retry_delay_secs`
    ///    (fixed delay) until `retry_count` retries are exhausted, so the
    ///    handler is invoked at most `retry_count + 1` times.
    pub async fn execute(
        &self,
        step: &StepDefinition,
        ctx: &ExecutionContext,
        prior: &HashMap<String, StepResult>,
    ) -> ExecutedStep {
        if !conditions_met(&step.conditions, ctx, prior) {
            tracing::info!(step_id = step.id.as_str(), "conditions not met, skipping step");
            return ExecutedStep::bare(StepResult::skipped("conditions not met"));
        }

        let Some(handler) = self.registry.resolve(&step.step_type) else {
            tracing::error!(
                step_id = step.id.as_str(),
                step_type = step.step_type.as_str(),
                "no handler registered for step type"
            );
            return ExecutedStep::bare(StepResult::failed(
                format!("unknown step type: '{}'", step.step_type),
                0,
            ));
        };

        let deadline = Duration::from_secs(step.timeout_secs);
        let started = Utc::now();
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;

            let failure = match tokio::time::timeout(deadline, handler.execute(step, ctx)).await {
                Ok(Ok(output)) => {
                    let mut result = StepResult::completed(output.output, attempts);
                    result.started_at = Some(started);
                    tracing::debug!(
                        step_id = step.id.as_str(),
                        attempts,
                        "step completed"
                    );
                    return ExecutedStep {
                        result,
                        context_patch: output.context_patch,
                    };
                }
                Ok(Err(err)) => err.to_string(),
                Err(_elapsed) => format!("step timed out after {}s", step.timeout_secs),
            };

            if attempts <= step.retry_count {
                tracing::warn!(
                    step_id = step.id.as_str(),
                    attempt = attempts,
                    error = failure.as_str(),
                    "step attempt failed, retrying"
                );
                tokio::time::sleep(Duration::from_secs(step.retry_delay_secs)).await;
                continue;
            }

            tracing::error!(
                step_id = step.id.as_str(),
                attempts,
                error = failure.as_str(),
                "step failed after exhausting retries"
            );
            let mut result = StepResult::failed(failure, attempts);
            result.started_at = Some(started);
            return ExecutedStep::bare(result);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
