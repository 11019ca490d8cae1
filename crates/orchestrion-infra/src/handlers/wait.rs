//! Timed wait adapter.
//!
//! Sleeps for `seconds` from the step config. The step's own `timeout_secs`
//! still applies, so a wait longer than the step timeout fails the attempt.

use std::time::Duration;

use orchestrion_core::engine::context::ExecutionContext;
use orchestrion_core::engine::registry::{HandlerOutput, StepError, StepHandler};
use orchestrion_types::workflow::StepDefinition;
use serde_json::{Value, json};

pub struct WaitHandler;

impl StepHandler for WaitHandler {
    async fn execute(
        &self,
        step: &StepDefinition,
        _ctx: &ExecutionContext,
    ) -> Result<HandlerOutput, StepError> {
        let seconds = step
            .config
            .get("seconds")
            .and_then(Value::as_u64)
            .unwrap_or(60);

        tokio::time::sleep(Duration::from_secs(seconds)).await;

        Ok(HandlerOutput::value(json!({ "waited_secs": seconds })))
    }
}
