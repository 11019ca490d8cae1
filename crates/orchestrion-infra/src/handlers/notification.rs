//! Notification adapter.
//!
//! Emits a structured log record for the configured message and recipients
//! and returns a delivery receipt. Real delivery channels (chat, email)
//! register their own handlers under their own type tags.

use chrono::Utc;
use orchestrion_core::engine::context::ExecutionContext;
use orchestrion_core::engine::registry::{HandlerOutput, StepError, StepHandler};
use orchestrion_types::workflow::StepDefinition;
use serde_json::{Value, json};

pub struct NotificationHandler;

impl StepHandler for NotificationHandler {
    async fn execute(
        &self,
        step: &StepDefinition,
        ctx: &ExecutionContext,
    ) -> Result<HandlerOutput, StepError> {
        let message = step
            .config
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("workflow step completed");
        let recipients: Vec<String> = step
            .config
            .get("recipients")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        tracing::info!(
            workflow = ctx.workflow_name.as_str(),
            message,
            recipients = ?recipients,
            "notification dispatched"
        );

        Ok(HandlerOutput::value(json!({
            "message": message,
            "recipients": recipients,
            "sent_at": Utc::now(),
        })))
    }
}
