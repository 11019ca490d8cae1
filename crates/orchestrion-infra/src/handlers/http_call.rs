//! Generic outbound HTTP call adapter.
//!
//! Config keys:
//! - `url` (required): request URL
//! - `method` (default "GET"): HTTP method
//! - `headers`: string -> string map
//! - `body`: JSON value, sent as the request body
//!
//! Non-2xx responses are handler failures, so the step's retry policy
//! applies to them the same way it applies to connection errors.

use std::time::Duration;

use orchestrion_core::engine::context::ExecutionContext;
use orchestrion_core::engine::registry::{HandlerOutput, StepError, StepHandler};
use orchestrion_types::workflow::StepDefinition;
use serde_json::{Value, json};

pub struct HttpCallHandler {
    client: reqwest::Client,
}

impl HttpCallHandler {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("orchestrion-workflow/0.1")
            .build()
            .expect("failed to build HTTP client");
        Self { client }
    }
}

impl Default for HttpCallHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl StepHandler for HttpCallHandler {
    async fn execute(
        &self,
        step: &StepDefinition,
        _ctx: &ExecutionContext,
    ) -> Result<HandlerOutput, StepError> {
        let url = step
            .config
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| StepError::InvalidConfig("http_call requires a 'url' string".to_string()))?;

        let method_str = step
            .config
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or("GET");
        let method: reqwest::Method = method_str
            .parse()
            .map_err(|_| StepError::InvalidConfig(format!("invalid HTTP method '{method_str}'")))?;

        let mut request = self.client.request(method, url);
        if let Some(headers) = step.config.get("headers").and_then(Value::as_object) {
            for (name, value) in headers {
                if let Some(value) = value.as_str() {
                    request = request.header(name.as_str(), value);
                }
            }
        }
        if let Some(body) = step.config.get("body") {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| StepError::ExecutionFailed(format!("request failed: {e}")))?;

        let status_code = response.status().as_u16();
        if !response.status().is_success() {
            return Err(StepError::ExecutionFailed(format!(
                "HTTP {status_code} from {url}"
            )));
        }

        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("application/json"))
            .unwrap_or(false);
        let body = if is_json {
            response
                .json::<Value>()
                .await
                .map_err(|e| StepError::ExecutionFailed(format!("invalid JSON response: {e}")))?
        } else {
            Value::String(
                response
                    .text()
                    .await
                    .map_err(|e| StepError::ExecutionFailed(format!("unreadable response: {e}")))?,
            )
        };

        tracing::debug!(url, status_code, "outbound call completed");
        Ok(HandlerOutput::value(json!({
            "status_code": status_code,
            "body": body,
        })))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn step(config: Vec<(&str, Value)>) -> StepDefinition {
        StepDefinition {
            id: "call".to_string(),
            name: "Call".to_string(),
            step_type: "http_call".to_string(),
            config: config
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            dependencies: vec![],
            timeout_secs: 30,
            retry_count: 0,
            retry_delay_secs: 0,
            conditions: vec![],
        }
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext::new("test".to_string(), Uuid::now_v7(), HashMap::new())
    }

    #[tokio::test]
    async fn test_missing_url_is_invalid_config() {
        let handler = HttpCallHandler::new();
        let err = handler.execute(&step(vec![]), &ctx()).await.unwrap_err();
        assert!(matches!(err, StepError::InvalidConfig(_)), "got: {err}");
        assert!(err.to_string().contains("url"));
    }

    #[tokio::test]
    async fn test_bad_method_is_invalid_config() {
        let handler = HttpCallHandler::new();
        let err = handler
            .execute(
                &step(vec![
                    ("url", json!("https://example.com")),
                    ("method", json!("NOT A METHOD")),
                ]),
                &ctx(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StepError::InvalidConfig(_)), "got: {err}");
    }
}
