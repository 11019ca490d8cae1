//! Context data transform adapter.
//!
//! A closed set of operations over execution state, each writing its result
//! back to the context through a patch so downstream steps can read it:
//!
//! - `pick`: select a (possibly nested) value -- `from`, optional dotted
//!   `path`, `into`
//! - `merge`: combine several named values into one object -- `keys`, `into`
//! - `count`: length of an array/object/string -- `of`, `into`
//!
//! Lookup resolves step outputs first, then context variables.

use orchestrion_core::engine::context::ExecutionContext;
use orchestrion_core::engine::registry::{HandlerOutput, StepError, StepHandler};
use orchestrion_types::workflow::StepDefinition;
use serde_json::{Map, Value, json};

pub struct TransformHandler;

fn lookup<'a>(ctx: &'a ExecutionContext, key: &str) -> Option<&'a Value> {
    ctx.step_output(key).or_else(|| ctx.variable(key))
}

fn resolve_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, segment| current.get(segment))
}

impl StepHandler for TransformHandler {
    async fn execute(
        &self,
        step: &StepDefinition,
        ctx: &ExecutionContext,
    ) -> Result<HandlerOutput, StepError> {
        let operation = step
            .config
            .get("operation")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                StepError::InvalidConfig("transform requires an 'operation' string".to_string())
            })?;
        let into = step
            .config
            .get("into")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                StepError::InvalidConfig("transform requires an 'into' target key".to_string())
            })?;

        let result = match operation {
            "pick" => {
                let from = step.config.get("from").and_then(Value::as_str).ok_or_else(|| {
                    StepError::InvalidConfig("pick requires a 'from' key".to_string())
                })?;
                let root = lookup(ctx, from).ok_or_else(|| {
                    StepError::ExecutionFailed(format!("no value named '{from}' in context"))
                })?;
                match step.config.get("path").and_then(Value::as_str) {
                    Some(path) => resolve_path(root, path)
                        .ok_or_else(|| {
                            StepError::ExecutionFailed(format!(
                                "path '{path}' not found under '{from}'"
                            ))
                        })?
                        .clone(),
                    None => root.clone(),
                }
            }
            "merge" => {
                let keys = step.config.get("keys").and_then(Value::as_array).ok_or_else(|| {
                    StepError::InvalidConfig("merge requires a 'keys' array".to_string())
                })?;
                let mut merged = Map::new();
                for key in keys.iter().filter_map(Value::as_str) {
                    let value = lookup(ctx, key).ok_or_else(|| {
                        StepError::ExecutionFailed(format!("no value named '{key}' in context"))
                    })?;
                    merged.insert(key.to_string(), value.clone());
                }
                Value::Object(merged)
            }
            "count" => {
                let of = step.config.get("of").and_then(Value::as_str).ok_or_else(|| {
                    StepError::InvalidConfig("count requires an 'of' key".to_string())
                })?;
                let value = lookup(ctx, of).ok_or_else(|| {
                    StepError::ExecutionFailed(format!("no value named '{of}' in context"))
                })?;
                let length = match value {
                    Value::Array(items) => items.len(),
                    Value::Object(fields) => fields.len(),
                    Value::String(text) => text.len(),
                    _ => {
                        return Err(StepError::ExecutionFailed(format!(
                            "value '{of}' is not countable"
                        )));
                    }
                };
                json!(length)
            }
            other => {
                return Err(StepError::InvalidConfig(format!(
                    "unknown transform operation '{other}'"
                )));
            }
        };

        Ok(HandlerOutput::value(result.clone()).with_patch(into, result))
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
            id: "shape".to_string(),
            name: "Shape".to_string(),
            step_type: "transform".to_string(),
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
        let mut ctx = ExecutionContext::new(
            "test".to_string(),
            Uuid::now_v7(),
            HashMap::from([("labels".to_string(), json!(["alpha", "beta", "gamma"]))]),
        );
        ctx.set_step_output("fetch", json!({"payload": {"rows": [1, 2], "source": "api"}}))
            .unwrap();
        ctx
    }

    #[tokio::test]
    async fn test_pick_nested_path() {
        let output = TransformHandler
            .execute(
                &step(vec![
                    ("operation", json!("pick")),
                    ("from", json!("fetch")),
                    ("path", json!("payload.source")),
                    ("into", json!("origin")),
                ]),
                &ctx(),
            )
            .await
            .unwrap();

        assert_eq!(output.output, json!("api"));
        assert_eq!(output.context_patch["origin"], json!("api"));
    }

    #[tokio::test]
    async fn test_merge_named_values() {
        let output = TransformHandler
            .execute(
                &step(vec![
                    ("operation", json!("merge")),
                    ("keys", json!(["fetch", "labels"])),
                    ("into", json!("combined")),
                ]),
                &ctx(),
            )
            .await
            .unwrap();

        let merged = output.output.as_object().unwrap();
        assert!(merged.contains_key("fetch"));
        assert!(merged.contains_key("labels"));
    }

    #[tokio::test]
    async fn test_count_array_variable() {
        let output = TransformHandler
            .execute(
                &step(vec![
                    ("operation", json!("count")),
                    ("of", json!("labels")),
                    ("into", json!("label-count")),
                ]),
                &ctx(),
            )
            .await
            .unwrap();

        assert_eq!(output.output, json!(3));
        assert_eq!(output.context_patch["label-count"], json!(3));
    }

    #[tokio::test]
    async fn test_missing_value_fails() {
        let err = TransformHandler
            .execute(
                &step(vec![
                    ("operation", json!("count")),
                    ("of", json!("ghost")),
                    ("into", json!("n")),
                ]),
                &ctx(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StepError::ExecutionFailed(_)), "got: {err}");
    }

    #[tokio::test]
    async fn test_unknown_operation_rejected() {
        let err = TransformHandler
            .execute(
                &step(vec![("operation", json!("explode")), ("into", json!("x"))]),
                &ctx(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StepError::InvalidConfig(_)), "got: {err}");
    }
}
