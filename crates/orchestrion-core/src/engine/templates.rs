//! Predefined pipeline templates.
//!
//! Drafts for the common delivery pipelines, ready to be customized and
//! passed to `WorkflowEngine::create_workflow`. Step types reference the
//! external collaborators (generation service, test runner, deployer,
//! notifier), so the matching handlers must be registered before creation.

use std::collections::HashMap;

use orchestrion_types::workflow::{StepDefinition, TriggerDescriptor, WorkflowDraft};
use serde_json::{Value, json};

fn step(
    id: &str,
    name: &str,
    step_type: &str,
    config: Vec<(&str, Value)>,
    dependencies: Vec<&str>,
) -> StepDefinition {
    StepDefinition {
        id: id.to_string(),
        name: name.to_string(),
        step_type: step_type.to_string(),
        config: config
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
        dependencies: dependencies.into_iter().map(String::from).collect(),
        timeout_secs: 300,
        retry_count: 3,
        retry_delay_secs: 60,
        conditions: vec![],
    }
}

fn manual_trigger() -> TriggerDescriptor {
    TriggerDescriptor {
        trigger_type: "manual".to_string(),
        config: HashMap::new(),
    }
}

/// Complete pipeline from code generation through deployment and notification.
pub fn full_stack_pipeline() -> WorkflowDraft {
    WorkflowDraft {
        name: "full-stack-pipeline".to_string(),
        description: Some("Complete pipeline from generation to deployment".to_string()),
        steps: vec![
            step(
                "generate-frontend",
                "Generate Frontend Code",
                "ai_generation",
                vec![
                    ("language", json!("typescript")),
                    ("framework", json!("react")),
                ],
                vec![],
            ),
            step(
                "generate-backend",
                "Generate Backend Code",
                "ai_generation",
                vec![
                    ("language", json!("python")),
                    ("framework", json!("fastapi")),
                ],
                vec![],
            ),
            step(
                "code-review",
                "Code Review",
                "code_review",
                vec![],
                vec!["generate-frontend", "generate-backend"],
            ),
            step(
                "run-tests",
                "Run Tests",
                "testing",
                vec![],
                vec!["code-review"],
            ),
            step(
                "deploy-staging",
                "Deploy to Staging",
                "deployment",
                vec![("environment", json!("staging"))],
                vec!["run-tests"],
            ),
            step(
                "notify-team",
                "Notify Team",
                "notification",
                vec![
                    ("message", json!("Deployment completed successfully")),
                    ("recipients", json!(["team@example.com"])),
                ],
                vec!["deploy-staging"],
            ),
        ],
        triggers: vec![manual_trigger()],
    }
}

/// Generate code with two providers in parallel, then compare and review.
pub fn generate_and_review_pipeline() -> WorkflowDraft {
    WorkflowDraft {
        name: "generate-and-review".to_string(),
        description: Some("Generate with two providers and review the results".to_string()),
        steps: vec![
            step(
                "generate-primary",
                "Generate with Primary Provider",
                "ai_generation",
                vec![("provider", json!("anthropic"))],
                vec![],
            ),
            step(
                "generate-secondary",
                "Generate with Secondary Provider",
                "ai_generation",
                vec![("provider", json!("openai"))],
                vec![],
            ),
            step(
                "compare-results",
                "Compare Results",
                "transform",
                vec![
                    ("operation", json!("merge")),
                    ("keys", json!(["generate-primary", "generate-secondary"])),
                    ("into", json!("candidates")),
                ],
                vec!["generate-primary", "generate-secondary"],
            ),
            step(
                "quality-review",
                "Quality Review",
                "code_review",
                vec![],
                vec!["compare-results"],
            ),
        ],
        triggers: vec![manual_trigger()],
    }
}

/// All built-in templates.
pub fn builtin_templates() -> Vec<WorkflowDraft> {
    vec![full_stack_pipeline(), generate_and_review_pipeline()]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
