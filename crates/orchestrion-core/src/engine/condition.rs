//! Evaluation of the closed predicate model against execution state.
//!
//! A step's `conditions` list is an implicit conjunction: every predicate
//! must hold or the step is skipped. Evaluation is pure and total -- a
//! predicate referencing a missing variable or an unattempted step is simply
//! false, never an error.

use std::collections::HashMap;

use orchestrion_types::condition::Condition;
use orchestrion_types::workflow::StepResult;

use super::context::ExecutionContext;

/// Whether every condition on a step holds. An empty list always holds.
pub fn conditions_met(
    conditions: &[Condition],
    ctx: &ExecutionContext,
    results: &HashMap<String, StepResult>,
) -> bool {
    conditions.iter().all(|c| evaluate(c, ctx, results))
}

/// Evaluate a single predicate.
///
/// `All` of an empty list is true; `Any` of an empty list is false.
pub fn evaluate(
    condition: &Condition,
    ctx: &ExecutionContext,
    results: &HashMap<String, StepResult>,
) -> bool {
    match condition {
        Condition::ContextEquals { key, value } => ctx.variable(key) == Some(value),
        Condition::ContextIn { key, values } => ctx
            .variable(key)
            .map(|current| values.contains(current))
            .unwrap_or(false),
        Condition::StepStatusIs { step, status } => results
            .get(step)
            .map(|result| result.status == *status)
            .unwrap_or(false),
        Condition::All { conditions } => conditions.iter().all(|c| evaluate(c, ctx, results)),
        Condition::Any { conditions } => conditions.iter().any(|c| evaluate(c, ctx, results)),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
