//! Closed predicate model for step conditions.
//!
//! Conditions gate step dispatch: all predicates on a step must hold against
//! the execution context and prior step results, otherwise the step is
//! recorded `Skipped` without invoking its handler. The model is a fixed set
//! of equality/membership/status checks -- deliberately not an expression
//! language.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::workflow::StepStatus;

/// A single predicate over the execution context or prior step results.
///
/// Internally tagged by `type` to match the definition file structure:
/// ```yaml
/// conditions:
///   - type: context_equals
///     key: environment
///     value: production
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    /// A context variable equals the given value.
    ContextEquals { key: String, value: Value },
    /// A context variable is one of the given values.
    ContextIn { key: String, values: Vec<Value> },
    /// A prior step reached the given terminal status.
    StepStatusIs { step: String, status: StepStatus },
    /// Every nested condition holds.
    All { conditions: Vec<Condition> },
    /// At least one nested condition holds.
    Any { conditions: Vec<Condition> },
}
