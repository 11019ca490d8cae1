//! Step handler registry: maps a step type tag to an executable handler.
//!
//! External collaborators (code generation services, test runners, deployers,
//! notifiers) register themselves once at startup; the engine resolves
//! handlers at dispatch time. Handlers are written against the RPITIT
//! [`StepHandler`] trait; dynamic dispatch goes through the object-safe
//! [`StepHandlerDyn`] wrapper with boxed futures:
//! 1. Define an object-safe `StepHandlerDyn` trait with boxed futures
//! 2. Blanket-impl `StepHandlerDyn` for all `T: StepHandler`
//! 3. `BoxStepHandler` wraps `Box<dyn StepHandlerDyn>` and delegates

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use dashmap::DashMap;
use orchestrion_types::workflow::StepDefinition;
use serde_json::Value;

use super::context::ExecutionContext;

// ---------------------------------------------------------------------------
// StepError
// ---------------------------------------------------------------------------

/// Errors a handler can return. All variants are treated as transient by the
/// step executor and retried per the step's retry policy.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// The handler ran and failed.
    #[error("step execution failed: {0}")]
    ExecutionFailed(String),

    /// The step's `config` is missing or malformed for this handler.
    #[error("invalid step config: {0}")]
    InvalidConfig(String),
}

// ---------------------------------------------------------------------------
// HandlerOutput
// ---------------------------------------------------------------------------

/// What a handler produces on success.
#[derive(Debug, Clone, Default)]
pub struct HandlerOutput {
    /// Arbitrary output payload, stored as the step's result.
    pub output: Value,
    /// Context variable writes, merged by the orchestrator after the batch
    /// joins. Concurrent steps in one batch must not patch overlapping keys.
    pub context_patch: HashMap<String, Value>,
}

impl HandlerOutput {
    /// An output payload with no context writes.
    pub fn value(output: Value) -> Self {
        Self {
            output,
            context_patch: HashMap::new(),
        }
    }

    /// Add a context variable write to this output.
    pub fn with_patch(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context_patch.insert(key.into(), value);
        self
    }
}

// ---------------------------------------------------------------------------
// StepHandler
// ---------------------------------------------------------------------------

/// The external function implementing a step type's behavior.
///
/// Receives the step definition (including its opaque `config`) and a
/// read-only context snapshot; may suspend on external I/O.
pub trait StepHandler: Send + Sync {
    fn execute(
        &self,
        step: &StepDefinition,
        ctx: &ExecutionContext,
    ) -> impl Future<Output = Result<HandlerOutput, StepError>> + Send;
}

/// Object-safe version of [`StepHandler`] with boxed futures.
///
/// Exists solely to enable dynamic dispatch; a blanket implementation covers
/// every `StepHandler`.
pub trait StepHandlerDyn: Send + Sync {
    fn execute_boxed<'a>(
        &'a self,
        step: &'a StepDefinition,
        ctx: &'a ExecutionContext,
    ) -> Pin<Box<dyn Future<Output = Result<HandlerOutput, StepError>> + Send + 'a>>;
}

impl<T: StepHandler> StepHandlerDyn for T {
    fn execute_boxed<'a>(
        &'a self,
        step: &'a StepDefinition,
        ctx: &'a ExecutionContext,
    ) -> Pin<Box<dyn Future<Output = Result<HandlerOutput, StepError>> + Send + 'a>> {
        Box::pin(self.execute(step, ctx))
    }
}

/// Type-erased step handler held by the registry.
pub struct BoxStepHandler {
    inner: Box<dyn StepHandlerDyn>,
}

impl BoxStepHandler {
    /// Wrap a concrete handler in a type-erased box.
    pub fn new<T: StepHandler + 'static>(handler: T) -> Self {
        Self {
            inner: Box::new(handler),
        }
    }

    /// Run the handler.
    pub async fn execute(
        &self,
        step: &StepDefinition,
        ctx: &ExecutionContext,
    ) -> Result<HandlerOutput, StepError> {
        self.inner.execute_boxed(step, ctx).await
    }
}

// ---------------------------------------------------------------------------
// HandlerRegistry
// ---------------------------------------------------------------------------

/// Pure lookup table from step type tag to handler. No other state.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: DashMap<String, Arc<BoxStepHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a step type tag, replacing any previous one.
    pub fn register<T: StepHandler + 'static>(&self, step_type: impl Into<String>, handler: T) {
        let step_type = step_type.into();
        tracing::debug!(step_type = step_type.as_str(), "registering step handler");
        self.handlers
            .insert(step_type, Arc::new(BoxStepHandler::new(handler)));
    }

    /// Resolve the handler for a step type tag.
    pub fn resolve(&self, step_type: &str) -> Option<Arc<BoxStepHandler>> {
        self.handlers.get(step_type).map(|h| Arc::clone(h.value()))
    }

    /// Whether a handler is registered for the given tag.
    pub fn contains(&self, step_type: &str) -> bool {
        self.handlers.contains_key(step_type)
    }

    /// All registered type tags (unordered).
    pub fn registered_types(&self) -> Vec<String> {
        self.handlers.iter().map(|e| e.key().clone()).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
