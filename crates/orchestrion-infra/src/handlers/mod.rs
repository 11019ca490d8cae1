//! Built-in step handler adapters.
//!
//! The engine treats concrete step behavior as external, but four generic
//! adapters ship in the box: an outbound HTTP call, a notification emitter,
//! a timed wait, and a context data transform. Domain-specific handlers
//! (code generation, test execution, deployment) are registered by their own
//! services at startup.

pub mod http_call;
pub mod notification;
pub mod transform;
pub mod wait;

pub use http_call::HttpCallHandler;
pub use notification::NotificationHandler;
pub use transform::TransformHandler;
pub use wait::WaitHandler;

use orchestrion_core::engine::registry::HandlerRegistry;

/// Register all built-in handlers under their canonical type tags.
pub fn register_builtin_handlers(registry: &HandlerRegistry) {
    registry.register("http_call", HttpCallHandler::new());
    registry.register("notification", NotificationHandler);
    registry.register("wait", WaitHandler);
    registry.register("transform", TransformHandler);
}
