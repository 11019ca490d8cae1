//! Structured logging setup for Orchestrion.

pub mod tracing_setup;
