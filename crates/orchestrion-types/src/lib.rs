//! Shared domain types for Orchestrion.
//!
//! This crate contains the core domain types used across the Orchestrion
//! workflow engine: workflow definitions, execution tracking records, step
//! conditions, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod condition;
pub mod error;
pub mod workflow;
