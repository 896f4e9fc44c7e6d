//! Core types and error definitions for the Delegor framework.
//!
//! This crate provides the foundational types shared across all Delegor
//! crates: error handling, task descriptors, coordination messages, and the
//! conflict-resolution primitives used by both the delegation engine and the
//! session coordinator.
//!
//! # Main types
//!
//! - [`DelegorError`] — Unified error enum for all Delegor subsystems.
//! - [`DelegorResult`] — Convenience alias for `Result<T, DelegorError>`.
//! - [`TaskDescriptor`] — An immutable description of work to be routed.
//! - [`WorkerMessage`] — A message exchanged between workers within a session.
//! - [`ConflictPolicy`] — How disagreeing worker outputs are reconciled.

/// Conflict-resolution policies and the pure resolver over contributions.
pub mod conflict;
/// Inter-worker coordination messages.
pub mod message;
/// Task descriptors, operation kinds, and submission-boundary validation.
pub mod task;

pub use conflict::{resolve, ConflictOutcome, ConflictPolicy, Contribution};
pub use message::{MessagePriority, WorkerMessage};
pub use task::{OperationKind, RiskTier, TaskContext, TaskDescriptor, TaskPriority};

/// Top-level error type for the Delegor framework.
///
/// Each variant corresponds to a subsystem that can produce errors.
#[derive(Debug, thiserror::Error)]
pub enum DelegorError {
    /// Input rejected at a submission boundary before any state mutation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A write operation referenced a session or delegation that does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// An error produced while executing a worker call.
    #[error("Worker error: {0}")]
    Worker(String),

    /// An error from session coordination or persistence.
    #[error("Session error: {0}")]
    Session(String),

    /// An error raised by a processor in the pipeline.
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An error from the delegation engine itself.
    #[error("Delegation error: {0}")]
    Delegation(String),
}

/// A convenience `Result` alias using [`DelegorError`].
pub type DelegorResult<T> = Result<T, DelegorError>;
