//! Complexity-scored delegation and multi-worker execution.
//!
//! The engine scores incoming tasks, selects concrete workers from the
//! registry by capability tags and live availability, and drives execution:
//! a single call, a concurrent fan-out with conflict reconciliation, or a
//! lead-coordinated decomposition with consolidation. Every worker call is
//! recorded as an interaction with the session coordinator, and the processor
//! pipeline wraps every delegated operation.
//!
//! # Main types
//!
//! - [`Delegator`] — Scores, routes, and executes tasks.
//! - [`WorkerRegistry`] — Capability catalog with live availability leases.
//! - [`Worker`] — The opaque execute-by-name worker boundary.
//! - [`DelegorConfig`] — Aggregated deployment configuration.

/// Aggregated configuration with TOML loading.
pub mod config;
/// The delegator: selection, execution, and reconciliation.
pub mod delegator;
/// Worker capability catalog and availability accounting.
pub mod registry;
/// The worker invocation boundary.
pub mod worker;

pub use config::DelegorConfig;
pub use delegator::{
    ConsolidatedReport, Delegation, DelegationHandle, DelegationOutcome, DelegationResult,
    Delegator, DelegatorConfig, ExecutionMode,
};
pub use registry::{default_catalog, CapabilityUpdate, WorkerCapability, WorkerLease, WorkerRegistry};
pub use worker::{SimulatedWorker, Worker, WorkerAssignment, WorkerOutput};
