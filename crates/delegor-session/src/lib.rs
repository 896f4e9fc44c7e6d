//! Session coordination for multi-worker delegations.
//!
//! A session is the bounded-lifetime container of coordination state shared by
//! all delegations issued under one external conversation: active delegation
//! records, per-worker interaction logs, pending messages, shared-context
//! histories, conflict history, and aggregate metrics. Sessions are owned
//! exclusively by the [`SessionCoordinator`]; every other component mutates
//! them only through its operations.
//!
//! # Main types
//!
//! - [`SessionCoordinator`] — Owns all sessions; the only mutation path.
//! - [`Session`] — The per-session coordination state.
//! - [`SessionLifecycleManager`] — Background reaper (TTL, idle, LRU).
//! - [`StateStore`] — Key/value persistence boundary (`session:{id}:{subkey}`).

/// The session coordinator: the single owner of all session state.
pub mod coordinator;
/// Background session reaping by TTL, idle time, and LRU eviction.
pub mod lifecycle;
/// Session data model: records, metrics, and the session struct itself.
pub mod session;
/// Generic key/value state store boundary and built-in implementations.
pub mod store;

pub use coordinator::{CoordinatorConfig, SessionAge, SessionCoordinator};
pub use lifecycle::{LifecycleConfig, ReapReason, SessionLifecycleManager};
pub use session::{
    ConflictRecord, ContextEntry, DelegationRecord, InteractionRecord, Session, SessionMetrics,
};
pub use store::{FileStateStore, MemoryStateStore, StateStore};
