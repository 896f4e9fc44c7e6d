use chrono::{DateTime, Utc};
use delegor_core::{ConflictPolicy, WorkerMessage};
use delegor_scoring::{ComplexityResult, DelegationStrategy};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// The routing decision attached to one delegated task.
///
/// Created by the delegator, tracked in the owning session's active map until
/// completion, and retained only in aggregate metrics afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegationRecord {
    /// Unique identifier of the delegation.
    pub id: Uuid,
    /// Strategy chosen by the scorer.
    pub strategy: DelegationStrategy,
    /// Names of the assigned workers.
    pub workers: Vec<String>,
    /// The scoring result the routing decision came from.
    pub complexity: ComplexityResult,
    /// Policy used to reconcile disagreeing outputs, fixed at creation.
    pub policy: ConflictPolicy,
    /// Estimated duration in minutes.
    pub estimated_minutes: u64,
    /// UTC timestamp of when the delegation was created.
    pub created_at: DateTime<Utc>,
}

/// One worker call recorded against a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRecord {
    /// Name of the worker involved.
    pub worker: String,
    /// What the worker was asked to do.
    pub action: String,
    /// Whether the call succeeded.
    pub success: bool,
    /// Wall-clock duration of the call in milliseconds.
    pub duration_ms: u64,
    /// Failure reason or other detail.
    #[serde(default)]
    pub detail: Option<String>,
    /// Stamped by the coordinator when the interaction is recorded.
    pub recorded_at: DateTime<Utc>,
}

impl InteractionRecord {
    /// Creates a successful interaction record.
    pub fn success(worker: impl Into<String>, action: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            worker: worker.into(),
            action: action.into(),
            success: true,
            duration_ms,
            detail: None,
            recorded_at: Utc::now(),
        }
    }

    /// Creates a failed interaction record with a reason.
    pub fn failure(
        worker: impl Into<String>,
        action: impl Into<String>,
        duration_ms: u64,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            worker: worker.into(),
            action: action.into(),
            success: false,
            duration_ms,
            detail: Some(reason.into()),
            recorded_at: Utc::now(),
        }
    }
}

/// One timestamped, attributed entry in a shared-context history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEntry {
    /// The shared value.
    pub value: serde_json::Value,
    /// Worker that contributed the value.
    pub worker: String,
    /// UTC timestamp of the contribution.
    pub recorded_at: DateTime<Utc>,
}

/// A recorded disagreement between workers and how it ended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictRecord {
    /// Unique identifier of the conflict.
    pub id: Uuid,
    /// Shared-context key the conflict arose over.
    pub key: String,
    /// Policy that was applied.
    pub policy: ConflictPolicy,
    /// Workers that contributed to the contested key.
    pub workers: Vec<String>,
    /// Winning value, absent when the conflict was left unresolved.
    #[serde(default)]
    pub resolution: Option<serde_json::Value>,
    /// Whether a winner was determined.
    pub resolved: bool,
    /// UTC timestamp of the resolution attempt.
    pub recorded_at: DateTime<Utc>,
}

/// Aggregate per-session counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionMetrics {
    /// Every recorded interaction, success or failure.
    pub total_interactions: u64,
    /// Interactions that succeeded.
    pub successful_interactions: u64,
    /// Interactions that failed.
    pub failed_interactions: u64,
    /// Conflicts recorded against the session.
    pub total_conflicts: u64,
    /// Conflicts that ended with a resolution value.
    pub resolved_conflicts: u64,
    /// Sum of interaction durations, for the response-time average.
    pub total_response_ms: u64,
}

impl SessionMetrics {
    /// Average interaction response time in milliseconds (0 with no data).
    pub fn average_response_ms(&self) -> f64 {
        if self.total_interactions == 0 {
            0.0
        } else {
            self.total_response_ms as f64 / self.total_interactions as f64
        }
    }

    /// Fraction of recorded conflicts that were resolved.
    ///
    /// Defined as 1.0 when no conflicts exist, by convention.
    pub fn conflict_resolution_rate(&self) -> f64 {
        if self.total_conflicts == 0 {
            1.0
        } else {
            self.resolved_conflicts as f64 / self.total_conflicts as f64
        }
    }

    /// Successful-interaction fraction weighted by the resolution rate.
    ///
    /// 1.0 for a session with no interactions and no conflicts.
    pub fn coordination_efficiency(&self) -> f64 {
        let success_rate = if self.total_interactions == 0 {
            1.0
        } else {
            self.successful_interactions as f64 / self.total_interactions as f64
        };
        success_rate * self.conflict_resolution_rate()
    }
}

/// Coordination state for one external conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// External session identifier.
    pub id: String,
    /// UTC creation time.
    pub created_at: DateTime<Utc>,
    /// UTC time of the last mutation.
    pub last_activity: DateTime<Utc>,
    /// Time-to-live in milliseconds, enforced by the lifecycle manager.
    pub ttl_ms: u64,
    /// Delegations currently in flight, keyed by delegation id.
    pub active_delegations: HashMap<Uuid, DelegationRecord>,
    /// Interaction log per worker name.
    pub interactions: HashMap<String, Vec<InteractionRecord>>,
    /// Conflicts recorded against this session, in order.
    pub conflict_history: Vec<ConflictRecord>,
    /// Workers currently engaged in the session.
    pub active_workers: HashSet<String>,
    /// Messages queued for delivery.
    pub pending_messages: Vec<WorkerMessage>,
    /// Append-only shared context, keyed by context key.
    pub shared_context: HashMap<String, Vec<ContextEntry>>,
    /// Aggregate counters.
    pub metrics: SessionMetrics,
}

impl Session {
    /// Creates a fresh session with the given default active-worker set.
    pub fn new(id: impl Into<String>, ttl_ms: u64, default_workers: &[String]) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            created_at: now,
            last_activity: now,
            ttl_ms,
            active_delegations: HashMap::new(),
            interactions: HashMap::new(),
            conflict_history: Vec::new(),
            active_workers: default_workers.iter().cloned().collect(),
            pending_messages: Vec::new(),
            shared_context: HashMap::new(),
            metrics: SessionMetrics::default(),
        }
    }

    /// Marks the session as active now.
    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}
