use crate::session::{
    ConflictRecord, ContextEntry, DelegationRecord, InteractionRecord, Session, SessionMetrics,
};
use crate::store::{session_key, StateStore};
use chrono::{DateTime, Utc};
use delegor_core::{
    conflict, ConflictOutcome, ConflictPolicy, Contribution, DelegorError, DelegorResult,
    MessagePriority, WorkerMessage,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Configuration for the session coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Time-to-live applied to new sessions, in milliseconds.
    #[serde(default = "default_ttl_ms")]
    pub default_ttl_ms: u64,
    /// Worker names every new session starts with in its active set.
    #[serde(default = "default_active_workers")]
    pub default_active_workers: Vec<String>,
}

fn default_ttl_ms() -> u64 {
    3_600_000 // 1 hour
}

fn default_active_workers() -> Vec<String> {
    vec!["coordinator".to_string()]
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            default_ttl_ms: default_ttl_ms(),
            default_active_workers: default_active_workers(),
        }
    }
}

/// Creation/activity metadata for one session, as seen by the reaper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionAge {
    /// Session identifier.
    pub id: String,
    /// UTC creation time.
    pub created_at: DateTime<Utc>,
    /// UTC time of the last mutation.
    pub last_activity: DateTime<Utc>,
    /// Time-to-live in milliseconds.
    pub ttl_ms: u64,
}

/// Exclusive owner of all session state.
///
/// Every component (delegator, workers, lifecycle manager) mutates sessions
/// only through these operations; no direct references into session internals
/// are handed out. An injected [`StateStore`] mirrors session snapshots under
/// `session:{id}:{subkey}` keys; persistence failures degrade to warnings
/// rather than failing the coordination path.
pub struct SessionCoordinator {
    sessions: RwLock<HashMap<String, Session>>,
    store: Option<Arc<dyn StateStore>>,
    config: CoordinatorConfig,
}

impl SessionCoordinator {
    /// Creates a coordinator with no persistence.
    pub fn new(config: CoordinatorConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            store: None,
            config,
        }
    }

    /// Creates a coordinator that mirrors state through the given store.
    pub fn with_store(config: CoordinatorConfig, store: Arc<dyn StateStore>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            store: Some(store),
            config,
        }
    }

    fn validate_id(id: &str) -> DelegorResult<()> {
        if id.trim().is_empty() {
            return Err(DelegorError::InvalidInput(
                "session id must be a non-empty identifier".to_string(),
            ));
        }
        Ok(())
    }

    /// Creates a session with the configured default active-worker set.
    ///
    /// Calling this for an existing id overwrites the session by design;
    /// callers that need idempotence must check [`Self::session_exists`]
    /// first.
    pub async fn initialize_session(&self, id: &str) -> DelegorResult<()> {
        Self::validate_id(id)?;
        let session = Session::new(id, self.config.default_ttl_ms, &self.config.default_active_workers);
        self.persist_meta(&session).await;
        self.sessions.write().await.insert(id.to_string(), session);
        info!(session = %id, "session initialized");
        Ok(())
    }

    /// Whether a session exists for the given id.
    pub async fn session_exists(&self, id: &str) -> bool {
        self.sessions.read().await.contains_key(id)
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Inserts a delegation into the session's active map and unions its
    /// workers into the active-worker set.
    pub async fn register_delegation(
        &self,
        id: &str,
        delegation_id: Uuid,
        record: DelegationRecord,
    ) -> DelegorResult<()> {
        Self::validate_id(id)?;
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| DelegorError::NotFound(format!("session {id}")))?;

        for worker in &record.workers {
            session.active_workers.insert(worker.clone());
        }
        session.active_delegations.insert(delegation_id, record);
        session.touch();
        debug!(session = %id, delegation = %delegation_id, "delegation registered");
        Ok(())
    }

    /// Appends an interaction to the worker's log and updates aggregate
    /// metrics.
    ///
    /// Silently no-ops when the session is missing: interaction logging must
    /// never block execution.
    pub async fn record_interaction(
        &self,
        id: &str,
        worker: &str,
        mut interaction: InteractionRecord,
    ) -> DelegorResult<()> {
        Self::validate_id(id)?;
        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.get_mut(id) else {
            debug!(session = %id, worker, "interaction dropped, session missing");
            return Ok(());
        };

        interaction.recorded_at = Utc::now();
        session.metrics.total_interactions += 1;
        if interaction.success {
            session.metrics.successful_interactions += 1;
        } else {
            session.metrics.failed_interactions += 1;
        }
        session.metrics.total_response_ms += interaction.duration_ms;
        session
            .interactions
            .entry(worker.to_string())
            .or_default()
            .push(interaction);
        session.touch();

        let snapshot = session.metrics.clone();
        drop(sessions);
        self.persist_metrics(id, &snapshot).await;
        Ok(())
    }

    /// Queues a message for delivery within the session.
    pub async fn send_message(
        &self,
        id: &str,
        from: &str,
        to: &str,
        payload: serde_json::Value,
        priority: MessagePriority,
    ) -> DelegorResult<Uuid> {
        Self::validate_id(id)?;
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| DelegorError::NotFound(format!("session {id}")))?;

        let message = WorkerMessage::new(from, to, payload, priority);
        let message_id = message.id;
        session.pending_messages.push(message);
        session.touch();
        debug!(session = %id, from, to, "message queued");
        Ok(message_id)
    }

    /// Returns and removes all queued messages addressed to the worker.
    ///
    /// Delivery is at-most-once per call: once removed, a message is not
    /// redelivered even if the caller crashes before processing it. That is a
    /// documented limitation of the queue, not a bug to paper over. A missing
    /// session yields an empty list.
    pub async fn receive_messages(&self, id: &str, worker: &str) -> DelegorResult<Vec<WorkerMessage>> {
        Self::validate_id(id)?;
        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.get_mut(id) else {
            return Ok(Vec::new());
        };

        let (delivered, remaining): (Vec<_>, Vec<_>) = session
            .pending_messages
            .drain(..)
            .partition(|m| m.addressed_to(worker));
        session.pending_messages = remaining;
        if !delivered.is_empty() {
            session.touch();
        }
        Ok(delivered)
    }

    /// Appends a timestamped, attributed entry to the key's history.
    ///
    /// Histories are append-only; earlier entries are never overwritten.
    pub async fn share_context(
        &self,
        id: &str,
        key: &str,
        value: serde_json::Value,
        from: &str,
    ) -> DelegorResult<()> {
        Self::validate_id(id)?;
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| DelegorError::NotFound(format!("session {id}")))?;

        session
            .shared_context
            .entry(key.to_string())
            .or_default()
            .push(ContextEntry {
                value,
                worker: from.to_string(),
                recorded_at: Utc::now(),
            });
        session.touch();

        let history = session.shared_context.get(key).cloned().unwrap_or_default();
        drop(sessions);
        self.persist_context(id, key, &history).await;
        Ok(())
    }

    /// The most recent entry for the key, or `None` if the session or key is
    /// missing. Read path: never errors on absence.
    pub async fn get_shared_context(&self, id: &str, key: &str) -> Option<ContextEntry> {
        let sessions = self.sessions.read().await;
        sessions
            .get(id)
            .and_then(|s| s.shared_context.get(key))
            .and_then(|history| history.last().cloned())
    }

    /// The full history for the key, oldest first. Empty on absence.
    pub async fn context_history(&self, id: &str, key: &str) -> Vec<ContextEntry> {
        let sessions = self.sessions.read().await;
        sessions
            .get(id)
            .and_then(|s| s.shared_context.get(key))
            .cloned()
            .unwrap_or_default()
    }

    /// Applies a conflict policy over the history stored under `key` and
    /// records the outcome.
    ///
    /// Appends exactly one [`ConflictRecord`] per call. An unresolved outcome
    /// is recorded with no resolution value; callers must treat it as
    /// requiring escalation.
    pub async fn resolve_conflict(
        &self,
        id: &str,
        key: &str,
        policy: ConflictPolicy,
        authoritative: &[String],
    ) -> DelegorResult<ConflictOutcome> {
        Self::validate_id(id)?;
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| DelegorError::NotFound(format!("session {id}")))?;

        let history = session.shared_context.get(key).cloned().unwrap_or_default();
        let contributions: Vec<Contribution> = history
            .iter()
            .map(|entry| Contribution::new(entry.worker.clone(), entry.value.clone()))
            .collect();

        let outcome = conflict::resolve(policy, &contributions, authoritative);

        let workers: Vec<String> = history.iter().map(|e| e.worker.clone()).collect();
        let (resolution, resolved) = match &outcome {
            ConflictOutcome::Resolved { value, .. } => (Some(value.clone()), true),
            ConflictOutcome::Unresolved => (None, false),
        };

        session.conflict_history.push(ConflictRecord {
            id: Uuid::new_v4(),
            key: key.to_string(),
            policy,
            workers,
            resolution,
            resolved,
            recorded_at: Utc::now(),
        });
        session.metrics.total_conflicts += 1;
        if resolved {
            session.metrics.resolved_conflicts += 1;
        } else {
            warn!(session = %id, key, %policy, "conflict left unresolved, escalation required");
        }
        session.touch();

        let snapshot = session.metrics.clone();
        drop(sessions);
        self.persist_metrics(id, &snapshot).await;
        Ok(outcome)
    }

    /// Removes the delegation from the active map. No-op if already removed.
    pub async fn complete_delegation(
        &self,
        id: &str,
        delegation_id: Uuid,
        result: &serde_json::Value,
    ) -> DelegorResult<()> {
        Self::validate_id(id)?;
        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.get_mut(id) else {
            return Ok(());
        };

        if session.active_delegations.remove(&delegation_id).is_some() {
            debug!(
                session = %id,
                delegation = %delegation_id,
                result_kind = result_kind(result),
                "delegation completed"
            );
        }
        session.touch();
        Ok(())
    }

    /// Clears all session substructures and removes the session entirely,
    /// including its persisted keys. Idempotent.
    pub async fn cleanup_session(&self, id: &str) -> DelegorResult<()> {
        Self::validate_id(id)?;
        let removed = self.sessions.write().await.remove(id);
        if let Some(session) = removed {
            for subkey in ["meta", "metrics"] {
                self.clear_persisted(id, subkey).await;
            }
            for key in session.shared_context.keys() {
                self.clear_persisted(id, &format!("context:{key}")).await;
            }
            info!(session = %id, "session cleaned up");
        }
        Ok(())
    }

    /// Metrics snapshot for the session, if it exists.
    pub async fn session_metrics(&self, id: &str) -> Option<SessionMetrics> {
        self.sessions.read().await.get(id).map(|s| s.metrics.clone())
    }

    /// Ids of delegations currently active in the session.
    pub async fn active_delegation_ids(&self, id: &str) -> Vec<Uuid> {
        self.sessions
            .read()
            .await
            .get(id)
            .map(|s| s.active_delegations.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Workers currently active in the session.
    pub async fn active_workers(&self, id: &str) -> Vec<String> {
        self.sessions
            .read()
            .await
            .get(id)
            .map(|s| s.active_workers.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Interaction log for one worker in the session, oldest first.
    pub async fn worker_interactions(&self, id: &str, worker: &str) -> Vec<InteractionRecord> {
        self.sessions
            .read()
            .await
            .get(id)
            .and_then(|s| s.interactions.get(worker))
            .cloned()
            .unwrap_or_default()
    }

    /// Conflict history for the session, oldest first.
    pub async fn conflict_history(&self, id: &str) -> Vec<ConflictRecord> {
        self.sessions
            .read()
            .await
            .get(id)
            .map(|s| s.conflict_history.clone())
            .unwrap_or_default()
    }

    /// Creation/activity metadata for every live session.
    pub async fn age_snapshot(&self) -> Vec<SessionAge> {
        self.sessions
            .read()
            .await
            .values()
            .map(|s| SessionAge {
                id: s.id.clone(),
                created_at: s.created_at,
                last_activity: s.last_activity,
                ttl_ms: s.ttl_ms,
            })
            .collect()
    }

    async fn persist_meta(&self, session: &Session) {
        let Some(store) = &self.store else { return };
        let meta = serde_json::json!({
            "created_at": session.created_at,
            "last_activity": session.last_activity,
            "ttl_ms": session.ttl_ms,
        });
        if let Err(e) = store.set(&session_key(&session.id, "meta"), meta).await {
            warn!(session = %session.id, error = %e, "failed to persist session meta");
        }
    }

    async fn persist_metrics(&self, id: &str, metrics: &SessionMetrics) {
        let Some(store) = &self.store else { return };
        match serde_json::to_value(metrics) {
            Ok(value) => {
                if let Err(e) = store.set(&session_key(id, "metrics"), value).await {
                    warn!(session = %id, error = %e, "failed to persist session metrics");
                }
            }
            Err(e) => warn!(session = %id, error = %e, "failed to serialize session metrics"),
        }
    }

    async fn persist_context(&self, id: &str, key: &str, history: &[ContextEntry]) {
        let Some(store) = &self.store else { return };
        match serde_json::to_value(history) {
            Ok(value) => {
                let subkey = format!("context:{key}");
                if let Err(e) = store.set(&session_key(id, &subkey), value).await {
                    warn!(session = %id, key, error = %e, "failed to persist shared context");
                }
            }
            Err(e) => warn!(session = %id, key, error = %e, "failed to serialize shared context"),
        }
    }

    async fn clear_persisted(&self, id: &str, subkey: &str) {
        let Some(store) = &self.store else { return };
        if let Err(e) = store.clear(&session_key(id, subkey)).await {
            warn!(session = %id, subkey, error = %e, "failed to clear persisted session state");
        }
    }
}

fn result_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
