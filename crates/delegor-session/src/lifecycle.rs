use crate::coordinator::{SessionAge, SessionCoordinator};
use chrono::Utc;
use delegor_core::DelegorResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Configuration for the background session reaper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Interval between sweeps, in milliseconds.
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
    /// Idle time after which a session is reaped, in milliseconds.
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
    /// Maximum number of live sessions before LRU eviction kicks in.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

fn default_sweep_interval_ms() -> u64 {
    60_000
}

fn default_idle_timeout_ms() -> u64 {
    900_000 // 15 minutes
}

fn default_max_sessions() -> usize {
    100
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            sweep_interval_ms: default_sweep_interval_ms(),
            idle_timeout_ms: default_idle_timeout_ms(),
            max_sessions: default_max_sessions(),
        }
    }
}

/// Why a session was selected for cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReapReason {
    /// Past its time-to-live, regardless of recent activity.
    Expired,
    /// No activity within the idle timeout.
    Idle,
    /// Evicted as least-recently-active over the session cap.
    Evicted,
}

/// Background reaper for session state.
///
/// On each sweep: sessions past their TTL are expired (TTL is checked against
/// creation time and takes precedence independently of activity), sessions
/// idle past the idle timeout are reaped, and if the live count still exceeds
/// the configured maximum, the least-recently-active sessions beyond the
/// limit are evicted. Manual and emergency cleanup route through the same
/// single-session path as the sweep, so teardown is always consistent.
pub struct SessionLifecycleManager {
    coordinator: Arc<SessionCoordinator>,
    config: LifecycleConfig,
    /// The reaper's own metadata view, refreshed each sweep and cleared
    /// entry-by-entry as sessions are cleaned.
    meta: RwLock<HashMap<String, SessionAge>>,
}

impl SessionLifecycleManager {
    /// Creates a manager over the given coordinator.
    pub fn new(coordinator: Arc<SessionCoordinator>, config: LifecycleConfig) -> Self {
        Self {
            coordinator,
            config,
            meta: RwLock::new(HashMap::new()),
        }
    }

    /// Runs one sweep and returns the number of sessions cleaned.
    pub async fn sweep(&self) -> usize {
        let snapshot = self.coordinator.age_snapshot().await;
        {
            let mut meta = self.meta.write().await;
            meta.clear();
            for age in &snapshot {
                meta.insert(age.id.clone(), age.clone());
            }
        }

        let now = Utc::now();
        let mut marked: Vec<(String, ReapReason)> = Vec::new();

        for age in &snapshot {
            let lived_ms = (now - age.created_at).num_milliseconds();
            let idle_ms = (now - age.last_activity).num_milliseconds();

            if lived_ms > age.ttl_ms as i64 {
                marked.push((age.id.clone(), ReapReason::Expired));
            } else if idle_ms > self.config.idle_timeout_ms as i64 {
                marked.push((age.id.clone(), ReapReason::Idle));
            }
        }

        // LRU eviction over whatever survives the age checks.
        let mut survivors: Vec<&SessionAge> = snapshot
            .iter()
            .filter(|age| !marked.iter().any(|(id, _)| id == &age.id))
            .collect();
        if survivors.len() > self.config.max_sessions {
            survivors.sort_by_key(|age| age.last_activity);
            let excess = survivors.len() - self.config.max_sessions;
            for age in survivors.into_iter().take(excess) {
                marked.push((age.id.clone(), ReapReason::Evicted));
            }
        }

        let mut cleaned = 0;
        for (id, reason) in marked {
            match self.cleanup_one(&id).await {
                Ok(()) => {
                    info!(session = %id, ?reason, "session reaped");
                    cleaned += 1;
                }
                Err(e) => warn!(session = %id, error = %e, "session cleanup failed"),
            }
        }
        cleaned
    }

    /// Manual cleanup of one session, routed through the same path the
    /// sweep uses.
    pub async fn cleanup_now(&self, id: &str) -> DelegorResult<()> {
        self.cleanup_one(id).await
    }

    /// Emergency teardown of every live session. Returns the cleaned count.
    pub async fn cleanup_all(&self) -> usize {
        let snapshot = self.coordinator.age_snapshot().await;
        let mut cleaned = 0;
        for age in snapshot {
            match self.cleanup_one(&age.id).await {
                Ok(()) => cleaned += 1,
                Err(e) => warn!(session = %age.id, error = %e, "emergency cleanup failed"),
            }
        }
        cleaned
    }

    /// The single teardown path: coordinator cleanup plus this manager's
    /// own metadata entry.
    async fn cleanup_one(&self, id: &str) -> DelegorResult<()> {
        self.coordinator.cleanup_session(id).await?;
        self.meta.write().await.remove(id);
        Ok(())
    }

    /// Number of sessions in the reaper's metadata view.
    pub async fn tracked_count(&self) -> usize {
        self.meta.read().await.len()
    }

    /// Starts the background sweep loop. Returns the handle so the caller
    /// can abort or await it.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_millis(
                self.config.sweep_interval_ms.max(1),
            ));
            // The first tick fires immediately; skip it so a fresh manager
            // does not sweep before any session has been created.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let cleaned = self.sweep().await;
                if cleaned > 0 {
                    info!(cleaned, "lifecycle sweep complete");
                }
            }
        })
    }
}
