use delegor_core::{DelegorError, DelegorResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// A worker's advertised capabilities and capacity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerCapability {
    /// Unique worker name.
    pub name: String,
    /// Broad expertise tags matched against task text.
    pub expertise: HashSet<String>,
    /// Narrow specialty tags; also mark a worker as authoritative for
    /// expert-priority reconciliation when they match the task.
    pub specialties: HashSet<String>,
    /// Maximum concurrent assignments the worker accepts.
    pub max_concurrent: u32,
    /// Rolling performance score in [0, 100], revised via capability updates.
    pub performance_score: f64,
}

impl WorkerCapability {
    /// Creates a capability from name, tags, capacity, and score.
    pub fn new(
        name: impl Into<String>,
        expertise: &[&str],
        specialties: &[&str],
        max_concurrent: u32,
        performance_score: f64,
    ) -> Self {
        Self {
            name: name.into(),
            expertise: expertise.iter().map(|t| (*t).to_string()).collect(),
            specialties: specialties.iter().map(|t| (*t).to_string()).collect(),
            max_concurrent,
            performance_score,
        }
    }

    /// Whether any of this worker's tags appears in the given lowercase text.
    pub fn matches_text(&self, text: &str) -> bool {
        self.expertise
            .iter()
            .chain(self.specialties.iter())
            .any(|tag| text.contains(&tag.to_lowercase()))
    }

    /// Whether any *specialty* tag appears in the given lowercase text.
    pub fn specialty_matches_text(&self, text: &str) -> bool {
        self.specialties
            .iter()
            .any(|tag| text.contains(&tag.to_lowercase()))
    }
}

/// A partial capability revision; only provided fields overwrite.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapabilityUpdate {
    /// Replacement expertise tags.
    #[serde(default)]
    pub expertise: Option<HashSet<String>>,
    /// Replacement specialty tags.
    #[serde(default)]
    pub specialties: Option<HashSet<String>>,
    /// Replacement concurrent-task capacity.
    #[serde(default)]
    pub max_concurrent: Option<u32>,
    /// Replacement performance score.
    #[serde(default)]
    pub performance_score: Option<f64>,
}

/// Catalog of available workers with live availability accounting.
///
/// Capabilities are mutable only through [`WorkerRegistry::update_capability`].
/// Active-task counts are not stored on the capability — they are tracked
/// live, per worker, behind one mutex so a capacity check and its increment
/// are a single atomic step and concurrent delegations cannot oversubscribe
/// a worker.
pub struct WorkerRegistry {
    capabilities: RwLock<HashMap<String, WorkerCapability>>,
    active: Arc<Mutex<HashMap<String, u32>>>,
}

impl WorkerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            capabilities: RwLock::new(HashMap::new()),
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Creates a registry pre-populated with a catalog.
    pub fn with_catalog(catalog: Vec<WorkerCapability>) -> Self {
        let capabilities = catalog
            .into_iter()
            .map(|c| (c.name.clone(), c))
            .collect::<HashMap<_, _>>();
        Self {
            capabilities: RwLock::new(capabilities),
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Registers (or replaces) a worker capability.
    pub async fn register(&self, capability: WorkerCapability) {
        self.capabilities
            .write()
            .await
            .insert(capability.name.clone(), capability);
    }

    /// Merges a partial update into an existing capability.
    pub async fn update_capability(
        &self,
        name: &str,
        update: CapabilityUpdate,
    ) -> DelegorResult<()> {
        let mut capabilities = self.capabilities.write().await;
        let capability = capabilities
            .get_mut(name)
            .ok_or_else(|| DelegorError::NotFound(format!("worker {name}")))?;

        if let Some(expertise) = update.expertise {
            capability.expertise = expertise;
        }
        if let Some(specialties) = update.specialties {
            capability.specialties = specialties;
        }
        if let Some(max_concurrent) = update.max_concurrent {
            capability.max_concurrent = max_concurrent;
        }
        if let Some(score) = update.performance_score {
            capability.performance_score = score.clamp(0.0, 100.0);
        }
        debug!(worker = %name, "capability updated");
        Ok(())
    }

    /// The capability registered under the given name.
    pub async fn get(&self, name: &str) -> Option<WorkerCapability> {
        self.capabilities.read().await.get(name).cloned()
    }

    /// All registered capabilities, unordered.
    pub async fn list(&self) -> Vec<WorkerCapability> {
        self.capabilities.read().await.values().cloned().collect()
    }

    /// Live active-assignment count for a worker.
    pub fn active_count(&self, name: &str) -> u32 {
        *self.active.lock().get(name).unwrap_or(&0)
    }

    /// Whether the worker can accept another assignment right now.
    pub fn is_available(&self, capability: &WorkerCapability) -> bool {
        self.active_count(&capability.name) < capability.max_concurrent
    }

    /// Atomically claims a slot on the worker if capacity allows.
    ///
    /// Returns `None` when the worker is at capacity. The returned lease
    /// releases the slot when dropped.
    pub fn try_lease(&self, capability: &WorkerCapability) -> Option<WorkerLease> {
        let mut active = self.active.lock();
        let count = active.entry(capability.name.clone()).or_insert(0);
        if *count >= capability.max_concurrent {
            return None;
        }
        *count += 1;
        Some(WorkerLease {
            worker: capability.name.clone(),
            active: Arc::clone(&self.active),
        })
    }

    /// Claims a slot regardless of capacity.
    ///
    /// Used only for the explicit no-capacity fallback, so the counter still
    /// reflects the oversubscription.
    pub fn lease_unchecked(&self, name: &str) -> WorkerLease {
        let mut active = self.active.lock();
        *active.entry(name.to_string()).or_insert(0) += 1;
        WorkerLease {
            worker: name.to_string(),
            active: Arc::clone(&self.active),
        }
    }
}

impl Default for WorkerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// A claimed slot on one worker; dropping it releases the slot.
pub struct WorkerLease {
    worker: String,
    active: Arc<Mutex<HashMap<String, u32>>>,
}

impl WorkerLease {
    /// Name of the leased worker.
    pub fn worker(&self) -> &str {
        &self.worker
    }
}

impl Drop for WorkerLease {
    fn drop(&mut self) {
        let mut active = self.active.lock();
        if let Some(count) = active.get_mut(&self.worker) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                active.remove(&self.worker);
            }
        }
    }
}

/// The default worker catalog: one specialist per development concern.
pub fn default_catalog() -> Vec<WorkerCapability> {
    vec![
        WorkerCapability::new(
            "architect",
            &["architecture", "design", "spec", "api"],
            &["analyze", "refactor"],
            2,
            88.0,
        ),
        WorkerCapability::new(
            "coder",
            &["implementation", "code", "feature"],
            &["create", "modify"],
            3,
            85.0,
        ),
        WorkerCapability::new(
            "tester",
            &["testing", "coverage", "regression"],
            &["test", "debug"],
            3,
            82.0,
        ),
        WorkerCapability::new(
            "reviewer",
            &["review", "quality", "style"],
            &["analyze"],
            2,
            87.0,
        ),
        WorkerCapability::new(
            "security",
            &["security", "vulnerability", "auth"],
            &["audit", "security"],
            1,
            93.0,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_and_get() {
        let registry = WorkerRegistry::new();
        registry
            .register(WorkerCapability::new("coder", &["code"], &["create"], 2, 80.0))
            .await;

        let cap = registry.get("coder").await.unwrap();
        assert_eq!(cap.max_concurrent, 2);
        assert!(registry.get("ghost").await.is_none());
    }

    #[tokio::test]
    async fn test_update_capability_merges_partial_fields() {
        let registry = WorkerRegistry::with_catalog(default_catalog());

        registry
            .update_capability(
                "coder",
                CapabilityUpdate {
                    performance_score: Some(91.0),
                    ..CapabilityUpdate::default()
                },
            )
            .await
            .unwrap();

        let cap = registry.get("coder").await.unwrap();
        assert_eq!(cap.performance_score, 91.0);
        // Untouched fields survive the merge.
        assert_eq!(cap.max_concurrent, 3);
        assert!(cap.expertise.contains("code"));
    }

    #[tokio::test]
    async fn test_update_capability_clamps_score() {
        let registry = WorkerRegistry::with_catalog(default_catalog());
        registry
            .update_capability(
                "tester",
                CapabilityUpdate {
                    performance_score: Some(250.0),
                    ..CapabilityUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(registry.get("tester").await.unwrap().performance_score, 100.0);
    }

    #[tokio::test]
    async fn test_update_missing_worker_not_found() {
        let registry = WorkerRegistry::new();
        let err = registry
            .update_capability("ghost", CapabilityUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DelegorError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_lease_enforces_capacity() {
        let registry = WorkerRegistry::new();
        let cap = WorkerCapability::new("solo", &["x"], &[], 1, 50.0);
        registry.register(cap.clone()).await;

        let lease = registry.try_lease(&cap).unwrap();
        assert_eq!(registry.active_count("solo"), 1);
        assert!(!registry.is_available(&cap));
        // Second claim while the first lease is held must fail.
        assert!(registry.try_lease(&cap).is_none());

        drop(lease);
        assert_eq!(registry.active_count("solo"), 0);
        assert!(registry.try_lease(&cap).is_some());
    }

    #[tokio::test]
    async fn test_unchecked_lease_oversubscribes_visibly() {
        let registry = WorkerRegistry::new();
        let cap = WorkerCapability::new("solo", &["x"], &[], 1, 50.0);
        registry.register(cap.clone()).await;

        let _l1 = registry.try_lease(&cap).unwrap();
        let _l2 = registry.lease_unchecked("solo");
        assert_eq!(registry.active_count("solo"), 2);
    }

    #[test]
    fn test_tag_matching_is_case_insensitive_substring() {
        let cap = WorkerCapability::new("security", &["Security", "auth"], &["audit"], 1, 90.0);
        assert!(cap.matches_text("run a security review of the login flow"));
        assert!(cap.specialty_matches_text("full audit of dependencies"));
        assert!(!cap.matches_text("refactor the parser"));
    }

    #[tokio::test]
    async fn test_concurrent_leases_never_oversubscribe() {
        let registry = Arc::new(WorkerRegistry::new());
        let cap = WorkerCapability::new("busy", &["x"], &[], 3, 50.0);
        registry.register(cap.clone()).await;

        let mut handles = Vec::new();
        for _ in 0..16 {
            let registry = Arc::clone(&registry);
            let cap = cap.clone();
            handles.push(tokio::spawn(async move { registry.try_lease(&cap) }));
        }

        // Keep granted leases alive until the final assertion.
        let mut leases = Vec::new();
        for handle in handles {
            if let Some(lease) = handle.await.unwrap() {
                leases.push(lease);
            }
        }
        assert_eq!(leases.len(), 3);
        assert_eq!(registry.active_count("busy"), 3);
    }
}
