use crate::registry::{WorkerLease, WorkerRegistry};
use crate::worker::{SimulatedWorker, Worker, WorkerAssignment, WorkerOutput};
use chrono::Utc;
use delegor_core::{
    conflict, ConflictOutcome, ConflictPolicy, Contribution, DelegorError, DelegorResult,
    TaskDescriptor, TaskPriority,
};
use delegor_pipeline::ProcessorChain;
use delegor_scoring::{ComplexityLevel, ComplexityResult, DelegationStrategy};
use delegor_session::{DelegationRecord, InteractionRecord, SessionCoordinator};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{info, warn};
use uuid::Uuid;

/// Whether `delegate` waits for execution or returns a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Execute inline and return the final result.
    Awaited,
    /// Fire-and-monitor: spawn execution and return a pollable handle.
    Detached,
}

/// Configuration for the delegator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegatorConfig {
    /// Return variant for `delegate`; never silently mixed.
    #[serde(default = "default_execution_mode")]
    pub execution: ExecutionMode,
    /// Maximum duration of one worker call, in milliseconds.
    #[serde(default = "default_worker_timeout_ms")]
    pub worker_timeout_ms: u64,
}

fn default_execution_mode() -> ExecutionMode {
    ExecutionMode::Awaited
}

fn default_worker_timeout_ms() -> u64 {
    300_000 // 5 minutes
}

impl Default for DelegatorConfig {
    fn default() -> Self {
        Self {
            execution: default_execution_mode(),
            worker_timeout_ms: default_worker_timeout_ms(),
        }
    }
}

/// What `delegate` returns, fixed by [`DelegatorConfig::execution`].
#[derive(Debug)]
pub enum Delegation {
    /// Execution finished; the result is final.
    Completed(DelegationResult),
    /// Execution continues in the background.
    Detached(DelegationHandle),
}

/// The final result of one delegated task.
#[derive(Debug)]
pub struct DelegationResult {
    /// The routing decision that drove execution.
    pub record: DelegationRecord,
    /// What execution produced.
    pub outcome: DelegationOutcome,
}

/// Execution output per strategy.
#[derive(Debug)]
pub enum DelegationOutcome {
    /// Single-agent: the worker's result, unmodified.
    Single(WorkerOutput),
    /// Multi-agent: all usable results plus their reconciliation.
    ///
    /// An [`ConflictOutcome::Unresolved`] reconciliation is a successful
    /// delegation that requires escalation, not a crash.
    Reconciled {
        /// Every usable worker result, completion order.
        outputs: Vec<WorkerOutput>,
        /// The reconciliation outcome under the record's policy.
        resolution: ConflictOutcome,
    },
    /// Orchestrator-led: consolidated subtask results.
    Consolidated(ConsolidatedReport),
}

/// Consolidation of a lead-coordinated delegation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidatedReport {
    /// Number of subtasks that succeeded.
    pub successes: usize,
    /// Number of subtasks that failed.
    pub failures: usize,
    /// Sum of reported durations across successful subtasks, in milliseconds.
    pub total_duration_ms: u64,
    /// Successful subtask results only.
    pub outputs: Vec<WorkerOutput>,
}

/// Handle to a detached delegation.
#[derive(Debug)]
pub struct DelegationHandle {
    delegation_id: Uuid,
    handle: JoinHandle<DelegorResult<DelegationResult>>,
}

impl DelegationHandle {
    /// Id of the delegation running behind this handle.
    pub fn delegation_id(&self) -> Uuid {
        self.delegation_id
    }

    /// Whether background execution has finished.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Cancels background execution.
    pub fn abort(&self) {
        self.handle.abort();
    }

    /// Waits for background execution and returns its result.
    pub async fn join(self) -> DelegorResult<DelegationResult> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => {
                Err(DelegorError::Delegation("delegation aborted".to_string()))
            }
            Err(e) => Err(DelegorError::Delegation(format!(
                "delegation task failed: {e}"
            ))),
        }
    }
}

struct Selection {
    workers: Vec<String>,
    leases: Vec<WorkerLease>,
    authoritative: Vec<String>,
    notes: Vec<String>,
}

/// Routes tasks to workers based on their complexity score.
///
/// Selection reads the registry's live availability; execution dispatches
/// worker calls as independent concurrent units, records every call as an
/// interaction with the session coordinator, and reconciles disagreeing
/// outputs under the policy fixed on the delegation record.
#[derive(Clone)]
pub struct Delegator {
    registry: Arc<WorkerRegistry>,
    coordinator: Arc<SessionCoordinator>,
    pipeline: Arc<ProcessorChain>,
    executors: Arc<RwLock<HashMap<String, Arc<dyn Worker>>>>,
    config: DelegatorConfig,
}

impl Delegator {
    /// Creates a delegator with the standard processor chain.
    pub fn new(
        registry: Arc<WorkerRegistry>,
        coordinator: Arc<SessionCoordinator>,
        config: DelegatorConfig,
    ) -> Self {
        Self {
            registry,
            coordinator,
            pipeline: Arc::new(ProcessorChain::standard()),
            executors: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    /// Replaces the processor chain.
    pub fn with_pipeline(mut self, pipeline: Arc<ProcessorChain>) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Registers an executable implementation for a worker name.
    ///
    /// Capabilities without a registered executor degrade to a
    /// [`SimulatedWorker`] response.
    pub async fn register_executor(&self, worker: Arc<dyn Worker>) {
        self.executors
            .write()
            .await
            .insert(worker.name().to_string(), worker);
    }

    /// Scores, routes, and executes a task.
    ///
    /// Returns [`Delegation::Completed`] or [`Delegation::Detached`]
    /// depending on the configured execution mode.
    pub async fn delegate(&self, task: &TaskDescriptor) -> DelegorResult<Delegation> {
        task.validate()?;

        let complexity = delegor_scoring::score(task.kind, &task.context);
        info!(
            component = "delegator",
            action = "score",
            status = "ok",
            details = %format!("score {:.1}, level {}, strategy {}", complexity.score, complexity.level, complexity.strategy),
            "task scored"
        );

        let mut selection = self.select_workers(&complexity, task).await?;

        let policy = policy_for_level(complexity.level);
        let mut record = DelegationRecord {
            id: Uuid::new_v4(),
            strategy: complexity.strategy,
            workers: selection.workers.clone(),
            complexity,
            policy,
            estimated_minutes: task.context.estimated_minutes,
            created_at: Utc::now(),
        };
        record
            .complexity
            .reasoning
            .append(&mut selection.notes);

        if let Some(session_id) = &task.context.session_id {
            if !self.coordinator.session_exists(session_id).await {
                self.coordinator.initialize_session(session_id).await?;
            }
            self.coordinator
                .register_delegation(session_id, record.id, record.clone())
                .await?;
        }

        info!(
            component = "delegator",
            action = "assign",
            status = "ok",
            delegation = %record.id,
            details = %format!("workers [{}], policy {}", record.workers.join(", "), record.policy),
            "workers assigned"
        );

        match self.config.execution {
            ExecutionMode::Awaited => {
                let result = self
                    .run_delegation(task.clone(), record, selection)
                    .await?;
                Ok(Delegation::Completed(result))
            }
            ExecutionMode::Detached => {
                let this = self.clone();
                let task = task.clone();
                let delegation_id = record.id;
                let handle =
                    tokio::spawn(async move { this.run_delegation(task, record, selection).await });
                Ok(Delegation::Detached(DelegationHandle {
                    delegation_id,
                    handle,
                }))
            }
        }
    }

    async fn run_delegation(
        &self,
        task: TaskDescriptor,
        record: DelegationRecord,
        selection: Selection,
    ) -> DelegorResult<DelegationResult> {
        if let Err(e) = self.pipeline.run_before(&task).await {
            self.finish(&task, record.id, &serde_json::json!({ "aborted": e.to_string() }))
                .await;
            return Err(e);
        }

        let outcome = match record.strategy {
            DelegationStrategy::SingleAgent => self.execute_single(&task, &record).await,
            DelegationStrategy::MultiAgent => {
                self.execute_fan_out(&task, &record, &selection.authoritative)
                    .await
            }
            DelegationStrategy::OrchestratorLed => self.execute_orchestrated(&task, &record).await,
        };

        self.pipeline.run_after(&task, outcome.is_ok()).await;

        let summary = match &outcome {
            Ok(o) => outcome_summary(o),
            Err(e) => serde_json::json!({ "failed": e.to_string() }),
        };
        self.finish(&task, record.id, &summary).await;

        // Leases release here, after all worker calls are done.
        drop(selection.leases);

        outcome.map(|outcome| DelegationResult { record, outcome })
    }

    async fn finish(&self, task: &TaskDescriptor, delegation_id: Uuid, result: &serde_json::Value) {
        if let Some(session_id) = &task.context.session_id {
            if let Err(e) = self
                .coordinator
                .complete_delegation(session_id, delegation_id, result)
                .await
            {
                warn!(delegation = %delegation_id, error = %e, "failed to complete delegation");
            }
        }
    }

    async fn executor_for(&self, name: &str) -> Arc<dyn Worker> {
        match self.executors.read().await.get(name) {
            Some(executor) => Arc::clone(executor),
            None => Arc::new(SimulatedWorker::new(name)),
        }
    }

    /// Calls one worker under the configured timeout and records the call as
    /// an interaction. A timeout counts as that worker's failure and the
    /// elapsed call's eventual late result is dropped with the future.
    async fn call_worker(&self, assignment: WorkerAssignment) -> Result<WorkerOutput, String> {
        let executor = self.executor_for(&assignment.worker).await;
        let started = Instant::now();
        let outcome = tokio::time::timeout(
            Duration::from_millis(self.config.worker_timeout_ms),
            executor.execute(&assignment),
        )
        .await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let (result, interaction) = match outcome {
            Ok(Ok(output)) => (
                Ok(output),
                InteractionRecord::success(
                    assignment.worker.as_str(),
                    assignment.description.as_str(),
                    elapsed_ms,
                ),
            ),
            Ok(Err(e)) => (
                Err(e.to_string()),
                InteractionRecord::failure(
                    assignment.worker.as_str(),
                    assignment.description.as_str(),
                    elapsed_ms,
                    e.to_string(),
                ),
            ),
            Err(_) => {
                let reason = format!("timed out after {}ms", self.config.worker_timeout_ms);
                (
                    Err(reason.clone()),
                    InteractionRecord::failure(
                        assignment.worker.as_str(),
                        assignment.description.as_str(),
                        elapsed_ms,
                        reason,
                    ),
                )
            }
        };

        if let Some(session_id) = &assignment.session_id {
            if let Err(e) = self
                .coordinator
                .record_interaction(session_id, &assignment.worker, interaction)
                .await
            {
                warn!(worker = %assignment.worker, error = %e, "interaction not recorded");
            }
        }

        info!(
            component = "delegator",
            action = "worker_call",
            status = if result.is_ok() { "ok" } else { "failed" },
            details = %format!("{} in {}ms", assignment.worker, elapsed_ms),
            "worker call finished"
        );
        result
    }

    fn assignment(
        task: &TaskDescriptor,
        record: &DelegationRecord,
        worker: &str,
        description: String,
    ) -> WorkerAssignment {
        WorkerAssignment {
            delegation_id: record.id,
            worker: worker.to_string(),
            kind: task.kind,
            description,
            session_id: task.context.session_id.clone(),
            priority: task.context.priority.unwrap_or(TaskPriority::Medium),
        }
    }

    async fn execute_single(
        &self,
        task: &TaskDescriptor,
        record: &DelegationRecord,
    ) -> DelegorResult<DelegationOutcome> {
        let worker = record.workers.first().ok_or_else(|| {
            DelegorError::Delegation("no worker assigned to single-agent delegation".to_string())
        })?;

        let assignment = Self::assignment(task, record, worker, task.description.clone());
        match self.call_worker(assignment).await {
            Ok(output) => Ok(DelegationOutcome::Single(output)),
            Err(reason) => Err(DelegorError::Worker(format!("{worker}: {reason}"))),
        }
    }

    /// Dispatches all assignments concurrently and joins on completion.
    /// One worker's failure never aborts its siblings.
    async fn dispatch(
        &self,
        assignments: Vec<WorkerAssignment>,
    ) -> (Vec<WorkerOutput>, Vec<(String, String)>) {
        let mut set = JoinSet::new();
        for assignment in assignments {
            let this = self.clone();
            set.spawn(async move {
                let worker = assignment.worker.clone();
                (worker, this.call_worker(assignment).await)
            });
        }

        let mut outputs = Vec::new();
        let mut failures = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((_, Ok(output))) => outputs.push(output),
                Ok((worker, Err(reason))) => failures.push((worker, reason)),
                Err(e) => failures.push(("worker task".to_string(), e.to_string())),
            }
        }
        (outputs, failures)
    }

    async fn execute_fan_out(
        &self,
        task: &TaskDescriptor,
        record: &DelegationRecord,
        authoritative: &[String],
    ) -> DelegorResult<DelegationOutcome> {
        let assignments: Vec<WorkerAssignment> = record
            .workers
            .iter()
            .map(|w| Self::assignment(task, record, w, task.description.clone()))
            .collect();

        let (outputs, failures) = self.dispatch(assignments).await;

        if outputs.is_empty() {
            return Err(DelegorError::Worker(aggregate_failures(&failures)));
        }
        if !failures.is_empty() {
            warn!(
                delegation = %record.id,
                failed = failures.len(),
                usable = outputs.len(),
                "partial multi-agent failure"
            );
        }

        let resolution = self
            .reconcile(task, record, &outputs, authoritative)
            .await?;
        Ok(DelegationOutcome::Reconciled {
            outputs,
            resolution,
        })
    }

    /// Reconciles multi-agent outputs under the record's policy.
    ///
    /// With a session, outputs are shared into the session's context under
    /// the delegation's key and resolved through the coordinator, so the
    /// conflict and its contributors land in the session history. Without a
    /// session the same semantics run locally.
    async fn reconcile(
        &self,
        task: &TaskDescriptor,
        record: &DelegationRecord,
        outputs: &[WorkerOutput],
        authoritative: &[String],
    ) -> DelegorResult<ConflictOutcome> {
        if let Some(session_id) = &task.context.session_id {
            let key = format!("delegation:{}", record.id);
            for output in outputs {
                self.coordinator
                    .share_context(session_id, &key, output.value.clone(), &output.worker)
                    .await?;
            }
            self.coordinator
                .resolve_conflict(session_id, &key, record.policy, authoritative)
                .await
        } else {
            let contributions: Vec<Contribution> = outputs
                .iter()
                .map(|o| Contribution::new(o.worker.clone(), o.value.clone()))
                .collect();
            Ok(conflict::resolve(record.policy, &contributions, authoritative))
        }
    }

    async fn execute_orchestrated(
        &self,
        task: &TaskDescriptor,
        record: &DelegationRecord,
    ) -> DelegorResult<DelegationOutcome> {
        let assignments: Vec<WorkerAssignment> = record
            .workers
            .iter()
            .map(|w| {
                let subtask = format!("[{w}'s perspective] {}", task.description);
                Self::assignment(task, record, w, subtask)
            })
            .collect();

        let (outputs, failures) = self.dispatch(assignments).await;

        if outputs.is_empty() {
            return Err(DelegorError::Worker(aggregate_failures(&failures)));
        }

        let total_duration_ms = outputs.iter().map(|o| o.duration_ms).sum();
        Ok(DelegationOutcome::Consolidated(ConsolidatedReport {
            successes: outputs.len(),
            failures: failures.len(),
            total_duration_ms,
            outputs,
        }))
    }

    async fn select_workers(
        &self,
        complexity: &ComplexityResult,
        task: &TaskDescriptor,
    ) -> DelegorResult<Selection> {
        let text = format!("{} {}", task.kind, task.description).to_lowercase();

        let mut catalog = self.registry.list().await;
        if catalog.is_empty() {
            return Err(DelegorError::Delegation("no workers registered".to_string()));
        }
        catalog.sort_by(|a, b| {
            b.performance_score
                .partial_cmp(&a.performance_score)
                .unwrap_or(Ordering::Equal)
        });

        let authoritative: Vec<String> = catalog
            .iter()
            .filter(|c| c.specialty_matches_text(&text))
            .map(|c| c.name.clone())
            .collect();

        let target = match complexity.strategy {
            DelegationStrategy::SingleAgent => 1,
            _ => complexity.estimated_workers.max(1) as usize,
        };

        let mut notes = Vec::new();
        let mut picked: Vec<(String, WorkerLease)> = Vec::new();

        match complexity.strategy {
            DelegationStrategy::SingleAgent | DelegationStrategy::MultiAgent => {
                // Tag-matching candidates first, ranked order.
                for cap in catalog.iter().filter(|c| c.matches_text(&text)) {
                    if picked.len() >= target {
                        break;
                    }
                    if let Some(lease) = self.registry.try_lease(cap) {
                        picked.push((cap.name.clone(), lease));
                    }
                }
                let had_matches = catalog.iter().any(|c| c.matches_text(&text));
                if picked.is_empty() && had_matches {
                    notes.push(
                        "tag-matching workers at capacity, falling back to ranked candidates"
                            .to_string(),
                    );
                }
                // Fill remaining slots from the ranked list, no duplicates.
                for cap in &catalog {
                    if picked.len() >= target {
                        break;
                    }
                    if picked.iter().any(|(name, _)| name == &cap.name) {
                        continue;
                    }
                    if let Some(lease) = self.registry.try_lease(cap) {
                        picked.push((cap.name.clone(), lease));
                    }
                }
            }
            DelegationStrategy::OrchestratorLed => {
                for cap in &catalog {
                    if picked.len() >= target {
                        break;
                    }
                    if let Some(lease) = self.registry.try_lease(cap) {
                        picked.push((cap.name.clone(), lease));
                    }
                }
            }
        }

        if picked.is_empty() {
            // Everyone is at capacity: oversubscribe the top-ranked worker
            // rather than fail the whole delegation, and say so.
            let top = &catalog[0];
            notes.push(format!("no capacity available, oversubscribing {}", top.name));
            picked.push((top.name.clone(), self.registry.lease_unchecked(&top.name)));
        } else if picked.len() < target {
            notes.push(format!(
                "only {} of {} requested workers available",
                picked.len(),
                target
            ));
        }

        let (workers, leases): (Vec<String>, Vec<WorkerLease>) = picked.into_iter().unzip();
        Ok(Selection {
            workers,
            leases,
            authoritative,
            notes,
        })
    }
}

fn policy_for_level(level: ComplexityLevel) -> ConflictPolicy {
    match level {
        ComplexityLevel::Simple | ComplexityLevel::Moderate => ConflictPolicy::Consensus,
        ComplexityLevel::Complex => ConflictPolicy::MajorityVote,
        ComplexityLevel::Enterprise => ConflictPolicy::ExpertPriority,
    }
}

fn aggregate_failures(failures: &[(String, String)]) -> String {
    let detail: Vec<String> = failures
        .iter()
        .map(|(worker, reason)| format!("{worker}: {reason}"))
        .collect();
    format!("all workers failed: {}", detail.join("; "))
}

fn outcome_summary(outcome: &DelegationOutcome) -> serde_json::Value {
    match outcome {
        DelegationOutcome::Single(output) => output.value.clone(),
        DelegationOutcome::Reconciled { resolution, .. } => match resolution {
            ConflictOutcome::Resolved { value, .. } => value.clone(),
            ConflictOutcome::Unresolved => serde_json::json!({ "unresolved": true }),
        },
        DelegationOutcome::Consolidated(report) => serde_json::json!({
            "successes": report.successes,
            "failures": report.failures,
            "total_duration_ms": report.total_duration_ms,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_mapping() {
        assert_eq!(policy_for_level(ComplexityLevel::Simple), ConflictPolicy::Consensus);
        assert_eq!(policy_for_level(ComplexityLevel::Moderate), ConflictPolicy::Consensus);
        assert_eq!(
            policy_for_level(ComplexityLevel::Complex),
            ConflictPolicy::MajorityVote
        );
        assert_eq!(
            policy_for_level(ComplexityLevel::Enterprise),
            ConflictPolicy::ExpertPriority
        );
    }

    #[test]
    fn test_aggregate_failure_lists_every_worker() {
        let failures = vec![
            ("coder".to_string(), "timeout".to_string()),
            ("tester".to_string(), "panic".to_string()),
        ];
        let message = aggregate_failures(&failures);
        assert!(message.contains("coder: timeout"));
        assert!(message.contains("tester: panic"));
    }

    #[test]
    fn test_outcome_summary_shapes() {
        let single = DelegationOutcome::Single(WorkerOutput {
            worker: "coder".to_string(),
            value: serde_json::json!("patch"),
            duration_ms: 10,
        });
        assert_eq!(outcome_summary(&single), serde_json::json!("patch"));

        let unresolved = DelegationOutcome::Reconciled {
            outputs: Vec::new(),
            resolution: ConflictOutcome::Unresolved,
        };
        assert_eq!(
            outcome_summary(&unresolved),
            serde_json::json!({ "unresolved": true })
        );
    }
}
