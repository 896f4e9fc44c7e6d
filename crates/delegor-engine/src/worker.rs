use async_trait::async_trait;
use delegor_core::{DelegorResult, OperationKind, TaskPriority};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The unit of work handed to one worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerAssignment {
    /// The delegation this assignment belongs to.
    pub delegation_id: Uuid,
    /// Name of the assigned worker.
    pub worker: String,
    /// Operation kind of the originating task.
    pub kind: OperationKind,
    /// Description of the work; lead-coordinated delegations annotate this
    /// with the worker's perspective.
    pub description: String,
    /// Session the work belongs to, if any.
    pub session_id: Option<String>,
    /// Priority inherited from the task.
    pub priority: TaskPriority,
}

/// The result a worker returns for one assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerOutput {
    /// Name of the worker that produced the result.
    pub worker: String,
    /// The result value.
    pub value: serde_json::Value,
    /// Duration the worker reports for the call, in milliseconds.
    pub duration_ms: u64,
}

/// An opaque executable unit called by name.
///
/// Workers are external collaborators; the engine knows nothing about their
/// internals beyond this contract.
#[async_trait]
pub trait Worker: Send + Sync {
    /// The worker's registered name.
    fn name(&self) -> &str;

    /// Executes one assignment.
    async fn execute(&self, assignment: &WorkerAssignment) -> DelegorResult<WorkerOutput>;
}

/// Stand-in for a registered capability with no executable implementation.
///
/// Returns a clearly-marked simulated response instead of crashing the
/// delegation, so catalogs can list workers that are not wired up yet.
pub struct SimulatedWorker {
    name: String,
}

impl SimulatedWorker {
    /// Creates a simulated worker with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Worker for SimulatedWorker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, assignment: &WorkerAssignment) -> DelegorResult<WorkerOutput> {
        Ok(WorkerOutput {
            worker: self.name.clone(),
            value: serde_json::json!({
                "simulated": true,
                "worker": self.name,
                "summary": format!("simulated response for: {}", assignment.description),
            }),
            duration_ms: 0,
        })
    }
}
