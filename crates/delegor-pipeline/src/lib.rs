//! Ordered pre/post processor hooks wrapping every delegated operation.
//!
//! Processors run in registration order around worker execution, independent
//! of which worker(s) ran. A `before` failure is a typed error that stops the
//! delegation before any worker is called; an `after` failure degrades to a
//! warning and never changes the delegation's outcome.
//!
//! Each step emits a structured (component, action, status, details) tuple
//! through `tracing`, which is the engine's observability boundary.
//!
//! # Main types
//!
//! - [`Processor`] — A single pre/post hook.
//! - [`ProcessorChain`] — Dispatches a task through all registered hooks.
//! - [`InputValidator`], [`ComplianceCheck`], [`StateValidator`] — Built-ins.

use async_trait::async_trait;
use delegor_core::{DelegorError, DelegorResult, RiskTier, TaskDescriptor};
use std::sync::Arc;
use tracing::{info, warn};

/// Emits the structured observability tuple for one pipeline step.
fn emit(component: &str, action: &str, status: &str, details: &str) {
    if status == "ok" {
        info!(component, action, status, details, "pipeline step");
    } else {
        warn!(component, action, status, details, "pipeline step");
    }
}

/// A single pre/post hook around delegated execution.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Stable name used in observability output.
    fn name(&self) -> &str;

    /// Runs before worker execution. An error here aborts the delegation.
    async fn before(&self, task: &TaskDescriptor) -> DelegorResult<()>;

    /// Runs after worker execution with the delegation's success flag.
    /// Errors are logged and swallowed; they never change the outcome.
    async fn after(&self, task: &TaskDescriptor, success: bool) -> DelegorResult<()>;
}

/// Dispatches a task through all registered processors in order.
pub struct ProcessorChain {
    processors: Vec<Arc<dyn Processor>>,
}

impl ProcessorChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self {
            processors: Vec::new(),
        }
    }

    /// The chain every delegator starts with: input validation, compliance
    /// check, state validation.
    pub fn standard() -> Self {
        let mut chain = Self::new();
        chain.add(Arc::new(InputValidator));
        chain.add(Arc::new(ComplianceCheck));
        chain.add(Arc::new(StateValidator::default()));
        chain
    }

    /// Appends a processor to the chain.
    pub fn add(&mut self, processor: Arc<dyn Processor>) {
        self.processors.push(processor);
    }

    /// Number of registered processors.
    pub fn processor_count(&self) -> usize {
        self.processors.len()
    }

    /// Runs every `before` hook in order; the first failure aborts.
    pub async fn run_before(&self, task: &TaskDescriptor) -> DelegorResult<()> {
        for processor in &self.processors {
            match processor.before(task).await {
                Ok(()) => emit(processor.name(), "before", "ok", &task.kind.to_string()),
                Err(e) => {
                    emit(processor.name(), "before", "failed", &e.to_string());
                    return Err(DelegorError::Pipeline(format!(
                        "{} rejected task: {e}",
                        processor.name()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Runs every `after` hook in order; failures are warnings only.
    pub async fn run_after(&self, task: &TaskDescriptor, success: bool) {
        for processor in &self.processors {
            match processor.after(task, success).await {
                Ok(()) => emit(processor.name(), "after", "ok", &task.kind.to_string()),
                Err(e) => emit(processor.name(), "after", "failed", &e.to_string()),
            }
        }
    }
}

impl Default for ProcessorChain {
    fn default() -> Self {
        Self::new()
    }
}

/// Rejects malformed task descriptors at the mouth of the pipeline.
pub struct InputValidator;

#[async_trait]
impl Processor for InputValidator {
    fn name(&self) -> &str {
        "input_validator"
    }

    async fn before(&self, task: &TaskDescriptor) -> DelegorResult<()> {
        task.validate()
    }

    async fn after(&self, _task: &TaskDescriptor, _success: bool) -> DelegorResult<()> {
        Ok(())
    }
}

/// Gates critical-risk work on traceability: a critical-risk task must carry
/// a session id so its coordination history is recorded somewhere.
pub struct ComplianceCheck;

#[async_trait]
impl Processor for ComplianceCheck {
    fn name(&self) -> &str {
        "compliance_check"
    }

    async fn before(&self, task: &TaskDescriptor) -> DelegorResult<()> {
        if task.context.risk == RiskTier::Critical && task.context.session_id.is_none() {
            return Err(DelegorError::InvalidInput(
                "critical-risk tasks require a session id for traceability".to_string(),
            ));
        }
        Ok(())
    }

    async fn after(&self, task: &TaskDescriptor, success: bool) -> DelegorResult<()> {
        if task.context.risk == RiskTier::Critical && !success {
            warn!(kind = %task.kind, "critical-risk delegation failed");
        }
        Ok(())
    }
}

/// Sanity-bounds the numeric context fields so wildly corrupted input cannot
/// skew routing.
pub struct StateValidator {
    /// Upper bound on changed-line volume.
    pub max_lines_changed: u64,
    /// Upper bound on estimated duration in minutes.
    pub max_estimated_minutes: u64,
}

impl Default for StateValidator {
    fn default() -> Self {
        Self {
            max_lines_changed: 1_000_000,
            max_estimated_minutes: 14_400, // ten days
        }
    }
}

#[async_trait]
impl Processor for StateValidator {
    fn name(&self) -> &str {
        "state_validator"
    }

    async fn before(&self, task: &TaskDescriptor) -> DelegorResult<()> {
        if task.context.lines_changed > self.max_lines_changed {
            return Err(DelegorError::InvalidInput(format!(
                "changed-line volume {} exceeds limit {}",
                task.context.lines_changed, self.max_lines_changed
            )));
        }
        if task.context.estimated_minutes > self.max_estimated_minutes {
            return Err(DelegorError::InvalidInput(format!(
                "estimated duration {}m exceeds limit {}m",
                task.context.estimated_minutes, self.max_estimated_minutes
            )));
        }
        Ok(())
    }

    async fn after(&self, _task: &TaskDescriptor, _success: bool) -> DelegorResult<()> {
        Ok(())
    }
}
