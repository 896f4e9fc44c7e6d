use crate::{DelegorError, DelegorResult};
use serde::{Deserialize, Serialize};

/// The kind of development operation a task performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Create new code or assets from scratch.
    Create,
    /// Modify existing code in place.
    Modify,
    /// Restructure code without changing behavior.
    Refactor,
    /// Analyze code or data without changing it.
    Analyze,
    /// Diagnose and fix a defect.
    Debug,
    /// Write or extend tests.
    Test,
    /// An operation kind this engine does not recognize.
    /// Scored with a neutral multiplier rather than rejected.
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Create => write!(f, "create"),
            OperationKind::Modify => write!(f, "modify"),
            OperationKind::Refactor => write!(f, "refactor"),
            OperationKind::Analyze => write!(f, "analyze"),
            OperationKind::Debug => write!(f, "debug"),
            OperationKind::Test => write!(f, "test"),
            OperationKind::Unknown => write!(f, "unknown"),
        }
    }
}

impl std::str::FromStr for OperationKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "create" => OperationKind::Create,
            "modify" => OperationKind::Modify,
            "refactor" => OperationKind::Refactor,
            "analyze" => OperationKind::Analyze,
            "debug" => OperationKind::Debug,
            "test" => OperationKind::Test,
            _ => OperationKind::Unknown,
        })
    }
}

/// Risk tier of the change a task makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskTier::Low => write!(f, "low"),
            RiskTier::Medium => write!(f, "medium"),
            RiskTier::High => write!(f, "high"),
            RiskTier::Critical => write!(f, "critical"),
        }
    }
}

/// Priority attached to a task or coordination message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl Default for TaskPriority {
    fn default() -> Self {
        TaskPriority::Medium
    }
}

/// Structured attributes of a task, consumed by the complexity scorer.
///
/// Zero values are valid and contribute nothing to the score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskContext {
    /// Number of files the task touches.
    #[serde(default)]
    pub file_count: u32,
    /// Estimated changed-line volume.
    #[serde(default)]
    pub lines_changed: u64,
    /// Number of dependencies involved.
    #[serde(default)]
    pub dependency_count: u32,
    /// Risk tier of the change.
    pub risk: RiskTier,
    /// Estimated duration in minutes.
    #[serde(default)]
    pub estimated_minutes: u64,
    /// Session this task belongs to, if any.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Optional priority hint.
    #[serde(default)]
    pub priority: Option<TaskPriority>,
}

impl TaskContext {
    /// A minimal low-risk context; callers set fields from there.
    pub fn low_risk() -> Self {
        Self {
            file_count: 0,
            lines_changed: 0,
            dependency_count: 0,
            risk: RiskTier::Low,
            estimated_minutes: 0,
            session_id: None,
            priority: None,
        }
    }
}

/// An immutable description of work submitted for delegation.
///
/// Validated once at the submission boundary; never mutated after scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDescriptor {
    /// The kind of operation.
    pub kind: OperationKind,
    /// Free-text description of the work.
    pub description: String,
    /// Structured task attributes.
    pub context: TaskContext,
}

impl TaskDescriptor {
    /// Creates a new task descriptor.
    pub fn new(kind: OperationKind, description: impl Into<String>, context: TaskContext) -> Self {
        Self {
            kind,
            description: description.into(),
            context,
        }
    }

    /// Validates the descriptor at the submission boundary.
    ///
    /// Fails before any state is mutated: an empty description or a
    /// whitespace-only session id is rejected here, not deeper in the engine.
    pub fn validate(&self) -> DelegorResult<()> {
        if self.description.trim().is_empty() {
            return Err(DelegorError::InvalidInput(
                "task description must not be empty".to_string(),
            ));
        }
        if let Some(session_id) = &self.context.session_id {
            if session_id.trim().is_empty() {
                return Err(DelegorError::InvalidInput(
                    "session id must be a non-empty identifier".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_descriptor() {
        let task = TaskDescriptor::new(
            OperationKind::Create,
            "Add login endpoint",
            TaskContext::low_risk(),
        );
        assert!(task.validate().is_ok());
    }

    #[test]
    fn test_empty_description_rejected() {
        let task = TaskDescriptor::new(OperationKind::Modify, "   ", TaskContext::low_risk());
        let err = task.validate().unwrap_err();
        assert!(matches!(err, DelegorError::InvalidInput(_)));
    }

    #[test]
    fn test_blank_session_id_rejected() {
        let mut ctx = TaskContext::low_risk();
        ctx.session_id = Some("  ".to_string());
        let task = TaskDescriptor::new(OperationKind::Debug, "Fix crash", ctx);
        assert!(task.validate().is_err());
    }

    #[test]
    fn test_operation_kind_from_str() {
        assert_eq!("refactor".parse::<OperationKind>(), Ok(OperationKind::Refactor));
        assert_eq!("DEBUG".parse::<OperationKind>(), Ok(OperationKind::Debug));
        assert_eq!("deploy".parse::<OperationKind>(), Ok(OperationKind::Unknown));
    }

    #[test]
    fn test_unknown_operation_deserializes() {
        let kind: OperationKind = serde_json::from_str("\"provision\"").unwrap();
        assert_eq!(kind, OperationKind::Unknown);
    }

    #[test]
    fn test_context_serde_defaults() {
        let ctx: TaskContext = serde_json::from_str(r#"{"risk":"high"}"#).unwrap();
        assert_eq!(ctx.file_count, 0);
        assert_eq!(ctx.risk, RiskTier::High);
        assert!(ctx.session_id.is_none());
    }

    #[test]
    fn test_priority_ordering() {
        assert!(TaskPriority::Critical > TaskPriority::High);
        assert!(TaskPriority::Medium > TaskPriority::Low);
        assert_eq!(TaskPriority::default(), TaskPriority::Medium);
    }
}
