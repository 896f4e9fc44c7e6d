//! Deterministic complexity scoring for task delegation.
//!
//! Maps task attributes to a numeric score, a discrete complexity level, a
//! recommended delegation strategy, and an estimated worker count. The scorer
//! is a pure function: same inputs, same result, no side effects.
//!
//! # Main types
//!
//! - [`score`] — The scoring function.
//! - [`ComplexityResult`] — Score, level, strategy, worker count, reasoning.
//! - [`ComplexityLevel`] — Discrete bucket derived from the numeric score.
//! - [`DelegationStrategy`] — How many workers the task should be routed to.

use delegor_core::{OperationKind, RiskTier, TaskContext};
use serde::{Deserialize, Serialize};

/// Points contributed per file touched.
const POINTS_PER_FILE: f64 = 2.0;
/// Cap on the file-count contribution.
const FILE_POINTS_CAP: f64 = 20.0;
/// Divisor applied to changed-line volume.
const LINES_DIVISOR: f64 = 10.0;
/// Cap on the changed-line contribution.
const LINE_POINTS_CAP: f64 = 25.0;
/// Points contributed per dependency.
const POINTS_PER_DEPENDENCY: f64 = 3.0;
/// Cap on the dependency contribution.
const DEPENDENCY_POINTS_CAP: f64 = 15.0;
/// Divisor applied to estimated duration in minutes.
const DURATION_DIVISOR: f64 = 10.0;
/// Cap on the duration contribution.
const DURATION_POINTS_CAP: f64 = 15.0;

/// Score at or below which a task is simple.
const SIMPLE_CEILING: f64 = 25.0;
/// Score at or below which a mid-band task is moderate rather than complex.
const MODERATE_CEILING: f64 = 50.0;
/// Score at or above which a task is enterprise-grade.
const ENTERPRISE_FLOOR: f64 = 96.0;

/// File count above which a mid-band task is promoted to multi-agent.
pub const MULTI_AGENT_FILE_THRESHOLD: u32 = 10;
/// Dependency count above which a mid-band task is promoted to multi-agent.
pub const MULTI_AGENT_DEPENDENCY_THRESHOLD: u32 = 5;

/// Discrete complexity bucket derived from the numeric score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityLevel {
    Simple,
    Moderate,
    Complex,
    Enterprise,
}

impl std::fmt::Display for ComplexityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComplexityLevel::Simple => write!(f, "simple"),
            ComplexityLevel::Moderate => write!(f, "moderate"),
            ComplexityLevel::Complex => write!(f, "complex"),
            ComplexityLevel::Enterprise => write!(f, "enterprise"),
        }
    }
}

/// Recommended routing strategy for a scored task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelegationStrategy {
    /// One worker handles the whole task.
    SingleAgent,
    /// Several workers handle the task independently; outputs are reconciled.
    MultiAgent,
    /// A lead decomposes the task into per-worker subtasks and consolidates.
    OrchestratorLed,
}

impl std::fmt::Display for DelegationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DelegationStrategy::SingleAgent => write!(f, "single_agent"),
            DelegationStrategy::MultiAgent => write!(f, "multi_agent"),
            DelegationStrategy::OrchestratorLed => write!(f, "orchestrator_led"),
        }
    }
}

/// The outcome of scoring a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplexityResult {
    /// Numeric score, clamped to [0, 100].
    pub score: f64,
    /// Discrete complexity bucket.
    pub level: ComplexityLevel,
    /// Recommended routing strategy.
    pub strategy: DelegationStrategy,
    /// Suggested number of workers for the task.
    pub estimated_workers: u32,
    /// Human-readable notes citing which factors dominated.
    pub reasoning: Vec<String>,
}

fn operation_multiplier(kind: OperationKind) -> Option<f64> {
    match kind {
        OperationKind::Create => Some(1.0),
        OperationKind::Modify => Some(1.2),
        OperationKind::Refactor => Some(1.8),
        OperationKind::Analyze => Some(1.5),
        OperationKind::Debug => Some(2.0),
        OperationKind::Test => Some(1.3),
        OperationKind::Unknown => None,
    }
}

fn risk_multiplier(risk: RiskTier) -> f64 {
    match risk {
        RiskTier::Low => 0.8,
        RiskTier::Medium => 1.0,
        RiskTier::High => 1.3,
        RiskTier::Critical => 1.6,
    }
}

/// Scores a task's complexity from its operation kind and context.
///
/// Pure and deterministic: accumulates capped point contributions from file
/// count, changed-line volume, dependency count, and estimated duration,
/// multiplies by operation and risk multipliers, and clamps to [0, 100].
/// Zero-valued inputs contribute nothing; they are never an error.
pub fn score(kind: OperationKind, ctx: &TaskContext) -> ComplexityResult {
    let mut reasoning = Vec::new();

    let file_points = (f64::from(ctx.file_count) * POINTS_PER_FILE).min(FILE_POINTS_CAP);
    let line_points = (ctx.lines_changed as f64 / LINES_DIVISOR).min(LINE_POINTS_CAP);
    let dependency_points =
        (f64::from(ctx.dependency_count) * POINTS_PER_DEPENDENCY).min(DEPENDENCY_POINTS_CAP);
    let duration_points = (ctx.estimated_minutes as f64 / DURATION_DIVISOR).min(DURATION_POINTS_CAP);

    if file_points >= FILE_POINTS_CAP {
        reasoning.push("high file count".to_string());
    }
    if line_points >= LINE_POINTS_CAP {
        reasoning.push("high changed-line volume".to_string());
    }
    if dependency_points >= DEPENDENCY_POINTS_CAP {
        reasoning.push("high dependency count".to_string());
    }
    if duration_points >= DURATION_POINTS_CAP {
        reasoning.push("long estimated duration".to_string());
    }

    let raw = file_points + line_points + dependency_points + duration_points;

    let op_multiplier = match operation_multiplier(kind) {
        Some(m) => {
            if m > 1.0 {
                reasoning.push(format!("{kind} operation multiplier {m}"));
            }
            m
        }
        None => {
            reasoning.push("unknown operation kind, defaulting multiplier to 1.0".to_string());
            1.0
        }
    };

    let risk = risk_multiplier(ctx.risk);
    if risk > 1.0 {
        reasoning.push(format!("{} risk multiplier {risk}", ctx.risk));
    }

    let final_score = (raw * op_multiplier * risk).clamp(0.0, 100.0);

    let (level, strategy, estimated_workers) = classify(final_score, ctx, &mut reasoning);

    ComplexityResult {
        score: final_score,
        level,
        strategy,
        estimated_workers,
        reasoning,
    }
}

fn classify(
    score: f64,
    ctx: &TaskContext,
    reasoning: &mut Vec<String>,
) -> (ComplexityLevel, DelegationStrategy, u32) {
    if score <= SIMPLE_CEILING {
        return (ComplexityLevel::Simple, DelegationStrategy::SingleAgent, 1);
    }

    if score >= ENTERPRISE_FLOOR {
        let workers = ((score / 30.0).ceil() as u32).max(3);
        reasoning.push("enterprise-grade score, lead-coordinated execution".to_string());
        return (
            ComplexityLevel::Enterprise,
            DelegationStrategy::OrchestratorLed,
            workers,
        );
    }

    let level = if score <= MODERATE_CEILING {
        ComplexityLevel::Moderate
    } else {
        ComplexityLevel::Complex
    };

    let strategy = if ctx.dependency_count > MULTI_AGENT_DEPENDENCY_THRESHOLD
        || ctx.file_count > MULTI_AGENT_FILE_THRESHOLD
    {
        reasoning.push("breadth of files or dependencies warrants multiple workers".to_string());
        DelegationStrategy::MultiAgent
    } else {
        DelegationStrategy::SingleAgent
    };

    let workers = ((score / 40.0).ceil() as u32).clamp(1, 4);
    (level, strategy, workers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(files: u32, lines: u64, deps: u32, risk: RiskTier, minutes: u64) -> TaskContext {
        TaskContext {
            file_count: files,
            lines_changed: lines,
            dependency_count: deps,
            risk,
            estimated_minutes: minutes,
            session_id: None,
            priority: None,
        }
    }

    #[test]
    fn test_zero_inputs_score_zero() {
        let result = score(OperationKind::Create, &ctx(0, 0, 0, RiskTier::Low, 0));
        assert_eq!(result.score, 0.0);
        assert_eq!(result.level, ComplexityLevel::Simple);
        assert_eq!(result.strategy, DelegationStrategy::SingleAgent);
        assert_eq!(result.estimated_workers, 1);
    }

    #[test]
    fn test_maximal_debug_task_clamps_to_100() {
        let result = score(
            OperationKind::Debug,
            &ctx(50, 5000, 25, RiskTier::Critical, 480),
        );
        assert_eq!(result.score, 100.0);
        assert_eq!(result.level, ComplexityLevel::Enterprise);
        assert_eq!(result.strategy, DelegationStrategy::OrchestratorLed);
        assert!(result.estimated_workers >= 3);
    }

    #[test]
    fn test_score_always_in_range() {
        let contexts = [
            ctx(0, 0, 0, RiskTier::Low, 0),
            ctx(1, 10, 1, RiskTier::Medium, 5),
            ctx(100, 100_000, 100, RiskTier::Critical, 10_000),
        ];
        for kind in [
            OperationKind::Create,
            OperationKind::Modify,
            OperationKind::Refactor,
            OperationKind::Analyze,
            OperationKind::Debug,
            OperationKind::Test,
            OperationKind::Unknown,
        ] {
            for c in &contexts {
                let result = score(kind, c);
                assert!((0.0..=100.0).contains(&result.score));
            }
        }
    }

    #[test]
    fn test_monotonic_in_each_factor() {
        let base = ctx(3, 200, 2, RiskTier::Medium, 30);
        let base_score = score(OperationKind::Modify, &base).score;

        let mut more_files = base.clone();
        more_files.file_count = 6;
        assert!(score(OperationKind::Modify, &more_files).score >= base_score);

        let mut more_lines = base.clone();
        more_lines.lines_changed = 400;
        assert!(score(OperationKind::Modify, &more_lines).score >= base_score);

        let mut more_deps = base.clone();
        more_deps.dependency_count = 4;
        assert!(score(OperationKind::Modify, &more_deps).score >= base_score);

        let mut longer = base.clone();
        longer.estimated_minutes = 60;
        assert!(score(OperationKind::Modify, &longer).score >= base_score);
    }

    #[test]
    fn test_mid_band_moderate_vs_complex() {
        // raw = 10*2 + 100/10 + 0 + 0 = 30, modify 1.2, medium 1.0 -> 36
        let moderate = score(OperationKind::Modify, &ctx(10, 100, 0, RiskTier::Medium, 0));
        assert_eq!(moderate.level, ComplexityLevel::Moderate);

        // raw = 20 + 25 + 9 + 0 = 54, modify 1.2 -> 64.8
        let complex = score(OperationKind::Modify, &ctx(10, 300, 3, RiskTier::Medium, 0));
        assert_eq!(complex.level, ComplexityLevel::Complex);
    }

    #[test]
    fn test_mid_band_promotion_to_multi_agent() {
        // Same score band, but file count over the secondary threshold.
        let promoted = score(OperationKind::Modify, &ctx(12, 100, 0, RiskTier::Medium, 0));
        assert_eq!(promoted.strategy, DelegationStrategy::MultiAgent);

        let kept_single = score(OperationKind::Modify, &ctx(10, 140, 0, RiskTier::Medium, 0));
        assert_eq!(kept_single.strategy, DelegationStrategy::SingleAgent);
    }

    #[test]
    fn test_mid_band_worker_count() {
        // score ~36 -> ceil(36/40) = 1
        let low = score(OperationKind::Modify, &ctx(10, 100, 0, RiskTier::Medium, 0));
        assert_eq!(low.estimated_workers, 1);

        // raw 54 * 1.2 * 1.3 = 84.2 -> ceil(84.2/40) = 3
        let high = score(OperationKind::Modify, &ctx(10, 300, 3, RiskTier::High, 0));
        assert_eq!(high.estimated_workers, 3);
    }

    #[test]
    fn test_unknown_operation_defaults_with_note() {
        let result = score(OperationKind::Unknown, &ctx(5, 100, 2, RiskTier::Medium, 20));
        assert!(result
            .reasoning
            .iter()
            .any(|r| r.contains("unknown operation kind")));
        // Same inputs under create (multiplier 1.0) give the same score.
        let create = score(OperationKind::Create, &ctx(5, 100, 2, RiskTier::Medium, 20));
        assert_eq!(result.score, create.score);
    }

    #[test]
    fn test_reasoning_cites_dominant_factors() {
        let result = score(
            OperationKind::Debug,
            &ctx(50, 5000, 25, RiskTier::Critical, 480),
        );
        assert!(result.reasoning.iter().any(|r| r.contains("high file count")));
        assert!(result
            .reasoning
            .iter()
            .any(|r| r.contains("critical risk multiplier")));
    }

    #[test]
    fn test_low_risk_discounts_score() {
        let low = score(OperationKind::Create, &ctx(10, 200, 3, RiskTier::Low, 60));
        let medium = score(OperationKind::Create, &ctx(10, 200, 3, RiskTier::Medium, 60));
        assert!(low.score < medium.score);
    }
}
