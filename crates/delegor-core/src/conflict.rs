use serde::{Deserialize, Serialize};

/// Policy for reconciling disagreeing worker outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// All values must be deep-equal; anything else is unresolved.
    Consensus,
    /// The most frequent value wins; ties go to the first seen.
    MajorityVote,
    /// A designated authoritative worker's value wins; else the first value.
    ExpertPriority,
}

impl std::fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictPolicy::Consensus => write!(f, "consensus"),
            ConflictPolicy::MajorityVote => write!(f, "majority_vote"),
            ConflictPolicy::ExpertPriority => write!(f, "expert_priority"),
        }
    }
}

/// A single worker's contribution to a contested value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contribution {
    /// Name of the contributing worker.
    pub worker: String,
    /// The value the worker produced.
    pub value: serde_json::Value,
}

impl Contribution {
    /// Creates a contribution from a worker name and value.
    pub fn new(worker: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            worker: worker.into(),
            value,
        }
    }
}

/// The outcome of applying a [`ConflictPolicy`] to a set of contributions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ConflictOutcome {
    /// A winning value was determined.
    Resolved {
        /// The winning value.
        value: serde_json::Value,
        /// Worker whose contribution won, when attributable.
        winner: Option<String>,
    },
    /// No winner could be determined; callers must escalate, not crash.
    Unresolved,
}

impl ConflictOutcome {
    /// Whether this outcome carries a resolution value.
    pub fn is_resolved(&self) -> bool {
        matches!(self, ConflictOutcome::Resolved { .. })
    }
}

/// Applies a resolution policy over a set of contributions.
///
/// Pure over its inputs. An empty contribution set is unresolved; a single
/// contribution wins under every policy. `authoritative` names the workers
/// whose output takes precedence under [`ConflictPolicy::ExpertPriority`];
/// it is ignored by the other policies.
pub fn resolve(
    policy: ConflictPolicy,
    contributions: &[Contribution],
    authoritative: &[String],
) -> ConflictOutcome {
    match contributions {
        [] => ConflictOutcome::Unresolved,
        [only] => ConflictOutcome::Resolved {
            value: only.value.clone(),
            winner: Some(only.worker.clone()),
        },
        _ => match policy {
            ConflictPolicy::Consensus => resolve_consensus(contributions),
            ConflictPolicy::MajorityVote => resolve_majority(contributions),
            ConflictPolicy::ExpertPriority => resolve_expert(contributions, authoritative),
        },
    }
}

fn resolve_consensus(contributions: &[Contribution]) -> ConflictOutcome {
    let first = &contributions[0].value;
    if contributions.iter().all(|c| &c.value == first) {
        ConflictOutcome::Resolved {
            value: first.clone(),
            winner: None,
        }
    } else {
        ConflictOutcome::Unresolved
    }
}

fn resolve_majority(contributions: &[Contribution]) -> ConflictOutcome {
    // Serialized form is the comparable key; first-seen order breaks ties.
    let mut tallies: Vec<(String, usize, usize)> = Vec::new();
    for (index, contribution) in contributions.iter().enumerate() {
        let key = contribution.value.to_string();
        match tallies.iter_mut().find(|(k, _, _)| *k == key) {
            Some((_, count, _)) => *count += 1,
            None => tallies.push((key, 1, index)),
        }
    }

    let winner = tallies
        .iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.2.cmp(&a.2)))
        .map(|(_, _, index)| *index);

    match winner {
        Some(index) => ConflictOutcome::Resolved {
            value: contributions[index].value.clone(),
            winner: Some(contributions[index].worker.clone()),
        },
        None => ConflictOutcome::Unresolved,
    }
}

fn resolve_expert(contributions: &[Contribution], authoritative: &[String]) -> ConflictOutcome {
    let expert = contributions
        .iter()
        .find(|c| authoritative.contains(&c.worker))
        .unwrap_or(&contributions[0]);
    ConflictOutcome::Resolved {
        value: expert.value.clone(),
        winner: Some(expert.worker.clone()),
    }
}
