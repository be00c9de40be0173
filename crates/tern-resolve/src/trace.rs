//! Serializable resolution traces.
//!
//! When tracing is enabled, the resolver records one step per decision it
//! makes. Steps serialize to JSON for tooling that wants to explain why a
//! goal picked one instance over another, or why it failed.

use serde::Serialize;

/// What a single trace step records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveAction {
    /// A goal was entered at some depth.
    GoalEntered,
    /// An ambient witness parameter satisfied the goal directly.
    AmbientWitness,
    /// A visible instance was considered as a candidate.
    CandidateConsidered,
    /// The candidate's head unified with the goal.
    CandidateUnified,
    /// All of the candidate's conditional witnesses were discharged.
    CandidateDischarged,
    /// The candidate was dropped (head mismatch or failed condition).
    CandidateDiscarded,
    /// The candidate re-entered a goal already in progress.
    CandidateCycled,
    /// The goal resolved to this candidate.
    Winner,
    /// Several candidates survived with no strict specificity winner.
    Ambiguous,
    /// No candidate survived.
    NoInstance,
    /// The recursion depth limit was reached.
    RecursionLimit,
}

/// One recorded resolver decision.
#[derive(Debug, Clone, Serialize)]
pub struct ResolveStep {
    /// Position in the trace, starting at zero.
    pub step: usize,
    /// Recursion depth of the goal this step belongs to.
    pub depth: usize,
    pub action: ResolveAction,
    /// The goal being resolved, rendered for humans.
    pub goal: String,
    /// Action-specific detail: a candidate name, a winner, a failure note.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Accumulates trace steps for one resolution request.
#[derive(Debug, Default)]
pub struct ResolveTrace {
    steps: Vec<ResolveStep>,
    enabled: bool,
}

impl ResolveTrace {
    pub fn new(enabled: bool) -> Self {
        Self {
            steps: Vec::new(),
            enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn record(
        &mut self,
        depth: usize,
        action: ResolveAction,
        goal: impl Into<String>,
        detail: Option<String>,
    ) {
        if !self.enabled {
            return;
        }
        self.steps.push(ResolveStep {
            step: self.steps.len(),
            depth,
            action,
            goal: goal.into(),
            detail,
        });
    }

    pub fn steps(&self) -> &[ResolveStep] {
        &self.steps
    }

    pub fn into_steps(self) -> Vec<ResolveStep> {
        self.steps
    }
}
