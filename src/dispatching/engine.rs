//! Composite ranking of assignment candidates.
//!
//! Composes candidate rules with configurable evaluation modes. Whatever
//! the configured chain, the ranking always ends with a tie-break on
//! (order ID, vehicle ID), so two passes over the same snapshot produce
//! the same assignment.

use std::sync::Arc;

use super::{AssignmentCandidate, CandidateRule, DispatchContext, RuleScore};
use super::rules;

/// How multiple rules are combined.
#[derive(Debug, Clone, Default)]
pub enum EvaluationMode {
    /// Apply rules in sequence; use the next rule only on ties.
    #[default]
    Sequential,
    /// Compute a weighted sum of all rule scores.
    Weighted,
}

#[derive(Clone)]
struct WeightedRule {
    rule: Arc<dyn CandidateRule>,
    weight: f64,
}

/// A composable ranking over assignment candidates.
///
/// The rule chain is fully configuration-driven; nothing downstream depends
/// on a particular order. Ties surviving every configured rule are broken
/// by (order ID, vehicle ID) — unconditionally, so the resulting order is
/// always total.
///
/// # Example
/// ```
/// use agv_kernel::dispatching::{CandidateRanking, rules};
///
/// let ranking = CandidateRanking::new()
///     .with_rule(rules::DeadlineAtRisk::default())
///     .with_rule(rules::RoutingCost);
/// ```
#[derive(Clone)]
pub struct CandidateRanking {
    rules: Vec<WeightedRule>,
    mode: EvaluationMode,
    epsilon: f64,
}

impl Default for CandidateRanking {
    fn default() -> Self {
        Self::new()
    }
}

impl CandidateRanking {
    /// Creates an empty ranking (tie-break only).
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            mode: EvaluationMode::Sequential,
            epsilon: 1e-9,
        }
    }

    /// The recommended default chain: deadline-at-risk, then order age,
    /// then routing cost, then vehicle energy.
    pub fn recommended() -> Self {
        Self::new()
            .with_rule(rules::DeadlineAtRisk::default())
            .with_rule(rules::OrderAge)
            .with_rule(rules::RoutingCost)
            .with_rule(rules::EnergyReserve)
    }

    /// Adds a rule (weight 1.0).
    pub fn with_rule<R: CandidateRule + 'static>(mut self, rule: R) -> Self {
        self.rules.push(WeightedRule {
            rule: Arc::new(rule),
            weight: 1.0,
        });
        self
    }

    /// Adds a weighted rule.
    pub fn with_weighted_rule<R: CandidateRule + 'static>(
        mut self,
        rule: R,
        weight: f64,
    ) -> Self {
        self.rules.push(WeightedRule {
            rule: Arc::new(rule),
            weight,
        });
        self
    }

    /// Sets the evaluation mode.
    pub fn with_mode(mut self, mode: EvaluationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sorts candidates by priority (highest priority first).
    ///
    /// Returns indices into the candidate slice.
    pub fn sort_indices(
        &self,
        candidates: &[AssignmentCandidate],
        context: &DispatchContext,
    ) -> Vec<usize> {
        if candidates.is_empty() {
            return Vec::new();
        }

        let mut indices: Vec<usize> = (0..candidates.len()).collect();

        match &self.mode {
            EvaluationMode::Sequential => {
                indices.sort_by(|&a, &b| {
                    self.compare_sequential(&candidates[a], &candidates[b], context)
                });
            }
            EvaluationMode::Weighted => {
                let scores: Vec<f64> = candidates
                    .iter()
                    .map(|c| self.weighted_score(c, context))
                    .collect();
                indices.sort_by(|&a, &b| {
                    scores[a]
                        .partial_cmp(&scores[b])
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| Self::tie_break(&candidates[a], &candidates[b]))
                });
            }
        }

        indices
    }

    /// Returns the index of the highest-priority candidate.
    pub fn select_best(
        &self,
        candidates: &[AssignmentCandidate],
        context: &DispatchContext,
    ) -> Option<usize> {
        self.sort_indices(candidates, context).first().copied()
    }

    /// Evaluates a single candidate against each rule.
    pub fn evaluate(
        &self,
        candidate: &AssignmentCandidate,
        context: &DispatchContext,
    ) -> Vec<RuleScore> {
        self.rules
            .iter()
            .map(|wr| wr.rule.evaluate(candidate, context) * wr.weight)
            .collect()
    }

    fn compare_sequential(
        &self,
        a: &AssignmentCandidate,
        b: &AssignmentCandidate,
        context: &DispatchContext,
    ) -> std::cmp::Ordering {
        for wr in &self.rules {
            let score_a = wr.rule.evaluate(a, context);
            let score_b = wr.rule.evaluate(b, context);

            if (score_a - score_b).abs() > self.epsilon {
                return score_a
                    .partial_cmp(&score_b)
                    .unwrap_or(std::cmp::Ordering::Equal);
            }
        }

        Self::tie_break(a, b)
    }

    fn tie_break(a: &AssignmentCandidate, b: &AssignmentCandidate) -> std::cmp::Ordering {
        a.order
            .id
            .cmp(&b.order.id)
            .then_with(|| a.vehicle.id.cmp(&b.vehicle.id))
    }

    fn weighted_score(&self, candidate: &AssignmentCandidate, context: &DispatchContext) -> f64 {
        self.rules
            .iter()
            .map(|wr| wr.rule.evaluate(candidate, context) * wr.weight)
            .sum()
    }
}

impl std::fmt::Debug for CandidateRanking {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandidateRanking")
            .field(
                "rules",
                &self
                    .rules
                    .iter()
                    .map(|r| format!("{}(w={})", r.rule.name(), r.weight))
                    .collect::<Vec<_>>(),
            )
            .field("mode", &self.mode)
            .finish()
    }
}
