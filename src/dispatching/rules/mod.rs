//! Built-in candidate priority rules.
//!
//! # Categories
//!
//! - **Urgency**: DEADLINE (deadline-at-risk first)
//! - **Age**: AGE (oldest order first)
//! - **Cost**: COST (cheapest route first)
//! - **Energy**: ENERGY (best-charged vehicle first)
//!
//! # Score Convention
//! All rules return lower scores for candidates that should be committed
//! first. The concrete chain is configuration-driven; see
//! [`CandidateRanking`](super::CandidateRanking) for composition and the
//! unconditional name-based tie-break.

use super::{AssignmentCandidate, CandidateRule, DispatchContext, RuleScore};

/// Deadline-at-risk rule.
///
/// Candidates whose order deadline lies within the risk window (or has
/// already passed) score 0, all others 1. Orders without a deadline are
/// never at risk.
#[derive(Debug, Clone, Copy)]
pub struct DeadlineAtRisk {
    /// How close (ms) a deadline may come before the order counts as at
    /// risk.
    pub window_ms: i64,
}

impl Default for DeadlineAtRisk {
    fn default() -> Self {
        Self { window_ms: 300_000 }
    }
}

impl DeadlineAtRisk {
    /// Creates the rule with a custom risk window.
    pub fn with_window(window_ms: i64) -> Self {
        Self { window_ms }
    }
}

impl CandidateRule for DeadlineAtRisk {
    fn name(&self) -> &'static str {
        "DEADLINE"
    }

    fn evaluate(&self, candidate: &AssignmentCandidate, context: &DispatchContext) -> RuleScore {
        if candidate
            .order
            .deadline_at_risk(context.now_ms, self.window_ms)
        {
            0.0
        } else {
            1.0
        }
    }

    fn description(&self) -> &'static str {
        "Deadline At Risk"
    }
}

/// Order age rule.
///
/// Prioritizes older orders: the score is the creation time, so orders
/// created earlier sort first.
#[derive(Debug, Clone, Copy)]
pub struct OrderAge;

impl CandidateRule for OrderAge {
    fn name(&self) -> &'static str {
        "AGE"
    }

    fn evaluate(&self, candidate: &AssignmentCandidate, _context: &DispatchContext) -> RuleScore {
        candidate.order.creation_time_ms as f64
    }

    fn description(&self) -> &'static str {
        "Order Age"
    }
}

/// Routing cost rule.
///
/// Prioritizes candidates with cheaper routes, as costed by the router.
#[derive(Debug, Clone, Copy)]
pub struct RoutingCost;

impl CandidateRule for RoutingCost {
    fn name(&self) -> &'static str {
        "COST"
    }

    fn evaluate(&self, candidate: &AssignmentCandidate, _context: &DispatchContext) -> RuleScore {
        candidate.cost as f64
    }

    fn description(&self) -> &'static str {
        "Routing Cost"
    }
}

/// Vehicle energy rule.
///
/// Prioritizes candidates whose vehicle has the higher energy level,
/// spreading wear and postponing recharge breaks.
#[derive(Debug, Clone, Copy)]
pub struct EnergyReserve;

impl CandidateRule for EnergyReserve {
    fn name(&self) -> &'static str {
        "ENERGY"
    }

    fn evaluate(&self, candidate: &AssignmentCandidate, _context: &DispatchContext) -> RuleScore {
        -(candidate.vehicle.energy_level as f64)
    }

    fn description(&self) -> &'static str {
        "Vehicle Energy Reserve"
    }
}
