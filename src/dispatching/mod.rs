//! Transport-order dispatching.
//!
//! The dispatcher repeatedly solves a constrained assignment problem:
//! which available vehicle should process which dispatchable order, over
//! which route. Selection is shaped by pluggable filters (predicates over
//! orders, vehicles, and candidates) and by chainable priority rules that
//! produce one deterministic total order of candidates per pass.
//!
//! # Usage
//!
//! ```no_run
//! use agv_kernel::dispatching::{CandidateRanking, rules};
//!
//! let ranking = CandidateRanking::new()
//!     .with_rule(rules::DeadlineAtRisk::default())
//!     .with_rule(rules::RoutingCost);
//! ```

mod candidate;
mod context;
mod engine;
mod filters;
mod idle;
mod pipeline;
mod reservation;
pub mod rules;

pub use candidate::{AssignmentCandidate, CandidateGenerator, GenerationResult};
pub use context::DispatchContext;
pub use engine::{CandidateRanking, EvaluationMode};
pub use filters::{FreeDestinationFilter, UnlockedRouteFilter};
pub use idle::{IdlePositionSelector, PositionFilter};
pub use pipeline::{Dispatcher, DispatchOutcome};
pub use reservation::OrderReservationPool;

use crate::models::{TransportOrder, Vehicle};
use crate::rerouting::RerouteError;
use crate::scheduler::SchedulerError;
use crate::store::StoreError;
use std::fmt::Debug;
use thiserror::Error;

/// Score returned by a candidate rule.
///
/// Lower scores = higher priority (committed first).
pub type RuleScore = f64;

/// A priority rule over assignment candidates.
///
/// # Score Convention
/// **Lower score = higher priority.** Rules return smaller values for
/// candidates that should be committed first.
pub trait CandidateRule: Send + Sync + Debug {
    /// Rule name (e.g., "DEADLINE", "COST").
    fn name(&self) -> &'static str;

    /// Evaluates a candidate's priority in the given dispatch context.
    fn evaluate(&self, candidate: &AssignmentCandidate, context: &DispatchContext) -> RuleScore;

    /// Rule description.
    fn description(&self) -> &'static str {
        self.name()
    }
}

/// A predicate removing ineligible transport orders from a dispatch pass.
pub trait OrderFilter: Send + Sync {
    /// Filter name, for diagnostics.
    fn name(&self) -> &'static str;

    /// Whether the order may take part in the pass.
    fn accepts(&self, order: &TransportOrder, context: &DispatchContext) -> bool;
}

/// A predicate removing ineligible vehicles from a dispatch pass.
pub trait VehicleFilter: Send + Sync {
    /// Filter name, for diagnostics.
    fn name(&self) -> &'static str;

    /// Whether the vehicle may take part in the pass.
    fn accepts(&self, vehicle: &Vehicle, context: &DispatchContext) -> bool;
}

/// A predicate removing unsuitable assignment candidates.
pub trait CandidateFilter: Send + Sync {
    /// Filter name, for diagnostics.
    fn name(&self) -> &'static str;

    /// Whether the candidate may be committed.
    fn accepts(&self, candidate: &AssignmentCandidate, context: &DispatchContext) -> bool;
}

/// Errors reported by dispatcher operations.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The named transport order does not exist.
    #[error("unknown transport order '{0}'")]
    UnknownOrder(String),

    /// The named vehicle does not exist.
    #[error("unknown vehicle '{0}'")]
    UnknownVehicle(String),

    /// The router returned no route for the order. The order stays
    /// dispatchable and is reconsidered on the next pass.
    #[error("no route found for order '{order}'")]
    NoRouteFound {
        /// The affected order.
        order: String,
    },

    /// Another vehicle reserved the order first. The candidate is dropped
    /// and retried on the next pass.
    #[error("order '{order}' is reserved by another vehicle")]
    AssignmentConflict {
        /// The affected order.
        order: String,
    },

    /// A scheduler operation failed while committing an assignment.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// A rerouting strategy could not produce a replacement route.
    #[error(transparent)]
    Reroute(#[from] RerouteError),

    /// A fleet store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
