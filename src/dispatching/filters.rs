//! Built-in selection filters.
//!
//! The dispatcher installs these by default; deployments add their own by
//! implementing the filter traits and registering them on the dispatcher.

use super::{AssignmentCandidate, CandidateFilter, DispatchContext, OrderFilter};
use crate::models::TransportOrder;

/// Drops orders whose final destination is already the target of an order
/// currently being processed.
#[derive(Debug, Clone, Copy, Default)]
pub struct FreeDestinationFilter;

impl OrderFilter for FreeDestinationFilter {
    fn name(&self) -> &'static str {
        "FREE_DESTINATION"
    }

    fn accepts(&self, order: &TransportOrder, context: &DispatchContext) -> bool {
        match order.final_destination() {
            Some(destination) => !context.reserved_destinations.contains(destination),
            None => false,
        }
    }
}

/// Drops candidates whose route crosses a locked resource.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnlockedRouteFilter;

impl CandidateFilter for UnlockedRouteFilter {
    fn name(&self) -> &'static str {
        "UNLOCKED_ROUTE"
    }

    fn accepts(&self, candidate: &AssignmentCandidate, context: &DispatchContext) -> bool {
        !candidate.route.uses_any_of(&context.locked_resources)
    }
}
