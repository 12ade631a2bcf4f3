//! Route recomputation for vehicles already under way.
//!
//! Two strategies, selected by trigger:
//!
//! - **Regular**: the vehicle is still executing a valid route. The new
//!   route is computed from the vehicle's current position and merged with
//!   the already-completed steps, so the drive order keeps its history and
//!   the vehicle keeps every resource it has allocated.
//! - **Forced**: the current route is known to be permanently invalid. The
//!   remaining route is recomputed outright; progress beyond the reported
//!   position is discarded.
//!
//! Neither strategy revokes resources the vehicle already holds; only
//! resources not yet allocated change.

use thiserror::Error;

use crate::models::{Route, TransportOrder, Vehicle};
use crate::router::Router;

/// Which rerouting behavior to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReroutingType {
    /// Recompute from the current position, preserving completed steps.
    Regular,
    /// Discard in-flight progress and recompute the full remaining route.
    Forced,
}

/// Errors reported by rerouting strategies.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RerouteError {
    /// The vehicle's position is unknown; nothing to reroute from.
    #[error("vehicle '{0}' has no known position")]
    MissingPosition(String),

    /// The router found no route for the remaining destinations.
    #[error("no route from '{origin}' for vehicle '{vehicle}'")]
    NoRouteFound {
        /// The rerouted vehicle.
        vehicle: String,
        /// Position the routing started from.
        origin: String,
    },
}

/// A rerouting result.
#[derive(Debug, Clone)]
pub struct Reroute {
    /// The drive order's new route: completed steps (if preserved) followed
    /// by the newly computed remainder. The cost reflects the new portion.
    pub merged: Route,
    /// Index of the first newly computed step within `merged`. Steps before
    /// it were already driven and keep their allocations.
    pub fresh_from: usize,
}

impl Reroute {
    /// The newly computed portion of the route — what the scheduler should
    /// claim from here on.
    pub fn fresh_route(&self) -> Route {
        Route::new(
            self.merged.steps[self.fresh_from..].to_vec(),
            self.merged.cost,
        )
    }
}

/// Computes a vehicle's replacement route.
pub trait RerouteStrategy: Send + Sync {
    /// Strategy name, for diagnostics.
    fn name(&self) -> &'static str;

    /// Computes the replacement route for the vehicle's current order.
    fn reroute(
        &self,
        vehicle: &Vehicle,
        order: &TransportOrder,
        router: &dyn Router,
    ) -> Result<Reroute, RerouteError>;
}

fn remaining_route(
    vehicle: &Vehicle,
    order: &TransportOrder,
    router: &dyn Router,
) -> Result<Route, RerouteError> {
    let origin = vehicle
        .position
        .as_deref()
        .ok_or_else(|| RerouteError::MissingPosition(vehicle.id.clone()))?;
    let destinations = order.remaining_destinations();
    router
        .compute_route(vehicle, origin, &destinations)
        .ok_or_else(|| RerouteError::NoRouteFound {
            vehicle: vehicle.id.clone(),
            origin: origin.to_string(),
        })
}

/// Rerouting for a vehicle still executing a valid route.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegularReroute;

impl RerouteStrategy for RegularReroute {
    fn name(&self) -> &'static str {
        "REGULAR"
    }

    fn reroute(
        &self,
        vehicle: &Vehicle,
        order: &TransportOrder,
        router: &dyn Router,
    ) -> Result<Reroute, RerouteError> {
        let fresh = remaining_route(vehicle, order, router)?;

        let completed: Vec<_> = match (&vehicle.route_progress, current_route(order)) {
            (Some(progress), Some(route)) => {
                route.steps[..(*progress + 1).min(route.steps.len())].to_vec()
            }
            _ => Vec::new(),
        };

        let fresh_from = completed.len();
        let mut steps = completed;
        steps.extend(fresh.steps);
        Ok(Reroute {
            merged: Route::new(steps, fresh.cost),
            fresh_from,
        })
    }
}

/// Rerouting for a vehicle whose current route is permanently invalid.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForcedReroute;

impl RerouteStrategy for ForcedReroute {
    fn name(&self) -> &'static str {
        "FORCED"
    }

    fn reroute(
        &self,
        vehicle: &Vehicle,
        order: &TransportOrder,
        router: &dyn Router,
    ) -> Result<Reroute, RerouteError> {
        let fresh = remaining_route(vehicle, order, router)?;
        Ok(Reroute {
            merged: fresh,
            fresh_from: 0,
        })
    }
}

fn current_route(order: &TransportOrder) -> Option<&Route> {
    order
        .drive_orders
        .get(order.current_drive_order)
        .and_then(|d| d.route.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Step, OPERATION_NOP};
    use crate::router::TableRouter;

    /// Order P1 → P4 whose current route goes P1, P2, P3, P4; the vehicle
    /// has completed the first step and stands on P2.
    fn fixture() -> (Vehicle, TransportOrder) {
        let original = Route::new(
            vec![
                Step::new("P1--P2", "P1", "P2"),
                Step::new("P2--P3", "P2", "P3"),
                Step::new("P3--P4", "P3", "P4"),
            ],
            900,
        );
        let mut order = TransportOrder::new("TO-1").with_destination("P4", OPERATION_NOP);
        order.drive_orders[0].route = Some(original);

        let mut vehicle = Vehicle::new("V1").with_position("P2");
        vehicle.route_progress = Some(0);
        (vehicle, order)
    }

    fn detour_router() -> TableRouter {
        // P2--P3 became unusable; the detour goes over P5
        TableRouter::new().with_route(
            "P2",
            "P4",
            Route::new(
                vec![
                    Step::new("P2--P5", "P2", "P5"),
                    Step::new("P5--P4", "P5", "P4"),
                ],
                700,
            ),
        )
    }

    #[test]
    fn test_regular_preserves_completed_steps() {
        let (vehicle, order) = fixture();
        let reroute = RegularReroute
            .reroute(&vehicle, &order, &detour_router())
            .unwrap();

        // Completed step P1→P2 is kept, the detour follows
        assert_eq!(reroute.fresh_from, 1);
        assert_eq!(reroute.merged.steps.len(), 3);
        assert_eq!(reroute.merged.steps[0].path, "P1--P2");
        assert_eq!(reroute.merged.steps[1].path, "P2--P5");
        assert_eq!(reroute.merged.final_destination(), Some("P4"));
    }

    #[test]
    fn test_regular_fresh_route_starts_at_position() {
        let (vehicle, order) = fixture();
        let reroute = RegularReroute
            .reroute(&vehicle, &order, &detour_router())
            .unwrap();

        let fresh = reroute.fresh_route();
        assert_eq!(fresh.steps[0].source_point, "P2");
        assert_eq!(fresh.len(), 2);
    }

    #[test]
    fn test_regular_without_progress_is_full_recompute() {
        let (mut vehicle, order) = fixture();
        vehicle.route_progress = None;
        vehicle.position = Some("P1".to_string());

        let router = TableRouter::new().with_route(
            "P1",
            "P4",
            Route::new(vec![Step::new("P1--P4", "P1", "P4")], 400),
        );
        let reroute = RegularReroute.reroute(&vehicle, &order, &router).unwrap();
        assert_eq!(reroute.fresh_from, 0);
        assert_eq!(reroute.merged.steps.len(), 1);
    }

    #[test]
    fn test_forced_discards_progress() {
        let (vehicle, order) = fixture();
        let reroute = ForcedReroute
            .reroute(&vehicle, &order, &detour_router())
            .unwrap();

        // No completed prefix survives
        assert_eq!(reroute.fresh_from, 0);
        assert_eq!(reroute.merged.steps.len(), 2);
        assert_eq!(reroute.merged.steps[0].source_point, "P2");
    }

    #[test]
    fn test_reroute_fails_without_route() {
        let (vehicle, order) = fixture();
        let err = RegularReroute
            .reroute(&vehicle, &order, &TableRouter::new())
            .unwrap_err();
        assert_eq!(
            err,
            RerouteError::NoRouteFound {
                vehicle: "V1".to_string(),
                origin: "P2".to_string(),
            }
        );
    }

    #[test]
    fn test_reroute_fails_without_position() {
        let (mut vehicle, order) = fixture();
        vehicle.position = None;
        let err = ForcedReroute
            .reroute(&vehicle, &order, &detour_router())
            .unwrap_err();
        assert_eq!(err, RerouteError::MissingPosition("V1".to_string()));
    }
}
