//! Parking and recharge position selection.
//!
//! Vehicles left without an assignment at the end of a pass are sent to a
//! recharge position (when their energy calls for it) or a parking
//! position. Position selection is routed through the same router as
//! transport orders and subject to configurable position filters; the
//! resulting movement is a synthetic, dispensable transport order committed
//! through the normal pipeline.

use crate::models::{PlantModel, Resource, Route, Vehicle};
use crate::router::Router;
use std::collections::HashSet;

/// A predicate narrowing the positions an idle vehicle may be sent to.
pub trait PositionFilter: Send + Sync {
    /// Filter name, for diagnostics.
    fn name(&self) -> &'static str;

    /// Whether the vehicle may be sent to the given point.
    fn accepts(&self, point: &Resource, vehicle: &Vehicle) -> bool;
}

/// Selects parking and recharge positions for idle vehicles.
#[derive(Default)]
pub struct IdlePositionSelector {
    filters: Vec<Box<dyn PositionFilter>>,
}

impl IdlePositionSelector {
    /// Creates a selector without extra filters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a position filter.
    pub fn with_filter<F: PositionFilter + 'static>(mut self, filter: F) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    /// Picks the cheapest reachable parking position not in `occupied`.
    pub fn select_park_position(
        &self,
        plant: &PlantModel,
        vehicle: &Vehicle,
        router: &dyn Router,
        occupied: &HashSet<String>,
    ) -> Option<(String, Route)> {
        self.select(plant.park_positions(), vehicle, router, occupied)
    }

    /// Picks the cheapest reachable recharge position not in `occupied`.
    pub fn select_recharge_position(
        &self,
        plant: &PlantModel,
        vehicle: &Vehicle,
        router: &dyn Router,
        occupied: &HashSet<String>,
    ) -> Option<(String, Route)> {
        self.select(plant.recharge_positions(), vehicle, router, occupied)
    }

    fn select(
        &self,
        positions: Vec<&Resource>,
        vehicle: &Vehicle,
        router: &dyn Router,
        occupied: &HashSet<String>,
    ) -> Option<(String, Route)> {
        let origin = vehicle.position.as_deref()?;

        let mut best: Option<(String, Route)> = None;
        for point in positions {
            if point.id == origin || occupied.contains(&point.id) {
                continue;
            }
            if !self.filters.iter().all(|f| f.accepts(point, vehicle)) {
                continue;
            }
            let Some(route) = router.compute_route(vehicle, origin, &[point.id.clone()]) else {
                continue;
            };
            let better = match &best {
                None => true,
                // Cheapest first, point ID as tie-break for determinism
                Some((best_id, best_route)) => {
                    (route.cost, &point.id) < (best_route.cost, best_id)
                }
            };
            if better {
                best = Some((point.id.clone(), route));
            }
        }
        best
    }
}
