//! Assignment candidate generation.
//!
//! For each dispatchable order and available vehicle that pass a
//! compatibility check, the generator asks the router for a route and
//! builds an [`AssignmentCandidate`]. Candidates are purely derived: they
//! are recomputed every pass and never persisted.

use log::debug;

use super::DispatchContext;
use crate::models::{PlantModel, Route, TransportOrder, Vehicle};
use crate::router::Router;

/// A scored (order, vehicle, route) tuple considered during one pass.
#[derive(Debug, Clone)]
pub struct AssignmentCandidate {
    /// Snapshot of the order.
    pub order: TransportOrder,
    /// Snapshot of the vehicle.
    pub vehicle: Vehicle,
    /// Route the vehicle would take.
    pub route: Route,
    /// Routing cost, denormalized from the route.
    pub cost: i64,
}

impl AssignmentCandidate {
    /// Creates a candidate from its parts.
    pub fn new(order: TransportOrder, vehicle: Vehicle, route: Route) -> Self {
        let cost = route.cost;
        Self {
            order,
            vehicle,
            route,
            cost,
        }
    }
}

/// Result of one generation run.
#[derive(Debug, Clone, Default)]
pub struct GenerationResult {
    /// Candidates with a successfully computed route.
    pub candidates: Vec<AssignmentCandidate>,
    /// Orders for which at least one compatible vehicle existed but none
    /// could route to them.
    pub unroutable: Vec<String>,
}

/// Whether a vehicle may process an order at all, before any routing.
pub(crate) fn compatible(order: &TransportOrder, vehicle: &Vehicle) -> bool {
    if let Some(intended) = &order.intended_vehicle {
        if intended != &vehicle.id {
            return false;
        }
    }
    if !vehicle.accepts_order_type(&order.order_type) {
        return false;
    }
    // A vehicle bound to a sequence only takes that sequence's orders
    if let Some(sequence_id) = &vehicle.order_sequence {
        if order.wrapping_sequence.as_ref() != Some(sequence_id) {
            return false;
        }
    }
    true
}

/// Builds assignment candidates by fanning out route requests.
pub struct CandidateGenerator<'a> {
    router: &'a dyn Router,
    plant: &'a PlantModel,
}

impl<'a> CandidateGenerator<'a> {
    /// Creates a generator over the given router and plant.
    pub fn new(router: &'a dyn Router, plant: &'a PlantModel) -> Self {
        Self { router, plant }
    }

    /// Generates candidates for every compatible (order, vehicle) pair.
    ///
    /// Step resource sets of the returned routes are expanded with block
    /// members, so the scheduler claims whole blocks.
    pub fn generate(
        &self,
        orders: &[TransportOrder],
        vehicles: &[Vehicle],
        _context: &DispatchContext,
    ) -> GenerationResult {
        let mut result = GenerationResult::default();

        for order in orders {
            let mut compatible_vehicles = 0usize;
            let mut routed = 0usize;

            for vehicle in vehicles {
                if !compatible(order, vehicle) {
                    continue;
                }
                compatible_vehicles += 1;

                let Some(origin) = vehicle.position.as_deref() else {
                    continue;
                };
                let destinations = order.remaining_destinations();
                match self.router.compute_route(vehicle, origin, &destinations) {
                    Some(route) => {
                        routed += 1;
                        let route = self.expand_blocks(route);
                        result.candidates.push(AssignmentCandidate::new(
                            order.clone(),
                            vehicle.clone(),
                            route,
                        ));
                    }
                    None => {
                        debug!(
                            "no route for order '{}' with vehicle '{}'",
                            order.id, vehicle.id
                        );
                    }
                }
            }

            if compatible_vehicles > 0 && routed == 0 {
                result.unroutable.push(order.id.clone());
            }
        }

        result
    }

    fn expand_blocks(&self, mut route: Route) -> Route {
        for step in &mut route.steps {
            step.resources = self.plant.expand_with_blocks(&step.resources);
        }
        route
    }
}
