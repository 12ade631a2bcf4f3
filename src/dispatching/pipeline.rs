//! The dispatch pass.
//!
//! Every dispatch-triggering event (order created or activated, vehicle
//! became idle, withdrawal, periodic tick) funnels into [`Dispatcher::dispatch`].
//! One pass runs to a fixed point without interleaving with another pass;
//! triggers arriving while a pass runs are coalesced into one follow-up
//! pass instead of queueing per event.
//!
//! # Pass structure
//!
//! 1. Promote orders along their lifecycle (`Raw → Active → Dispatchable`).
//! 2. Select dispatchable orders and available vehicles, through the
//!    configured filter chains.
//! 3. Fan out route requests and build assignment candidates.
//! 4. Rank all candidates into one deterministic total order.
//! 5. Commit greedily, displacing dispensable orders where that wins.
//! 6. Send the vehicles left over to recharge or parking positions via
//!    synthetic dispensable orders.

use log::{debug, info, warn};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use super::{
    AssignmentCandidate, CandidateFilter, CandidateGenerator, CandidateRanking, DispatchContext,
    DispatchError, FreeDestinationFilter, IdlePositionSelector, OrderFilter, OrderReservationPool,
    UnlockedRouteFilter, VehicleFilter,
};
use crate::models::{
    IntegrationLevel, OrderState, PlantModel, ProcState, Route, TransportOrder, Vehicle,
    VehicleState, OPERATION_CHARGE, OPERATION_PARK,
};
use crate::rerouting::{ForcedReroute, RegularReroute, RerouteError, RerouteStrategy, ReroutingType};
use crate::router::Router;
use crate::scheduler::Scheduler;
use crate::store::FleetStore;

/// Summary of one dispatch call.
#[derive(Debug, Clone, Default)]
pub struct DispatchOutcome {
    /// Committed assignments as (order ID, vehicle ID).
    pub assigned: Vec<(String, String)>,
    /// Orders displaced from their vehicle and returned to dispatchable.
    pub displaced: Vec<String>,
    /// Orders found unroutable this pass.
    pub unroutable: Vec<String>,
    /// Vehicles sent to a parking position as (vehicle ID, point ID).
    pub parked: Vec<(String, String)>,
    /// Vehicles sent to a recharge position as (vehicle ID, point ID).
    pub recharging: Vec<(String, String)>,
    /// Whether the call was absorbed by a pass already running.
    pub deferred: bool,
}

impl DispatchOutcome {
    fn deferred() -> Self {
        Self {
            deferred: true,
            ..Default::default()
        }
    }

    /// Number of committed assignments.
    pub fn assignment_count(&self) -> usize {
        self.assigned.len()
    }

    /// Whether the pass changed nothing.
    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
            && self.displaced.is_empty()
            && self.unroutable.is_empty()
            && self.parked.is_empty()
            && self.recharging.is_empty()
    }

    fn merge(&mut self, other: DispatchOutcome) {
        self.assigned.extend(other.assigned);
        self.displaced.extend(other.displaced);
        self.unroutable.extend(other.unroutable);
        self.parked.extend(other.parked);
        self.recharging.extend(other.recharging);
    }
}

/// Matches transport orders to vehicles and hands their routes to the
/// scheduler.
pub struct Dispatcher {
    store: Arc<FleetStore>,
    plant: PlantModel,
    scheduler: Arc<Scheduler>,
    router: Arc<dyn Router>,
    order_filters: Vec<Box<dyn OrderFilter>>,
    vehicle_filters: Vec<Box<dyn VehicleFilter>>,
    candidate_filters: Vec<Box<dyn CandidateFilter>>,
    ranking: CandidateRanking,
    idle_selector: IdlePositionSelector,
    pass_lock: Mutex<()>,
    pass_pending: AtomicBool,
    synthetic_seq: AtomicU64,
}

impl Dispatcher {
    /// Creates a dispatcher with the default filters and the recommended
    /// ranking.
    pub fn new(
        store: Arc<FleetStore>,
        plant: PlantModel,
        scheduler: Arc<Scheduler>,
        router: Arc<dyn Router>,
    ) -> Self {
        Self {
            store,
            plant,
            scheduler,
            router,
            order_filters: vec![Box::new(FreeDestinationFilter)],
            vehicle_filters: Vec::new(),
            candidate_filters: vec![Box::new(UnlockedRouteFilter)],
            ranking: CandidateRanking::recommended(),
            idle_selector: IdlePositionSelector::new(),
            pass_lock: Mutex::new(()),
            pass_pending: AtomicBool::new(false),
            synthetic_seq: AtomicU64::new(0),
        }
    }

    /// Adds an order-selection filter.
    pub fn with_order_filter<F: OrderFilter + 'static>(mut self, filter: F) -> Self {
        self.order_filters.push(Box::new(filter));
        self
    }

    /// Adds a vehicle-selection filter.
    pub fn with_vehicle_filter<F: VehicleFilter + 'static>(mut self, filter: F) -> Self {
        self.vehicle_filters.push(Box::new(filter));
        self
    }

    /// Adds an assignment-candidate filter.
    pub fn with_candidate_filter<F: CandidateFilter + 'static>(mut self, filter: F) -> Self {
        self.candidate_filters.push(Box::new(filter));
        self
    }

    /// Replaces the candidate ranking.
    pub fn with_ranking(mut self, ranking: CandidateRanking) -> Self {
        self.ranking = ranking;
        self
    }

    /// Replaces the idle-position selector.
    pub fn with_idle_selector(mut self, selector: IdlePositionSelector) -> Self {
        self.idle_selector = selector;
        self
    }

    /// Runs dispatch passes until no re-trigger is pending.
    ///
    /// Serialized: if another pass is running, the call returns a deferred
    /// outcome and the running pass follows up with one more pass.
    pub fn dispatch(&self, now_ms: i64) -> DispatchOutcome {
        let Some(_guard) = self.pass_lock.try_lock() else {
            self.pass_pending.store(true, Ordering::SeqCst);
            return DispatchOutcome::deferred();
        };

        let mut outcome = self.run_pass(now_ms);
        while self.pass_pending.swap(false, Ordering::SeqCst) {
            outcome.merge(self.run_pass(now_ms));
        }
        outcome
    }

    fn run_pass(&self, now_ms: i64) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        let mut pool = OrderReservationPool::new();

        self.promote_orders();
        let context = self.build_context(now_ms);

        let orders: Vec<TransportOrder> = self
            .store
            .orders()
            .into_iter()
            .filter(|o| o.state == OrderState::Dispatchable)
            .filter(|o| self.dependencies_final(o))
            .filter(|o| self.sequence_allows(o))
            .filter(|o| self.order_filters.iter().all(|f| f.accepts(o, &context)))
            .collect();

        let vehicles: Vec<Vehicle> = self
            .store
            .vehicles()
            .into_iter()
            .filter(|v| self.vehicle_available(v))
            .filter(|v| self.vehicle_filters.iter().all(|f| f.accepts(v, &context)))
            .collect();

        debug!(
            "dispatch pass at {now_ms}: {} dispatchable orders, {} available vehicles",
            orders.len(),
            vehicles.len()
        );

        let generator = CandidateGenerator::new(self.router.as_ref(), &self.plant);
        let generation = generator.generate(&orders, &vehicles, &context);

        for order_id in &generation.unroutable {
            warn!("order '{order_id}' is unroutable for every compatible vehicle");
            let _ = self
                .store
                .modify_order(order_id, |o| o.state = OrderState::Unroutable);
            outcome.unroutable.push(order_id.clone());
        }

        let candidates: Vec<AssignmentCandidate> = generation
            .candidates
            .into_iter()
            .filter(|c| self.sequence_vehicle_matches(c))
            .filter(|c| self.candidate_filters.iter().all(|f| f.accepts(c, &context)))
            .collect();

        let sorted = self.ranking.sort_indices(&candidates, &context);
        let mut committed_orders: HashSet<String> = HashSet::new();
        let mut committed_vehicles: HashSet<String> = HashSet::new();

        for index in sorted {
            let candidate = &candidates[index];
            if committed_orders.contains(&candidate.order.id)
                || committed_vehicles.contains(&candidate.vehicle.id)
            {
                continue;
            }
            if pool.is_reserved_by_other(&candidate.order.id, &candidate.vehicle.id) {
                debug!(
                    "order '{}' already reserved, dropping candidate for '{}'",
                    candidate.order.id, candidate.vehicle.id
                );
                continue;
            }

            if let Some(displaced) = candidate.vehicle.transport_order.clone() {
                if let Err(err) = self.release_assignment(
                    &displaced,
                    &candidate.vehicle.id,
                    OrderState::Dispatchable,
                ) {
                    warn!("failed to displace order '{displaced}': {err}");
                    continue;
                }
                // The displaced route's undriven resources go back to the
                // pool right away; the vehicle keeps only its position
                let keep: Vec<String> =
                    candidate.vehicle.position.clone().into_iter().collect();
                if let Err(err) = self
                    .scheduler
                    .free_all_except(&candidate.vehicle.id, &keep)
                {
                    warn!(
                        "failed to reclaim resources from '{}': {err}",
                        candidate.vehicle.id
                    );
                }
                info!(
                    "displaced dispensable order '{displaced}' from vehicle '{}'",
                    candidate.vehicle.id
                );
                outcome.displaced.push(displaced);
            }

            match self.commit(candidate, &mut pool) {
                Ok(()) => {
                    info!(
                        "assigned order '{}' to vehicle '{}'",
                        candidate.order.id, candidate.vehicle.id
                    );
                    committed_orders.insert(candidate.order.id.clone());
                    committed_vehicles.insert(candidate.vehicle.id.clone());
                    outcome
                        .assigned
                        .push((candidate.order.id.clone(), candidate.vehicle.id.clone()));
                }
                Err(err) => {
                    warn!(
                        "dropping candidate ('{}', '{}'): {err}",
                        candidate.order.id, candidate.vehicle.id
                    );
                    pool.remove_order(&candidate.order.id);
                }
            }
        }

        self.handle_idle_vehicles(&vehicles, &committed_vehicles, &context, &mut outcome);

        // Pass-local reservations not committed are dropped with the pool
        pool.clear();
        outcome
    }

    /// `Raw` orders are accepted; `Active` orders whose dependencies have
    /// reached a final state become dispatchable.
    fn promote_orders(&self) {
        for order in self.store.orders() {
            if order.state == OrderState::Raw {
                let _ = self
                    .store
                    .modify_order(&order.id, |o| o.state = OrderState::Active);
            }
        }
        for order in self.store.orders() {
            if order.state == OrderState::Active && self.dependencies_final(&order) {
                let _ = self
                    .store
                    .modify_order(&order.id, |o| o.state = OrderState::Dispatchable);
            }
        }
    }

    fn build_context(&self, now_ms: i64) -> DispatchContext {
        let mut context = DispatchContext::at_time(now_ms)
            .with_locked_resources(self.plant.locked_resources());

        for order in self.store.orders() {
            if order.state == OrderState::BeingProcessed {
                if let Some(destination) = order.final_destination() {
                    context = context.with_reserved_destination(destination);
                }
            }
        }
        for vehicle in self.store.vehicles() {
            if let Some(position) = &vehicle.position {
                context = context.with_vehicle_position(&vehicle.id, position);
            }
        }
        context
    }

    fn dependencies_final(&self, order: &TransportOrder) -> bool {
        order.dependencies.iter().all(|dep| {
            self.store
                .order(dep)
                .map(|o| o.is_final())
                .unwrap_or(false)
        })
    }

    /// A sequence member is dispatchable only while it is the sequence's
    /// next unfinished order.
    fn sequence_allows(&self, order: &TransportOrder) -> bool {
        match &order.wrapping_sequence {
            None => true,
            Some(sequence_id) => self
                .store
                .sequence(sequence_id)
                .map(|s| s.is_next_order(&order.id))
                .unwrap_or(false),
        }
    }

    /// A sequence is processed by at most one vehicle at a time.
    fn sequence_vehicle_matches(&self, candidate: &AssignmentCandidate) -> bool {
        let Some(sequence_id) = &candidate.order.wrapping_sequence else {
            return true;
        };
        let Some(sequence) = self.store.sequence(sequence_id) else {
            return false;
        };
        if let Some(processing) = &sequence.processing_vehicle {
            return processing == &candidate.vehicle.id;
        }
        if let Some(intended) = &sequence.intended_vehicle {
            return intended == &candidate.vehicle.id;
        }
        true
    }

    fn vehicle_available(&self, vehicle: &Vehicle) -> bool {
        if vehicle.integration_level != IntegrationLevel::ToBeUtilized
            || vehicle.position.is_none()
            || vehicle.is_energy_critical()
        {
            return false;
        }
        match vehicle.state {
            VehicleState::Unknown | VehicleState::Unavailable | VehicleState::Error => {
                return false
            }
            VehicleState::Charging if !vehicle.is_sufficiently_recharged() => return false,
            _ => {}
        }
        match vehicle.proc_state {
            ProcState::Idle => true,
            ProcState::AwaitingOrder => false,
            ProcState::ProcessingOrder => vehicle
                .transport_order
                .as_ref()
                .and_then(|id| self.store.order(id))
                .map(|order| order.dispensable)
                .unwrap_or(false),
        }
    }

    /// Commits an assignment: reserve, hand the route to the scheduler,
    /// request the first step, and mutate order and vehicle state.
    fn commit(
        &self,
        candidate: &AssignmentCandidate,
        pool: &mut OrderReservationPool,
    ) -> Result<(), DispatchError> {
        let order_id = &candidate.order.id;
        let vehicle_id = &candidate.vehicle.id;

        if pool.is_reserved_by_other(order_id, vehicle_id) {
            return Err(DispatchError::AssignmentConflict {
                order: order_id.clone(),
            });
        }
        pool.reserve(order_id.clone(), vehicle_id.clone());

        self.scheduler.set_route(vehicle_id, &candidate.route)?;
        if let Some(first) = candidate.route.steps.first() {
            self.scheduler.allocate(vehicle_id, first.resources.clone())?;
        }

        let route = candidate.route.clone();
        let drive_index = candidate.order.current_drive_order;
        let sequence = candidate.order.wrapping_sequence.clone();
        let allocated = self.scheduler.allocated_by(vehicle_id);
        let claimed: Vec<Vec<String>> =
            route.steps.iter().map(|s| s.resources.clone()).collect();

        self.store.modify_order(order_id, |o| {
            o.state = OrderState::BeingProcessed;
            o.processing_vehicle = Some(vehicle_id.clone());
            if let Some(drive_order) = o.drive_orders.get_mut(drive_index) {
                drive_order.route = Some(route.clone());
            }
        })?;

        self.store.modify_vehicle(vehicle_id, |v| {
            v.proc_state = ProcState::ProcessingOrder;
            v.transport_order = Some(order_id.clone());
            v.order_sequence = sequence.clone();
            v.route_progress = None;
            v.claimed_resources = claimed.clone();
            v.allocated_resources = allocated.clone();
        })?;

        if let Some(sequence_id) = &sequence {
            self.store.modify_sequence(sequence_id, |s| {
                s.processing_vehicle = Some(vehicle_id.clone());
            })?;
        }

        Ok(())
    }

    /// Sends unassigned idle vehicles to recharge or parking positions.
    fn handle_idle_vehicles(
        &self,
        vehicles: &[Vehicle],
        committed_vehicles: &HashSet<String>,
        context: &DispatchContext,
        outcome: &mut DispatchOutcome,
    ) {
        let mut taken: HashSet<String> = context.occupied_points();
        taken.extend(context.reserved_destinations.iter().cloned());

        for snapshot in vehicles {
            if committed_vehicles.contains(&snapshot.id) {
                continue;
            }
            // Re-fetch: displacement may have changed the snapshot
            let Some(vehicle) = self.store.vehicle(&snapshot.id) else {
                continue;
            };
            if vehicle.proc_state != ProcState::Idle {
                continue;
            }

            if vehicle.needs_charging() {
                if let Some((point, route)) = self.idle_selector.select_recharge_position(
                    &self.plant,
                    &vehicle,
                    self.router.as_ref(),
                    &taken,
                ) {
                    if self
                        .commit_synthetic(&vehicle, &point, OPERATION_CHARGE, route)
                        .is_ok()
                    {
                        taken.insert(point.clone());
                        outcome.recharging.push((vehicle.id.clone(), point));
                    }
                }
                continue;
            }

            let already_parked = vehicle
                .position
                .as_deref()
                .and_then(|p| self.plant.resource(p))
                .map(|r| r.is_park_position())
                .unwrap_or(false);
            if already_parked {
                continue;
            }
            if let Some((point, route)) = self.idle_selector.select_park_position(
                &self.plant,
                &vehicle,
                self.router.as_ref(),
                &taken,
            ) {
                if self
                    .commit_synthetic(&vehicle, &point, OPERATION_PARK, route)
                    .is_ok()
                {
                    taken.insert(point.clone());
                    outcome.parked.push((vehicle.id.clone(), point));
                }
            }
        }
    }

    /// Creates and commits a dispensable parking/recharge order.
    fn commit_synthetic(
        &self,
        vehicle: &Vehicle,
        point: &str,
        operation: &str,
        route: Route,
    ) -> Result<(), DispatchError> {
        let seq = self.synthetic_seq.fetch_add(1, Ordering::SeqCst);
        let prefix = if operation == OPERATION_CHARGE {
            "Recharge"
        } else {
            "Park"
        };
        let order_id = format!("{prefix}-{}-{seq:04}", vehicle.id);

        let order = TransportOrder::new(&order_id)
            .with_destination(point, operation)
            .with_intended_vehicle(&vehicle.id)
            .with_dispensable(true)
            .with_state(OrderState::Dispatchable);
        self.store.add_order(order.clone());

        let candidate = AssignmentCandidate::new(order, vehicle.clone(), route);
        let mut pool = OrderReservationPool::new();
        match self.commit(&candidate, &mut pool) {
            Ok(()) => {
                info!("sending idle vehicle '{}' to '{point}' ({operation})", vehicle.id);
                Ok(())
            }
            Err(err) => {
                warn!(
                    "could not send vehicle '{}' to '{point}': {err}",
                    vehicle.id
                );
                let _ = self
                    .store
                    .modify_order(&order_id, |o| o.state = OrderState::Failed);
                Err(err)
            }
        }
    }

    /// Detaches an order from its vehicle, leaving the order in
    /// `new_state`. Pending allocations are cancelled; held resources stay
    /// with the vehicle until its controller frees them.
    fn release_assignment(
        &self,
        order_id: &str,
        vehicle_id: &str,
        new_state: OrderState,
    ) -> Result<(), DispatchError> {
        self.scheduler.clear_pending_allocations(vehicle_id)?;
        self.store.modify_order(order_id, |o| {
            o.state = new_state;
            o.processing_vehicle = None;
            if let Some(drive_order) = o.drive_orders.get_mut(o.current_drive_order) {
                drive_order.route = None;
            }
        })?;
        self.store.modify_vehicle(vehicle_id, |v| {
            v.proc_state = ProcState::Idle;
            v.transport_order = None;
            v.route_progress = None;
            v.claimed_resources = Vec::new();
        })?;
        Ok(())
    }

    /// Withdraws a transport order.
    ///
    /// With `immediate`, every resource the processing vehicle holds except
    /// its current position is freed at once; otherwise freeing is left to
    /// the vehicle's stop report. With `disable_vehicle`, the vehicle's
    /// integration level is lowered so it receives no further orders.
    pub fn withdraw_order(
        &self,
        order_id: &str,
        immediate: bool,
        disable_vehicle: bool,
    ) -> Result<(), DispatchError> {
        let order = self
            .store
            .order(order_id)
            .ok_or_else(|| DispatchError::UnknownOrder(order_id.to_string()))?;
        if order.is_final() {
            return Ok(());
        }

        info!("withdrawing order '{order_id}' (immediate: {immediate})");
        if let Some(vehicle_id) = order.processing_vehicle.clone() {
            self.release_assignment(order_id, &vehicle_id, OrderState::Withdrawn)?;
            if immediate {
                let keep: Vec<String> = self
                    .store
                    .vehicle(&vehicle_id)
                    .and_then(|v| v.position)
                    .into_iter()
                    .collect();
                self.scheduler.free_all_except(&vehicle_id, &keep)?;
            }
            if disable_vehicle {
                self.store.modify_vehicle(&vehicle_id, |v| {
                    v.integration_level = IntegrationLevel::ToBeRespected;
                })?;
            }
            if let Some(sequence_id) = &order.wrapping_sequence {
                self.store.modify_sequence(sequence_id, |s| s.abort())?;
                self.store.modify_vehicle(&vehicle_id, |v| {
                    v.order_sequence = None;
                })?;
            }
        } else {
            self.store
                .modify_order(order_id, |o| o.state = OrderState::Withdrawn)?;
        }
        Ok(())
    }

    /// Withdraws whatever order the vehicle is processing.
    pub fn withdraw_vehicle(
        &self,
        vehicle_id: &str,
        immediate: bool,
        disable_vehicle: bool,
    ) -> Result<(), DispatchError> {
        let vehicle = self
            .store
            .vehicle(vehicle_id)
            .ok_or_else(|| DispatchError::UnknownVehicle(vehicle_id.to_string()))?;

        match vehicle.transport_order {
            Some(order_id) => self.withdraw_order(&order_id, immediate, disable_vehicle),
            None => {
                if disable_vehicle {
                    self.store.modify_vehicle(vehicle_id, |v| {
                        v.integration_level = IntegrationLevel::ToBeRespected;
                    })?;
                }
                Ok(())
            }
        }
    }

    /// Records a vehicle's progress along its current route: updates its
    /// position and progress index from the completed step.
    pub fn report_route_progress(
        &self,
        vehicle_id: &str,
        step_index: usize,
    ) -> Result<(), DispatchError> {
        let vehicle = self
            .store
            .vehicle(vehicle_id)
            .ok_or_else(|| DispatchError::UnknownVehicle(vehicle_id.to_string()))?;
        let order_id = vehicle
            .transport_order
            .clone()
            .ok_or_else(|| DispatchError::UnknownOrder(format!("{vehicle_id} (no order)")))?;
        let order = self
            .store
            .order(&order_id)
            .ok_or_else(|| DispatchError::UnknownOrder(order_id.clone()))?;

        let position = order
            .drive_orders
            .get(order.current_drive_order)
            .and_then(|d| d.route.as_ref())
            .and_then(|r| r.steps.get(step_index))
            .map(|s| s.destination_point.clone());

        self.store.modify_vehicle(vehicle_id, |v| {
            v.route_progress = Some(step_index);
            if let Some(position) = position.clone() {
                v.position = Some(position);
            }
        })?;
        Ok(())
    }

    /// Records that the vehicle finished its current order. Advances the
    /// wrapping sequence, if any.
    pub fn report_order_finished(&self, order_id: &str) -> Result<(), DispatchError> {
        let order = self
            .store
            .order(order_id)
            .ok_or_else(|| DispatchError::UnknownOrder(order_id.to_string()))?;
        if order.is_final() {
            return Ok(());
        }

        info!("order '{order_id}' finished");
        self.store
            .modify_order(order_id, |o| o.state = OrderState::Finished)?;

        if let Some(vehicle_id) = &order.processing_vehicle {
            self.store.modify_vehicle(vehicle_id, |v| {
                v.proc_state = ProcState::Idle;
                v.transport_order = None;
                v.route_progress = None;
                v.claimed_resources = Vec::new();
            })?;
        }

        if let Some(sequence_id) = &order.wrapping_sequence {
            self.store.modify_sequence(sequence_id, |s| s.advance())?;
            let finished = self
                .store
                .sequence(sequence_id)
                .map(|s| s.finished)
                .unwrap_or(true);
            if finished {
                self.store
                    .modify_sequence(sequence_id, |s| s.processing_vehicle = None)?;
                if let Some(vehicle_id) = &order.processing_vehicle {
                    self.store
                        .modify_vehicle(vehicle_id, |v| v.order_sequence = None)?;
                }
            }
        }
        Ok(())
    }

    /// Records that the vehicle's controller gave up on its current order.
    /// A failure-fatal sequence aborts its remaining orders.
    pub fn report_order_failed(&self, order_id: &str) -> Result<(), DispatchError> {
        let order = self
            .store
            .order(order_id)
            .ok_or_else(|| DispatchError::UnknownOrder(order_id.to_string()))?;
        if order.is_final() {
            return Ok(());
        }

        warn!("order '{order_id}' failed");
        self.store
            .modify_order(order_id, |o| o.state = OrderState::Failed)?;

        if let Some(vehicle_id) = &order.processing_vehicle {
            self.store.modify_vehicle(vehicle_id, |v| {
                v.proc_state = ProcState::Idle;
                v.transport_order = None;
                v.route_progress = None;
                v.claimed_resources = Vec::new();
            })?;
        }

        if let Some(sequence_id) = &order.wrapping_sequence {
            let sequence = self.store.sequence(sequence_id);
            let fatal = sequence.as_ref().map(|s| s.failure_fatal).unwrap_or(false);
            if fatal {
                if let Some(sequence) = sequence {
                    for member in &sequence.orders[sequence.next_unfinished..] {
                        if member != order_id {
                            let _ = self.store.modify_order(member, |o| {
                                if !o.is_final() {
                                    o.state = OrderState::Failed;
                                }
                            });
                        }
                    }
                }
                self.store.modify_sequence(sequence_id, |s| {
                    s.abort();
                    s.processing_vehicle = None;
                })?;
                if let Some(vehicle_id) = &order.processing_vehicle {
                    self.store
                        .modify_vehicle(vehicle_id, |v| v.order_sequence = None)?;
                }
            } else {
                self.store.modify_sequence(sequence_id, |s| s.advance())?;
            }
        }
        Ok(())
    }

    /// Recomputes the remaining route of a vehicle's current order.
    ///
    /// A failed regular reroute detaches the order and returns it to
    /// dispatchable; a failed forced reroute marks the order failed.
    pub fn reroute_vehicle(
        &self,
        vehicle_id: &str,
        kind: ReroutingType,
    ) -> Result<(), DispatchError> {
        let vehicle = self
            .store
            .vehicle(vehicle_id)
            .ok_or_else(|| DispatchError::UnknownVehicle(vehicle_id.to_string()))?;
        let order_id = vehicle
            .transport_order
            .clone()
            .ok_or_else(|| DispatchError::UnknownOrder(format!("{vehicle_id} (no order)")))?;
        let order = self
            .store
            .order(&order_id)
            .ok_or_else(|| DispatchError::UnknownOrder(order_id.clone()))?;

        let strategy: &dyn RerouteStrategy = match kind {
            ReroutingType::Regular => &RegularReroute,
            ReroutingType::Forced => &ForcedReroute,
        };

        match strategy.reroute(&vehicle, &order, self.router.as_ref()) {
            Ok(reroute) => {
                info!(
                    "rerouted vehicle '{vehicle_id}' ({}), {} fresh steps",
                    strategy.name(),
                    reroute.merged.steps.len() - reroute.fresh_from
                );
                // Only the not-yet-driven portion is re-claimed; held
                // resources are untouched
                self.scheduler.set_route(vehicle_id, &reroute.fresh_route())?;
                let drive_index = order.current_drive_order;
                let merged = reroute.merged;
                self.store.modify_order(&order_id, |o| {
                    if let Some(drive_order) = o.drive_orders.get_mut(drive_index) {
                        drive_order.route = Some(merged.clone());
                    }
                })?;
                Ok(())
            }
            Err(err) => {
                warn!("reroute ({}) failed for '{vehicle_id}': {err}", strategy.name());
                match kind {
                    ReroutingType::Regular => {
                        self.release_assignment(&order_id, vehicle_id, OrderState::Dispatchable)?;
                    }
                    ReroutingType::Forced => {
                        self.report_order_failed(&order_id)?;
                    }
                }
                Err(match err {
                    RerouteError::NoRouteFound { .. } => {
                        DispatchError::NoRouteFound { order: order_id }
                    }
                    other => other.into(),
                })
            }
        }
    }

    /// The scheduler this dispatcher commits routes to.
    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    /// The fleet store this dispatcher operates on.
    pub fn store(&self) -> &Arc<FleetStore> {
        &self.store
    }
}
