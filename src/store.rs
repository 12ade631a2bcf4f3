//! Fleet object store.
//!
//! The kernel reads and mutates transport orders, vehicles, and order
//! sequences through this store and emits change events to registered
//! listeners (status APIs, UIs). How those events are transported further
//! is not this crate's concern.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use thiserror::Error;

use crate::models::{OrderSequence, OrderState, TransportOrder, Vehicle};

/// A change to a fleet object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FleetEvent {
    /// A transport order was added.
    OrderCreated(String),
    /// A transport order changed state.
    OrderStateChanged {
        /// The affected order.
        order: String,
        /// The new state.
        state: OrderState,
    },
    /// A transport order changed without a state transition.
    OrderUpdated(String),
    /// A vehicle was added.
    VehicleCreated(String),
    /// A vehicle changed.
    VehicleUpdated(String),
    /// An order sequence was added.
    SequenceCreated(String),
    /// An order sequence changed.
    SequenceUpdated(String),
}

/// Errors reported by store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No object with the given ID exists.
    #[error("no object named '{0}'")]
    Unknown(String),
}

type Listener = Box<dyn Fn(&FleetEvent) + Send + Sync>;

/// Shared, synchronized storage for fleet objects.
///
/// Reads return snapshots; mutation goes through `modify_*` closures, each
/// atomic with respect to other store operations.
#[derive(Default)]
pub struct FleetStore {
    orders: RwLock<HashMap<String, TransportOrder>>,
    vehicles: RwLock<HashMap<String, Vehicle>>,
    sequences: RwLock<HashMap<String, OrderSequence>>,
    listeners: Mutex<Vec<Listener>>,
}

impl FleetStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a change listener.
    pub fn subscribe(&self, listener: impl Fn(&FleetEvent) + Send + Sync + 'static) {
        self.listeners.lock().push(Box::new(listener));
    }

    fn emit(&self, event: FleetEvent) {
        for listener in self.listeners.lock().iter() {
            listener(&event);
        }
    }

    /// Adds a transport order.
    pub fn add_order(&self, order: TransportOrder) {
        let id = order.id.clone();
        self.orders.write().insert(id.clone(), order);
        self.emit(FleetEvent::OrderCreated(id));
    }

    /// Adds a vehicle.
    pub fn add_vehicle(&self, vehicle: Vehicle) {
        let id = vehicle.id.clone();
        self.vehicles.write().insert(id.clone(), vehicle);
        self.emit(FleetEvent::VehicleCreated(id));
    }

    /// Adds an order sequence.
    pub fn add_sequence(&self, sequence: OrderSequence) {
        let id = sequence.id.clone();
        self.sequences.write().insert(id.clone(), sequence);
        self.emit(FleetEvent::SequenceCreated(id));
    }

    /// Snapshot of one order.
    pub fn order(&self, id: &str) -> Option<TransportOrder> {
        self.orders.read().get(id).cloned()
    }

    /// Snapshot of all orders, sorted by ID for deterministic iteration.
    pub fn orders(&self) -> Vec<TransportOrder> {
        let mut orders: Vec<TransportOrder> = self.orders.read().values().cloned().collect();
        orders.sort_by(|a, b| a.id.cmp(&b.id));
        orders
    }

    /// Snapshot of one vehicle.
    pub fn vehicle(&self, id: &str) -> Option<Vehicle> {
        self.vehicles.read().get(id).cloned()
    }

    /// Snapshot of all vehicles, sorted by ID.
    pub fn vehicles(&self) -> Vec<Vehicle> {
        let mut vehicles: Vec<Vehicle> = self.vehicles.read().values().cloned().collect();
        vehicles.sort_by(|a, b| a.id.cmp(&b.id));
        vehicles
    }

    /// Snapshot of one sequence.
    pub fn sequence(&self, id: &str) -> Option<OrderSequence> {
        self.sequences.read().get(id).cloned()
    }

    /// Mutates an order in place, emitting a state-change or update event.
    pub fn modify_order(
        &self,
        id: &str,
        mutate: impl FnOnce(&mut TransportOrder),
    ) -> Result<(), StoreError> {
        let event = {
            let mut orders = self.orders.write();
            let order = orders.get_mut(id).ok_or_else(|| StoreError::Unknown(id.to_string()))?;
            let before = order.state;
            mutate(order);
            if order.state != before {
                FleetEvent::OrderStateChanged {
                    order: id.to_string(),
                    state: order.state,
                }
            } else {
                FleetEvent::OrderUpdated(id.to_string())
            }
        };
        self.emit(event);
        Ok(())
    }

    /// Mutates a vehicle in place.
    pub fn modify_vehicle(
        &self,
        id: &str,
        mutate: impl FnOnce(&mut Vehicle),
    ) -> Result<(), StoreError> {
        {
            let mut vehicles = self.vehicles.write();
            let vehicle = vehicles
                .get_mut(id)
                .ok_or_else(|| StoreError::Unknown(id.to_string()))?;
            mutate(vehicle);
        }
        self.emit(FleetEvent::VehicleUpdated(id.to_string()));
        Ok(())
    }

    /// Mutates a sequence in place.
    pub fn modify_sequence(
        &self,
        id: &str,
        mutate: impl FnOnce(&mut OrderSequence),
    ) -> Result<(), StoreError> {
        {
            let mut sequences = self.sequences.write();
            let sequence = sequences
                .get_mut(id)
                .ok_or_else(|| StoreError::Unknown(id.to_string()))?;
            mutate(sequence);
        }
        self.emit(FleetEvent::SequenceUpdated(id.to_string()));
        Ok(())
    }
}
