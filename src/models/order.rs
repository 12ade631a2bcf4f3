//! Transport order model.
//!
//! A transport order is a unit of work for one vehicle: an ordered list of
//! drive orders (destination + operation), a lifecycle state, and the
//! scheduling metadata the dispatcher acts on (deadline, dependencies,
//! intended vehicle, dispensability).
//!
//! # Lifecycle
//!
//! `Raw → Active → Dispatchable → BeingProcessed → {Finished | Failed |
//! Withdrawn | Unroutable}`. Orders are created externally and mutated only
//! by the dispatcher and by vehicle progress reporting.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::Route;

/// Order type accepted by any vehicle.
pub const ORDER_TYPE_ANY: &str = "*";
/// Operation performed by synthetic parking orders.
pub const OPERATION_PARK: &str = "PARK";
/// Operation performed by synthetic recharge orders.
pub const OPERATION_CHARGE: &str = "CHARGE";
/// No-op operation: just move to the destination.
pub const OPERATION_NOP: &str = "NOP";

/// Lifecycle state of a transport order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderState {
    /// Created but not yet accepted for dispatching.
    Raw,
    /// Accepted; waiting for its dependencies to reach a final state.
    Active,
    /// Ready to be assigned to a vehicle.
    Dispatchable,
    /// Assigned to a vehicle and being executed.
    BeingProcessed,
    /// Completed successfully. Final.
    Finished,
    /// Aborted due to an unrecoverable execution problem. Final.
    Failed,
    /// Cancelled by an operator or by displacement handling. Final.
    Withdrawn,
    /// No vehicle can compute a route for it. Final.
    Unroutable,
}

impl OrderState {
    /// Whether this state is terminal.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            OrderState::Finished
                | OrderState::Failed
                | OrderState::Withdrawn
                | OrderState::Unroutable
        )
    }
}

/// A single destination with an operation to perform there.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveOrder {
    /// Destination point or location ID.
    pub destination: String,
    /// Operation to perform at the destination.
    pub operation: String,
    /// Operation parameters.
    pub properties: HashMap<String, String>,
    /// Route to the destination, attached when the order is assigned.
    pub route: Option<Route>,
}

impl DriveOrder {
    /// Creates a drive order.
    pub fn new(destination: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            operation: operation.into(),
            properties: HashMap::new(),
            route: None,
        }
    }

    /// Adds an operation parameter.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// A transport order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportOrder {
    /// Unique order identifier.
    pub id: String,
    /// Order type, matched against vehicles' acceptable order types.
    pub order_type: String,
    /// Destinations to visit, in order.
    pub drive_orders: Vec<DriveOrder>,
    /// Index of the drive order currently being processed.
    pub current_drive_order: usize,
    /// Lifecycle state.
    pub state: OrderState,
    /// Creation time (ms since the epoch the consumer defines).
    pub creation_time_ms: i64,
    /// Latest acceptable completion time (ms). `None` = no deadline.
    pub deadline_ms: Option<i64>,
    /// Vehicle that must process this order, if constrained.
    pub intended_vehicle: Option<String>,
    /// Order sequence this order belongs to, if any.
    pub wrapping_sequence: Option<String>,
    /// Orders that must reach a final state before this one is dispatchable.
    pub dependencies: Vec<String>,
    /// Whether a higher-priority candidate may displace this order from its
    /// assigned vehicle.
    pub dispensable: bool,
    /// Vehicle currently processing this order.
    pub processing_vehicle: Option<String>,
    /// Domain-specific metadata.
    pub attributes: HashMap<String, String>,
}

impl TransportOrder {
    /// Creates a raw transport order.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            order_type: ORDER_TYPE_ANY.to_string(),
            drive_orders: Vec::new(),
            current_drive_order: 0,
            state: OrderState::Raw,
            creation_time_ms: 0,
            deadline_ms: None,
            intended_vehicle: None,
            wrapping_sequence: None,
            dependencies: Vec::new(),
            dispensable: false,
            processing_vehicle: None,
            attributes: HashMap::new(),
        }
    }

    /// Sets the order type.
    pub fn with_order_type(mut self, order_type: impl Into<String>) -> Self {
        self.order_type = order_type.into();
        self
    }

    /// Adds a drive order.
    pub fn with_drive_order(mut self, drive_order: DriveOrder) -> Self {
        self.drive_orders.push(drive_order);
        self
    }

    /// Adds a destination with the given operation.
    pub fn with_destination(
        self,
        destination: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        self.with_drive_order(DriveOrder::new(destination, operation))
    }

    /// Sets the creation time.
    pub fn with_creation_time(mut self, creation_time_ms: i64) -> Self {
        self.creation_time_ms = creation_time_ms;
        self
    }

    /// Sets the deadline.
    pub fn with_deadline(mut self, deadline_ms: i64) -> Self {
        self.deadline_ms = Some(deadline_ms);
        self
    }

    /// Constrains processing to one specific vehicle.
    pub fn with_intended_vehicle(mut self, vehicle_id: impl Into<String>) -> Self {
        self.intended_vehicle = Some(vehicle_id.into());
        self
    }

    /// Attaches the order to an order sequence.
    pub fn with_wrapping_sequence(mut self, sequence_id: impl Into<String>) -> Self {
        self.wrapping_sequence = Some(sequence_id.into());
        self
    }

    /// Adds a dependency on another order reaching a final state.
    pub fn with_dependency(mut self, order_id: impl Into<String>) -> Self {
        self.dependencies.push(order_id.into());
        self
    }

    /// Marks the order as displaceable by higher-priority candidates.
    pub fn with_dispensable(mut self, dispensable: bool) -> Self {
        self.dispensable = dispensable;
        self
    }

    /// Sets the initial state.
    pub fn with_state(mut self, state: OrderState) -> Self {
        self.state = state;
        self
    }

    /// Adds a domain-specific attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Whether the order has reached a terminal state.
    pub fn is_final(&self) -> bool {
        self.state.is_final()
    }

    /// Final destination across all drive orders, if any.
    pub fn final_destination(&self) -> Option<&str> {
        self.drive_orders.last().map(|d| d.destination.as_str())
    }

    /// Destinations of the drive orders not yet completed.
    pub fn remaining_destinations(&self) -> Vec<String> {
        self.drive_orders[self.current_drive_order.min(self.drive_orders.len())..]
            .iter()
            .map(|d| d.destination.clone())
            .collect()
    }

    /// Age of the order at the given time (ms, never negative).
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        (now_ms - self.creation_time_ms).max(0)
    }

    /// Whether the deadline is within `window_ms` of `now_ms` (or already
    /// passed). Orders without a deadline are never at risk.
    pub fn deadline_at_risk(&self, now_ms: i64, window_ms: i64) -> bool {
        match self.deadline_ms {
            Some(deadline) => deadline - now_ms <= window_ms,
            None => false,
        }
    }
}
