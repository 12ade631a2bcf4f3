//! Dispatch context for filter and rule evaluation.

use std::collections::{HashMap, HashSet};

/// Pass-local state handed to filters and candidate rules.
///
/// Built once at the start of each dispatch pass from a consistent snapshot
/// of the fleet. All times are in milliseconds on the consumer's clock.
#[derive(Debug, Clone, Default)]
pub struct DispatchContext {
    /// Time the pass started (ms).
    pub now_ms: i64,
    /// Resources currently locked by an operator.
    pub locked_resources: HashSet<String>,
    /// Final destinations of orders currently being processed.
    pub reserved_destinations: HashSet<String>,
    /// Points occupied by vehicles (vehicle ID → point ID).
    pub vehicle_positions: HashMap<String, String>,
}

impl DispatchContext {
    /// Creates a context at the given time.
    pub fn at_time(now_ms: i64) -> Self {
        Self {
            now_ms,
            ..Default::default()
        }
    }

    /// Sets the locked resources.
    pub fn with_locked_resources(mut self, locked: HashSet<String>) -> Self {
        self.locked_resources = locked;
        self
    }

    /// Marks a destination as reserved by an executing order.
    pub fn with_reserved_destination(mut self, point_id: impl Into<String>) -> Self {
        self.reserved_destinations.insert(point_id.into());
        self
    }

    /// Records a vehicle's position.
    pub fn with_vehicle_position(
        mut self,
        vehicle_id: impl Into<String>,
        point_id: impl Into<String>,
    ) -> Self {
        self.vehicle_positions
            .insert(vehicle_id.into(), point_id.into());
        self
    }

    /// Points currently occupied by any vehicle.
    pub fn occupied_points(&self) -> HashSet<String> {
        self.vehicle_positions.values().cloned().collect()
    }
}
