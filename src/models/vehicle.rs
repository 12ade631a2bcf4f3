//! Vehicle model.
//!
//! A read-only snapshot of one AGV as the dispatcher sees it: integration
//! level, processing and operational state, energy bookkeeping, position,
//! and the order types it accepts. The snapshot also mirrors the vehicle's
//! claimed and allocated resources for introspection; the authoritative
//! allocation state lives in the scheduler.
//!
//! # Reference
//! Le-Anh & De Koster (2006), "A review of design and control of automated
//! guided vehicle systems"

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::ORDER_TYPE_ANY;

/// How far a vehicle is integrated into the fleet.
///
/// Only `ToBeUtilized` vehicles receive transport orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegrationLevel {
    /// Ignored entirely.
    ToBeIgnored,
    /// Position is tracked, resources are not claimed.
    ToBeNoticed,
    /// Resources are claimed/allocated, but no orders are assigned.
    ToBeRespected,
    /// Fully integrated: orders are assigned.
    ToBeUtilized,
}

/// Whether the vehicle is working on a transport order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcState {
    /// Not processing any order.
    Idle,
    /// Assigned an order, waiting to start moving.
    AwaitingOrder,
    /// Executing its current order.
    ProcessingOrder,
}

/// Operational state reported by the vehicle's controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VehicleState {
    /// No communication established.
    Unknown,
    /// Communicating but not usable.
    Unavailable,
    /// In an error state requiring intervention.
    Error,
    /// Ready for movement orders.
    Idle,
    /// Executing a movement order.
    Executing,
    /// Recharging its energy storage.
    Charging,
}

/// An order type a vehicle accepts, with a selection priority.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderTypeAcceptance {
    /// Order type name, or [`ORDER_TYPE_ANY`] for all types.
    pub name: String,
    /// Priority among this vehicle's acceptable types (lower = preferred).
    pub priority: i32,
}

/// A vehicle snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    /// Unique vehicle identifier.
    pub id: String,
    /// Fleet integration level.
    pub integration_level: IntegrationLevel,
    /// Order processing state.
    pub proc_state: ProcState,
    /// Operational state reported by the controller.
    pub state: VehicleState,
    /// Energy level in percent (0–100).
    pub energy_level: u32,
    /// Below this level the vehicle must not take orders.
    pub energy_level_critical: u32,
    /// Below this level the vehicle should recharge when idle.
    pub energy_level_good: u32,
    /// A charging vehicle resumes taking orders at this level.
    pub energy_level_sufficiently_recharged: u32,
    /// Charging normally continues up to this level.
    pub energy_level_fully_recharged: u32,
    /// Current position (point resource ID), if known.
    pub position: Option<String>,
    /// Transport order currently assigned.
    pub transport_order: Option<String>,
    /// Order sequence currently being processed.
    pub order_sequence: Option<String>,
    /// Index of the last route step the vehicle reported as completed, for
    /// the current drive order. `None` before the first report.
    pub route_progress: Option<usize>,
    /// Order types this vehicle accepts.
    pub acceptable_order_types: Vec<OrderTypeAcceptance>,
    /// Mirror of the resource sets claimed for the remaining route.
    pub claimed_resources: Vec<Vec<String>>,
    /// Mirror of the resources currently allocated.
    pub allocated_resources: Vec<String>,
    /// Domain-specific metadata.
    pub attributes: HashMap<String, String>,
}

impl Vehicle {
    /// Creates a vehicle with full integration and sane energy thresholds.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            integration_level: IntegrationLevel::ToBeUtilized,
            proc_state: ProcState::Idle,
            state: VehicleState::Idle,
            energy_level: 100,
            energy_level_critical: 10,
            energy_level_good: 30,
            energy_level_sufficiently_recharged: 60,
            energy_level_fully_recharged: 95,
            position: None,
            transport_order: None,
            order_sequence: None,
            route_progress: None,
            acceptable_order_types: vec![OrderTypeAcceptance {
                name: ORDER_TYPE_ANY.to_string(),
                priority: 0,
            }],
            claimed_resources: Vec::new(),
            allocated_resources: Vec::new(),
            attributes: HashMap::new(),
        }
    }

    /// Sets the integration level.
    pub fn with_integration_level(mut self, level: IntegrationLevel) -> Self {
        self.integration_level = level;
        self
    }

    /// Sets the current position.
    pub fn with_position(mut self, point_id: impl Into<String>) -> Self {
        self.position = Some(point_id.into());
        self
    }

    /// Sets the energy level.
    pub fn with_energy_level(mut self, percent: u32) -> Self {
        self.energy_level = percent.min(100);
        self
    }

    /// Sets the named energy thresholds.
    pub fn with_energy_thresholds(
        mut self,
        critical: u32,
        good: u32,
        sufficiently_recharged: u32,
        fully_recharged: u32,
    ) -> Self {
        self.energy_level_critical = critical;
        self.energy_level_good = good;
        self.energy_level_sufficiently_recharged = sufficiently_recharged;
        self.energy_level_fully_recharged = fully_recharged;
        self
    }

    /// Replaces the acceptable order types.
    pub fn with_acceptable_order_type(
        mut self,
        name: impl Into<String>,
        priority: i32,
    ) -> Self {
        let name = name.into();
        self.acceptable_order_types
            .retain(|t| t.name != ORDER_TYPE_ANY || name == ORDER_TYPE_ANY);
        self.acceptable_order_types
            .push(OrderTypeAcceptance { name, priority });
        self
    }

    /// Sets the operational state.
    pub fn with_state(mut self, state: VehicleState) -> Self {
        self.state = state;
        self
    }

    /// Adds a domain-specific attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Whether this vehicle accepts orders of the given type.
    pub fn accepts_order_type(&self, order_type: &str) -> bool {
        self.acceptable_order_types
            .iter()
            .any(|t| t.name == ORDER_TYPE_ANY || t.name == order_type)
    }

    /// Whether the energy level is at or below the critical threshold.
    pub fn is_energy_critical(&self) -> bool {
        self.energy_level <= self.energy_level_critical
    }

    /// Whether the vehicle should recharge when it has nothing else to do.
    pub fn needs_charging(&self) -> bool {
        self.energy_level < self.energy_level_good
    }

    /// Whether a charging vehicle has recharged enough to take orders again.
    pub fn is_sufficiently_recharged(&self) -> bool {
        self.energy_level >= self.energy_level_sufficiently_recharged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vehicle_builder() {
        let v = Vehicle::new("V1")
            .with_position("P1")
            .with_energy_level(80)
            .with_energy_thresholds(15, 40, 70, 100)
            .with_attribute("model", "KMP-600");

        assert_eq!(v.id, "V1");
        assert_eq!(v.integration_level, IntegrationLevel::ToBeUtilized);
        assert_eq!(v.proc_state, ProcState::Idle);
        assert_eq!(v.position.as_deref(), Some("P1"));
        assert_eq!(v.energy_level, 80);
        assert_eq!(v.energy_level_critical, 15);
        assert_eq!(v.energy_level_fully_recharged, 100);
    }

    #[test]
    fn test_energy_level_clamped() {
        let v = Vehicle::new("V1").with_energy_level(250);
        assert_eq!(v.energy_level, 100);
    }

    #[test]
    fn test_accepts_any_order_type_by_default() {
        let v = Vehicle::new("V1");
        assert!(v.accepts_order_type("Transport"));
        assert!(v.accepts_order_type("anything"));
    }

    #[test]
    fn test_specific_order_types_replace_wildcard() {
        let v = Vehicle::new("V1")
            .with_acceptable_order_type("Transport", 0)
            .with_acceptable_order_type("Park", 1);
        assert!(v.accepts_order_type("Transport"));
        assert!(v.accepts_order_type("Park"));
        assert!(!v.accepts_order_type("Recharge"));
    }

    #[test]
    fn test_energy_predicates() {
        let v = Vehicle::new("V1")
            .with_energy_thresholds(10, 30, 60, 95)
            .with_energy_level(5);
        assert!(v.is_energy_critical());
        assert!(v.needs_charging());
        assert!(!v.is_sufficiently_recharged());

        let v = v.with_energy_level(25);
        assert!(!v.is_energy_critical());
        assert!(v.needs_charging());

        let v = v.with_energy_level(75);
        assert!(!v.needs_charging());
        assert!(v.is_sufficiently_recharged());
    }
}
