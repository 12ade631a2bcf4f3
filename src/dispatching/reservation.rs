//! Pass-local order reservations.
//!
//! During a dispatch pass, an order is provisionally reserved for a vehicle
//! before the assignment is committed, so the candidate generator never
//! offers the same order to two vehicles — and never treats a vehicle as
//! free while it is mid-negotiation — without a global lock across the
//! whole pipeline. Entries are cleared at the end of each pass or on
//! explicit commit/withdrawal.

use std::collections::{HashMap, HashSet};

/// Provisional order ↔ vehicle pairings of the current dispatch pass.
#[derive(Debug, Clone, Default)]
pub struct OrderReservationPool {
    /// order ID → vehicles that reserved it.
    reservations: HashMap<String, HashSet<String>>,
}

impl OrderReservationPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves an order for a vehicle.
    pub fn reserve(&mut self, order_id: impl Into<String>, vehicle_id: impl Into<String>) {
        self.reservations
            .entry(order_id.into())
            .or_default()
            .insert(vehicle_id.into());
    }

    /// Orders reserved by the given vehicle, sorted.
    pub fn reservations_for(&self, vehicle_id: &str) -> Vec<String> {
        let mut orders: Vec<String> = self
            .reservations
            .iter()
            .filter(|(_, vehicles)| vehicles.contains(vehicle_id))
            .map(|(order, _)| order.clone())
            .collect();
        orders.sort();
        orders
    }

    /// Whether any vehicle has reserved the order.
    pub fn is_reserved(&self, order_id: &str) -> bool {
        self.reservations
            .get(order_id)
            .is_some_and(|vehicles| !vehicles.is_empty())
    }

    /// Whether a vehicle other than `vehicle_id` has reserved the order.
    pub fn is_reserved_by_other(&self, order_id: &str, vehicle_id: &str) -> bool {
        self.reservations
            .get(order_id)
            .is_some_and(|vehicles| vehicles.iter().any(|v| v != vehicle_id))
    }

    /// Removes all reservations of an order.
    pub fn remove_order(&mut self, order_id: &str) {
        self.reservations.remove(order_id);
    }

    /// Removes every reservation held by a vehicle.
    pub fn remove_vehicle(&mut self, vehicle_id: &str) {
        for vehicles in self.reservations.values_mut() {
            vehicles.remove(vehicle_id);
        }
        self.reservations.retain(|_, vehicles| !vehicles.is_empty());
    }

    /// Clears the pool.
    pub fn clear(&mut self) {
        self.reservations.clear();
    }

    /// Number of reserved orders.
    pub fn len(&self) -> usize {
        self.reservations.len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.reservations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_and_query() {
        let mut pool = OrderReservationPool::new();
        pool.reserve("TO-1", "V1");

        assert!(pool.is_reserved("TO-1"));
        assert!(!pool.is_reserved("TO-2"));
        assert!(pool.is_reserved_by_other("TO-1", "V2"));
        assert!(!pool.is_reserved_by_other("TO-1", "V1"));
        assert_eq!(pool.reservations_for("V1"), vec!["TO-1".to_string()]);
    }

    #[test]
    fn test_remove_order() {
        let mut pool = OrderReservationPool::new();
        pool.reserve("TO-1", "V1");
        pool.remove_order("TO-1");
        assert!(!pool.is_reserved("TO-1"));
        assert!(pool.is_empty());
    }

    #[test]
    fn test_remove_vehicle() {
        let mut pool = OrderReservationPool::new();
        pool.reserve("TO-1", "V1");
        pool.reserve("TO-2", "V1");
        pool.reserve("TO-2", "V2");

        pool.remove_vehicle("V1");
        assert!(!pool.is_reserved("TO-1"));
        assert!(pool.is_reserved("TO-2")); // V2's reservation survives
        assert!(pool.reservations_for("V1").is_empty());
    }

    #[test]
    fn test_clear() {
        let mut pool = OrderReservationPool::new();
        pool.reserve("TO-1", "V1");
        pool.reserve("TO-2", "V2");
        pool.clear();
        assert!(pool.is_empty());
        assert_eq!(pool.len(), 0);
    }
}
