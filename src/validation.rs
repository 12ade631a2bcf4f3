//! Input validation for fleet data.
//!
//! Checks structural integrity of transport orders, vehicles, and the
//! plant model before they enter the dispatch loop. Detects:
//! - Duplicate IDs
//! - Dangling references (destinations, intended vehicles, dependencies)
//! - Circular order dependencies
//! - Orders without destinations
//!
//! # Reference
//! Cormen et al. (2009), "Introduction to Algorithms", Ch. 22.4 (Topological Sort)

use crate::models::{PlantModel, TransportOrder, Vehicle};
use std::collections::{HashMap, HashSet, VecDeque};

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Two entities share the same ID.
    DuplicateId,
    /// A drive order or vehicle references a resource that doesn't exist.
    InvalidResourceReference,
    /// An order references a vehicle that doesn't exist.
    InvalidVehicleReference,
    /// An order depends on an order that doesn't exist.
    InvalidDependency,
    /// The dependency graph contains a cycle.
    CyclicDependency,
    /// An order has no drive orders.
    EmptyOrder,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Validates fleet input data.
///
/// Checks:
/// 1. No duplicate order IDs
/// 2. No duplicate vehicle IDs
/// 3. All orders have at least one drive order
/// 4. All drive order destinations exist in the plant
/// 5. All intended-vehicle references point to existing vehicles
/// 6. All dependencies point to existing orders
/// 7. No circular dependencies between orders
/// 8. All vehicle positions exist in the plant
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn validate_fleet(
    orders: &[TransportOrder],
    vehicles: &[Vehicle],
    plant: &PlantModel,
) -> ValidationResult {
    let mut errors = Vec::new();

    let mut order_ids = HashSet::new();
    for order in orders {
        if !order_ids.insert(order.id.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate order ID: {}", order.id),
            ));
        }
        if order.drive_orders.is_empty() {
            errors.push(ValidationError::new(
                ValidationErrorKind::EmptyOrder,
                format!("Order '{}' has no drive orders", order.id),
            ));
        }
    }

    let mut vehicle_ids = HashSet::new();
    for vehicle in vehicles {
        if !vehicle_ids.insert(vehicle.id.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate vehicle ID: {}", vehicle.id),
            ));
        }
        if let Some(position) = &vehicle.position {
            if !plant.contains(position) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::InvalidResourceReference,
                    format!(
                        "Vehicle '{}' stands on unknown resource '{}'",
                        vehicle.id, position
                    ),
                ));
            }
        }
    }

    for order in orders {
        for drive_order in &order.drive_orders {
            if !plant.contains(&drive_order.destination) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::InvalidResourceReference,
                    format!(
                        "Order '{}' targets unknown destination '{}'",
                        order.id, drive_order.destination
                    ),
                ));
            }
        }
        if let Some(intended) = &order.intended_vehicle {
            if !vehicle_ids.contains(intended.as_str()) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::InvalidVehicleReference,
                    format!(
                        "Order '{}' is intended for unknown vehicle '{}'",
                        order.id, intended
                    ),
                ));
            }
        }
        for dependency in &order.dependencies {
            if !order_ids.contains(dependency.as_str()) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::InvalidDependency,
                    format!(
                        "Order '{}' depends on unknown order '{}'",
                        order.id, dependency
                    ),
                ));
            }
        }
    }

    if let Some(cycle_error) = detect_dependency_cycle(orders) {
        errors.push(cycle_error);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Kahn's algorithm over the order dependency graph. Any node left
/// unprocessed sits on a cycle.
fn detect_dependency_cycle(orders: &[TransportOrder]) -> Option<ValidationError> {
    let known: HashSet<&str> = orders.iter().map(|o| o.id.as_str()).collect();

    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for order in orders {
        in_degree.entry(order.id.as_str()).or_insert(0);
        for dependency in &order.dependencies {
            if known.contains(dependency.as_str()) {
                *in_degree.entry(order.id.as_str()).or_insert(0) += 1;
                dependents
                    .entry(dependency.as_str())
                    .or_default()
                    .push(order.id.as_str());
            }
        }
    }

    let mut queue: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut processed = 0usize;

    while let Some(id) = queue.pop_front() {
        processed += 1;
        if let Some(children) = dependents.get(id) {
            for &child in children {
                let degree = in_degree.get_mut(child).expect("child was registered");
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(child);
                }
            }
        }
    }

    if processed < in_degree.len() {
        let mut cyclic: Vec<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree > 0)
            .map(|(id, _)| *id)
            .collect();
        cyclic.sort_unstable();
        Some(ValidationError::new(
            ValidationErrorKind::CyclicDependency,
            format!("Orders form a dependency cycle: {cyclic:?}"),
        ))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Resource, OPERATION_NOP};

    fn plant() -> PlantModel {
        PlantModel::new()
            .with_resource(Resource::point("P1"))
            .with_resource(Resource::point("P2"))
    }

    fn order_to(id: &str, destination: &str) -> TransportOrder {
        TransportOrder::new(id).with_destination(destination, OPERATION_NOP)
    }

    #[test]
    fn test_valid_input() {
        let orders = vec![order_to("TO-1", "P1"), order_to("TO-2", "P2")];
        let vehicles = vec![Vehicle::new("V1").with_position("P1")];
        assert!(validate_fleet(&orders, &vehicles, &plant()).is_ok());
    }

    #[test]
    fn test_duplicate_order_ids() {
        let orders = vec![order_to("TO-1", "P1"), order_to("TO-1", "P2")];
        let errors = validate_fleet(&orders, &[], &plant()).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::DuplicateId));
    }

    #[test]
    fn test_empty_order() {
        let orders = vec![TransportOrder::new("TO-1")];
        let errors = validate_fleet(&orders, &[], &plant()).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::EmptyOrder));
    }

    #[test]
    fn test_unknown_destination() {
        let orders = vec![order_to("TO-1", "P9")];
        let errors = validate_fleet(&orders, &[], &plant()).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::InvalidResourceReference));
    }

    #[test]
    fn test_unknown_intended_vehicle() {
        let orders = vec![order_to("TO-1", "P1").with_intended_vehicle("V9")];
        let errors = validate_fleet(&orders, &[], &plant()).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::InvalidVehicleReference));
    }

    #[test]
    fn test_unknown_dependency() {
        let orders = vec![order_to("TO-1", "P1").with_dependency("TO-9")];
        let errors = validate_fleet(&orders, &[], &plant()).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::InvalidDependency));
    }

    #[test]
    fn test_vehicle_on_unknown_resource() {
        let vehicles = vec![Vehicle::new("V1").with_position("P9")];
        let errors = validate_fleet(&[], &vehicles, &plant()).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::InvalidResourceReference));
    }

    #[test]
    fn test_dependency_cycle_detected() {
        let orders = vec![
            order_to("TO-1", "P1").with_dependency("TO-2"),
            order_to("TO-2", "P2").with_dependency("TO-1"),
        ];
        let errors = validate_fleet(&orders, &[], &plant()).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::CyclicDependency));
    }

    #[test]
    fn test_dependency_chain_is_acyclic() {
        let orders = vec![
            order_to("TO-1", "P1"),
            order_to("TO-2", "P2").with_dependency("TO-1"),
            order_to("TO-3", "P1").with_dependency("TO-2"),
        ];
        assert!(validate_fleet(&orders, &[], &plant()).is_ok());
    }

    #[test]
    fn test_all_errors_collected() {
        let orders = vec![
            TransportOrder::new("TO-1"),                       // empty
            order_to("TO-1", "P9").with_dependency("TO-404"), // dup + unknown dest + dep
        ];
        let errors = validate_fleet(&orders, &[], &plant()).unwrap_err();
        assert!(errors.len() >= 4);
    }
}
