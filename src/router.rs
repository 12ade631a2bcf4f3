//! Router seam.
//!
//! The kernel consumes routes; it does not compute them. A [`Router`]
//! implementation owns the shortest-path algorithm and its edge weighting —
//! both outside this crate's scope — and returns immutable [`Route`]s with
//! an associated scalar cost.

use crate::models::{Route, Vehicle};
use std::collections::HashMap;

/// Computes routes over the plant graph.
///
/// Implementations must be deterministic for a given plant state: the
/// dispatcher relies on identical inputs producing identical routes.
pub trait Router: Send + Sync {
    /// Computes a route for `vehicle` from `origin` through `destinations`
    /// in order. Returns `None` if no route exists.
    fn compute_route(
        &self,
        vehicle: &Vehicle,
        origin: &str,
        destinations: &[String],
    ) -> Option<Route>;
}

/// A table-backed router.
///
/// Serves routes from a fixed `(origin, destination)` table, chaining table
/// entries for multi-destination queries and summing their costs. Suited to
/// fixed-route plants and to tests.
#[derive(Debug, Clone, Default)]
pub struct TableRouter {
    routes: HashMap<(String, String), Route>,
}

impl TableRouter {
    /// Creates an empty table router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a route from `origin` to `destination`.
    pub fn with_route(
        mut self,
        origin: impl Into<String>,
        destination: impl Into<String>,
        route: Route,
    ) -> Self {
        self.routes.insert((origin.into(), destination.into()), route);
        self
    }
}

impl Router for TableRouter {
    fn compute_route(
        &self,
        _vehicle: &Vehicle,
        origin: &str,
        destinations: &[String],
    ) -> Option<Route> {
        if destinations.is_empty() {
            return None;
        }

        let mut steps = Vec::new();
        let mut cost = 0;
        let mut current = origin.to_string();

        for destination in destinations {
            if &current == destination {
                continue;
            }
            let leg = self.routes.get(&(current.clone(), destination.clone()))?;
            steps.extend(leg.steps.iter().cloned());
            cost += leg.cost;
            current = destination.clone();
        }

        Some(Route::new(steps, cost))
    }
}
