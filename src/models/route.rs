//! Route model.
//!
//! A route is an ordered sequence of steps produced by a router. Each step
//! traverses one path between two points and names the full resource set the
//! step requires: source point, path, destination point, and the members of
//! any block one of them belongs to. Routes are immutable once computed;
//! the dispatcher and scheduler only consume them.

use serde::{Deserialize, Serialize};

/// One movement along a single path of the plant graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Path traversed by this step.
    pub path: String,
    /// Point the step starts at.
    pub source_point: String,
    /// Point the step ends at.
    pub destination_point: String,
    /// Whether the path is traversed in its nominal direction.
    pub forward: bool,
    /// Resources this step requires exclusively.
    ///
    /// Defaults to `{source_point, path, destination_point}`; block members
    /// are added via [`with_resources`](Step::with_resources), typically
    /// using [`PlantModel::expand_with_blocks`](crate::models::PlantModel::expand_with_blocks).
    pub resources: Vec<String>,
}

impl Step {
    /// Creates a forward step with the default resource set.
    pub fn new(
        path: impl Into<String>,
        source_point: impl Into<String>,
        destination_point: impl Into<String>,
    ) -> Self {
        let path = path.into();
        let source_point = source_point.into();
        let destination_point = destination_point.into();
        let resources = vec![
            source_point.clone(),
            path.clone(),
            destination_point.clone(),
        ];
        Self {
            path,
            source_point,
            destination_point,
            forward: true,
            resources,
        }
    }

    /// Marks the step as traversing its path against the nominal direction.
    pub fn reversed(mut self) -> Self {
        self.forward = false;
        self
    }

    /// Replaces the step's required resource set.
    pub fn with_resources(mut self, resources: Vec<String>) -> Self {
        self.resources = resources;
        self
    }
}

/// An ordered sequence of steps with an associated scalar cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Steps in traversal order.
    pub steps: Vec<Step>,
    /// Scalar routing cost, as reported by the router.
    pub cost: i64,
}

impl Route {
    /// Creates a route.
    pub fn new(steps: Vec<Step>, cost: i64) -> Self {
        Self { steps, cost }
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the route has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Final point of the route, if any.
    pub fn final_destination(&self) -> Option<&str> {
        self.steps.last().map(|s| s.destination_point.as_str())
    }

    /// All resources required along the route, in first-use order.
    pub fn required_resources(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut resources = Vec::new();
        for step in &self.steps {
            for r in &step.resources {
                if seen.insert(r.clone()) {
                    resources.push(r.clone());
                }
            }
        }
        resources
    }

    /// Whether the route uses any of the given resources.
    pub fn uses_any_of(&self, resource_ids: &std::collections::HashSet<String>) -> bool {
        self.steps
            .iter()
            .any(|s| s.resources.iter().any(|r| resource_ids.contains(r)))
    }
}
