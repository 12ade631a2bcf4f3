//! Plant resource model.
//!
//! Resources are the elements of the plant graph that vehicles occupy
//! exclusively while moving: points (nodes) and paths (edges). Points may
//! belong to blocks — named groups of which at most one member may be
//! occupied at a time, independent of any route.
//!
//! # Reference
//! Vis (2006), "Survey of research in the design and control of automated
//! guided vehicle systems"

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A plant resource that vehicles use exclusively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    /// Unique resource identifier.
    pub id: String,
    /// Resource classification.
    pub kind: ResourceKind,
    /// Role of a point in idle-vehicle handling. `None` for paths.
    pub point_kind: Option<PointKind>,
    /// Blocks this resource belongs to.
    pub blocks: Vec<String>,
    /// Operator lock. Locked resources disqualify routes that use them.
    pub locked: bool,
    /// Domain-specific metadata.
    pub attributes: HashMap<String, String>,
}

/// Resource classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceKind {
    /// A node of the plant graph where a vehicle can stand.
    Point,
    /// An edge of the plant graph connecting two points.
    Path,
}

/// Role of a point for vehicles without a transport order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointKind {
    /// Regular stopping position.
    Halt,
    /// Designated parking position for idle vehicles.
    Park,
    /// Position where a vehicle can recharge its energy storage.
    Recharge,
}

/// A named set of points of which at most one may be occupied at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    /// Unique block identifier.
    pub id: String,
    /// Member resource IDs.
    pub members: Vec<String>,
}

impl Resource {
    /// Creates a new resource.
    pub fn new(id: impl Into<String>, kind: ResourceKind) -> Self {
        let is_point = kind == ResourceKind::Point;
        Self {
            id: id.into(),
            kind,
            point_kind: is_point.then_some(PointKind::Halt),
            blocks: Vec::new(),
            locked: false,
            attributes: HashMap::new(),
        }
    }

    /// Creates a point resource.
    pub fn point(id: impl Into<String>) -> Self {
        Self::new(id, ResourceKind::Point)
    }

    /// Creates a path resource.
    pub fn path(id: impl Into<String>) -> Self {
        Self::new(id, ResourceKind::Path)
    }

    /// Sets the point kind.
    pub fn with_point_kind(mut self, point_kind: PointKind) -> Self {
        self.point_kind = Some(point_kind);
        self
    }

    /// Adds a block membership.
    pub fn with_block(mut self, block_id: impl Into<String>) -> Self {
        self.blocks.push(block_id.into());
        self
    }

    /// Sets the operator lock.
    pub fn with_locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }

    /// Adds a domain-specific attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Whether this resource is a point.
    pub fn is_point(&self) -> bool {
        self.kind == ResourceKind::Point
    }

    /// Whether this point is a designated parking position.
    pub fn is_park_position(&self) -> bool {
        self.point_kind == Some(PointKind::Park)
    }

    /// Whether this point is a recharge position.
    pub fn is_recharge_position(&self) -> bool {
        self.point_kind == Some(PointKind::Recharge)
    }
}

impl Block {
    /// Creates a new block.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            members: Vec::new(),
        }
    }

    /// Adds a member resource.
    pub fn with_member(mut self, resource_id: impl Into<String>) -> Self {
        self.members.push(resource_id.into());
        self
    }

    /// Whether the block contains the given resource.
    pub fn contains(&self, resource_id: &str) -> bool {
        self.members.iter().any(|m| m == resource_id)
    }
}

/// Read-only view of the plant graph's resources and blocks.
///
/// The plant topology is immutable once built; topology changes are handled
/// by replacing the whole model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlantModel {
    resources: HashMap<String, Resource>,
    blocks: HashMap<String, Block>,
}

impl PlantModel {
    /// Creates an empty plant model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a resource.
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resources.insert(resource.id.clone(), resource);
        self
    }

    /// Adds a block and records the membership on its member resources.
    pub fn with_block(mut self, block: Block) -> Self {
        for member in &block.members {
            if let Some(resource) = self.resources.get_mut(member) {
                if !resource.blocks.iter().any(|b| b == &block.id) {
                    resource.blocks.push(block.id.clone());
                }
            }
        }
        self.blocks.insert(block.id.clone(), block);
        self
    }

    /// Looks up a resource by ID.
    pub fn resource(&self, id: &str) -> Option<&Resource> {
        self.resources.get(id)
    }

    /// Looks up a block by ID.
    pub fn block(&self, id: &str) -> Option<&Block> {
        self.blocks.get(id)
    }

    /// Whether the plant contains the given resource.
    pub fn contains(&self, id: &str) -> bool {
        self.resources.contains_key(id)
    }

    /// All resources.
    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.values()
    }

    /// Unlocked parking positions.
    pub fn park_positions(&self) -> Vec<&Resource> {
        self.resources
            .values()
            .filter(|r| r.is_park_position() && !r.locked)
            .collect()
    }

    /// Unlocked recharge positions.
    pub fn recharge_positions(&self) -> Vec<&Resource> {
        self.resources
            .values()
            .filter(|r| r.is_recharge_position() && !r.locked)
            .collect()
    }

    /// IDs of all locked resources.
    pub fn locked_resources(&self) -> HashSet<String> {
        self.resources
            .values()
            .filter(|r| r.locked)
            .map(|r| r.id.clone())
            .collect()
    }

    /// Expands a set of resource IDs with the members of every block any of
    /// them belongs to.
    ///
    /// Occupying one member of a block requires exclusive use of the whole
    /// block, so a route step over a blocked point claims all members.
    pub fn expand_with_blocks(&self, resource_ids: &[String]) -> Vec<String> {
        let mut expanded: Vec<String> = resource_ids.to_vec();
        let mut seen: HashSet<String> = resource_ids.iter().cloned().collect();

        for id in resource_ids {
            if let Some(resource) = self.resources.get(id) {
                for block_id in &resource.blocks {
                    if let Some(block) = self.blocks.get(block_id) {
                        for member in &block.members {
                            if seen.insert(member.clone()) {
                                expanded.push(member.clone());
                            }
                        }
                    }
                }
            }
        }

        expanded
    }
}
