//! Fleet domain models.
//!
//! Provides the core data types of the orchestration kernel: the plant
//! graph's resources, routes over it, transport orders, order sequences,
//! and vehicle snapshots.
//!
//! # Domain Mappings
//!
//! | agv-kernel | Warehouse | Container Terminal | Hospital Logistics |
//! |------------|-----------|--------------------|--------------------|
//! | Resource | Aisle node/segment | Lane section | Corridor section |
//! | TransportOrder | Pallet move | Container move | Cart delivery |
//! | Vehicle | Forklift AGV | Straddle carrier | Tug AGV |
//! | Block | One-lane aisle | Crane workspace | Airlock |

mod order;
mod resource;
mod route;
mod sequence;
mod vehicle;

pub use order::{
    DriveOrder, OrderState, TransportOrder, OPERATION_CHARGE, OPERATION_NOP, OPERATION_PARK,
    ORDER_TYPE_ANY,
};
pub use resource::{Block, PlantModel, PointKind, Resource, ResourceKind};
pub use route::{Route, Step};
pub use sequence::OrderSequence;
pub use vehicle::{
    IntegrationLevel, OrderTypeAcceptance, ProcState, Vehicle, VehicleState,
};
