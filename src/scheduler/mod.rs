//! Exclusive resource scheduling.
//!
//! The scheduler owns the authoritative map of which plant resources are
//! claimed and allocated by which [`ResourceUser`]. Vehicles claim the
//! resource sets of their route up front, then allocate them step by step
//! as they advance; contention is resolved in claim order, which is what
//! makes the protocol deadlock-free (see [`Scheduler`]).
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use agv_kernel::scheduler::{ResourceUser, Scheduler};
//!
//! struct Controller;
//! impl ResourceUser for Controller {
//!     fn id(&self) -> &str { "V1" }
//!     fn allocation_successful(&self, _resources: &[String]) -> bool { true }
//!     fn allocation_failed(&self, _resources: &[String]) {}
//! }
//!
//! let scheduler = Scheduler::new();
//! scheduler.register_user(Arc::new(Controller));
//! scheduler.claim("V1", vec!["P1".to_string()]).unwrap();
//! scheduler.allocate("V1", vec!["P1".to_string()]).unwrap();
//! assert_eq!(scheduler.allocations()["V1"], vec!["P1".to_string()]);
//! ```

mod allocation;

pub use allocation::Scheduler;

use thiserror::Error;

/// A party that claims and allocates plant resources — one per vehicle
/// controller, long-lived.
///
/// Callbacks are invoked outside the scheduler's internal lock, so an
/// implementation may call back into the scheduler.
pub trait ResourceUser: Send + Sync {
    /// Stable identity of this user.
    fn id(&self) -> &str;

    /// Called when a requested set of resources has been allocated to this
    /// user. Returning `false` rejects the allocation; the resources are
    /// released again immediately.
    fn allocation_successful(&self, resources: &[String]) -> bool;

    /// Called when an allocation request has been abandoned. The claim is
    /// retained.
    fn allocation_failed(&self, resources: &[String]);
}

/// Errors reported by [`Scheduler`] operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// The named resource user has not been registered.
    #[error("unknown resource user '{0}'")]
    UnknownResourceUser(String),

    /// The operation is incompatible with the user's current route or
    /// allocation state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A route index outside the user's claim list.
    #[error("route index {index} out of range (claim list has {len} entries)")]
    OutOfRange {
        /// The rejected index.
        index: usize,
        /// Length of the user's claim list.
        len: usize,
    },

    /// A synchronous allocation could not be granted right now.
    #[error("resources cannot be allocated now: {resources:?}")]
    ResourceAllocation {
        /// The resources that were unavailable.
        resources: Vec<String>,
    },
}
