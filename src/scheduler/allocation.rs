//! Claim/allocate/free arbitration.
//!
//! # Deadlock avoidance
//!
//! Pending allocation requests wait in a queue per resource, ordered by the
//! time the requester *claimed* that resource (a logical counter, not the
//! request time). A request is granted only when, for every resource it
//! asks for, the resource is unheld (or held by the requester) and the
//! requester heads that resource's queue. Every resource serves its waiters
//! in the same stable order, so as long as holders eventually free what
//! they hold, no cycle of mutual waiting persists: the total order over
//! claim times breaks ties identically across all resources.
//!
//! All state mutation happens inside a single critical section; user
//! callbacks are invoked strictly outside of it, so a callback may re-enter
//! the scheduler.

use log::{debug, warn};
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::{ResourceUser, SchedulerError};
use crate::models::Route;

struct UserEntry {
    user: Arc<dyn ResourceUser>,
    /// Claim sets in route order, followed by any ad-hoc claims.
    claim: Vec<Vec<String>>,
    /// First claim entry still ahead of the vehicle.
    route_index: usize,
}

struct PendingRequest {
    user_id: String,
    resources: Vec<String>,
    request_seq: u64,
}

enum Outcome {
    Granted,
    Abandoned,
}

struct Delivery {
    user: Arc<dyn ResourceUser>,
    user_id: String,
    resources: Vec<String>,
    outcome: Outcome,
}

#[derive(Default)]
struct Inner {
    users: HashMap<String, UserEntry>,
    /// resource → holder.
    allocations: HashMap<String, String>,
    /// resource → user → logical claim time.
    claim_seq: HashMap<String, HashMap<String, u64>>,
    pending: Vec<PendingRequest>,
    next_claim_seq: u64,
    next_request_seq: u64,
}

/// Grants exclusive use of plant resources to [`ResourceUser`]s.
///
/// See the [module docs](crate::scheduler) for the protocol and the
/// arbitration rule.
#[derive(Default)]
pub struct Scheduler {
    inner: Mutex<Inner>,
}

impl Scheduler {
    /// Creates an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resource user. Re-registering an ID replaces the
    /// callback target but keeps the user's claim and allocation state.
    pub fn register_user(&self, user: Arc<dyn ResourceUser>) {
        let mut inner = self.inner.lock();
        let id = user.id().to_string();
        match inner.users.entry(id) {
            Entry::Occupied(mut occupied) => occupied.get_mut().user = user,
            Entry::Vacant(vacant) => {
                vacant.insert(UserEntry {
                    user,
                    claim: Vec::new(),
                    route_index: 0,
                });
            }
        }
    }

    /// Replaces the user's claim list with the resource sets of `route`'s
    /// steps, in order, and resets the route index to 0.
    ///
    /// Pending allocation requests of the user are abandoned. Fails with
    /// [`SchedulerError::InvalidState`] if the user holds allocations not
    /// covered by the new route's first resource set.
    pub fn set_route(&self, user_id: &str, route: &Route) -> Result<(), SchedulerError> {
        let deliveries = {
            let mut inner = self.inner.lock();
            inner.ensure_user(user_id)?;

            let new_claim: Vec<Vec<String>> =
                route.steps.iter().map(|s| s.resources.clone()).collect();

            if let Some(first) = new_claim.first() {
                let first: HashSet<&str> = first.iter().map(|s| s.as_str()).collect();
                for resource in inner.held_by(user_id) {
                    if !first.contains(resource.as_str()) {
                        return Err(SchedulerError::InvalidState(format!(
                            "user '{user_id}' holds '{resource}', which the new route's \
                             first step does not cover"
                        )));
                    }
                }
            }

            let mut deliveries = inner.abandon_pending(user_id, |_| true);

            let entry = inner.users.get_mut(user_id).expect("checked above");
            entry.claim = new_claim;
            entry.route_index = 0;

            inner.refresh_claims(user_id);
            deliveries.extend(inner.scan());
            deliveries
        };
        self.deliver(deliveries);
        Ok(())
    }

    /// Advances the user's position in its claim list.
    ///
    /// Claim entries behind the new index are released. Fails with
    /// [`SchedulerError::OutOfRange`] if `index` exceeds the claim list and
    /// with [`SchedulerError::InvalidState`] if it would move backwards.
    pub fn set_route_index(&self, user_id: &str, index: usize) -> Result<(), SchedulerError> {
        let deliveries = {
            let mut inner = self.inner.lock();
            inner.ensure_user(user_id)?;

            let entry = inner.users.get_mut(user_id).expect("checked above");
            let len = entry.claim.len();
            if index > len {
                return Err(SchedulerError::OutOfRange { index, len });
            }
            if index < entry.route_index {
                return Err(SchedulerError::InvalidState(format!(
                    "route index may only advance (current {}, requested {index})",
                    entry.route_index
                )));
            }
            entry.route_index = index;

            inner.refresh_claims(user_id);
            let claimed = inner.claimed_union(user_id);
            let mut deliveries = inner.abandon_pending(user_id, |req| {
                !req.resources.iter().all(|r| claimed.contains(r))
            });
            deliveries.extend(inner.scan());
            deliveries
        };
        self.deliver(deliveries);
        Ok(())
    }

    /// Appends an ad-hoc claim entry. Claiming never blocks and never
    /// grants exclusive use by itself.
    pub fn claim(&self, user_id: &str, resources: Vec<String>) -> Result<(), SchedulerError> {
        let mut inner = self.inner.lock();
        inner.ensure_user(user_id)?;
        debug!("{user_id} claims {resources:?}");
        let entry = inner.users.get_mut(user_id).expect("checked above");
        entry.claim.push(resources);
        inner.refresh_claims(user_id);
        Ok(())
    }

    /// Removes the first remaining claim entry matching `resources`.
    /// Unknown entries are ignored. Pending requests that are no longer
    /// covered by the remaining claim are abandoned.
    pub fn unclaim(&self, user_id: &str, resources: &[String]) -> Result<(), SchedulerError> {
        let deliveries = {
            let mut inner = self.inner.lock();
            inner.ensure_user(user_id)?;

            let wanted: HashSet<&str> = resources.iter().map(|s| s.as_str()).collect();
            let entry = inner.users.get_mut(user_id).expect("checked above");
            let start = entry.route_index;
            let position = entry.claim[start..].iter().position(|set| {
                set.len() == wanted.len() && set.iter().all(|r| wanted.contains(r.as_str()))
            });
            match position {
                Some(offset) => {
                    entry.claim.remove(start + offset);
                }
                None => {
                    debug!("{user_id} unclaimed {resources:?}, which was not claimed");
                    return Ok(());
                }
            }

            inner.refresh_claims(user_id);
            let claimed = inner.claimed_union(user_id);
            let mut deliveries = inner.abandon_pending(user_id, |req| {
                !req.resources.iter().all(|r| claimed.contains(r))
            });
            deliveries.extend(inner.scan());
            deliveries
        };
        self.deliver(deliveries);
        Ok(())
    }

    /// Requests exclusive use of `resources`, which must be covered by the
    /// user's current claim. Returns immediately; exactly one of the user's
    /// callbacks is invoked later — `allocation_successful` once the
    /// request is granted, or `allocation_failed` if it is abandoned.
    pub fn allocate(&self, user_id: &str, resources: Vec<String>) -> Result<(), SchedulerError> {
        let deliveries = {
            let mut inner = self.inner.lock();
            inner.ensure_user(user_id)?;

            let claimed = inner.claimed_union(user_id);
            if let Some(unclaimed) = resources.iter().find(|r| !claimed.contains(*r)) {
                return Err(SchedulerError::InvalidState(format!(
                    "user '{user_id}' requested unclaimed resource '{unclaimed}'"
                )));
            }

            let request_seq = inner.next_request_seq;
            inner.next_request_seq += 1;
            inner.pending.push(PendingRequest {
                user_id: user_id.to_string(),
                resources,
                request_seq,
            });
            inner.scan()
        };
        self.deliver(deliveries);
        Ok(())
    }

    /// Synchronously allocates `resources` if and only if every one of them
    /// is already held by the user or free of any other user's allocation
    /// and pending request. Grants nothing on failure.
    pub fn allocate_now(
        &self,
        user_id: &str,
        resources: Vec<String>,
    ) -> Result<(), SchedulerError> {
        let mut inner = self.inner.lock();
        inner.ensure_user(user_id)?;

        let blocked: Vec<String> = resources
            .iter()
            .filter(|r| {
                let held_by_other = inner
                    .allocations
                    .get(*r)
                    .is_some_and(|holder| holder != user_id);
                let queued_by_other = inner
                    .pending
                    .iter()
                    .any(|req| req.user_id != user_id && req.resources.contains(r));
                held_by_other || queued_by_other
            })
            .cloned()
            .collect();
        if !blocked.is_empty() {
            return Err(SchedulerError::ResourceAllocation { resources: blocked });
        }

        debug!("{user_id} allocates {resources:?} synchronously");
        for resource in resources {
            inner.allocations.insert(resource, user_id.to_string());
        }
        Ok(())
    }

    /// Releases resources held by the user. Resources not held by the user
    /// are ignored. Triggers re-evaluation of pending requests.
    pub fn free(&self, user_id: &str, resources: &[String]) -> Result<(), SchedulerError> {
        let deliveries = {
            let mut inner = self.inner.lock();
            inner.ensure_user(user_id)?;
            inner.release(user_id, resources);
            inner.scan()
        };
        self.deliver(deliveries);
        Ok(())
    }

    /// Releases everything the user holds.
    pub fn free_all(&self, user_id: &str) -> Result<(), SchedulerError> {
        let held = {
            let inner = self.inner.lock();
            inner.ensure_user(user_id)?;
            inner.held_by(user_id)
        };
        self.free(user_id, &held)
    }

    /// Releases everything the user holds except the listed resources.
    ///
    /// Used by immediate withdrawal, where a vehicle cannot be yanked off
    /// the point it physically occupies.
    pub fn free_all_except(
        &self,
        user_id: &str,
        keep: &[String],
    ) -> Result<(), SchedulerError> {
        let held: Vec<String> = {
            let inner = self.inner.lock();
            inner.ensure_user(user_id)?;
            inner
                .held_by(user_id)
                .into_iter()
                .filter(|r| !keep.contains(r))
                .collect()
        };
        self.free(user_id, &held)
    }

    /// Abandons all pending allocation requests of the user, invoking
    /// `allocation_failed` for each. The claim is retained.
    pub fn clear_pending_allocations(&self, user_id: &str) -> Result<(), SchedulerError> {
        let deliveries = {
            let mut inner = self.inner.lock();
            inner.ensure_user(user_id)?;
            let mut deliveries = inner.abandon_pending(user_id, |_| true);
            deliveries.extend(inner.scan());
            deliveries
        };
        self.deliver(deliveries);
        Ok(())
    }

    /// Current allocation map: user ID → resources held, sorted.
    pub fn allocations(&self) -> HashMap<String, Vec<String>> {
        let inner = self.inner.lock();
        let mut map: HashMap<String, Vec<String>> = HashMap::new();
        for (resource, holder) in &inner.allocations {
            map.entry(holder.clone()).or_default().push(resource.clone());
        }
        for resources in map.values_mut() {
            resources.sort();
        }
        map
    }

    /// The user's remaining claim entries, if the user is known.
    pub fn claimed_by(&self, user_id: &str) -> Option<Vec<Vec<String>>> {
        let inner = self.inner.lock();
        inner
            .users
            .get(user_id)
            .map(|entry| entry.claim[entry.route_index..].to_vec())
    }

    /// Resources currently held by the user, sorted.
    pub fn allocated_by(&self, user_id: &str) -> Vec<String> {
        let inner = self.inner.lock();
        let mut held = inner.held_by(user_id);
        held.sort();
        held
    }

    /// Invokes callbacks collected under the lock, strictly outside of it.
    /// A rejected grant is handed back, which may unblock further requests;
    /// the loop drains until no deliveries remain.
    fn deliver(&self, mut deliveries: Vec<Delivery>) {
        while !deliveries.is_empty() {
            for delivery in std::mem::take(&mut deliveries) {
                match delivery.outcome {
                    Outcome::Granted => {
                        debug!(
                            "{} granted {:?}",
                            delivery.user_id, delivery.resources
                        );
                        if !delivery.user.allocation_successful(&delivery.resources) {
                            warn!(
                                "{} rejected granted resources {:?}, releasing",
                                delivery.user_id, delivery.resources
                            );
                            let mut inner = self.inner.lock();
                            inner.release(&delivery.user_id, &delivery.resources);
                            deliveries.extend(inner.scan());
                        }
                    }
                    Outcome::Abandoned => {
                        debug!(
                            "{} abandoned request for {:?}",
                            delivery.user_id, delivery.resources
                        );
                        delivery.user.allocation_failed(&delivery.resources);
                    }
                }
            }
        }
    }
}

impl Inner {
    fn ensure_user(&self, user_id: &str) -> Result<(), SchedulerError> {
        if self.users.contains_key(user_id) {
            Ok(())
        } else {
            Err(SchedulerError::UnknownResourceUser(user_id.to_string()))
        }
    }

    fn held_by(&self, user_id: &str) -> Vec<String> {
        self.allocations
            .iter()
            .filter(|(_, holder)| holder.as_str() == user_id)
            .map(|(resource, _)| resource.clone())
            .collect()
    }

    fn claimed_union(&self, user_id: &str) -> HashSet<String> {
        match self.users.get(user_id) {
            Some(entry) => entry.claim[entry.route_index..]
                .iter()
                .flatten()
                .cloned()
                .collect(),
            None => HashSet::new(),
        }
    }

    /// Assigns claim times to newly claimed resources and drops the claim
    /// times of resources the user no longer claims. A resource that stays
    /// claimed keeps its original claim time.
    fn refresh_claims(&mut self, user_id: &str) {
        let claimed = self.claimed_union(user_id);

        for resource in &claimed {
            let seq_map = self.claim_seq.entry(resource.clone()).or_default();
            if !seq_map.contains_key(user_id) {
                seq_map.insert(user_id.to_string(), self.next_claim_seq);
                self.next_claim_seq += 1;
            }
        }

        self.claim_seq.retain(|resource, seq_map| {
            if !claimed.contains(resource) {
                seq_map.remove(user_id);
            }
            !seq_map.is_empty()
        });
    }

    fn release(&mut self, user_id: &str, resources: &[String]) {
        for resource in resources {
            if self.allocations.get(resource).is_some_and(|h| h == user_id) {
                self.allocations.remove(resource);
            }
        }
    }

    /// Removes the user's pending requests matching the predicate and
    /// returns them as abandonment deliveries.
    fn abandon_pending(
        &mut self,
        user_id: &str,
        mut predicate: impl FnMut(&PendingRequest) -> bool,
    ) -> Vec<Delivery> {
        let user = match self.users.get(user_id) {
            Some(entry) => Arc::clone(&entry.user),
            None => return Vec::new(),
        };
        let mut abandoned = Vec::new();
        let mut kept = Vec::new();
        for request in self.pending.drain(..) {
            if request.user_id == user_id && predicate(&request) {
                abandoned.push(Delivery {
                    user: Arc::clone(&user),
                    user_id: request.user_id,
                    resources: request.resources,
                    outcome: Outcome::Abandoned,
                });
            } else {
                kept.push(request);
            }
        }
        self.pending = kept;
        abandoned
    }

    fn claim_time(&self, resource: &str, user_id: &str) -> u64 {
        self.claim_seq
            .get(resource)
            .and_then(|m| m.get(user_id))
            .copied()
            .unwrap_or(u64::MAX)
    }

    /// Ordering key of a pending request: the earliest claim time among its
    /// resources, with the request time as tie-break.
    fn request_key(&self, request: &PendingRequest) -> (u64, u64) {
        let earliest = request
            .resources
            .iter()
            .map(|r| self.claim_time(r, &request.user_id))
            .min()
            .unwrap_or(u64::MAX);
        (earliest, request.request_seq)
    }

    fn is_satisfiable(&self, index: usize, granted: &HashSet<usize>) -> bool {
        let request = &self.pending[index];
        for resource in &request.resources {
            if self
                .allocations
                .get(resource)
                .is_some_and(|holder| holder != &request.user_id)
            {
                return false;
            }

            // Head-of-queue rule: no other pending requester may have
            // claimed this resource earlier.
            let my_key = (
                self.claim_time(resource, &request.user_id),
                request.request_seq,
            );
            for (other_index, other) in self.pending.iter().enumerate() {
                if other_index == index
                    || granted.contains(&other_index)
                    || other.user_id == request.user_id
                {
                    continue;
                }
                if other.resources.contains(resource) {
                    let other_key =
                        (self.claim_time(resource, &other.user_id), other.request_seq);
                    if other_key < my_key {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Grants every pending request that has become satisfiable, in
    /// claim-time order, and returns the grant deliveries.
    fn scan(&mut self) -> Vec<Delivery> {
        let mut order: Vec<usize> = (0..self.pending.len()).collect();
        order.sort_by_key(|&i| self.request_key(&self.pending[i]));

        let mut granted: HashSet<usize> = HashSet::new();
        for index in order {
            if !self.is_satisfiable(index, &granted) {
                continue;
            }
            let (user_id, resources) = {
                let request = &self.pending[index];
                (request.user_id.clone(), request.resources.clone())
            };
            for resource in &resources {
                self.allocations.insert(resource.clone(), user_id.clone());
            }
            granted.insert(index);
        }

        let mut deliveries = Vec::new();
        let mut kept = Vec::new();
        for (index, request) in self.pending.drain(..).enumerate() {
            if granted.contains(&index) {
                let user = self
                    .users
                    .get(&request.user_id)
                    .map(|entry| Arc::clone(&entry.user))
                    .expect("pending request from unregistered user");
                deliveries.push(Delivery {
                    user,
                    user_id: request.user_id,
                    resources: request.resources,
                    outcome: Outcome::Granted,
                });
            } else {
                kept.push(request);
            }
        }
        self.pending = kept;
        deliveries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Step;
    use parking_lot::Mutex as PlMutex;

    /// Records callback invocations; configurable acceptance.
    struct TestUser {
        id: String,
        accept: bool,
        successes: PlMutex<Vec<Vec<String>>>,
        failures: PlMutex<Vec<Vec<String>>>,
    }

    impl TestUser {
        fn new(id: &str) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                accept: true,
                successes: PlMutex::new(Vec::new()),
                failures: PlMutex::new(Vec::new()),
            })
        }

        fn rejecting(id: &str) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                accept: false,
                successes: PlMutex::new(Vec::new()),
                failures: PlMutex::new(Vec::new()),
            })
        }

        fn success_count(&self) -> usize {
            self.successes.lock().len()
        }

        fn failure_count(&self) -> usize {
            self.failures.lock().len()
        }
    }

    impl ResourceUser for TestUser {
        fn id(&self) -> &str {
            &self.id
        }

        fn allocation_successful(&self, resources: &[String]) -> bool {
            self.successes.lock().push(resources.to_vec());
            self.accept
        }

        fn allocation_failed(&self, resources: &[String]) {
            self.failures.lock().push(resources.to_vec());
        }
    }

    fn strings(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn route(steps: &[(&str, &str, &str)]) -> Route {
        Route::new(
            steps
                .iter()
                .map(|(path, from, to)| Step::new(*path, *from, *to))
                .collect(),
            1000,
        )
    }

    #[test]
    fn test_allocate_after_claim_grants_immediately() {
        let scheduler = Scheduler::new();
        let user = TestUser::new("V1");
        scheduler.register_user(user.clone());

        scheduler.claim("V1", strings(&["P1", "P2"])).unwrap();
        scheduler.allocate("V1", strings(&["P1"])).unwrap();

        assert_eq!(user.success_count(), 1);
        assert_eq!(scheduler.allocated_by("V1"), strings(&["P1"]));
    }

    #[test]
    fn test_allocate_unclaimed_resource_rejected() {
        let scheduler = Scheduler::new();
        scheduler.register_user(TestUser::new("V1"));

        let err = scheduler.allocate("V1", strings(&["P1"])).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidState(_)));
    }

    #[test]
    fn test_unknown_user() {
        let scheduler = Scheduler::new();
        assert_eq!(
            scheduler.claim("ghost", strings(&["P1"])).unwrap_err(),
            SchedulerError::UnknownResourceUser("ghost".to_string())
        );
    }

    #[test]
    fn test_mutual_exclusion() {
        let scheduler = Scheduler::new();
        let v = TestUser::new("V");
        let u = TestUser::new("U");
        scheduler.register_user(v.clone());
        scheduler.register_user(u.clone());

        scheduler.claim("V", strings(&["Q"])).unwrap();
        scheduler.claim("U", strings(&["Q"])).unwrap();
        scheduler.allocate("V", strings(&["Q"])).unwrap();
        scheduler.allocate("U", strings(&["Q"])).unwrap();

        // Q must never be held by both
        assert_eq!(scheduler.allocated_by("V"), strings(&["Q"]));
        assert!(scheduler.allocated_by("U").is_empty());
        assert_eq!(u.success_count(), 0);
    }

    #[test]
    fn test_free_triggers_rescan_and_grant() {
        // V at P holds {P, Path1, Q} for its route; U needs Q for its own.
        let scheduler = Scheduler::new();
        let v = TestUser::new("V");
        let u = TestUser::new("U");
        scheduler.register_user(v.clone());
        scheduler.register_user(u.clone());

        scheduler.claim("V", strings(&["P", "Path1", "Q"])).unwrap();
        scheduler
            .allocate("V", strings(&["P", "Path1", "Q"]))
            .unwrap();
        assert_eq!(v.success_count(), 1);

        scheduler.claim("U", strings(&["Q", "Path2", "R"])).unwrap();
        scheduler.allocate("U", strings(&["Q", "Path2", "R"])).unwrap();
        // Q is held by V: U waits, no callback yet
        assert_eq!(u.success_count(), 0);
        assert_eq!(u.failure_count(), 0);

        scheduler.free("V", &strings(&["Q"])).unwrap();

        // Rescan granted U everything it asked for
        assert_eq!(u.success_count(), 1);
        assert_eq!(scheduler.allocated_by("U"), strings(&["Path2", "Q", "R"]));
    }

    #[test]
    fn test_claim_order_fairness() {
        // A claimed R before B; B requests first, but A is served first.
        let scheduler = Scheduler::new();
        let holder = TestUser::new("C");
        let a = TestUser::new("A");
        let b = TestUser::new("B");
        scheduler.register_user(holder.clone());
        scheduler.register_user(a.clone());
        scheduler.register_user(b.clone());

        scheduler.claim("C", strings(&["R"])).unwrap();
        scheduler.allocate("C", strings(&["R"])).unwrap();

        scheduler.claim("A", strings(&["R"])).unwrap();
        scheduler.claim("B", strings(&["R"])).unwrap();

        scheduler.allocate("B", strings(&["R"])).unwrap();
        scheduler.allocate("A", strings(&["R"])).unwrap();

        scheduler.free("C", &strings(&["R"])).unwrap();

        assert_eq!(a.success_count(), 1);
        assert_eq!(b.success_count(), 0);
        assert_eq!(scheduler.allocated_by("A"), strings(&["R"]));
    }

    #[test]
    fn test_free_is_idempotent() {
        let scheduler = Scheduler::new();
        let v = TestUser::new("V");
        let u = TestUser::new("U");
        scheduler.register_user(v.clone());
        scheduler.register_user(u.clone());

        scheduler.claim("V", strings(&["P"])).unwrap();
        scheduler.allocate("V", strings(&["P"])).unwrap();

        // U frees something it does not hold: no-op
        scheduler.free("U", &strings(&["P"])).unwrap();
        assert_eq!(scheduler.allocated_by("V"), strings(&["P"]));

        // Double free by the holder
        scheduler.free("V", &strings(&["P"])).unwrap();
        scheduler.free("V", &strings(&["P"])).unwrap();
        assert!(scheduler.allocated_by("V").is_empty());
    }

    #[test]
    fn test_rejected_grant_is_released_and_passed_on() {
        let scheduler = Scheduler::new();
        let rejecting = TestUser::rejecting("V");
        let u = TestUser::new("U");
        scheduler.register_user(rejecting.clone());
        scheduler.register_user(u.clone());

        scheduler.claim("V", strings(&["P"])).unwrap();
        scheduler.claim("U", strings(&["P"])).unwrap();

        scheduler.allocate("V", strings(&["P"])).unwrap();
        // V's callback rejected the grant; the release lets U through
        assert_eq!(rejecting.success_count(), 1);
        assert!(scheduler.allocated_by("V").is_empty());

        scheduler.allocate("U", strings(&["P"])).unwrap();
        assert_eq!(u.success_count(), 1);
        assert_eq!(scheduler.allocated_by("U"), strings(&["P"]));
    }

    #[test]
    fn test_crossing_claims_drain_as_holders_free() {
        // U1 holds A and waits for B; U2 holds B and waits for A. As soon
        // as one holder frees, every request drains — no permanent wait.
        let scheduler = Scheduler::new();
        let u1 = TestUser::new("U1");
        let u2 = TestUser::new("U2");
        scheduler.register_user(u1.clone());
        scheduler.register_user(u2.clone());

        scheduler.claim("U1", strings(&["A", "B"])).unwrap();
        scheduler.claim("U2", strings(&["B", "A"])).unwrap();

        scheduler.allocate("U1", strings(&["A"])).unwrap();
        scheduler.allocate("U2", strings(&["B"])).unwrap();
        assert_eq!(u1.success_count(), 1);
        assert_eq!(u2.success_count(), 1);

        scheduler.allocate("U1", strings(&["B"])).unwrap();
        scheduler.allocate("U2", strings(&["A"])).unwrap();
        assert_eq!(u1.success_count(), 1);
        assert_eq!(u2.success_count(), 1);

        // U2 moves on and frees B
        scheduler.free("U2", &strings(&["B"])).unwrap();
        assert_eq!(u1.success_count(), 2);

        // U1 moves on and frees A
        scheduler.free("U1", &strings(&["A"])).unwrap();
        assert_eq!(u2.success_count(), 2);

        assert_eq!(scheduler.allocated_by("U1"), strings(&["B"]));
        assert_eq!(scheduler.allocated_by("U2"), strings(&["A"]));
    }

    #[test]
    fn test_set_route_establishes_claim() {
        let scheduler = Scheduler::new();
        let v = TestUser::new("V");
        scheduler.register_user(v.clone());

        let r = route(&[("P1--P2", "P1", "P2"), ("P2--P3", "P2", "P3")]);
        scheduler.set_route("V", &r).unwrap();

        let claimed = scheduler.claimed_by("V").unwrap();
        assert_eq!(claimed.len(), 2);
        assert_eq!(claimed[0], strings(&["P1", "P1--P2", "P2"]));

        scheduler
            .allocate("V", strings(&["P1", "P1--P2", "P2"]))
            .unwrap();
        assert_eq!(v.success_count(), 1);
    }

    #[test]
    fn test_set_route_rejects_inconsistent_allocations() {
        let scheduler = Scheduler::new();
        scheduler.register_user(TestUser::new("V"));

        // V holds X, which the new route's first step does not cover
        scheduler.allocate_now("V", strings(&["X"])).unwrap();
        let r = route(&[("P1--P2", "P1", "P2")]);
        let err = scheduler.set_route("V", &r).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidState(_)));
    }

    #[test]
    fn test_set_route_allowed_when_holding_first_step_resource() {
        let scheduler = Scheduler::new();
        scheduler.register_user(TestUser::new("V"));

        scheduler.allocate_now("V", strings(&["P1"])).unwrap();
        let r = route(&[("P1--P2", "P1", "P2")]);
        scheduler.set_route("V", &r).unwrap();
        assert_eq!(scheduler.claimed_by("V").unwrap().len(), 1);
    }

    #[test]
    fn test_set_route_index_advances_and_releases() {
        let scheduler = Scheduler::new();
        let v = TestUser::new("V");
        scheduler.register_user(v.clone());

        let r = route(&[("P1--P2", "P1", "P2"), ("P2--P3", "P2", "P3")]);
        scheduler.set_route("V", &r).unwrap();
        scheduler.set_route_index("V", 1).unwrap();

        let claimed = scheduler.claimed_by("V").unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0], strings(&["P2", "P2--P3", "P3"]));
    }

    #[test]
    fn test_set_route_index_out_of_range() {
        let scheduler = Scheduler::new();
        scheduler.register_user(TestUser::new("V"));

        let r = route(&[("P1--P2", "P1", "P2")]);
        scheduler.set_route("V", &r).unwrap();
        assert_eq!(
            scheduler.set_route_index("V", 2).unwrap_err(),
            SchedulerError::OutOfRange { index: 2, len: 1 }
        );
    }

    #[test]
    fn test_set_route_index_never_moves_backwards() {
        let scheduler = Scheduler::new();
        scheduler.register_user(TestUser::new("V"));

        let r = route(&[("P1--P2", "P1", "P2"), ("P2--P3", "P2", "P3")]);
        scheduler.set_route("V", &r).unwrap();
        scheduler.set_route_index("V", 2).unwrap();
        assert!(matches!(
            scheduler.set_route_index("V", 1).unwrap_err(),
            SchedulerError::InvalidState(_)
        ));
    }

    #[test]
    fn test_advancing_abandons_uncovered_requests() {
        let scheduler = Scheduler::new();
        let v = TestUser::new("V");
        let blocker = TestUser::new("B");
        scheduler.register_user(v.clone());
        scheduler.register_user(blocker.clone());

        // B holds P2 so V's request stays pending
        scheduler.claim("B", strings(&["P2"])).unwrap();
        scheduler.allocate("B", strings(&["P2"])).unwrap();

        let r = route(&[("P1--P2", "P1", "P2"), ("P2--P3", "P2", "P3")]);
        scheduler.set_route("V", &r).unwrap();
        scheduler
            .allocate("V", strings(&["P1", "P1--P2", "P2"]))
            .unwrap();
        assert_eq!(v.failure_count(), 0);

        // Advancing past step 0 drops its claim; the pending request no
        // longer fits the remaining claim and is abandoned
        scheduler.set_route_index("V", 1).unwrap();
        assert_eq!(v.failure_count(), 1);
    }

    #[test]
    fn test_allocate_now_grants_free_resources() {
        let scheduler = Scheduler::new();
        scheduler.register_user(TestUser::new("V"));

        scheduler.allocate_now("V", strings(&["P1", "P2"])).unwrap();
        assert_eq!(scheduler.allocated_by("V"), strings(&["P1", "P2"]));
    }

    #[test]
    fn test_allocate_now_fails_on_conflict() {
        let scheduler = Scheduler::new();
        scheduler.register_user(TestUser::new("V"));
        scheduler.register_user(TestUser::new("U"));

        scheduler.allocate_now("V", strings(&["P1"])).unwrap();
        let err = scheduler.allocate_now("U", strings(&["P1", "P2"])).unwrap_err();
        assert_eq!(
            err,
            SchedulerError::ResourceAllocation {
                resources: strings(&["P1"])
            }
        );
        // Grants nothing on failure
        assert!(scheduler.allocated_by("U").is_empty());
    }

    #[test]
    fn test_allocate_now_respects_queued_requests() {
        let scheduler = Scheduler::new();
        let v = TestUser::new("V");
        let u = TestUser::new("U");
        let w = TestUser::new("W");
        scheduler.register_user(v.clone());
        scheduler.register_user(u.clone());
        scheduler.register_user(w.clone());

        scheduler.claim("V", strings(&["P1"])).unwrap();
        scheduler.allocate("V", strings(&["P1"])).unwrap();
        scheduler.claim("U", strings(&["P1"])).unwrap();
        scheduler.allocate("U", strings(&["P1"])).unwrap(); // queued behind V

        // W must not jump U's queue position
        assert!(scheduler.allocate_now("W", strings(&["P1"])).is_err());
    }

    #[test]
    fn test_clear_pending_invokes_failed() {
        let scheduler = Scheduler::new();
        let v = TestUser::new("V");
        let u = TestUser::new("U");
        scheduler.register_user(v.clone());
        scheduler.register_user(u.clone());

        scheduler.claim("V", strings(&["P1"])).unwrap();
        scheduler.allocate("V", strings(&["P1"])).unwrap();
        scheduler.claim("U", strings(&["P1"])).unwrap();
        scheduler.allocate("U", strings(&["P1"])).unwrap();

        scheduler.clear_pending_allocations("U").unwrap();
        assert_eq!(u.failure_count(), 1);

        // V freeing now leaves U's abandoned request ungranted
        scheduler.free("V", &strings(&["P1"])).unwrap();
        assert_eq!(u.success_count(), 0);
    }

    #[test]
    fn test_callback_may_reenter_scheduler() {
        // A user that frees its resources from inside the success callback.
        struct Reentrant {
            scheduler: Arc<Scheduler>,
        }
        impl ResourceUser for Reentrant {
            fn id(&self) -> &str {
                "R"
            }
            fn allocation_successful(&self, resources: &[String]) -> bool {
                self.scheduler.free("R", resources).unwrap();
                true
            }
            fn allocation_failed(&self, _resources: &[String]) {}
        }

        let scheduler = Arc::new(Scheduler::new());
        scheduler.register_user(Arc::new(Reentrant {
            scheduler: Arc::clone(&scheduler),
        }));

        scheduler.claim("R", strings(&["P1"])).unwrap();
        scheduler.allocate("R", strings(&["P1"])).unwrap();
        // Freed from within the callback without deadlocking
        assert!(scheduler.allocated_by("R").is_empty());
    }

    #[test]
    fn test_allocations_map() {
        let scheduler = Scheduler::new();
        scheduler.register_user(TestUser::new("V"));
        scheduler.register_user(TestUser::new("U"));

        scheduler.allocate_now("V", strings(&["P2", "P1"])).unwrap();
        scheduler.allocate_now("U", strings(&["P3"])).unwrap();

        let map = scheduler.allocations();
        assert_eq!(map["V"], strings(&["P1", "P2"]));
        assert_eq!(map["U"], strings(&["P3"]));
    }

    #[test]
    fn test_free_all_except_keeps_position() {
        let scheduler = Scheduler::new();
        scheduler.register_user(TestUser::new("V"));

        scheduler
            .allocate_now("V", strings(&["P1", "Path1", "P2"]))
            .unwrap();
        scheduler
            .free_all_except("V", &strings(&["P2"]))
            .unwrap();
        assert_eq!(scheduler.allocated_by("V"), strings(&["P2"]));
    }
}
