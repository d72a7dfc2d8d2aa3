use std::collections::{HashMap, VecDeque};
use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    sync::Arc,
};

use crate::{
    diagnostics::{DiagnosticsSink, Occupancy, PoolEvent, TracingSink},
    error::{AcquireError, RefreshError},
    factory::ResourceFactory,
    lease::{FaultCode, Lease},
    maybe_loom::{Condvar, Mutex, MutexGuard},
};


/// The capacity of a [`Pool`] constructed through [`Pool::new`].
pub const DEFAULT_CAPACITY: usize = 200;

/// Identifies one pooled resource for as long as the pool or a lease holds it.
///
/// Slot numbers are assigned at resource creation and never reused.
pub(crate) type SlotId = u64;

/// A bounded, thread-safe pool of resources, leased out with exclusive claims.
///
/// Resources are built on demand by a [`ResourceFactory`], up to a fixed capacity, and
/// handed out as [`Lease`]s; once the capacity is reached, [`Pool::acquire`] blocks
/// until some lease is dropped. Dropping a healthy lease returns its resource for
/// reuse, while dropping a lease marked unhealthy destroys the resource, making room
/// for a freshly created replacement.
///
/// A `Pool` is a cheap handle: clones share one underlying pool.
pub struct Pool<Factory: ResourceFactory> {
    inner: Arc<PoolInner<Factory>>,
}

struct PoolInner<Factory: ResourceFactory> {
    /// Fixed at construction, never zero.
    capacity:    usize,
    factory:     Factory,
    diagnostics: Box<dyn DiagnosticsSink>,
    state:       Mutex<PoolState<Factory::Resource>>,
    /// Notified once per admission opportunity: a resource was returned to the idle
    /// set, or a capacity slot was freed.
    admission:   Condvar,
}

struct PoolState<Resource> {
    /// Resources ready for reuse, oldest return first. The order is a convenience,
    /// not a guarantee.
    idle:      VecDeque<(SlotId, Arc<Resource>)>,
    /// Resources currently leased out. Membership here is the sole source of truth
    /// for "at most one lease per resource".
    busy:      HashMap<SlotId, Arc<Resource>>,
    /// Resources held by neither `idle` nor `busy` while the factory repairs them
    /// outside the pool lock. Still counted against capacity.
    detached:  usize,
    next_slot: SlotId,
}

impl<Resource> PoolState<Resource> {
    fn live_resources(&self) -> usize {
        self.idle.len() + self.busy.len() + self.detached
    }

    fn occupancy(&self) -> Occupancy {
        Occupancy {
            idle: self.idle.len(),
            busy: self.busy.len(),
        }
    }
}

impl<Factory: ResourceFactory> Pool<Factory> {
    /// Create a pool of at most [`DEFAULT_CAPACITY`] resources, built by `factory`.
    ///
    /// Occupancy events are logged through [`tracing`] at the DEBUG level; see
    /// [`Self::with_diagnostics`] to send them elsewhere.
    #[inline]
    #[must_use]
    pub fn new(factory: Factory) -> Self {
        Self::with_capacity(factory, DEFAULT_CAPACITY)
    }

    /// Create a pool of at most `capacity` resources, built by `factory`.
    ///
    /// Occupancy events are logged through [`tracing`] at the DEBUG level; see
    /// [`Self::with_diagnostics`] to send them elsewhere.
    ///
    /// # Panics
    /// Panics if `capacity` is zero, since such a pool could never satisfy an
    /// [`acquire`](Self::acquire).
    #[inline]
    #[must_use]
    pub fn with_capacity(factory: Factory, capacity: usize) -> Self {
        Self::with_diagnostics(factory, capacity, TracingSink)
    }

    /// Create a pool of at most `capacity` resources, built by `factory`, which
    /// reports its occupancy events to `diagnostics`.
    ///
    /// # Panics
    /// Panics if `capacity` is zero, since such a pool could never satisfy an
    /// [`acquire`](Self::acquire).
    #[must_use]
    pub fn with_diagnostics<Sink>(factory: Factory, capacity: usize, diagnostics: Sink) -> Self
    where
        Sink: DiagnosticsSink + 'static,
    {
        assert_ne!(
            capacity, 0,
            "a Pool with a capacity of zero resources could never satisfy an `acquire`",
        );

        Self {
            inner: Arc::new(PoolInner {
                capacity,
                factory,
                diagnostics: Box::new(diagnostics),
                state:       Mutex::new(PoolState {
                    idle:      VecDeque::new(),
                    busy:      HashMap::new(),
                    detached:  0,
                    next_slot: 0,
                }),
                admission:   Condvar::new(),
            }),
        }
    }

    /// Lease a resource from the pool, blocking the calling thread until a resource
    /// is available or creatable.
    ///
    /// An idle resource is reused if there is one; otherwise, if the pool is below
    /// capacity, the factory builds a new resource. A factory failure propagates to
    /// the caller and consumes nothing, so a later attempt may succeed.
    ///
    /// There is no deadline, and no admission order is promised between competing
    /// callers; a caller needing a timeout or fairness must build it above this layer.
    ///
    /// # Potential Panics or Deadlocks
    /// This method panics if the pool's internal lock was poisoned, which can only
    /// happen if the factory panicked. It may also cause a deadlock if the pool is
    /// saturated and every lease is held by the calling thread, or by threads which
    /// are themselves waiting on the calling thread.
    pub fn acquire(&self) -> Result<Lease<Factory>, AcquireError<Factory::Error>> {
        let mut state = self.inner.lock_state();

        while state.idle.is_empty() && state.live_resources() >= self.inner.capacity {
            state = self.inner.wait_for_admission(state);
        }

        let (slot, resource) = if let Some((slot, resource)) = state.idle.pop_front() {
            state.busy.insert(slot, Arc::clone(&resource));
            (slot, resource)
        } else {
            // Creating under the lock makes the capacity check and the admission of
            // the new resource one atomic step.
            let resource = match self.inner.factory.create() {
                Ok(resource) => Arc::new(resource),
                Err(source) => {
                    drop(state);
                    // This thread may have consumed a wake-up on its way in. The slot
                    // it failed to fill is still free, so pass the chance along.
                    self.inner.admission.notify_one();
                    return Err(AcquireError { source });
                }
            };
            let slot = state.next_slot;
            state.next_slot += 1;
            state.busy.insert(slot, Arc::clone(&resource));
            (slot, resource)
        };

        let occupancy = state.occupancy();
        drop(state);
        self.inner.diagnostics.record(PoolEvent::Acquired, occupancy);

        Ok(Lease::new(self.clone(), slot, resource))
    }

    /// The maximum number of resources this pool may have live at once.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// The current counts of idle and leased resources.
    ///
    /// The answer may be stale by the time it is read; this is for monitoring, not
    /// for coordination.
    #[must_use]
    pub fn occupancy(&self) -> Occupancy {
        self.inner.lock_state().occupancy()
    }

    /// Take back a leased resource. Called exactly once per lease, from [`Lease`]'s
    /// `Drop` impl.
    ///
    /// A healthy resource returns to the idle set; a faulted one is destroyed,
    /// freeing its capacity slot. Both outcomes are admission opportunities, so one
    /// waiter is woken either way.
    pub(crate) fn release(
        &self,
        slot:     SlotId,
        resource: Arc<Factory::Resource>,
        fault:    Option<FaultCode>,
    ) {
        let mut state = self.inner.lock_state();
        let removed = state.busy.remove(&slot);
        debug_assert!(removed.is_some(), "a released resource was missing from the busy set");
        // Cannot run the resource's destructor: `resource` still refers to it.
        drop(removed);

        let (event, to_destroy) = if fault.is_none() {
            state.idle.push_back((slot, resource));
            (PoolEvent::Recycled, None)
        } else {
            (PoolEvent::Discarded, Some(resource))
        };

        let occupancy = state.occupancy();
        drop(state);

        // A discarded resource has no references left but this one, so this runs its
        // destructor, which may block on I/O. Destruction stays outside the lock.
        drop(to_destroy);

        self.inner.admission.notify_one();
        self.inner.diagnostics.record(event, occupancy);
    }

    /// Repair a leased resource in place. Called from [`Lease::refresh`].
    ///
    /// The resource leaves the busy set while the factory works on it, so the pool
    /// lock is not held across a possibly I/O-bound repair; `detached` keeps the
    /// resource counted against capacity in the meantime. The resource is re-filed
    /// as busy whether or not the factory succeeds.
    pub(crate) fn refresh(
        &self,
        slot:     SlotId,
        resource: &mut Arc<Factory::Resource>,
    ) -> Result<(), RefreshError<Factory::Error>> {
        {
            let mut state = self.inner.lock_state();
            let removed = state.busy.remove(&slot);
            debug_assert!(removed.is_some(), "a refreshed resource was missing from the busy set");
            state.detached += 1;
        }

        // With the busy entry gone, the lease's reference is the only one left, which
        // gives the factory the exclusive access it needs.
        #[expect(clippy::expect_used, reason = "the busy entry was just removed under the lock")]
        let result = self.inner.factory.refresh(
            Arc::get_mut(resource).expect("a detached resource is uniquely referenced"),
        );

        let mut state = self.inner.lock_state();
        state.detached -= 1;
        state.busy.insert(slot, Arc::clone(resource));
        let occupancy = state.occupancy();
        drop(state);

        self.inner.diagnostics.record(PoolEvent::Refreshed, occupancy);

        result.map_err(|source| RefreshError { source })
    }
}

impl<Factory: ResourceFactory> PoolInner<Factory> {
    /// Lock the pool state.
    #[inline]
    fn lock_state(&self) -> MutexGuard<'_, PoolState<Factory::Resource>> {
        #[expect(clippy::unwrap_used, reason = "only unwrapping Mutex poison")]
        self.state.lock().unwrap()
    }

    /// Block until another thread signals an admission opportunity.
    ///
    /// Spurious wake-ups are possible; callers re-check their condition in a loop.
    fn wait_for_admission<'a>(
        &self,
        state: MutexGuard<'a, PoolState<Factory::Resource>>,
    ) -> MutexGuard<'a, PoolState<Factory::Resource>> {
        #[expect(clippy::unwrap_used, reason = "only unwrapping Mutex poison")]
        self.admission.wait(state).unwrap()
    }
}

impl<Factory: ResourceFactory> Clone for Pool<Factory> {
    #[inline]
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }

    #[inline]
    fn clone_from(&mut self, source: &Self) {
        self.inner.clone_from(&source.inner);
    }
}

impl<Factory: ResourceFactory> Debug for Pool<Factory> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let occupancy = self.occupancy();
        f.debug_struct("Pool")
            .field("capacity", &self.inner.capacity)
            .field("idle",     &occupancy.idle)
            .field("busy",     &occupancy.busy)
            .finish_non_exhaustive()
    }
}


#[cfg(all(test, not(loom)))]
mod tests {
    use std::io::Error as IoError;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use crate::diagnostics::NullSink;

    use super::*;


    /// Numbers its resources in creation order; `fail_next` makes the next `create`
    /// fail, once.
    #[derive(Debug)]
    struct Counting {
        created:   Arc<AtomicUsize>,
        fail_next: Arc<AtomicBool>,
    }

    impl ResourceFactory for Counting {
        type Resource = usize;
        type Error    = IoError;

        fn create(&self) -> Result<usize, IoError> {
            if self.fail_next.swap(false, Ordering::Relaxed) {
                return Err(IoError::other("creation refused"));
            }
            Ok(self.created.fetch_add(1, Ordering::Relaxed))
        }

        fn refresh(&self, _resource: &mut usize) -> Result<(), IoError> {
            Ok(())
        }
    }

    fn counting_pool(capacity: usize) -> (Pool<Counting>, Arc<AtomicUsize>, Arc<AtomicBool>) {
        let created   = Arc::new(AtomicUsize::new(0));
        let fail_next = Arc::new(AtomicBool::new(false));
        let factory   = Counting {
            created:   Arc::clone(&created),
            fail_next: Arc::clone(&fail_next),
        };
        (Pool::with_diagnostics(factory, capacity, NullSink), created, fail_next)
    }

    #[test]
    fn creates_resources_on_demand() {
        let (pool, created, _) = counting_pool(3);
        assert_eq!(created.load(Ordering::Relaxed), 0);

        let first  = pool.acquire().unwrap();
        let second = pool.acquire().unwrap();
        let third  = pool.acquire().unwrap();

        assert_eq!((*first, *second, *third), (0, 1, 2));
        assert_eq!(created.load(Ordering::Relaxed), 3);
        assert_eq!(pool.occupancy(), Occupancy { idle: 0, busy: 3 });
    }

    #[test]
    fn prefers_idle_over_creating() {
        let (pool, created, _) = counting_pool(2);

        let first = pool.acquire().unwrap();
        assert_eq!(*first, 0);
        drop(first);

        // Capacity remains for a second resource, but the recycled one is reused.
        let reused = pool.acquire().unwrap();
        assert_eq!(*reused, 0);
        assert_eq!(created.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn occupancy_tracks_transitions() {
        let (pool, _, _) = counting_pool(2);
        assert_eq!(pool.occupancy(), Occupancy { idle: 0, busy: 0 });

        let first = pool.acquire().unwrap();
        let second = pool.acquire().unwrap();
        assert_eq!(pool.occupancy(), Occupancy { idle: 0, busy: 2 });

        drop(first);
        assert_eq!(pool.occupancy(), Occupancy { idle: 1, busy: 1 });
        drop(second);
        assert_eq!(pool.occupancy(), Occupancy { idle: 2, busy: 0 });

        let _third = pool.acquire().unwrap();
        assert_eq!(pool.occupancy(), Occupancy { idle: 1, busy: 1 });
    }

    #[test]
    fn unhealthy_resources_are_destroyed() {
        let (pool, created, _) = counting_pool(1);

        let mut lease = pool.acquire().unwrap();
        lease.mark_unhealthy();
        drop(lease);

        // Nothing was recycled, and the replacement is newly created.
        assert_eq!(pool.occupancy(), Occupancy { idle: 0, busy: 0 });
        let replacement = pool.acquire().unwrap();
        assert_eq!(*replacement, 1);
        assert_eq!(created.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn failed_creation_leaves_the_pool_unchanged() {
        let (pool, created, fail_next) = counting_pool(2);
        fail_next.store(true, Ordering::Relaxed);

        let error = pool.acquire().unwrap_err();
        assert_eq!(error.source.to_string(), "creation refused");
        assert_eq!(pool.occupancy(), Occupancy { idle: 0, busy: 0 });
        assert_eq!(created.load(Ordering::Relaxed), 0);

        // The failure reserved nothing, so a retry can fill the whole pool.
        let _first  = pool.acquire().unwrap();
        let _second = pool.acquire().unwrap();
        assert_eq!(created.load(Ordering::Relaxed), 2);
    }

    #[test]
    #[should_panic]
    fn zero_capacity_fail() {
        let (_pool, _, _) = counting_pool(0);
    }

    #[test]
    fn default_capacity() {
        let created   = Arc::new(AtomicUsize::new(0));
        let fail_next = Arc::new(AtomicBool::new(false));
        let pool = Pool::new(Counting { created, fail_next });
        assert_eq!(pool.capacity(), DEFAULT_CAPACITY);
        assert_eq!(pool.capacity(), 200);
    }

    #[test]
    fn clones_share_the_pool() {
        let (pool, created, _) = counting_pool(2);
        let cloned_pool = pool.clone();

        let first  = pool.acquire().unwrap();
        let second = cloned_pool.acquire().unwrap();
        assert_eq!((*first, *second), (0, 1));
        assert_eq!(created.load(Ordering::Relaxed), 2);

        drop(first);
        assert_eq!(cloned_pool.occupancy(), Occupancy { idle: 1, busy: 1 });
    }

    #[test]
    fn debug_reports_counts() {
        let (pool, _, _) = counting_pool(4);
        let _lease = pool.acquire().unwrap();
        let debugged = format!("{pool:?}");
        assert!(debugged.contains("capacity: 4"));
        assert!(debugged.contains("busy: 1"));
    }
}
