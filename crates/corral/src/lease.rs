#![expect(unsafe_code, reason = "ManuallyDrop lets the Drop impl hand the resource back by value")]

use std::num::NonZeroU32;
use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    mem::ManuallyDrop,
    ops::Deref,
    sync::Arc,
};

use crate::{
    error::RefreshError,
    factory::ResourceFactory,
    pool::{Pool, SlotId},
};


/// A fault recorded on a [`Lease`] by [`mark_unhealthy_with`].
///
/// Code values are caller-defined; the pool only cares whether a fault is present.
/// [`mark_unhealthy`] records [`FaultCode::MIN`], i.e. code `1`.
///
/// [`mark_unhealthy`]: Lease::mark_unhealthy
/// [`mark_unhealthy_with`]: Lease::mark_unhealthy_with
pub type FaultCode = NonZeroU32;

/// An exclusive lease of one resource from a [`Pool`].
///
/// While a `Lease` is live, no other lease can reach the same resource. Dropping the
/// lease returns the resource to its pool on every exit path: back into the idle set if
/// the lease is healthy, or destroyed if it was marked unhealthy. Either way, a thread
/// blocked on [`Pool::acquire`] is woken.
///
/// A `Lease` can be moved across threads (given a suitable resource and factory), but
/// not cloned or copied.
pub struct Lease<Factory: ResourceFactory> {
    pool:     Pool<Factory>,
    slot:     SlotId,
    /// Taken exactly once, in the `Drop` impl.
    resource: ManuallyDrop<Arc<Factory::Resource>>,
    /// `None` while the resource is believed healthy.
    fault:    Option<FaultCode>,
}

impl<Factory: ResourceFactory> Lease<Factory> {
    #[expect(clippy::missing_const_for_fn, reason = "no reason to promise const-ness")]
    #[inline]
    #[must_use]
    pub(crate) fn new(
        pool:     Pool<Factory>,
        slot:     SlotId,
        resource: Arc<Factory::Resource>,
    ) -> Self {
        Self {
            pool,
            slot,
            resource: ManuallyDrop::new(resource),
            fault:    None,
        }
    }

    /// Get the leased resource.
    ///
    /// The same access is available through `Deref`. Only shared access is possible,
    /// as the pool keeps its own reference to the resource for bookkeeping; a resource
    /// which callers mutate must use interior mutability.
    #[inline]
    #[must_use]
    pub fn get(&self) -> &Factory::Resource {
        &self.resource
    }

    /// Whether the resource will be recycled, rather than destroyed, when this lease
    /// is dropped.
    #[inline]
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.fault.is_none()
    }

    /// Get the fault recorded on this lease, if any.
    #[inline]
    #[must_use]
    pub fn fault_code(&self) -> Option<FaultCode> {
        self.fault
    }

    /// Record that the resource is broken, so that it is destroyed instead of recycled
    /// when this lease is dropped.
    ///
    /// Records [`FaultCode::MIN`]; use [`Self::mark_unhealthy_with`] to record a more
    /// specific fault.
    #[inline]
    pub fn mark_unhealthy(&mut self) {
        self.mark_unhealthy_with(FaultCode::MIN);
    }

    /// Record a specific fault, so that the resource is destroyed instead of recycled
    /// when this lease is dropped.
    ///
    /// A later call overwrites the previously recorded fault.
    #[inline]
    pub fn mark_unhealthy_with(&mut self, code: FaultCode) {
        self.fault = Some(code);
    }

    /// Have the pool's factory repair the resource in place, blocking until the repair
    /// completes.
    ///
    /// On success, any recorded fault is cleared, and this lease keeps the repaired
    /// resource; a caller holding a broken resource can recover without giving up its
    /// claim on pool capacity. On failure, the recorded fault is left untouched and
    /// the factory's error is returned; the lease is still usable, and still destined
    /// for whatever its fault state implies at drop time.
    pub fn refresh(&mut self) -> Result<(), RefreshError<Factory::Error>> {
        self.pool.refresh(self.slot, &mut self.resource)?;
        self.fault = None;
        Ok(())
    }
}

impl<Factory: ResourceFactory> Drop for Lease<Factory> {
    fn drop(&mut self) {
        // SAFETY:
        // We must never again use the `ManuallyDrop` value. This is the destructor of
        // the type, and `self.resource` is not touched after this line, so the value
        // is taken at most once.
        let resource = unsafe { ManuallyDrop::take(&mut self.resource) };
        self.pool.release(self.slot, resource, self.fault);
    }
}

impl<Factory: ResourceFactory> Deref for Lease<Factory> {
    type Target = Factory::Resource;

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.get()
    }
}

impl<Factory: ResourceFactory> AsRef<Factory::Resource> for Lease<Factory> {
    #[inline]
    fn as_ref(&self) -> &Factory::Resource {
        self
    }
}

impl<Factory: ResourceFactory> Debug for Lease<Factory> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Lease")
            .field("slot",  &self.slot)
            .field("fault", &self.fault)
            .finish_non_exhaustive()
    }
}


#[cfg(doctest)]
pub mod _compile_fail_tests {
    /// ```compile_fail
    /// use std::convert::Infallible;
    ///
    /// use corral::{Pool, ResourceFactory};
    ///
    /// struct UnitFactory;
    ///
    /// impl ResourceFactory for UnitFactory {
    ///     type Resource = ();
    ///     type Error    = Infallible;
    ///
    ///     fn create(&self) -> Result<(), Infallible> {
    ///         Ok(())
    ///     }
    ///
    ///     fn refresh(&self, _resource: &mut ()) -> Result<(), Infallible> {
    ///         Ok(())
    ///     }
    /// }
    ///
    /// fn leases_move(pool: &Pool<UnitFactory>) {
    ///     let lease = pool.acquire().unwrap();
    ///     let moved_lease = lease;
    ///     lease.get();
    /// }
    /// ```
    ///
    /// ```compile_fail
    /// fn no_mutable_access(lease: &mut corral::Lease<impl corral::ResourceFactory>) {
    ///     let _ = &mut **lease;
    /// }
    /// ```
    pub const fn _test_lease_exclusivity() {}
}
