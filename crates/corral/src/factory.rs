/// Constructs and repairs the resources managed by a [`Pool`](crate::Pool).
///
/// A pool owns exactly one factory, and calls it from whichever thread happens to need
/// a resource built or repaired; the factory itself decides what a resource is and what
/// failure looks like.
pub trait ResourceFactory {
    /// The pooled resource.
    ///
    /// Leases only ever hand out `&Self::Resource`, so a resource which callers mutate
    /// must use interior mutability.
    type Resource: Send + Sync;

    /// Error produced by failed construction or repair.
    ///
    /// Surfaced to callers through [`AcquireError`](crate::AcquireError) and
    /// [`RefreshError`](crate::RefreshError).
    type Error;

    /// Construct a new resource.
    ///
    /// The pool calls this with its internal lock held, so that checking capacity and
    /// admitting the new resource are one atomic step; `create` must not call back into
    /// the same pool.
    fn create(&self) -> Result<Self::Resource, Self::Error>;

    /// Repair a resource in place, e.g. reconnect a dropped connection.
    ///
    /// The pool guarantees that no other thread can reach `resource` for the duration
    /// of the call, and does not hold its internal lock, so a slow repair stalls only
    /// the lease being refreshed. On failure, the resource must still be safe to drop;
    /// the pool files it back as leased either way.
    fn refresh(&self, resource: &mut Self::Resource) -> Result<(), Self::Error>;
}
