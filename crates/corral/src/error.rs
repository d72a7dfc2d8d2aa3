use thiserror::Error;


/// The factory failed to construct a new resource during [`Pool::acquire`].
///
/// The failure consumes nothing: no capacity is reserved for the failed attempt, and
/// the pool is left exactly as it was, so a later `acquire` may succeed.
///
/// [`Pool::acquire`]: crate::Pool::acquire
#[derive(Error, Debug)]
#[error("factory failed to create a pooled resource: {source}")]
pub struct AcquireError<E> {
    /// The factory's own error.
    pub source: E,
}

/// The factory failed to repair a resource during [`Lease::refresh`].
///
/// The resource is back in the pool's busy set and still held by the lease; the
/// lease's fault code is left untouched.
///
/// [`Lease::refresh`]: crate::Lease::refresh
#[derive(Error, Debug)]
#[error("factory failed to refresh a pooled resource: {source}")]
pub struct RefreshError<E> {
    /// The factory's own error.
    pub source: E,
}
