mod factory;
mod pool;

mod diagnostics;
mod error;
mod lease;

mod maybe_loom;


pub use self::{
    diagnostics::{DiagnosticsSink, NullSink, Occupancy, PoolEvent, TracingSink},
    error::{AcquireError, RefreshError},
    factory::ResourceFactory,
    lease::{FaultCode, Lease},
    pool::{DEFAULT_CAPACITY, Pool},
};
