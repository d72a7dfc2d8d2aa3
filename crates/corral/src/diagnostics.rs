use std::fmt::{Display, Formatter, Result as FmtResult};

use tracing::Level as LogLevel;


/// Receives occupancy events from a [`Pool`](crate::Pool).
///
/// Sinks are purely observational: nothing a sink does feeds back into the pool's
/// decisions. The pool records each event after releasing its internal lock, so a slow
/// sink delays only the thread whose operation produced the event.
pub trait DiagnosticsSink: Send + Sync {
    /// Called once per pool transition, with the counts the transition left behind.
    fn record(&self, event: PoolEvent, occupancy: Occupancy);
}

/// Any suitable `Fn` closure or function may be used as a [`DiagnosticsSink`].
impl<F: Fn(PoolEvent, Occupancy) + Send + Sync> DiagnosticsSink for F {
    #[inline]
    fn record(&self, event: PoolEvent, occupancy: Occupancy) {
        self(event, occupancy);
    }
}

/// The default [`DiagnosticsSink`]: emits each event through [`tracing`] at the DEBUG
/// level, along with the idle and busy counts.
#[derive(Default, Debug, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn record(&self, event: PoolEvent, occupancy: Occupancy) {
        let Occupancy { idle, busy } = occupancy;
        tracing::event!(LogLevel::DEBUG, "{event}: idle: {idle}, busy: {busy}");
    }
}

/// A [`DiagnosticsSink`] which drops every event, for pools whose occupancy is not
/// worth recording.
#[derive(Default, Debug, Clone, Copy)]
pub struct NullSink;

impl DiagnosticsSink for NullSink {
    /// Do nothing with the event.
    fn record(&self, _event: PoolEvent, _occupancy: Occupancy) {}
}

/// Counts of pooled resources by state, as observed just after one pool transition.
///
/// `idle + busy` never exceeds the pool's capacity. A resource detached from the pool
/// for the duration of a factory repair is counted by neither field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occupancy {
    /// Resources sitting in the pool, available for immediate reuse.
    pub idle: usize,
    /// Resources currently leased out.
    pub busy: usize,
}

/// A pool state transition, reported to a [`DiagnosticsSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolEvent {
    /// A resource was leased out, whether reused or newly created.
    Acquired,
    /// A healthy resource was returned to the idle set.
    Recycled,
    /// An unhealthy resource was returned and destroyed.
    Discarded,
    /// A leased resource was repaired in place.
    Refreshed,
}

impl Display for PoolEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match *self {
            Self::Acquired  => "acquired",
            Self::Recycled  => "recycled",
            Self::Discarded => "discarded",
            Self::Refreshed => "refreshed",
        };
        f.write_str(name)
    }
}
