#[cfg(loom)]
pub(crate) use loom::sync::Condvar as Condvar;
#[cfg(loom)]
pub(crate) use loom::sync::Mutex as Mutex;
#[cfg(loom)]
pub(crate) use loom::sync::MutexGuard as MutexGuard;

#[cfg(not(loom))]
pub(crate) use std::sync::Condvar as Condvar;
#[cfg(not(loom))]
pub(crate) use std::sync::Mutex as Mutex;
#[cfg(not(loom))]
pub(crate) use std::sync::MutexGuard as MutexGuard;
