//! Per-entity-kind domain caches.
//!
//! A [`DomainCache`] owns the in-memory snapshot of one remote collection,
//! serves synchronous period reads from it, persists it to the local store
//! and keeps it in sync through forced refreshes after every mutation and
//! every change notification.

mod clock;
mod domain;
mod error;

pub use clock::{Clock, SystemClock};
pub use domain::{
    CacheSettings, CacheStatus, DomainCache, RefreshOutcome, DEFAULT_REFRESH_TIMEOUT,
    DEFAULT_STALE_THRESHOLD,
};
pub use error::{CacheError, Result};

#[cfg(any(test, feature = "testing"))]
pub use clock::ManualClock;
