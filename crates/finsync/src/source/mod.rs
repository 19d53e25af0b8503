//! Remote record source wrappers and backends.
//!
//! [`Collection`] is the typed wrapper the caches talk to. Backends implement
//! `finsync_core::storage::RecordSource`; the in-process backend is selected
//! with the `inmemory` feature. `InstrumentedSource`, behind the `testing`
//! feature, decorates any backend to simulate outages and slow responses.

mod collection;
#[cfg(any(test, feature = "testing"))]
mod instrumented;

#[cfg(feature = "inmemory")]
pub mod inmemory;

pub use collection::Collection;
#[cfg(any(test, feature = "testing"))]
pub use instrumented::InstrumentedSource;

#[cfg(feature = "inmemory")]
pub use inmemory::InMemoryRecordSource;
