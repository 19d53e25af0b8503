//! Client-side cache and sync layer for personal finance records.
//!
//! Keeps an in-memory snapshot of each remote collection (expenses, goals,
//! investments), serves synchronous period reads from it, persists it to a
//! local store for fast restarts and re-fetches after every mutation through
//! a debounced change bus. [`FinanceCaches`] wires the pieces together.

pub mod app;
pub mod backfill;
pub mod bus;
pub mod cache;
pub mod config;
pub mod source;
pub mod store;
pub mod telemetry;

pub use app::{FinanceCaches, InitReport};
pub use backfill::{BackfillJob, BackfillOutcome, BackfillReport};
pub use bus::ChangeBus;
pub use cache::{CacheError, CacheSettings, CacheStatus, DomainCache, RefreshOutcome};
pub use config::Config;
