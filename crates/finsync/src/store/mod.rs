//! Local store backends.
//!
//! Implementations of `finsync_core::cache::LocalStore`:
//!
//! - [`MemoryStore`]: volatile, for tests and ephemeral sessions
//! - `SqliteStore` (feature `sqlite`, default): durable key-value table in a
//!   SQLite file, using `rusqlite` wrapped by `tokio-rusqlite`

mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::MemoryStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
