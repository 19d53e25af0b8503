//! SQLite local store.
//!
//! Persists string values in a single key-value table using `rusqlite` for
//! synchronous access and `tokio-rusqlite` to run it off the async runtime.

mod error;
mod schema;
mod store;

pub use store::SqliteStore;
