//! Core types and ports for finsync.
//!
//! Everything in this crate is free of runtime I/O: record types and their
//! period parsing, the traits the runtime talks to (remote record source and
//! persistent local store), storage key builders, snapshot serialization and
//! stateless derivations over snapshots.

pub mod cache;
pub mod calc;
pub mod records;
pub mod recurring;
pub mod storage;
