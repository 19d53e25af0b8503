//! Stateless derivations over a snapshot.
//!
//! These operate on whatever slice a cache currently holds and never touch
//! storage. Records with unparsable amounts or dates are skipped.

pub mod expenses;
pub mod goals;
pub mod investments;
