//! In-process change notification bus.
//!
//! Mutations announce that "something changed" without knowing who is
//! listening. Bursts of announcements are debounced into a single
//! notification round.

mod change_bus;

pub use change_bus::{ChangeBus, SubscriptionId, DEFAULT_DEBOUNCE};
