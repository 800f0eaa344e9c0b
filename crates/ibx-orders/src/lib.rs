//! Order lifecycle tracking.
//!
//! Tracks every submitted order from creation to a terminal state,
//! enforcing the legal transition graph, and maintains the action-id
//! index that makes submission idempotent.

pub mod tracker;

pub use tracker::{OrderTracker, ReserveOutcome, TrackerError};
