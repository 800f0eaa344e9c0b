//! Account state cache.
//!
//! Maintains the latest known balances, positions, and last trade
//! prices, fed by unsolicited gateway events. Reads never block on
//! the network; feasibility checks run against whatever the cache
//! holds right now.

pub mod cache;

pub use cache::AccountCache;
