//! netsync time engine - server clock estimation and tick derivation
//!
//! This crate implements:
//! - `ClockOffsetEstimator`: RTT samples to target local/server offsets
//! - `TimeSystem`: local and server clocks that converge by rate, not by jumps
//! - `TickSystem`: fixed-rate tick index with coalesced tick notifications

pub mod clock;
pub mod estimator;
pub mod tick;

pub use clock::*;
pub use estimator::*;
pub use tick::*;
