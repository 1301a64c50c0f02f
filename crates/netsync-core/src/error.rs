//! Error types for netsync
//!
//! Only caller misuse is an error. Loss, duplication, reordering, RTT spikes
//! and measurement bursts are normal operating conditions and are absorbed by
//! the clock and interpolator policies instead.

use thiserror::Error;

/// Core netsync errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    // Lifecycle errors
    #[error("Time system used before reset: call reset(server_time, rtt) first")]
    NotInitialized,

    // Input errors
    #[error("Invalid round-trip time: {0} (must be finite and non-negative)")]
    InvalidRtt(f64),

    #[error("Non-finite server time: {0}")]
    NonFiniteServerTime(f64),

    #[error("Invalid delta time: {0} (must be finite and non-negative)")]
    InvalidDeltaTime(f64),

    #[error("Non-finite timestamp: {0}")]
    NonFiniteTimestamp(f64),

    // Tick errors
    #[error("Invalid tick rate: {0}")]
    InvalidTickRate(u32),

    #[error("Tick rate mismatch: {left}Hz vs {right}Hz")]
    TickRateMismatch { left: u32, right: u32 },

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Result type for netsync operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Reject RTT values that are negative, NaN or infinite
#[inline]
pub fn check_rtt(rtt: f64) -> SyncResult<f64> {
    if rtt.is_finite() && rtt >= 0.0 {
        Ok(rtt)
    } else {
        Err(SyncError::InvalidRtt(rtt))
    }
}

/// Reject frame deltas that are negative, NaN or infinite
#[inline]
pub fn check_delta(delta_time: f64) -> SyncResult<f64> {
    if delta_time.is_finite() && delta_time >= 0.0 {
        Ok(delta_time)
    } else {
        Err(SyncError::InvalidDeltaTime(delta_time))
    }
}
