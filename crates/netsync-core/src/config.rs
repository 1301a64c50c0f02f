//! Session configuration
//!
//! Configuration is constructed once per connection and handed to the
//! components that need it. Nothing here is global.

use crate::{SyncError, SyncResult};

/// Clock synchronization configuration
#[derive(Clone, Debug, PartialEq)]
pub struct TimeSystemConfig {
    /// Fixed simulation tick rate (Hz)
    pub tick_rate: u32,
    /// Extra lead of local time over the estimated server arrival time (seconds)
    pub local_buffer_sec: f64,
    /// Lag of server time behind the last received server timestamp (seconds)
    pub server_buffer_sec: f64,
    /// RTT assumed before the first measurement (seconds)
    pub initial_rtt: f64,
    /// Offset gap above which clocks snap instead of converging (seconds)
    pub hard_reset_threshold_sec: f64,
    /// Maximum clock rate deviation used while converging (0.01 = ±1%)
    pub adjustment_ratio: f64,
    /// Number of RTT samples kept for statistics
    pub rtt_window: usize,
}

impl Default for TimeSystemConfig {
    fn default() -> Self {
        Self::for_tick_rate(30)
    }
}

impl TimeSystemConfig {
    /// Defaults for a tick rate: both buffers are one tick long
    pub fn for_tick_rate(tick_rate: u32) -> Self {
        let tick = 1.0 / f64::from(tick_rate.max(1));
        TimeSystemConfig {
            tick_rate,
            local_buffer_sec: tick,
            server_buffer_sec: tick,
            initial_rtt: 0.1,
            hard_reset_threshold_sec: 0.15,
            adjustment_ratio: 0.01,
            rtt_window: 64,
        }
    }

    /// Tick duration in seconds
    pub fn tick_duration(&self) -> f64 {
        1.0 / f64::from(self.tick_rate)
    }

    pub fn validate(&self) -> SyncResult<()> {
        if self.tick_rate == 0 {
            return Err(SyncError::InvalidTickRate(self.tick_rate));
        }
        if !(self.local_buffer_sec.is_finite() && self.local_buffer_sec >= 0.0) {
            return Err(SyncError::InvalidConfig("local_buffer_sec must be finite and >= 0"));
        }
        if !(self.server_buffer_sec.is_finite() && self.server_buffer_sec >= 0.0) {
            return Err(SyncError::InvalidConfig("server_buffer_sec must be finite and >= 0"));
        }
        if !(self.initial_rtt.is_finite() && self.initial_rtt >= 0.0) {
            return Err(SyncError::InvalidConfig("initial_rtt must be finite and >= 0"));
        }
        if !(self.hard_reset_threshold_sec.is_finite() && self.hard_reset_threshold_sec > 0.0) {
            return Err(SyncError::InvalidConfig("hard_reset_threshold_sec must be > 0"));
        }
        if !(self.adjustment_ratio > 0.0 && self.adjustment_ratio < 1.0) {
            return Err(SyncError::InvalidConfig("adjustment_ratio must be in (0, 1)"));
        }
        if self.rtt_window == 0 {
            return Err(SyncError::InvalidConfig("rtt_window must be > 0"));
        }
        Ok(())
    }
}

/// Interpolation buffer configuration
#[derive(Clone, Debug, PartialEq)]
pub struct InterpolatorConfig {
    /// Maximum measurements retained; the oldest are evicted beyond this
    pub max_buffered_measurements: usize,
    /// Arrivals within one update above which the interpolator teleports
    pub burst_teleport_count: usize,
    /// Bracket or render gap above which the interpolator snaps (seconds)
    pub large_gap_threshold_sec: f64,
}

impl Default for InterpolatorConfig {
    fn default() -> Self {
        InterpolatorConfig {
            max_buffered_measurements: 100,
            burst_teleport_count: 100,
            large_gap_threshold_sec: 3.0,
        }
    }
}

impl InterpolatorConfig {
    pub fn validate(&self) -> SyncResult<()> {
        if self.max_buffered_measurements == 0 {
            return Err(SyncError::InvalidConfig("max_buffered_measurements must be > 0"));
        }
        if self.burst_teleport_count == 0 {
            return Err(SyncError::InvalidConfig("burst_teleport_count must be > 0"));
        }
        if !(self.large_gap_threshold_sec.is_finite() && self.large_gap_threshold_sec > 0.0) {
            return Err(SyncError::InvalidConfig("large_gap_threshold_sec must be > 0"));
        }
        Ok(())
    }
}

/// Complete per-session configuration
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SyncConfig {
    pub time: TimeSystemConfig,
    pub interpolation: InterpolatorConfig,
}

impl SyncConfig {
    /// Low latency, low jitter links (60Hz, tight buffers)
    pub fn lan() -> Self {
        SyncConfig {
            time: TimeSystemConfig {
                initial_rtt: 0.005,
                hard_reset_threshold_sec: 0.1,
                ..TimeSystemConfig::for_tick_rate(60)
            },
            interpolation: InterpolatorConfig {
                large_gap_threshold_sec: 1.0,
                ..InterpolatorConfig::default()
            },
        }
    }

    /// Mobile and long-haul links (20Hz, generous buffers)
    pub fn high_latency() -> Self {
        SyncConfig {
            time: TimeSystemConfig {
                local_buffer_sec: 0.1,
                server_buffer_sec: 0.1,
                initial_rtt: 0.3,
                hard_reset_threshold_sec: 0.4,
                ..TimeSystemConfig::for_tick_rate(20)
            },
            interpolation: InterpolatorConfig {
                max_buffered_measurements: 200,
                large_gap_threshold_sec: 5.0,
                ..InterpolatorConfig::default()
            },
        }
    }

    pub fn validate(&self) -> SyncResult<()> {
        self.time.validate()?;
        self.interpolation.validate()
    }
}
