//! Local/server clock pair with drift-correcting convergence

use netsync_core::{check_delta, NetworkTime, SyncError, SyncResult, TimeSystemConfig};
use tracing::{debug, warn};

use crate::{ClockOffsetEstimator, RttStats};

/// Lifecycle of a [`TimeSystem`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeSystemState {
    /// Created, no reference sample yet
    Uninitialized,
    /// Reset at least once; clocks advance
    Running,
}

/// Two continuous clocks driven by one raw time counter.
///
/// `local_time` runs ahead of the server so that messages sent now arrive
/// in time; `server_time` trails the last received server timestamp so that
/// received state is already buffered when it is needed. Both are raw time
/// plus an offset, and the offsets converge toward the estimator's targets
/// by bending clock rate rather than jumping, unless the gap is too large.
pub struct TimeSystem {
    config: TimeSystemConfig,
    state: TimeSystemState,
    /// Raw accumulated time (seconds)
    time_sec: f64,
    current_local_offset: f64,
    current_server_offset: f64,
    estimator: ClockOffsetEstimator,
    cumulative_local_adjustment: f64,
    cumulative_server_adjustment: f64,
    hard_resets: u64,
}

impl TimeSystem {
    /// Create a time system with validated configuration
    pub fn new(config: TimeSystemConfig) -> SyncResult<Self> {
        config.validate()?;
        Ok(TimeSystem {
            estimator: ClockOffsetEstimator::new(&config),
            config,
            state: TimeSystemState::Uninitialized,
            time_sec: 0.0,
            current_local_offset: 0.0,
            current_server_offset: 0.0,
            cumulative_local_adjustment: 0.0,
            cumulative_server_adjustment: 0.0,
            hard_resets: 0,
        })
    }

    /// Default configuration for a tick rate
    pub fn with_tick_rate(tick_rate: u32) -> SyncResult<Self> {
        Self::new(TimeSystemConfig::for_tick_rate(tick_rate))
    }

    /// Snap both clocks to a fresh reference sample, dropping history.
    ///
    /// Called on connect, and usable any time the caller knows the timeline
    /// was discontinuous.
    pub fn reset(&mut self, server_time: f64, rtt: f64) -> SyncResult<()> {
        if !server_time.is_finite() {
            return Err(SyncError::NonFiniteServerTime(server_time));
        }
        netsync_core::check_rtt(rtt)?;

        self.estimator.clear();
        self.estimator.sync(server_time, rtt, self.time_sec)?;
        self.snap_to_target();
        self.state = TimeSystemState::Running;

        debug!(
            server_time,
            rtt,
            local_time = self.local_time(),
            "time system reset"
        );
        Ok(())
    }

    /// Feed a new sample. Only the convergence target moves.
    pub fn sync(&mut self, server_time: f64, rtt: f64) -> SyncResult<()> {
        self.ensure_running()?;
        self.estimator.sync(server_time, rtt, self.time_sec)
    }

    /// Advance both clocks by `delta_time` seconds of wall time.
    ///
    /// Returns `true` when the offset gap exceeded the hard reset threshold
    /// and the clocks were snapped instead of converged.
    pub fn advance(&mut self, delta_time: f64) -> SyncResult<bool> {
        let delta_time = check_delta(delta_time)?;
        self.ensure_running()?;

        self.time_sec += delta_time;

        let local_gap = self.estimator.target_local_offset() - self.current_local_offset;
        let server_gap = self.estimator.target_server_offset() - self.current_server_offset;
        let threshold = self.config.hard_reset_threshold_sec;

        if local_gap.abs() > threshold || server_gap.abs() > threshold {
            warn!(
                local_gap,
                server_gap,
                threshold,
                rtt = self.estimator.last_synced_rtt(),
                "clock offset diverged, hard reset"
            );
            self.snap_to_target();
            self.hard_resets += 1;
            return Ok(true);
        }

        // Each clock runs at (1 ± ratio) of wall time until it reaches its target
        let max_step = delta_time * self.config.adjustment_ratio;
        let local_step = local_gap.clamp(-max_step, max_step);
        let server_step = server_gap.clamp(-max_step, max_step);

        self.current_local_offset += local_step;
        self.current_server_offset += server_step;
        self.cumulative_local_adjustment += local_step;
        self.cumulative_server_adjustment += server_step;

        Ok(false)
    }

    /// Fold the server target into raw time and snap both offsets
    fn snap_to_target(&mut self) {
        let server_offset = self.estimator.target_server_offset();
        self.time_sec += server_offset;
        self.estimator.rebase(server_offset);
        self.current_server_offset = self.estimator.target_server_offset();
        self.current_local_offset = self.estimator.target_local_offset();
    }

    fn ensure_running(&self) -> SyncResult<()> {
        match self.state {
            TimeSystemState::Running => Ok(()),
            TimeSystemState::Uninitialized => Err(SyncError::NotInitialized),
        }
    }

    /// Predicted server time at which messages sent now will be processed
    pub fn local_time(&self) -> f64 {
        self.time_sec + self.current_local_offset
    }

    /// Server timeline as it should be presented locally
    pub fn server_time(&self) -> f64 {
        self.time_sec + self.current_server_offset
    }

    pub fn local_network_time(&self) -> SyncResult<NetworkTime> {
        NetworkTime::new(self.config.tick_rate, self.local_time())
    }

    pub fn server_network_time(&self) -> SyncResult<NetworkTime> {
        NetworkTime::new(self.config.tick_rate, self.server_time())
    }

    pub fn state(&self) -> TimeSystemState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == TimeSystemState::Running
    }

    /// Desired `local_time - server_time`
    pub fn target_offset(&self) -> f64 {
        self.estimator.target_offset()
    }

    /// Actual `local_time - server_time`
    pub fn current_offset(&self) -> f64 {
        self.current_local_offset - self.current_server_offset
    }

    pub fn last_synced_rtt(&self) -> f64 {
        self.estimator.last_synced_rtt()
    }

    pub fn last_synced_server_time(&self) -> f64 {
        self.estimator.last_synced_server_time()
    }

    pub fn rtt_stats(&self) -> &RttStats {
        self.estimator.rtt_stats()
    }

    pub fn estimator(&self) -> &ClockOffsetEstimator {
        &self.estimator
    }

    /// Total smooth correction applied to local time since creation
    pub fn cumulative_local_adjustment(&self) -> f64 {
        self.cumulative_local_adjustment
    }

    /// Total smooth correction applied to server time since creation
    pub fn cumulative_server_adjustment(&self) -> f64 {
        self.cumulative_server_adjustment
    }

    pub fn hard_reset_count(&self) -> u64 {
        self.hard_resets
    }

    pub fn config(&self) -> &TimeSystemConfig {
        &self.config
    }
}
