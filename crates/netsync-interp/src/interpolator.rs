//! Buffered interpolation of replicated values
//!
//! Measurements arrive stamped with the sender's time. The interpolator holds
//! them until the local server clock reaches their timestamp, then blends
//! from the previous endpoint to the newest consumed measurement while the
//! render time (one tick behind server time) sweeps across the bracket.
//!
//! ## Policies
//! - **No extrapolation**: the blend fraction is clamped to `[0, 1]`, so the
//!   value holds at the last known measurement while waiting for more.
//! - **Late arrivals**: once interpolation heads toward an endpoint, a
//!   measurement at or before that endpoint is ignored instead of pulling the
//!   value backward.
//! - **Bursts**: more than `burst_teleport_count` arrivals between two
//!   updates (a suspended client catching up) teleports to the newest one.
//! - **Large gaps**: a bracket wider than `large_gap_threshold_sec` snaps to
//!   the new endpoint.

use netsync_core::{check_delta, InterpolatorConfig, NetworkTime, SyncError, SyncResult};
use tracing::{debug, trace};

use crate::{InterpolationStrategy, Linear, Measurement, MeasurementBuffer, Nlerp, Quat, Slerp, Vec3};

/// Brackets shorter than this are treated as instantaneous
const SMALL_RANGE: f64 = 1e-9;

/// Interpolates a stream of timestamped measurements into a per-frame value
pub struct BufferedLinearInterpolator<T, S = Linear> {
    config: InterpolatorConfig,
    strategy: S,
    buffer: MeasurementBuffer<T>,
    current_value: T,
    start_value: T,
    end_value: T,
    start_time: f64,
    end_time: f64,
    fraction: f32,
    /// Measurements consumed since creation or the last `clear`
    lifetime_consumed: u64,
    /// Arrivals since the last update, for burst detection
    received_this_frame: usize,
    last_received_time: Option<f64>,
}

pub type FloatInterpolator = BufferedLinearInterpolator<f32, Linear>;
pub type DoubleInterpolator = BufferedLinearInterpolator<f64, Linear>;
pub type Vec3Interpolator = BufferedLinearInterpolator<Vec3, Linear>;
pub type QuatInterpolator = BufferedLinearInterpolator<Quat, Slerp>;
pub type QuatLerpInterpolator = BufferedLinearInterpolator<Quat, Nlerp>;

impl<T, S> BufferedLinearInterpolator<T, S>
where
    T: Clone + Default,
    S: InterpolationStrategy<T>,
{
    pub fn new(config: InterpolatorConfig, strategy: S) -> SyncResult<Self> {
        config.validate()?;
        Ok(Self::build(config, strategy))
    }

    /// Default configuration with a custom strategy
    pub fn with_strategy(strategy: S) -> Self {
        Self::build(InterpolatorConfig::default(), strategy)
    }

    fn build(config: InterpolatorConfig, strategy: S) -> Self {
        BufferedLinearInterpolator {
            buffer: MeasurementBuffer::new(config.max_buffered_measurements),
            config,
            strategy,
            current_value: T::default(),
            start_value: T::default(),
            end_value: T::default(),
            start_time: 0.0,
            end_time: 0.0,
            fraction: 0.0,
            lifetime_consumed: 0,
            received_this_frame: 0,
            last_received_time: None,
        }
    }

    /// Queue a measurement taken at `timestamp`
    pub fn add_measurement(&mut self, value: T, timestamp: f64) -> SyncResult<()> {
        if !timestamp.is_finite() {
            return Err(SyncError::NonFiniteTimestamp(timestamp));
        }

        self.received_this_frame += 1;

        if self.received_this_frame > self.config.burst_teleport_count {
            let newer = self.last_received_time.map_or(true, |last| timestamp > last)
                && (self.lifetime_consumed == 0 || timestamp > self.end_time);
            if newer {
                debug!(
                    timestamp,
                    received = self.received_this_frame,
                    "measurement burst, teleporting to newest"
                );
                self.reset_to(value.clone(), timestamp);
                // keeps render time from falling behind the teleport target
                self.buffer.insert(Measurement::new(value, timestamp));
            }
            return Ok(());
        }

        if self.lifetime_consumed > 0 && timestamp <= self.end_time {
            trace!(timestamp, end_time = self.end_time, "ignoring late measurement");
            return Ok(());
        }

        self.last_received_time = Some(
            self.last_received_time
                .map_or(timestamp, |last| last.max(timestamp)),
        );
        if let Some(evicted) = self.buffer.insert(Measurement::new(value, timestamp)) {
            trace!(evicted = evicted.timestamp, "measurement buffer full");
        }
        Ok(())
    }

    /// Advance interpolation.
    ///
    /// `server_time` decides which measurements are consumable; `render_time`
    /// (normally one tick earlier) is the point shown inside the bracket.
    pub fn update(&mut self, delta_time: f64, render_time: f64, server_time: f64) -> SyncResult<T> {
        check_delta(delta_time)?;
        if !render_time.is_finite() {
            return Err(SyncError::NonFiniteTimestamp(render_time));
        }
        if !server_time.is_finite() {
            return Err(SyncError::NonFiniteTimestamp(server_time));
        }

        self.try_consume(render_time, server_time);

        if self.lifetime_consumed > 0 {
            let range = self.end_time - self.start_time;
            let t = if range > SMALL_RANGE {
                ((render_time - self.start_time) / range).clamp(0.0, 1.0)
            } else {
                1.0
            };
            self.fraction = t as f32;
            self.current_value = self
                .strategy
                .interpolate(&self.start_value, &self.end_value, self.fraction);
        }

        self.received_this_frame = 0;
        Ok(self.current_value.clone())
    }

    /// Update against a server clock, rendering one tick behind it
    pub fn update_with_time(&mut self, delta_time: f64, server_time: &NetworkTime) -> SyncResult<T> {
        let render_time = server_time.time_ticks_ago(1).time();
        self.update(delta_time, render_time, server_time.time())
    }

    /// Update with render and consume times both at `current_time`
    pub fn update_internal(&mut self, delta_time: f64, current_time: f64) -> SyncResult<T> {
        self.update(delta_time, current_time, current_time)
    }

    fn try_consume(&mut self, render_time: f64, server_time: f64) {
        if self.lifetime_consumed > 0 && render_time < self.end_time {
            return;
        }

        let (oldest, newest, consumed) = {
            let mut drained = self.buffer.drain_until(server_time);
            let consumed = drained.len();
            let Some(oldest) = drained.next() else {
                return;
            };
            match drained.last() {
                Some(newest) => (Some(oldest), newest, consumed),
                None => (None, oldest, consumed),
            }
        };

        if self.lifetime_consumed == 0 {
            // first data: start at the oldest consumed value, no blend from default
            let start = oldest.unwrap_or_else(|| newest.clone());
            self.start_value = start.value;
            self.start_time = start.timestamp;
            self.end_value = newest.value;
            self.end_time = newest.timestamp;
        } else if newest.timestamp > self.end_time {
            self.start_value = std::mem::replace(&mut self.end_value, newest.value);
            self.start_time = self.end_time;
            self.end_time = newest.timestamp;
        }
        self.lifetime_consumed += consumed as u64;

        let bracket = self.end_time - self.start_time;
        let threshold = self.config.large_gap_threshold_sec;
        if bracket > threshold {
            debug!(bracket, threshold, "gap too large, snapping to latest");
            self.start_value = self.end_value.clone();
            self.start_time = self.end_time;
        }
    }

    /// Value for the current frame. Reading never advances state.
    pub fn get_interpolated_value(&self) -> &T {
        &self.current_value
    }

    /// Drop all buffered data and show `value` from `timestamp` on
    pub fn reset_to(&mut self, value: T, timestamp: f64) {
        self.buffer.clear();
        self.last_received_time = Some(
            self.last_received_time
                .map_or(timestamp, |last| last.max(timestamp)),
        );
        self.lifetime_consumed = 1;
        self.start_value = value.clone();
        self.end_value = value.clone();
        self.current_value = value;
        self.start_time = timestamp;
        self.end_time = timestamp;
        self.fraction = 1.0;
    }

    /// Forget everything, as if no measurement was ever received
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.current_value = T::default();
        self.start_value = T::default();
        self.end_value = T::default();
        self.start_time = 0.0;
        self.end_time = 0.0;
        self.fraction = 0.0;
        self.lifetime_consumed = 0;
        self.received_this_frame = 0;
        self.last_received_time = None;
    }

    /// Whether any measurement has been consumed
    pub fn is_initialized(&self) -> bool {
        self.lifetime_consumed > 0
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Blend fraction used by the last update
    pub fn interpolation_fraction(&self) -> f32 {
        self.fraction
    }

    /// Timestamp of the current interpolation endpoint
    pub fn end_time(&self) -> f64 {
        self.end_time
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn config(&self) -> &InterpolatorConfig {
        &self.config
    }
}

impl<T, S> Default for BufferedLinearInterpolator<T, S>
where
    T: Clone + Default,
    S: InterpolationStrategy<T> + Default,
{
    fn default() -> Self {
        Self::with_strategy(S::default())
    }
}
