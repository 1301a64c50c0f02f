//! Clock offset estimation from (server time, RTT) samples

use std::collections::VecDeque;

use netsync_core::{check_rtt, SyncError, SyncResult, TimeSystemConfig};
use tracing::trace;

/// Rolling RTT statistics over the most recent samples
#[derive(Clone, Debug)]
pub struct RttStats {
    samples: VecDeque<f64>,
    max_samples: usize,
    /// Median of the window
    median: f64,
    /// Max deviation from the median (jitter envelope)
    jitter: f64,
}

impl RttStats {
    pub fn new(max_samples: usize) -> Self {
        RttStats {
            samples: VecDeque::with_capacity(max_samples),
            max_samples: max_samples.max(1),
            median: 0.0,
            jitter: 0.0,
        }
    }

    /// Record an RTT sample (seconds)
    pub fn record(&mut self, rtt: f64) {
        self.samples.push_back(rtt);
        while self.samples.len() > self.max_samples {
            self.samples.pop_front();
        }

        self.median = Self::median_of(&self.samples);
        let median = self.median;
        self.jitter = self
            .samples
            .iter()
            .map(|s| (s - median).abs())
            .fold(0.0, f64::max);
    }

    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    pub fn median(&self) -> f64 {
        self.median
    }

    pub fn jitter(&self) -> f64 {
        self.jitter
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn latest(&self) -> Option<f64> {
        self.samples.back().copied()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.median = 0.0;
        self.jitter = 0.0;
    }

    fn median_of(values: &VecDeque<f64>) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        let mut sorted: Vec<f64> = values.iter().copied().collect();
        sorted.sort_by(f64::total_cmp);
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        }
    }
}

/// Turns raw sync samples into target clock offsets.
///
/// Offsets are relative to the owning system's raw accumulated time. The
/// estimator only moves targets; converging the live clocks toward them is
/// the job of [`TimeSystem::advance`](crate::TimeSystem::advance).
#[derive(Clone, Debug)]
pub struct ClockOffsetEstimator {
    local_buffer_sec: f64,
    server_buffer_sec: f64,
    target_local_offset: f64,
    target_server_offset: f64,
    last_synced_server_time: f64,
    last_synced_rtt: f64,
    initial_rtt: f64,
    sync_count: u64,
    rtt: RttStats,
}

impl ClockOffsetEstimator {
    pub fn new(config: &TimeSystemConfig) -> Self {
        ClockOffsetEstimator {
            local_buffer_sec: config.local_buffer_sec,
            server_buffer_sec: config.server_buffer_sec,
            target_local_offset: 0.0,
            target_server_offset: 0.0,
            last_synced_server_time: 0.0,
            last_synced_rtt: config.initial_rtt,
            initial_rtt: config.initial_rtt,
            sync_count: 0,
            rtt: RttStats::new(config.rtt_window),
        }
    }

    /// Record a sample received when raw local time was `time_sec`.
    ///
    /// Server time targets the received timestamp minus the server buffer and
    /// does not depend on RTT. Local time leads it by half the RTT plus both
    /// buffers.
    pub fn sync(&mut self, server_time: f64, rtt: f64, time_sec: f64) -> SyncResult<()> {
        if !server_time.is_finite() {
            return Err(SyncError::NonFiniteServerTime(server_time));
        }
        let rtt = check_rtt(rtt)?;

        self.last_synced_server_time = server_time;
        self.last_synced_rtt = rtt;
        self.sync_count += 1;
        self.rtt.record(rtt);

        let time_diff = server_time - time_sec;
        self.target_server_offset = time_diff - self.server_buffer_sec;
        self.target_local_offset = time_diff + rtt / 2.0 + self.local_buffer_sec;

        trace!(
            server_time,
            rtt,
            target_local = self.target_local_offset,
            target_server = self.target_server_offset,
            "sync sample"
        );
        Ok(())
    }

    /// Shift both targets after `shift` seconds were folded into raw time
    pub fn rebase(&mut self, shift: f64) {
        self.target_local_offset -= shift;
        self.target_server_offset -= shift;
    }

    /// Forget all sample history
    pub fn clear(&mut self) {
        self.target_local_offset = 0.0;
        self.target_server_offset = 0.0;
        self.last_synced_server_time = 0.0;
        self.last_synced_rtt = self.initial_rtt;
        self.sync_count = 0;
        self.rtt.clear();
    }

    pub fn target_local_offset(&self) -> f64 {
        self.target_local_offset
    }

    pub fn target_server_offset(&self) -> f64 {
        self.target_server_offset
    }

    /// Desired `LocalTime - ServerTime`
    pub fn target_offset(&self) -> f64 {
        self.target_local_offset - self.target_server_offset
    }

    pub fn half_rtt(&self) -> f64 {
        self.last_synced_rtt / 2.0
    }

    pub fn last_synced_server_time(&self) -> f64 {
        self.last_synced_server_time
    }

    pub fn last_synced_rtt(&self) -> f64 {
        self.last_synced_rtt
    }

    pub fn sync_count(&self) -> u64 {
        self.sync_count
    }

    pub fn rtt_stats(&self) -> &RttStats {
        &self.rtt
    }

    /// Combined jitter absorption margin (server + local buffer)
    pub fn buffer_sec(&self) -> f64 {
        self.local_buffer_sec + self.server_buffer_sec
    }
}
