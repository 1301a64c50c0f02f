//! Time system simulation
//!
//! Drives one client [`TimeSystem`] against an ideal server clock through
//! randomized frames and periodic sync messages, recording how far the
//! client's offsets stray from where they should be.
//!
//! A sync sample carries the server clock as it was when the reply left the
//! server, one downlink latency before it reaches the client. RTT steps,
//! spikes and jitter act on the uplink leg; the downlink latency only moves
//! through [`TimeSimulator::set_downlink_latency`].

use netsync_core::{SyncResult, TimeSystemConfig};
use netsync_time::TimeSystem;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::chaos::{ChaosConfig, RttSource};

/// Server clock reading when the simulation starts
const SERVER_EPOCH: f64 = 1000.0;

/// State of the simulated client after one frame
#[derive(Clone, Copy, Debug)]
pub struct FrameSample {
    pub real_time: f64,
    /// `current_offset` minus the offset implied by the true mean RTT
    pub offset_error: f64,
    /// Client server time minus (true server clock - downlink latency - server buffer)
    pub server_error: f64,
    pub hard_reset: bool,
}

/// Aggregate over a run of frames
#[derive(Clone, Debug, Default)]
pub struct SimulationReport {
    pub frames: usize,
    pub duration: f64,
    pub max_abs_offset_error: f64,
    pub mean_offset_error: f64,
    pub max_abs_server_error: f64,
    pub hard_resets: usize,
    /// Smooth local correction applied during the run
    pub local_adjustment: f64,
    /// Smooth server correction applied during the run
    pub server_adjustment: f64,
}

impl SimulationReport {
    fn from_frames(frames: &[FrameSample], local_adjustment: f64, server_adjustment: f64) -> Self {
        let mut report = SimulationReport {
            frames: frames.len(),
            local_adjustment,
            server_adjustment,
            ..Default::default()
        };
        let (Some(first), Some(last)) = (frames.first(), frames.last()) else {
            return report;
        };
        report.duration = last.real_time - first.real_time;

        let mut sum = 0.0;
        for frame in frames {
            sum += frame.offset_error;
            report.max_abs_offset_error = report.max_abs_offset_error.max(frame.offset_error.abs());
            report.max_abs_server_error = report.max_abs_server_error.max(frame.server_error.abs());
            if frame.hard_reset {
                report.hard_resets += 1;
            }
        }
        report.mean_offset_error = sum / frames.len() as f64;
        report
    }
}

/// Single client against an ideal server
pub struct TimeSimulator {
    system: TimeSystem,
    chaos: ChaosConfig,
    rtt: RttSource,
    rng: StdRng,
    downlink_latency: f64,
    real_time: f64,
    next_sync: f64,
    syncs_sent: u64,
    syncs_delivered: u64,
    frames: Vec<FrameSample>,
}

impl TimeSimulator {
    /// Connect a fresh client: the time system is reset at the base RTT,
    /// with half of it on each leg
    pub fn new(config: TimeSystemConfig, chaos: ChaosConfig, seed: u64) -> SyncResult<Self> {
        let downlink_latency = chaos.base_rtt / 2.0;
        let mut system = TimeSystem::new(config)?;
        system.reset(SERVER_EPOCH - downlink_latency, chaos.base_rtt)?;

        Ok(TimeSimulator {
            system,
            rtt: RttSource::from_config(&chaos, seed),
            rng: StdRng::seed_from_u64(seed.wrapping_add(1)),
            downlink_latency,
            next_sync: chaos.sync_interval,
            chaos,
            real_time: 0.0,
            syncs_sent: 0,
            syncs_delivered: 0,
            frames: Vec::new(),
        })
    }

    /// Render one frame: advance the client, then deliver a sync if due
    pub fn step(&mut self) -> SyncResult<FrameSample> {
        let (min, max) = self.chaos.frame_time;
        let dt = if max > min {
            self.rng.gen_range(min..max)
        } else {
            min
        };
        self.real_time += dt;

        let hard_reset = self.system.advance(dt * (1.0 + self.chaos.clock_drift))?;
        if hard_reset {
            debug!(real_time = self.real_time, "simulated client hard reset");
        }

        if self.real_time >= self.next_sync {
            self.next_sync += self.chaos.sync_interval;
            self.syncs_sent += 1;
            if self.rng.gen::<f64>() >= self.chaos.loss_rate {
                let rtt = self.rtt.sample();
                self.system.sync(self.server_clock() - self.downlink_latency, rtt)?;
                self.syncs_delivered += 1;
            }
        }

        let ideal_server =
            self.server_clock() - self.downlink_latency - self.system.config().server_buffer_sec;
        let sample = FrameSample {
            real_time: self.real_time,
            offset_error: self.system.current_offset() - self.expected_offset(),
            server_error: self.system.server_time() - ideal_server,
            hard_reset,
        };
        self.frames.push(sample);
        Ok(sample)
    }

    /// Run for `seconds` of simulated wall time
    pub fn run_for(&mut self, seconds: f64) -> SyncResult<SimulationReport> {
        let end = self.real_time + seconds;
        self.run_while(|sim| sim.real_time < end)
    }

    /// Run until `count` more sync messages have been sent
    pub fn run_syncs(&mut self, count: u64) -> SyncResult<SimulationReport> {
        let target = self.syncs_sent + count;
        self.run_while(|sim| sim.syncs_sent < target)
    }

    fn run_while(&mut self, mut keep_going: impl FnMut(&Self) -> bool) -> SyncResult<SimulationReport> {
        let first = self.frames.len();
        let local_before = self.system.cumulative_local_adjustment();
        let server_before = self.system.cumulative_server_adjustment();

        while keep_going(self) {
            self.step()?;
        }

        Ok(SimulationReport::from_frames(
            &self.frames[first..],
            self.system.cumulative_local_adjustment() - local_before,
            self.system.cumulative_server_adjustment() - server_before,
        ))
    }

    /// Move the mean RTT of future sync samples
    pub fn set_base_rtt(&mut self, rtt: f64) {
        self.rtt.set_base_rtt(rtt);
    }

    /// Server-to-client latency of sync replies
    pub fn set_downlink_latency(&mut self, latency: f64) {
        self.downlink_latency = latency;
    }

    pub fn downlink_latency(&self) -> f64 {
        self.downlink_latency
    }

    /// Inflate the next `syncs` RTT samples by `extra` seconds
    pub fn spike_rtt(&mut self, extra: f64, syncs: u32) {
        self.rtt.spike(extra, syncs);
    }

    /// True server clock now
    pub fn server_clock(&self) -> f64 {
        SERVER_EPOCH + self.real_time
    }

    /// `local_time - server_time` the client should settle at
    pub fn expected_offset(&self) -> f64 {
        self.rtt.base_rtt() / 2.0 + self.system.estimator().buffer_sec()
    }

    pub fn system(&self) -> &TimeSystem {
        &self.system
    }

    pub fn system_mut(&mut self) -> &mut TimeSystem {
        &mut self.system
    }

    pub fn real_time(&self) -> f64 {
        self.real_time
    }

    pub fn frames(&self) -> &[FrameSample] {
        &self.frames
    }

    pub fn syncs_sent(&self) -> u64 {
        self.syncs_sent
    }

    pub fn syncs_delivered(&self) -> u64 {
        self.syncs_delivered
    }
}
