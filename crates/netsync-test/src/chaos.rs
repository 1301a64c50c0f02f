//! Seeded network condition models
//!
//! Everything here is driven by a seeded `StdRng`, so a failing run can be
//! replayed exactly. Times are seconds.

use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Latency variation around the base value
#[derive(Clone, Debug)]
pub enum JitterDistribution {
    None,
    /// Uniform in `[-max_sec, max_sec]`
    Uniform { max_sec: f64 },
    /// Normal with zero mean
    Normal { stddev_sec: f64 },
}

impl JitterDistribution {
    pub fn sample(&self, rng: &mut StdRng) -> f64 {
        match self {
            JitterDistribution::None => 0.0,
            JitterDistribution::Uniform { max_sec } => {
                if *max_sec <= 0.0 {
                    return 0.0;
                }
                Uniform::new_inclusive(-max_sec, *max_sec).sample(rng)
            }
            JitterDistribution::Normal { stddev_sec } => {
                // Box-Muller; 1 - u keeps ln() away from zero
                let u1: f64 = 1.0 - rng.gen::<f64>();
                let u2: f64 = rng.gen();
                let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
                stddev_sec * z
            }
        }
    }
}

/// Client-side network and frame conditions
#[derive(Clone, Debug)]
pub struct ChaosConfig {
    /// Mean round-trip time
    pub base_rtt: f64,
    pub jitter: JitterDistribution,
    /// Probability that a message is lost (0.0 - 1.0)
    pub loss_rate: f64,
    /// Render frame duration range
    pub frame_time: (f64, f64),
    /// Seconds between time sync messages
    pub sync_interval: f64,
    /// Client clock rate error (1e-4 = 100 ppm fast)
    pub clock_drift: f64,
}

impl Default for ChaosConfig {
    fn default() -> Self {
        ChaosConfig {
            base_rtt: 0.1,
            jitter: JitterDistribution::Uniform { max_sec: 0.01 },
            loss_rate: 0.0,
            frame_time: (1.0 / 120.0, 1.0 / 30.0),
            sync_interval: 0.1,
            clock_drift: 0.0,
        }
    }
}

impl ChaosConfig {
    /// Fixed RTT, fixed 60 Hz frames
    pub fn perfect() -> Self {
        ChaosConfig {
            jitter: JitterDistribution::None,
            frame_time: (1.0 / 60.0, 1.0 / 60.0),
            ..Default::default()
        }
    }

    /// Broadband-class link
    pub fn good() -> Self {
        ChaosConfig {
            loss_rate: 0.01,
            ..Default::default()
        }
    }

    /// Congested mobile-class link with a drifting client clock
    pub fn poor() -> Self {
        ChaosConfig {
            base_rtt: 0.25,
            jitter: JitterDistribution::Normal { stddev_sec: 0.02 },
            loss_rate: 0.1,
            frame_time: (1.0 / 60.0, 1.0 / 20.0),
            sync_interval: 0.2,
            clock_drift: 1e-4,
        }
    }
}

/// RTT measurements around a base value that tests can move
pub struct RttSource {
    base_rtt: f64,
    jitter: JitterDistribution,
    rng: StdRng,
    /// (extra seconds, samples left)
    spike: Option<(f64, u32)>,
}

impl RttSource {
    pub fn new(base_rtt: f64, jitter: JitterDistribution, seed: u64) -> Self {
        RttSource {
            base_rtt,
            jitter,
            rng: StdRng::seed_from_u64(seed),
            spike: None,
        }
    }

    pub fn from_config(config: &ChaosConfig, seed: u64) -> Self {
        Self::new(config.base_rtt, config.jitter.clone(), seed)
    }

    pub fn base_rtt(&self) -> f64 {
        self.base_rtt
    }

    /// Step change, as after a route change
    pub fn set_base_rtt(&mut self, rtt: f64) {
        self.base_rtt = rtt;
    }

    /// Add `extra` seconds to the next `samples` measurements
    pub fn spike(&mut self, extra: f64, samples: u32) {
        self.spike = (samples > 0).then_some((extra, samples));
    }

    /// Next measured RTT; never negative
    pub fn sample(&mut self) -> f64 {
        let mut rtt = self.base_rtt + self.jitter.sample(&mut self.rng);
        if let Some((extra, left)) = self.spike {
            rtt += extra;
            self.spike = (left > 1).then_some((extra, left - 1));
        }
        rtt.max(0.0)
    }
}

/// Message in flight on a [`ChaosLink`]
#[derive(Clone, Debug)]
struct InFlight<T> {
    payload: T,
    send_time: f64,
    delivery_time: f64,
    seq: u64,
}

/// Link statistics
#[derive(Clone, Debug, Default)]
pub struct LinkStats {
    pub sent: u64,
    pub delivered: u64,
    pub lost: u64,
    /// Delivered after a message sent later
    pub reordered: u64,
    pub total_latency: f64,
    pub max_latency: f64,
}

impl LinkStats {
    pub fn loss_rate(&self) -> f64 {
        if self.sent == 0 {
            0.0
        } else {
            self.lost as f64 / self.sent as f64
        }
    }

    pub fn avg_latency(&self) -> f64 {
        if self.delivered == 0 {
            0.0
        } else {
            self.total_latency / self.delivered as f64
        }
    }
}

/// One-way lossy link with per-message jitter.
///
/// Jitter is drawn per message, so later messages can overtake earlier
/// ones; delivery is in arrival order.
pub struct ChaosLink<T> {
    one_way_latency: f64,
    jitter: JitterDistribution,
    loss_rate: f64,
    rng: StdRng,
    in_flight: Vec<InFlight<T>>,
    current_time: f64,
    next_seq: u64,
    highest_delivered: Option<u64>,
    stats: LinkStats,
}

impl<T> ChaosLink<T> {
    /// Server-to-client half of a link described by `config`
    pub fn new(config: &ChaosConfig, seed: u64) -> Self {
        ChaosLink {
            one_way_latency: config.base_rtt / 2.0,
            jitter: config.jitter.clone(),
            loss_rate: config.loss_rate,
            rng: StdRng::seed_from_u64(seed),
            in_flight: Vec::new(),
            current_time: 0.0,
            next_seq: 0,
            highest_delivered: None,
            stats: LinkStats::default(),
        }
    }

    pub fn send(&mut self, payload: T) {
        self.stats.sent += 1;
        let seq = self.next_seq;
        self.next_seq += 1;

        if self.rng.gen::<f64>() < self.loss_rate {
            self.stats.lost += 1;
            return;
        }

        let latency = (self.one_way_latency + self.jitter.sample(&mut self.rng)).max(0.0);
        self.in_flight.push(InFlight {
            payload,
            send_time: self.current_time,
            delivery_time: self.current_time + latency,
            seq,
        });
    }

    /// Advance link time and take everything that has arrived
    pub fn tick(&mut self, dt: f64) -> Vec<T> {
        self.current_time += dt;

        let now = self.current_time;
        let (mut arrived, pending): (Vec<_>, Vec<_>) = self
            .in_flight
            .drain(..)
            .partition(|m| m.delivery_time <= now);
        self.in_flight = pending;
        arrived.sort_by(|a, b| a.delivery_time.total_cmp(&b.delivery_time));

        let mut delivered = Vec::with_capacity(arrived.len());
        for message in arrived {
            let latency = message.delivery_time - message.send_time;
            self.stats.delivered += 1;
            self.stats.total_latency += latency;
            self.stats.max_latency = self.stats.max_latency.max(latency);

            match self.highest_delivered {
                Some(highest) if message.seq < highest => self.stats.reordered += 1,
                _ => self.highest_delivered = Some(message.seq),
            }
            delivered.push(message.payload);
        }
        delivered
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rtt_source_is_seeded() {
        let config = ChaosConfig::good();
        let mut a = RttSource::from_config(&config, 7);
        let mut b = RttSource::from_config(&config, 7);
        for _ in 0..50 {
            assert_eq!(a.sample(), b.sample());
        }
    }

    #[test]
    fn test_rtt_source_stays_in_jitter_band() {
        let mut source = RttSource::new(0.1, JitterDistribution::Uniform { max_sec: 0.01 }, 1);
        for _ in 0..1000 {
            let rtt = source.sample();
            assert!((0.09..=0.11).contains(&rtt), "rtt {rtt}");
        }

        source.set_base_rtt(0.2);
        assert!(source.sample() > 0.18);
    }

    #[test]
    fn test_spike_is_temporary() {
        let mut source = RttSource::new(0.1, JitterDistribution::None, 0);
        source.spike(0.4, 2);
        assert_eq!(source.sample(), 0.5);
        assert_eq!(source.sample(), 0.5);
        assert_eq!(source.sample(), 0.1);
    }

    #[test]
    fn test_normal_jitter_never_negative_rtt() {
        let mut source = RttSource::new(0.001, JitterDistribution::Normal { stddev_sec: 0.05 }, 3);
        for _ in 0..1000 {
            assert!(source.sample() >= 0.0);
        }
    }

    #[test]
    fn test_link_delivers_after_latency() {
        let mut link = ChaosLink::new(&ChaosConfig::perfect(), 0);
        link.send(1u32);

        assert!(link.tick(0.04).is_empty());
        assert_eq!(link.tick(0.02), vec![1]);
        assert_eq!(link.stats().delivered, 1);
        assert!((link.stats().avg_latency() - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_link_loss_and_reorder() {
        let config = ChaosConfig {
            jitter: JitterDistribution::Uniform { max_sec: 0.04 },
            loss_rate: 0.1,
            ..Default::default()
        };
        let mut link = ChaosLink::new(&config, 12345);

        let mut delivered = 0;
        for i in 0..1000u32 {
            link.send(i);
            delivered += link.tick(0.005).len();
        }
        delivered += link.tick(1.0).len();

        let stats = link.stats();
        assert_eq!(stats.sent, 1000);
        assert_eq!(stats.lost + stats.delivered, 1000);
        assert_eq!(delivered as u64, stats.delivered);
        assert!(stats.loss_rate() > 0.05 && stats.loss_rate() < 0.15);
        assert!(stats.reordered > 0);
        assert_eq!(link.in_flight(), 0);
    }
}
