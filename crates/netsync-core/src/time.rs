//! Time primitives for netsync
//!
//! All continuous times are `f64` seconds. A [`NetworkTime`] pairs such a time
//! with the fixed tick rate it is measured against, so the discrete tick index
//! and the position inside the current tick can be derived from it.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Sub};

use crate::{SyncError, SyncResult};

/// Products within this distance below a whole tick are treated as that tick.
/// Accumulated frame deltas otherwise land on 2.9999999 and lose a tick.
const TICK_EPSILON: f64 = 1e-9;

/// Continuous time measured against a fixed tick rate
#[derive(Clone, Copy, PartialEq)]
pub struct NetworkTime {
    tick_rate: u32,
    time: f64,
}

impl NetworkTime {
    /// Create a network time, validating the tick rate and the time value
    pub fn new(tick_rate: u32, time: f64) -> SyncResult<Self> {
        if tick_rate == 0 {
            return Err(SyncError::InvalidTickRate(tick_rate));
        }
        if !time.is_finite() {
            return Err(SyncError::NonFiniteTimestamp(time));
        }
        Ok(NetworkTime { tick_rate, time })
    }

    /// Time zero at the given tick rate
    pub fn zero(tick_rate: u32) -> SyncResult<Self> {
        Self::new(tick_rate, 0.0)
    }

    /// Network time at the start of `tick`
    pub fn from_tick(tick_rate: u32, tick: i64) -> SyncResult<Self> {
        if tick_rate == 0 {
            return Err(SyncError::InvalidTickRate(tick_rate));
        }
        Self::new(tick_rate, tick as f64 / f64::from(tick_rate))
    }

    #[inline]
    pub fn tick_rate(&self) -> u32 {
        self.tick_rate
    }

    #[inline]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Duration of one tick in seconds
    #[inline]
    pub fn tick_duration(&self) -> f64 {
        1.0 / f64::from(self.tick_rate)
    }

    /// Discrete tick index: `floor(time * tick_rate)`
    #[inline]
    pub fn tick(&self) -> i64 {
        (self.time * f64::from(self.tick_rate) + TICK_EPSILON).floor() as i64
    }

    /// Seconds elapsed since the start of the current tick
    #[inline]
    pub fn tick_offset(&self) -> f64 {
        (self.time - self.fixed_time()).max(0.0)
    }

    /// Time snapped down to the start of the current tick
    #[inline]
    pub fn fixed_time(&self) -> f64 {
        self.tick() as f64 * self.tick_duration()
    }

    /// This time snapped down to its tick boundary
    pub fn to_fixed(&self) -> NetworkTime {
        NetworkTime {
            tick_rate: self.tick_rate,
            time: self.fixed_time(),
        }
    }

    /// The same clock `ticks` ticks earlier
    pub fn time_ticks_ago(&self, ticks: u32) -> NetworkTime {
        NetworkTime {
            tick_rate: self.tick_rate,
            time: self.time - f64::from(ticks) * self.tick_duration(),
        }
    }

    /// Difference in seconds, only defined for equal tick rates
    pub fn checked_sub(&self, rhs: &NetworkTime) -> SyncResult<f64> {
        if self.tick_rate != rhs.tick_rate {
            return Err(SyncError::TickRateMismatch {
                left: self.tick_rate,
                right: rhs.tick_rate,
            });
        }
        Ok(self.time - rhs.time)
    }

    /// Replace the time, keeping the tick rate
    pub fn with_time(&self, time: f64) -> SyncResult<NetworkTime> {
        Self::new(self.tick_rate, time)
    }
}

impl PartialOrd for NetworkTime {
    /// Times at different tick rates are unordered
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.tick_rate != other.tick_rate {
            return None;
        }
        self.time.partial_cmp(&other.time)
    }
}

impl Add<f64> for NetworkTime {
    type Output = NetworkTime;

    #[inline]
    fn add(self, rhs: f64) -> Self::Output {
        NetworkTime {
            tick_rate: self.tick_rate,
            time: self.time + rhs,
        }
    }
}

impl Sub<f64> for NetworkTime {
    type Output = NetworkTime;

    #[inline]
    fn sub(self, rhs: f64) -> Self::Output {
        NetworkTime {
            tick_rate: self.tick_rate,
            time: self.time - rhs,
        }
    }
}

impl Sub<NetworkTime> for NetworkTime {
    type Output = f64;

    #[inline]
    fn sub(self, rhs: NetworkTime) -> Self::Output {
        debug_assert_eq!(
            self.tick_rate, rhs.tick_rate,
            "subtracting network times with different tick rates"
        );
        self.time - rhs.time
    }
}

impl fmt::Debug for NetworkTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "NetworkTime({:.4}s, tick {} @ {}Hz)",
            self.time,
            self.tick(),
            self.tick_rate
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_tick_derivation() {
        let t = NetworkTime::new(30, 1.0).unwrap();
        assert_eq!(t.tick(), 30);
        assert!((t.tick_duration() - 1.0 / 30.0).abs() < 1e-12);

        let t = NetworkTime::new(10, 0.35).unwrap();
        assert_eq!(t.tick(), 3);
        assert!((t.tick_offset() - 0.05).abs() < 1e-9);
        assert!((t.fixed_time() - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_accumulated_time_keeps_whole_ticks() {
        let mut t = NetworkTime::zero(10).unwrap();
        for _ in 0..30 {
            t = t + 0.1;
        }
        assert_eq!(t.tick(), 30);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(
            NetworkTime::new(0, 1.0),
            Err(SyncError::InvalidTickRate(0))
        ));
        assert!(NetworkTime::new(30, f64::NAN).is_err());
        assert!(NetworkTime::new(30, f64::INFINITY).is_err());
    }

    #[test]
    fn test_ticks_ago() {
        let t = NetworkTime::new(1, 2.5).unwrap();
        let earlier = t.time_ticks_ago(1);
        assert!((earlier.time() - 1.5).abs() < 1e-12);
        assert_eq!(earlier.tick_rate(), 1);
    }

    #[test]
    fn test_mismatched_rates() {
        let a = NetworkTime::new(30, 1.0).unwrap();
        let b = NetworkTime::new(60, 1.0).unwrap();
        assert!(a.partial_cmp(&b).is_none());
        assert!(matches!(
            a.checked_sub(&b),
            Err(SyncError::TickRateMismatch { left: 30, right: 60 })
        ));
        let c = NetworkTime::new(30, 0.5).unwrap();
        assert!((a.checked_sub(&c).unwrap() - 0.5).abs() < 1e-12);
        assert!(c < a);
    }

    #[test]
    fn test_from_tick_roundtrip() {
        let t = NetworkTime::from_tick(60, 125).unwrap();
        assert_eq!(t.tick(), 125);
        assert!(t.tick_offset() < 1e-9);
    }

    proptest! {
        #[test]
        fn prop_fixed_time_never_after_time(rate in 1u32..240, time in 0.0f64..10_000.0) {
            let t = NetworkTime::new(rate, time).unwrap();
            prop_assert!(t.fixed_time() <= t.time() + 1e-6);
            prop_assert!(t.tick_offset() < t.tick_duration() + 1e-6);
        }

        #[test]
        fn prop_tick_monotonic(rate in 1u32..240, a in 0.0f64..1_000.0, delta in 0.0f64..10.0) {
            let t1 = NetworkTime::new(rate, a).unwrap();
            let t2 = t1 + delta;
            prop_assert!(t2.tick() >= t1.tick());
        }
    }
}
