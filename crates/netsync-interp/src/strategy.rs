//! Interpolation strategies
//!
//! The strategy is part of the interpolator's type, so the blend used for a
//! replicated field is fixed at compile time.

use crate::{Quat, Vec3};

/// Types that can blend linearly toward another value
pub trait Lerp {
    fn lerp(&self, other: &Self, t: f32) -> Self;
}

impl Lerp for f32 {
    #[inline]
    fn lerp(&self, other: &Self, t: f32) -> Self {
        self + (other - self) * t
    }
}

impl Lerp for f64 {
    #[inline]
    fn lerp(&self, other: &Self, t: f32) -> Self {
        self + (other - self) * f64::from(t)
    }
}

impl Lerp for Vec3 {
    #[inline]
    fn lerp(&self, other: &Self, t: f32) -> Self {
        Vec3::lerp(self, other, t)
    }
}

impl Lerp for Quat {
    #[inline]
    fn lerp(&self, other: &Self, t: f32) -> Self {
        self.nlerp(other, t)
    }
}

/// Blends two bracketing values by a fraction in `[0, 1]`
pub trait InterpolationStrategy<T> {
    fn interpolate(&self, start: &T, end: &T, t: f32) -> T;
}

/// Straight-line blend via [`Lerp`]
#[derive(Debug, Clone, Copy, Default)]
pub struct Linear;

impl<T: Lerp> InterpolationStrategy<T> for Linear {
    fn interpolate(&self, start: &T, end: &T, t: f32) -> T {
        start.lerp(end, t)
    }
}

/// Constant angular velocity rotation blend
#[derive(Debug, Clone, Copy, Default)]
pub struct Slerp;

impl InterpolationStrategy<Quat> for Slerp {
    fn interpolate(&self, start: &Quat, end: &Quat, t: f32) -> Quat {
        start.slerp(end, t)
    }
}

/// Cheaper rotation blend; slightly uneven angular velocity
#[derive(Debug, Clone, Copy, Default)]
pub struct Nlerp;

impl InterpolationStrategy<Quat> for Nlerp {
    fn interpolate(&self, start: &Quat, end: &Quat, t: f32) -> Quat {
        start.nlerp(end, t)
    }
}

/// Holds the start value until the bracket completes (discrete state)
#[derive(Debug, Clone, Copy, Default)]
pub struct Step;

impl<T: Clone> InterpolationStrategy<T> for Step {
    fn interpolate(&self, start: &T, end: &T, t: f32) -> T {
        if t >= 1.0 {
            end.clone()
        } else {
            start.clone()
        }
    }
}

impl<T, F> InterpolationStrategy<T> for F
where
    F: Fn(&T, &T, f32) -> T,
{
    fn interpolate(&self, start: &T, end: &T, t: f32) -> T {
        self(start, end, t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_scalars() {
        assert_eq!(Linear.interpolate(&0.0f32, &10.0, 0.25), 2.5);
        assert_eq!(Linear.interpolate(&-2.0f64, &2.0, 0.5), 0.0);
    }

    #[test]
    fn test_step_holds_until_complete() {
        assert_eq!(Step.interpolate(&1u8, &9u8, 0.99), 1);
        assert_eq!(Step.interpolate(&1u8, &9u8, 1.0), 9);
    }

    #[test]
    fn test_closure_strategy() {
        let ease_in = |a: &f32, b: &f32, t: f32| a + (b - a) * t * t;
        assert_eq!(ease_in.interpolate(&0.0, &8.0, 0.5), 2.0);
    }

    #[test]
    fn test_rotation_strategies_agree_at_ends() {
        let a = Quat::from_euler(0.2, 0.0, 0.0);
        let b = Quat::from_euler(1.4, 0.0, 0.0);
        for strategy_out in [Slerp.interpolate(&a, &b, 1.0), Nlerp.interpolate(&a, &b, 1.0)] {
            assert!(strategy_out.angle_to(&b) < 1e-3);
        }
    }
}
