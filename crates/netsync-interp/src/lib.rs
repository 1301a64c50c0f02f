//! netsync interpolation - smooth per-frame values from jittery measurements
//!
//! - `BufferedLinearInterpolator`: timestamp-ordered buffering and bracketed blending
//! - `MeasurementBuffer`: bounded measurement queue
//! - Interpolation strategies (`Linear`, `Slerp`, `Nlerp`, `Step`, closures)
//! - Value types (`Vec3`, `Quat`)

pub mod buffer;
pub mod interpolator;
pub mod strategy;
pub mod value;

pub use buffer::*;
pub use interpolator::*;
pub use strategy::*;
pub use value::*;
