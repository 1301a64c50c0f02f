//! netsync core - fundamental types shared by the clock and interpolation engines
//!
//! - Time primitives (`NetworkTime`)
//! - Session configuration (`SyncConfig`, `TimeSystemConfig`, `InterpolatorConfig`)
//! - The misuse error taxonomy (`SyncError`)

pub mod config;
pub mod error;
pub mod time;

pub use config::*;
pub use error::*;
pub use time::*;
