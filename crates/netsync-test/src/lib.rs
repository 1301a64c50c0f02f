//! netsync test harness
//!
//! This crate provides:
//! - Seeded RTT, jitter and loss models
//! - A lossy, reordering message link
//! - Client clock simulation against an ideal server
//! - Test log setup

pub mod chaos;
pub mod time_simulator;

pub use chaos::*;
pub use time_simulator::*;

use tracing_subscriber::EnvFilter;

/// Route `tracing` output to the test harness.
///
/// Honors `RUST_LOG`, defaulting to `warn`. Safe to call from every test;
/// only the first call installs a subscriber.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
