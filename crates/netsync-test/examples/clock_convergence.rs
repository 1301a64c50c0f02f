//! Watch a client clock settle, absorb an RTT step and recover from a spike
//!
//! Run with `RUST_LOG=debug` to see sync and reset events.

use netsync_core::{SyncResult, TimeSystemConfig};
use netsync_test::{ChaosConfig, SimulationReport, TimeSimulator};

fn print_report(label: &str, report: &SimulationReport) {
    println!(
        "{label:<14} frames={:>5} max_err={:>7.2}ms mean_err={:>7.2}ms local_adj={:>7.2}ms resets={}",
        report.frames,
        report.max_abs_offset_error * 1000.0,
        report.mean_offset_error * 1000.0,
        report.local_adjustment * 1000.0,
        report.hard_resets,
    );
}

fn main() -> SyncResult<()> {
    netsync_test::init_tracing();

    let mut sim = TimeSimulator::new(TimeSystemConfig::default(), ChaosConfig::good(), 2024)?;

    print_report("warmup", &sim.run_for(10.0)?);

    sim.set_base_rtt(0.2);
    print_report("rtt 200ms", &sim.run_for(10.0)?);

    sim.set_base_rtt(0.6);
    print_report("rtt 600ms", &sim.run_for(10.0)?);

    sim.set_base_rtt(0.1);
    print_report("recovered", &sim.run_for(10.0)?);

    let system = sim.system();
    println!(
        "local={:.4} server={:.4} offset={:.2}ms target={:.2}ms hard_resets={}",
        system.local_time(),
        system.server_time(),
        system.current_offset() * 1000.0,
        system.target_offset() * 1000.0,
        system.hard_reset_count(),
    );
    Ok(())
}
