//! Tick notifications driven by a synced clock

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;

use netsync_core::TimeSystemConfig;
use netsync_test::init_tracing;
use netsync_time::{TickSystem, TimeSystem};

#[test]
fn skipped_ticks_fire_once() {
    init_tracing();
    let mut ticks = TickSystem::new(10).unwrap();
    let fired = Arc::new(AtomicUsize::new(0));
    let f = Arc::clone(&fired);
    ticks.subscribe(move |_| {
        f.fetch_add(1, Ordering::SeqCst);
    });

    let before = ticks.tick();
    ticks.advance(0.3).unwrap();

    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(ticks.tick(), before + 3);
}

#[test]
fn hard_reset_jump_fires_single_catch_up() {
    init_tracing();
    let config = TimeSystemConfig::for_tick_rate(30);
    let mut time = TimeSystem::new(config).unwrap();
    time.reset(100.0, 0.1).unwrap();

    let mut ticks = TickSystem::new(30).unwrap();
    ticks.reset(time.local_time(), time.server_time()).unwrap();

    let elapsed = Arc::new(AtomicI64::new(0));
    let e = Arc::clone(&elapsed);
    ticks.subscribe(move |event| {
        e.fetch_add(event.ticks_elapsed, Ordering::SeqCst);
    });
    let rx = ticks.subscribe_channel();
    let start_tick = ticks.tick();

    for _ in 0..30 {
        time.advance(1.0 / 30.0).unwrap();
        ticks.advance_from(&time).unwrap();
    }
    let steady_fires = ticks.fire_count();
    assert!((29..=31).contains(&steady_fires), "fires {steady_fires}");

    // server clock jumps two seconds ahead
    let server_now = time.server_time() + time.config().server_buffer_sec;
    time.sync(server_now + 2.0, 0.1).unwrap();
    assert!(time.advance(1.0 / 30.0).unwrap());
    let event = ticks.advance_from(&time).unwrap().unwrap();

    assert_eq!(ticks.fire_count(), steady_fires + 1);
    assert!(event.ticks_elapsed >= 60, "elapsed {}", event.ticks_elapsed);
    assert_eq!(elapsed.load(Ordering::SeqCst), ticks.tick() - start_tick);
    assert_eq!(rx.try_iter().count() as u64, ticks.fire_count());
}
