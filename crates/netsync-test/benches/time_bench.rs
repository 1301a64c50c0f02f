//! Benchmarks for clock synchronization and tick derivation

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use netsync_core::NetworkTime;
use netsync_time::{TickSystem, TimeSystem};

fn bench_time_system_advance(c: &mut Criterion) {
    let mut time = TimeSystem::with_tick_rate(60).unwrap();
    time.reset(1000.0, 0.1).unwrap();

    c.bench_function("time_system_advance", |b| {
        b.iter(|| {
            time.advance(black_box(1.0 / 60.0)).unwrap();
            black_box(time.server_time())
        })
    });
}

fn bench_time_system_sync(c: &mut Criterion) {
    let mut time = TimeSystem::with_tick_rate(60).unwrap();
    time.reset(1000.0, 0.1).unwrap();

    c.bench_function("time_system_sync", |b| {
        let mut i = 0u32;
        b.iter(|| {
            i = i.wrapping_add(1);
            let rtt = 0.1 + f64::from(i % 10) * 0.001;
            time.sync(black_box(1000.0), black_box(rtt)).unwrap();
        })
    });
}

fn bench_tick_system_advance(c: &mut Criterion) {
    let mut ticks = TickSystem::new(60).unwrap();
    ticks.subscribe(|event| {
        black_box(event.tick);
    });

    c.bench_function("tick_system_advance", |b| {
        b.iter(|| black_box(ticks.advance(black_box(1.0 / 120.0)).unwrap()))
    });
}

fn bench_network_time_tick(c: &mut Criterion) {
    let time = NetworkTime::new(64, 12345.678).unwrap();

    c.bench_function("network_time_tick", |b| {
        b.iter(|| black_box(black_box(time).tick()))
    });
}

criterion_group!(
    benches,
    bench_time_system_advance,
    bench_time_system_sync,
    bench_tick_system_advance,
    bench_network_time_tick,
);
criterion_main!(benches);
