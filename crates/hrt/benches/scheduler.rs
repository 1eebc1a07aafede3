use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use hrt::{HostAlarm, TimerArgs, TimerService};

fn manual_service() -> TimerService {
    TimerService::builder()
        .driver(Arc::new(HostAlarm::manual()))
        .start()
        .expect("timer service")
}

fn start_stop(c: &mut Criterion) {
    let service = manual_service();
    let timers = service.timers();
    let background: Vec<_> = (0..256)
        .map(|i| {
            let handle = timers.create(TimerArgs::with_callback(|_| {})).unwrap();
            timers.start_once(handle, 1_000 + i * 10).unwrap();
            handle
        })
        .collect();
    let handle = timers.create(TimerArgs::with_callback(|_| {})).unwrap();

    c.bench_function("start_once+stop (256 armed)", |b| {
        b.iter(|| {
            timers.start_once(handle, black_box(1_500)).unwrap();
            timers.stop(handle).unwrap();
        })
    });

    c.bench_function("restart (256 armed)", |b| {
        timers.start_periodic(handle, 2_000).unwrap();
        b.iter(|| timers.restart(handle, black_box(1_750)).unwrap());
        timers.stop(handle).unwrap();
    });

    for handle in background {
        timers.stop(handle).unwrap();
    }
}

fn create_delete(c: &mut Criterion) {
    let service = manual_service();
    let timers = service.timers();

    c.bench_function("create+delete", |b| {
        b.iter(|| {
            let handle = timers.create(TimerArgs::with_callback(|_| {})).unwrap();
            timers.delete(black_box(handle)).unwrap();
        })
    });
}

fn snapshot(c: &mut Criterion) {
    let service = manual_service();
    let timers = service.timers();
    for i in 0..200 {
        let handle = timers.create(TimerArgs::with_callback(|_| {}).name(format!("t{i}"))).unwrap();
        timers.start_periodic(handle, 1_000 + i).unwrap();
    }

    c.bench_function("dump 200 timers", |b| {
        b.iter_batched(String::new, |mut out| timers.dump(&mut out).map(|_| out), BatchSize::SmallInput)
    });
}

criterion_group!(benches, start_stop, create_delete, snapshot);
criterion_main!(benches);
