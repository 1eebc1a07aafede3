//! Scheduling order as seen through dumps and snapshots.

use std::sync::Arc;

use hrt::{HostAlarm, TimerArgs, TimerService};

#[test]
fn dump_lists_timers_by_deadline_then_creation() {
    let service = TimerService::builder()
        .driver(Arc::new(HostAlarm::manual()))
        .start()
        .unwrap();
    let timers = service.timers();

    let timeouts = [10_000, 1_000, 10_000, 5_000, 20_000, 1_000];
    let handles: Vec<_> = timeouts
        .iter()
        .enumerate()
        .map(|(index, _)| {
            timers
                .create(TimerArgs::with_callback(|_| {}).name(format!("timer{index}")))
                .unwrap()
        })
        .collect();
    for (handle, timeout) in handles.iter().zip(timeouts) {
        timers.start_once(*handle, timeout).unwrap();
    }

    let order: Vec<usize> = timers
        .snapshot()
        .iter()
        .map(|info| handles.iter().position(|h| *h == info.handle).unwrap())
        .collect();
    assert_eq!(order, vec![1, 5, 3, 0, 2, 4]);

    let dump = timers.dump_to_string();
    let names: Vec<&str> = dump
        .lines()
        .skip(1)
        .filter_map(|line| line.split_whitespace().next())
        .collect();
    assert_eq!(names, vec!["timer1", "timer5", "timer3", "timer0", "timer2", "timer4"]);
    assert_eq!(timers.get_next_alarm(), Some(1_000));

    for handle in handles {
        timers.stop(handle).unwrap();
        timers.delete(handle).unwrap();
    }
}

#[test]
fn dump_reorders_after_restart() {
    let service = TimerService::builder()
        .driver(Arc::new(HostAlarm::manual()))
        .start()
        .unwrap();
    let timers = service.timers();

    let a = timers.create(TimerArgs::with_callback(|_| {}).name("a")).unwrap();
    let b = timers.create(TimerArgs::with_callback(|_| {}).name("b")).unwrap();
    timers.start_once(a, 1_000).unwrap();
    timers.start_once(b, 2_000).unwrap();

    timers.restart(a, 3_000).unwrap();
    let order: Vec<_> = timers.snapshot().into_iter().map(|info| info.name).collect();
    assert_eq!(order, vec!["b", "a"]);
}
