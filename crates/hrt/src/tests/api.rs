use std::time::Duration;

use crate::context;
use crate::error::TimerError;
use crate::timer::{DispatchMethod, TimerArgs};
use crate::{TimerService, ALARM_DISABLED};

use super::manual_service;

fn noop() -> TimerArgs {
    TimerArgs::with_callback(|_| {})
}

#[test]
fn create_requires_callback() {
    let service = manual_service();
    let err = service.timers().create(TimerArgs::new().name("empty")).unwrap_err();
    assert!(matches!(err, TimerError::InvalidArgument(_)));
    assert!(service.timers().is_empty());
}

#[test]
fn create_fails_when_capacity_is_exhausted() {
    let config = crate::ServiceConfig::builder().max_timers(2).build();
    let service = TimerService::with_config(config)
        .driver(std::sync::Arc::new(crate::HostAlarm::manual()))
        .start()
        .unwrap();
    let timers = service.timers();

    let first = timers.create(noop()).unwrap();
    timers.create(noop()).unwrap();
    assert!(matches!(timers.create(noop()), Err(TimerError::NoMemory(2))));

    timers.delete(first).unwrap();
    timers.create(noop()).unwrap();
}

#[test]
fn start_and_stop_track_active_state() {
    let service = manual_service();
    let timers = service.timers();
    let handle = timers.create(noop()).unwrap();

    assert!(!timers.is_active(handle));
    timers.start_once(handle, 1_000).unwrap();
    assert!(timers.is_active(handle));
    assert!(matches!(timers.start_once(handle, 5), Err(TimerError::InvalidState(_))));
    assert!(matches!(timers.start_periodic(handle, 5), Err(TimerError::InvalidState(_))));

    timers.stop(handle).unwrap();
    assert!(!timers.is_active(handle));
    assert!(matches!(timers.stop(handle), Err(TimerError::InvalidState(_))));
}

#[test]
fn zero_period_is_rejected() {
    let service = manual_service();
    let timers = service.timers();
    let handle = timers.create(noop()).unwrap();

    assert!(matches!(timers.start_periodic(handle, 0), Err(TimerError::InvalidArgument(_))));
    timers.start_periodic(handle, 100).unwrap();
    assert!(matches!(timers.restart(handle, 0), Err(TimerError::InvalidArgument(_))));
    assert_eq!(timers.get_period(handle).unwrap(), 100);
}

#[test]
fn delete_rejects_active_and_stale_handles() {
    let service = manual_service();
    let timers = service.timers();
    let handle = timers.create(noop()).unwrap();

    timers.start_once(handle, 1_000).unwrap();
    assert!(matches!(timers.delete(handle), Err(TimerError::InvalidState(_))));

    timers.stop(handle).unwrap();
    timers.delete(handle).unwrap();
    assert!(matches!(timers.delete(handle), Err(TimerError::InvalidState(_))));
    assert!(matches!(timers.start_once(handle, 1), Err(TimerError::InvalidState(_))));
    assert!(!timers.is_active(handle));
}

#[test]
fn restart_requires_active_timer() {
    let service = manual_service();
    let timers = service.timers();
    let handle = timers.create(noop()).unwrap();

    assert!(matches!(timers.restart(handle, 100), Err(TimerError::InvalidState(_))));

    timers.start_periodic(handle, 1_000).unwrap();
    timers.restart(handle, 250).unwrap();
    assert_eq!(timers.get_period(handle).unwrap(), 250);
    assert_eq!(timers.get_next_alarm(), Some(250));
}

#[test]
fn expiry_time_only_for_armed_one_shots() {
    let service = manual_service();
    let timers = service.timers();
    let once = timers.create(noop()).unwrap();
    let periodic = timers.create(noop()).unwrap();

    assert!(matches!(timers.get_expiry_time(once), Err(TimerError::InvalidState(_))));
    timers.advance(40);
    timers.start_once(once, 60).unwrap();
    assert_eq!(timers.get_expiry_time(once).unwrap(), 100);
    assert_eq!(timers.get_period(once).unwrap(), 0);

    timers.start_periodic(periodic, 500).unwrap();
    assert!(matches!(timers.get_expiry_time(periodic), Err(TimerError::NotSupported(_))));
}

#[test]
fn next_alarm_covers_both_tracks() {
    let service = manual_service();
    let timers = service.timers();
    let task = timers.create(noop()).unwrap();
    let isr = timers.create(noop().dispatch(DispatchMethod::Isr)).unwrap();

    assert_eq!(timers.get_next_alarm(), None);
    timers.start_once(task, 3_000).unwrap();
    timers.start_once(isr, 2_000).unwrap();
    assert_eq!(timers.get_next_alarm(), Some(2_000));
    assert_eq!(timers.driver().alarm_reg(), 2_000);

    timers.stop(isr).unwrap();
    assert_eq!(timers.get_next_alarm(), Some(3_000));
    assert_eq!(timers.driver().alarm_reg(), 3_000);
}

#[test]
fn wake_up_alarm_ignores_skippable_timers() {
    let service = manual_service();
    let timers = service.timers();
    let lazy = timers.create(noop().skip_unhandled_events(true)).unwrap();
    let eager = timers.create(noop()).unwrap();

    timers.start_periodic(lazy, 1_000).unwrap();
    assert_eq!(timers.get_next_alarm(), Some(1_000));
    assert_eq!(timers.get_next_alarm_for_wake_up(), None);

    timers.start_once(eager, 5_000).unwrap();
    assert_eq!(timers.get_next_alarm(), Some(1_000));
    assert_eq!(timers.get_next_alarm_for_wake_up(), Some(5_000));
}

#[test]
fn alarm_is_disabled_when_last_timer_stops() {
    let service = manual_service();
    let timers = service.timers();
    let a = timers.create(noop().dispatch(DispatchMethod::Isr)).unwrap();
    let b = timers.create(noop()).unwrap();

    timers.start_once(a, 10_000).unwrap();
    timers.start_periodic(b, 20_000).unwrap();
    timers.stop(a).unwrap();
    assert_ne!(timers.driver().alarm_reg(), ALARM_DISABLED);
    timers.stop(b).unwrap();
    assert_eq!(timers.driver().alarm_reg(), ALARM_DISABLED);
}

#[test]
fn past_deadline_is_programmed_ahead_of_counter() {
    let service = manual_service();
    let timers = service.timers();
    let handle = timers.create(noop().dispatch(DispatchMethod::Isr)).unwrap();

    timers.advance(50_000);
    timers.start_once(handle, 0).unwrap();
    let driver = timers.driver();
    assert!(driver.alarm_reg() > driver.counter_reg());
    assert!(driver.alarm_reg() - driver.counter_reg() <= crate::alarm::DEFAULT_MIN_ALARM_LEAD_US);
}

#[test]
fn stop_blocking_on_idle_timer_is_invalid_state() {
    let service = manual_service();
    let timers = service.timers();
    let handle = timers.create(noop()).unwrap();

    let err = timers.stop_blocking(handle, Duration::from_millis(10)).unwrap_err();
    assert!(matches!(err, TimerError::InvalidState(_)));
}

#[test]
fn stop_blocking_panics_in_interrupt_context() {
    let service = manual_service();
    let timers = service.timers().clone();
    let handle = timers.create(noop()).unwrap();
    timers.start_once(handle, 1_000).unwrap();

    let result = std::thread::spawn(move || {
        context::mark_isr_thread();
        let _ = timers.stop_blocking(handle, Duration::from_millis(10));
    })
    .join();
    assert!(result.is_err());
    assert!(service.timers().is_active(handle));
}

#[test]
fn snapshot_lists_armed_then_idle() {
    let service = manual_service();
    let timers = service.timers();
    let idle = timers.create(noop().name("idle")).unwrap();
    let late = timers.create(noop().name("late")).unwrap();
    let early = timers.create(noop().name("early").dispatch(DispatchMethod::Isr)).unwrap();

    timers.start_once(late, 900).unwrap();
    timers.start_periodic(early, 300).unwrap();

    let order: Vec<_> = timers.snapshot().into_iter().map(|info| info.handle).collect();
    assert_eq!(order, vec![early, late, idle]);

    let info = timers.info(early).unwrap();
    assert_eq!(info.name, "early");
    assert_eq!(info.period_us, 300);
    assert_eq!(info.next_alarm_us, Some(300));
    assert_eq!(info.stats.times_armed, 1);
    assert_eq!(timers.info(idle).unwrap().next_alarm_us, None);
}

#[test]
fn deinit_refuses_while_timers_exist() {
    let mut service = manual_service();
    let handle = service.timers().create(noop()).unwrap();

    assert!(matches!(service.deinit(), Err(TimerError::InvalidState(_))));
    assert!(!service.is_stopped());

    service.timers().delete(handle).unwrap();
    service.deinit().unwrap();
    assert!(service.is_stopped());
    assert!(matches!(service.timers().create(noop()), Err(TimerError::InvalidState(_))));
    assert!(matches!(service.deinit(), Err(TimerError::InvalidState(_))));
}

#[test]
fn services_are_independent() {
    let first = manual_service();
    let second = manual_service();

    let handle = first.timers().create(noop()).unwrap();
    first.timers().start_once(handle, 10).unwrap();
    assert_eq!(second.timers().get_next_alarm(), None);
    assert!(second.timers().is_empty());
}
