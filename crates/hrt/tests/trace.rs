//! Trace records emitted by the scheduler.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use hrt::{HostAlarm, TimerArgs, TimerService, TraceHook};
use hrt_trace::records::{alarm, timer};
use hrt_trace::{MemoryBackend, TraceConfig, Tracer};

#[test]
fn lifecycle_is_traced() {
    let backend = MemoryBackend::new();
    let tracer = Tracer::new(TraceConfig::default(), backend.clone()).into_handle();
    let service = TimerService::builder()
        .driver(Arc::new(HostAlarm::manual()))
        .with_trace_hook(tracer.hook())
        .start()
        .unwrap();
    let timers = service.timers();
    let (tx, rx) = mpsc::channel();

    let handle = timers
        .create(TimerArgs::with_callback(move |_| tx.send(()).unwrap()))
        .unwrap();
    timers.start_once(handle, 100).unwrap();
    timers.advance(100);
    rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert!(timers.stop(handle).is_err());
    timers.delete(handle).unwrap();

    let kinds: Vec<u8> = backend.frames(true).unwrap().iter().map(|f| f.record_type).collect();
    let position = |kind: u8| kinds.iter().position(|k| *k == kind).unwrap();

    assert!(position(timer::CREATE) < position(timer::ARM));
    assert!(position(timer::ARM) < position(timer::FIRE));
    assert!(position(timer::FIRE) < position(timer::DISARM_ATTEMPT));
    assert!(position(timer::DISARM_ATTEMPT) < position(timer::DELETE));
    assert!(kinds.contains(&alarm::SET));
    assert!(kinds.contains(&alarm::DISABLE));

    let arm = backend
        .frames(true)
        .unwrap()
        .into_iter()
        .find(|f| f.record_type == timer::ARM)
        .unwrap();
    // handle, deadline, period
    assert_eq!(arm.payload.len(), 8 + 8 + 8);
    assert_eq!(arm.timer_handle(), Some((handle.index(), handle.generation())));
    assert_eq!(arm.u64_at(8), Some(100));
    assert_eq!(arm.u64_at(16), Some(0));
    assert!(arm.timestamp_us.is_some());
}

#[test]
fn slow_hook_does_not_hold_the_scheduler_lock() {
    let (entered_tx, entered_rx) = mpsc::channel();
    let entered_tx = Mutex::new(entered_tx);
    let hook: TraceHook = Arc::new(move |record_type, _payload| {
        if record_type == timer::ARM {
            let _ = entered_tx.lock().unwrap().send(());
            thread::sleep(Duration::from_millis(200));
        }
        Ok(())
    });
    let service = TimerService::builder()
        .driver(Arc::new(HostAlarm::manual()))
        .with_trace_hook(hook)
        .start()
        .unwrap();
    let timers = service.timers().clone();
    let handle = timers.create(TimerArgs::with_callback(|_| {})).unwrap();

    let starter = {
        let timers = timers.clone();
        thread::spawn(move || timers.start_once(handle, 1_000))
    };
    entered_rx.recv_timeout(Duration::from_secs(2)).unwrap();

    let began = Instant::now();
    assert!(timers.is_active(handle));
    assert_eq!(timers.get_next_alarm(), Some(1_000));
    assert!(began.elapsed() < Duration::from_millis(100));

    starter.join().unwrap().unwrap();
    timers.stop(handle).unwrap();
    timers.delete(handle).unwrap();
}
