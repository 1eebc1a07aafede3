//! Timer scenarios run against a live service.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use hrt::{dump, DispatchMethod, TimerArgs, TimerHandle, TimerInfo, TimerService, Timers};
use serde_json::json;

const FIRE_WAIT: Duration = Duration::from_secs(5);

fn print_snapshot(snapshot: &[TimerInfo], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(snapshot)?);
    } else {
        let mut table = String::new();
        dump::write_table(&mut table, snapshot)?;
        print!("{table}");
    }
    Ok(())
}

fn release(timers: &Timers, handles: &[TimerHandle]) -> Result<()> {
    for handle in handles {
        if timers.is_active(*handle) {
            timers.stop_blocking(*handle, FIRE_WAIT)?;
        }
        timers.delete(*handle)?;
    }
    Ok(())
}

/// Arms one-shot timers with `timeouts`, dumps them, then lets them fire on
/// a manual clock and reports the firing order.
pub fn order(service: &TimerService, timeouts: &[u64], json: bool) -> Result<()> {
    let timers = service.timers();
    let (tx, rx) = mpsc::channel();

    let mut handles = Vec::with_capacity(timeouts.len());
    for index in 0..timeouts.len() {
        let tx = tx.clone();
        let handle = timers.create(
            TimerArgs::with_callback(move |_| {
                let _ = tx.send(index);
            })
            .name(format!("timer{index}")),
        )?;
        handles.push(handle);
    }
    for (handle, timeout) in handles.iter().zip(timeouts) {
        timers.start_once(*handle, *timeout)?;
    }

    let snapshot = timers.snapshot();
    let expected: Vec<usize> = snapshot
        .iter()
        .filter_map(|info| handles.iter().position(|h| *h == info.handle))
        .collect();

    let horizon = timeouts.iter().copied().max().unwrap_or(0);
    timers.advance(horizon);
    let fired = (0..timeouts.len())
        .map(|_| rx.recv_timeout(FIRE_WAIT))
        .collect::<Result<Vec<_>, _>>()
        .context("timers did not fire")?;

    if json {
        let report = json!({
            "timers": snapshot,
            "dump_order": expected,
            "fire_order": fired,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_snapshot(&snapshot, false)?;
        println!("dump order: {expected:?}");
        println!("fire order: {fired:?}");
    }

    release(timers, &handles)?;
    if fired != expected {
        bail!("fire order {fired:?} differs from dump order {expected:?}");
    }
    Ok(())
}

pub struct PeriodicOptions {
    pub period_us: u64,
    pub count: usize,
    pub dispatch: DispatchMethod,
    pub skip_unhandled_events: bool,
}

/// Runs one periodic timer for `count` periods and reports deadline drift
/// and dispatch latency.
pub fn periodic(service: &TimerService, opts: &PeriodicOptions, json: bool) -> Result<()> {
    if opts.count == 0 {
        bail!("count must be at least 1");
    }

    let timers = service.timers();
    let (tx, rx) = mpsc::channel();
    let handle = timers.create(
        TimerArgs::with_callback(move |ctx| {
            let _ = tx.send((ctx.deadline(), ctx.now()));
        })
        .name("periodic")
        .dispatch(opts.dispatch)
        .skip_unhandled_events(opts.skip_unhandled_events),
    )?;

    let started = Instant::now();
    timers.start_periodic(handle, opts.period_us)?;
    let samples = (0..opts.count)
        .map(|_| rx.recv_timeout(FIRE_WAIT))
        .collect::<Result<Vec<_>, _>>()
        .context("periodic timer stalled")?;
    let elapsed = started.elapsed();
    timers.stop_blocking(handle, FIRE_WAIT)?;

    let first = samples[0].0;
    let max_drift = samples
        .iter()
        .map(|(deadline, _)| (deadline - first) % opts.period_us)
        .max()
        .unwrap_or(0);
    let latencies: Vec<u64> = samples.iter().map(|(deadline, fired)| fired - deadline).collect();
    let min_latency = latencies.iter().copied().min().unwrap_or(0);
    let max_latency = latencies.iter().copied().max().unwrap_or(0);
    let mean_latency = latencies.iter().sum::<u64>() / latencies.len() as u64;
    let info = timers.info(handle)?;

    if json {
        let report = json!({
            "timer": info,
            "samples": samples.len(),
            "elapsed_us": elapsed.as_micros() as u64,
            "max_drift_us": max_drift,
            "latency_us": { "min": min_latency, "mean": mean_latency, "max": max_latency },
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_snapshot(std::slice::from_ref(&info), false)?;
        println!(
            "{} fires in {:?}; drift {max_drift} us; latency min/mean/max {min_latency}/{mean_latency}/{max_latency} us",
            samples.len(),
            elapsed
        );
    }

    timers.delete(handle)?;
    if max_drift != 0 && !opts.skip_unhandled_events {
        bail!("periodic deadlines drifted by up to {max_drift} us");
    }
    Ok(())
}

pub struct StressOptions {
    pub timers: usize,
    pub duration: Duration,
    pub dumpers: usize,
}

/// Runs many periodic timers on both dispatch paths while other threads keep
/// dumping the timer table.
pub fn stress(service: &TimerService, opts: &StressOptions, json: bool) -> Result<()> {
    let timers = service.timers();
    let fired = Arc::new(AtomicU64::new(0));

    let mut handles = Vec::with_capacity(opts.timers);
    for index in 0..opts.timers {
        let fired = fired.clone();
        let dispatch = if index % 2 == 0 {
            DispatchMethod::Task
        } else {
            DispatchMethod::Isr
        };
        let handle = timers.create(
            TimerArgs::with_callback(move |_| {
                fired.fetch_add(1, Ordering::Relaxed);
            })
            .name(format!("stress{index}"))
            .dispatch(dispatch),
        )?;
        handles.push(handle);
    }
    for (index, handle) in handles.iter().enumerate() {
        timers.start_periodic(*handle, 1_000 + (index as u64 % 17) * 500)?;
    }

    let running = Arc::new(AtomicBool::new(true));
    let dumps = Arc::new(AtomicU64::new(0));
    let workers: Vec<_> = (0..opts.dumpers)
        .map(|_| {
            let (timers, running, dumps) = (timers.clone(), running.clone(), dumps.clone());
            let expected = opts.timers + 1;
            thread::spawn(move || {
                while running.load(Ordering::Relaxed) {
                    let lines = timers.dump_to_string().lines().count();
                    if lines != expected {
                        return Err(anyhow::anyhow!("dump had {lines} lines, expected {expected}"));
                    }
                    dumps.fetch_add(1, Ordering::Relaxed);
                }
                Ok(())
            })
        })
        .collect();

    thread::sleep(opts.duration);
    running.store(false, Ordering::Relaxed);
    for worker in workers {
        worker
            .join()
            .map_err(|_| anyhow::anyhow!("dump thread panicked"))??;
    }

    let snapshot = timers.snapshot();
    release(timers, &handles)?;

    let fired = fired.load(Ordering::Relaxed);
    let dumps = dumps.load(Ordering::Relaxed);
    let skipped: u64 = snapshot.iter().map(|info| info.stats.times_skipped).sum();
    if json {
        let report = json!({
            "timers": opts.timers,
            "duration_ms": opts.duration.as_millis() as u64,
            "callbacks": fired,
            "dumps": dumps,
            "skipped": skipped,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "{} timers for {:?}: {fired} callbacks, {dumps} dumps, {skipped} skipped periods",
            opts.timers, opts.duration
        );
    }
    Ok(())
}
