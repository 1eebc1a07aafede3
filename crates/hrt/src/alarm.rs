//! Time base and alarm comparator.
//!
//! The service consumes a single free-running microsecond counter with one
//! alarm comparator through [`AlarmDriver`]. [`HostAlarm`] emulates that pair
//! on top of the host monotonic clock; its manual mode only moves when
//! [`AlarmDriver::advance`] is called, which makes timing tests deterministic.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Alarm register value meaning "no alarm programmed".
pub const ALARM_DISABLED: u64 = u64::MAX;

/// Smallest distance between the counter and a freshly programmed alarm.
pub const DEFAULT_MIN_ALARM_LEAD_US: u64 = 2;

/// Monotonic counter plus alarm comparator.
///
/// Implementations must be callable from any thread. `wait_for_alarm` is only
/// ever called by the service's interrupt thread.
pub trait AlarmDriver: Send + Sync + 'static {
    /// Current counter value in microseconds.
    fn get_time(&self) -> u64;

    /// Programs the comparator. Timestamps at or below the counter must not
    /// wrap; they are treated as due and moved just ahead of the counter.
    fn set_alarm(&self, timestamp: u64);

    /// Parks the comparator at [`ALARM_DISABLED`].
    fn disable_alarm(&self);

    /// Moves the counter forward by `delta_us`.
    fn advance(&self, delta_us: u64);

    /// Raw comparator value.
    fn alarm_reg(&self) -> u64;

    /// Raw counter value.
    fn counter_reg(&self) -> u64;

    /// Blocks until the alarm fires (`true`), `timeout` elapses or
    /// [`wake`](Self::wake) is called (`false`). A fired alarm is one-shot
    /// until the comparator is programmed again.
    fn wait_for_alarm(&self, timeout: Duration) -> bool;

    /// Releases a thread blocked in [`wait_for_alarm`](Self::wait_for_alarm).
    fn wake(&self);
}

#[derive(Debug, Clone, Copy)]
enum Clock {
    Monotonic(Instant),
    Manual,
}

#[derive(Debug)]
struct Registers {
    offset: u64,
    alarm: u64,
    armed: bool,
    woken: bool,
}

/// Host emulation of the counter/comparator pair.
#[derive(Debug)]
pub struct HostAlarm {
    clock: Clock,
    min_lead_us: u64,
    regs: Mutex<Registers>,
    irq: Condvar,
}

impl Default for HostAlarm {
    fn default() -> Self {
        Self::new()
    }
}

impl HostAlarm {
    /// Counter driven by the host monotonic clock, starting at zero.
    pub fn new() -> Self {
        Self::with_clock(Clock::Monotonic(Instant::now()))
    }

    /// Counter that stands still until [`AlarmDriver::advance`] is called.
    ///
    /// `set_alarm` still clamps a due timestamp to `now + min_lead_us`, and
    /// the counter never reaches that on its own. An interrupt timer started
    /// with `start_once(handle, 0)` therefore stays armed until the next
    /// `advance` of at least [`min_lead_us`](Self::min_lead_us).
    pub fn manual() -> Self {
        Self::with_clock(Clock::Manual)
    }

    pub fn with_min_lead(mut self, lead_us: u64) -> Self {
        self.min_lead_us = lead_us;
        self
    }

    pub fn min_lead_us(&self) -> u64 {
        self.min_lead_us
    }

    fn with_clock(clock: Clock) -> Self {
        Self {
            clock,
            min_lead_us: DEFAULT_MIN_ALARM_LEAD_US,
            regs: Mutex::new(Registers {
                offset: 0,
                alarm: ALARM_DISABLED,
                armed: false,
                woken: false,
            }),
            irq: Condvar::new(),
        }
    }

    fn now(&self, regs: &Registers) -> u64 {
        let raw = match self.clock {
            Clock::Monotonic(epoch) => {
                u64::try_from(epoch.elapsed().as_micros()).unwrap_or(u64::MAX)
            }
            Clock::Manual => 0,
        };
        raw.saturating_add(regs.offset)
    }
}

impl AlarmDriver for HostAlarm {
    fn get_time(&self) -> u64 {
        let regs = self.regs.lock();
        self.now(&regs)
    }

    fn set_alarm(&self, timestamp: u64) {
        let mut regs = self.regs.lock();
        let earliest = self.now(&regs).saturating_add(self.min_lead_us);
        regs.alarm = timestamp.max(earliest);
        regs.armed = true;
        self.irq.notify_all();
    }

    fn disable_alarm(&self) {
        let mut regs = self.regs.lock();
        regs.alarm = ALARM_DISABLED;
        regs.armed = false;
    }

    fn advance(&self, delta_us: u64) {
        let mut regs = self.regs.lock();
        regs.offset = regs.offset.saturating_add(delta_us);
        self.irq.notify_all();
    }

    fn alarm_reg(&self) -> u64 {
        self.regs.lock().alarm
    }

    fn counter_reg(&self) -> u64 {
        self.get_time()
    }

    fn wait_for_alarm(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut regs = self.regs.lock();
        loop {
            if regs.woken {
                regs.woken = false;
                return false;
            }

            let now = self.now(&regs);
            if regs.armed && regs.alarm <= now {
                regs.armed = false;
                return true;
            }

            let wall = Instant::now();
            if wall >= deadline {
                return false;
            }

            let mut until = deadline;
            if regs.armed {
                if let Clock::Monotonic(_) = self.clock {
                    until = until.min(wall + Duration::from_micros(regs.alarm - now));
                }
            }
            self.irq.wait_until(&mut regs, until);
        }
    }

    fn wake(&self) {
        let mut regs = self.regs.lock();
        regs.woken = true;
        self.irq.notify_all();
    }
}
