//! Timer records and the types used to describe them.

use core::fmt;

use crate::queue::QueueKey;
use crate::registry::TimerHandle;
use crate::timers::Timers;

/// Where a timer callback executes.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchMethod {
    /// Dedicated worker thread; callbacks may block and run one at a time.
    #[default]
    Task,
    /// Interrupt thread; callbacks must be short and must not block.
    Isr,
}

impl DispatchMethod {
    pub(crate) const ALL: [DispatchMethod; 2] = [DispatchMethod::Task, DispatchMethod::Isr];

    pub(crate) const fn index(self) -> usize {
        match self {
            Self::Task => 0,
            Self::Isr => 1,
        }
    }

    pub(crate) const fn as_u8(self) -> u8 {
        self.index() as u8
    }
}

impl fmt::Display for DispatchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Task => f.write_str("task"),
            Self::Isr => f.write_str("isr"),
        }
    }
}

/// Callback type. State the callback needs is captured by the closure.
pub type TimerCallback = Box<dyn FnMut(&TimerContext<'_>) + Send + 'static>;

/// Passed to every callback invocation.
pub struct TimerContext<'a> {
    timers: &'a Timers,
    handle: TimerHandle,
    deadline: u64,
}

impl<'a> TimerContext<'a> {
    pub(crate) fn new(timers: &'a Timers, handle: TimerHandle, deadline: u64) -> Self {
        Self {
            timers,
            handle,
            deadline,
        }
    }

    /// Service the timer belongs to.
    pub fn timers(&self) -> &'a Timers {
        self.timers
    }

    pub fn handle(&self) -> TimerHandle {
        self.handle
    }

    /// Scheduled time of this invocation. For periodic timers this is always
    /// `start + k * period`, independent of dispatch latency.
    pub fn deadline(&self) -> u64 {
        self.deadline
    }

    pub fn now(&self) -> u64 {
        self.timers.now()
    }
}

/// Arguments for [`Timers::create`].
#[derive(Default)]
pub struct TimerArgs {
    pub(crate) callback: Option<TimerCallback>,
    pub(crate) name: Option<String>,
    pub(crate) dispatch: DispatchMethod,
    pub(crate) skip_unhandled_events: bool,
}

impl TimerArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback<F>(callback: F) -> Self
    where
        F: FnMut(&TimerContext<'_>) + Send + 'static,
    {
        Self::new().callback(callback)
    }

    pub fn callback<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&TimerContext<'_>) + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn dispatch(mut self, method: DispatchMethod) -> Self {
        self.dispatch = method;
        self
    }

    /// Drop periods that elapse while the timer lags instead of replaying
    /// them back-to-back. Such timers also do not count as wake-up sources.
    pub fn skip_unhandled_events(mut self, skip: bool) -> Self {
        self.skip_unhandled_events = skip;
        self
    }
}

impl fmt::Debug for TimerArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerArgs")
            .field("callback", &self.callback.is_some())
            .field("name", &self.name)
            .field("dispatch", &self.dispatch)
            .field("skip_unhandled_events", &self.skip_unhandled_events)
            .finish()
    }
}

/// Per-timer counters reported by dumps.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TimerStats {
    pub times_armed: u64,
    pub times_triggered: u64,
    pub times_skipped: u64,
    pub callback_run_time_us: u64,
}

/// Point-in-time description of one timer.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerInfo {
    pub handle: TimerHandle,
    pub name: String,
    pub dispatch: DispatchMethod,
    /// Zero for one-shot timers.
    pub period_us: u64,
    /// Next deadline, `None` while the timer is idle.
    pub next_alarm_us: Option<u64>,
    pub skip_unhandled_events: bool,
    pub stats: TimerStats,
}

pub(crate) struct TimerRecord {
    pub(crate) name: String,
    pub(crate) dispatch: DispatchMethod,
    pub(crate) skip_unhandled_events: bool,
    pub(crate) period: u64,
    pub(crate) deadline: u64,
    pub(crate) key: Option<QueueKey>,
    /// Taken out while the callback runs.
    pub(crate) callback: Option<TimerCallback>,
    pub(crate) in_flight: bool,
    pub(crate) delete_pending: bool,
    pub(crate) stats: TimerStats,
}

impl TimerRecord {
    pub(crate) fn new(name: String, dispatch: DispatchMethod, skip: bool, callback: TimerCallback) -> Self {
        Self {
            name,
            dispatch,
            skip_unhandled_events: skip,
            period: 0,
            deadline: 0,
            key: None,
            callback: Some(callback),
            in_flight: false,
            delete_pending: false,
            stats: TimerStats::default(),
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.key.is_some()
    }

    pub(crate) fn info(&self, handle: TimerHandle) -> TimerInfo {
        TimerInfo {
            handle,
            name: self.name.clone(),
            dispatch: self.dispatch,
            period_us: self.period,
            next_alarm_us: self.key.map(|(deadline, _)| deadline),
            skip_unhandled_events: self.skip_unhandled_events,
            stats: self.stats,
        }
    }
}
