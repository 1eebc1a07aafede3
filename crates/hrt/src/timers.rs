//! Public timer API.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::alarm::AlarmDriver;
use crate::context;
use crate::error::{TimerError, TimerResult};
use crate::registry::TimerHandle;
use crate::scheduler::{Scheduler, State};
use crate::timer::{TimerArgs, TimerInfo, TimerRecord};
use crate::trace::Note;

/// Cloneable handle to a running timer service.
///
/// Every operation is safe to call from any thread, including from inside
/// timer callbacks. Only [`stop_blocking`](Self::stop_blocking) is forbidden
/// in interrupt context.
#[derive(Clone)]
pub struct Timers {
    pub(crate) inner: Arc<Scheduler>,
}

impl Timers {
    pub(crate) fn new(inner: Arc<Scheduler>) -> Self {
        Self { inner }
    }

    /// Registers a new idle timer.
    pub fn create(&self, args: TimerArgs) -> TimerResult<TimerHandle> {
        let callback = args
            .callback
            .ok_or(TimerError::InvalidArgument("timer callback is required"))?;

        let mut state = self.inner.state.lock();
        if state.shutdown {
            return Err(TimerError::InvalidState("timer service is shut down"));
        }

        let name = args.name.unwrap_or_default();
        let record = TimerRecord::new(name, args.dispatch, args.skip_unhandled_events, callback);
        let handle = state.registry.insert(record)?;
        drop(state);

        log::debug!("{handle} created ({} dispatch)", args.dispatch);
        self.inner.trace.emit(Note::create(handle, args.dispatch));
        Ok(handle)
    }

    /// Deletes an idle timer.
    ///
    /// An active timer may only be deleted from inside its own callback; it
    /// is disarmed and its memory is released once the callback returns.
    pub fn delete(&self, handle: TimerHandle) -> TimerResult<()> {
        let own_callback = context::running_callback() == Some((self.inner.id, handle));

        let mut state = self.inner.state.lock();
        if state.live(handle)?.is_active() {
            if !own_callback {
                return Err(TimerError::InvalidState("timer is active; stop it first"));
            }
            self.inner.disarm(&mut state, handle);
            self.inner.reprogram_alarm(&mut state);
        }

        let record = state.live(handle)?;
        let released = if record.in_flight {
            record.delete_pending = true;
            None
        } else {
            state.registry.remove(handle)
        };
        self.inner.release(state);

        log::debug!("{handle} deleted");
        self.inner.trace.emit(Note::delete(handle));
        drop(released);
        Ok(())
    }

    /// Arms a one-shot timer to fire `timeout_us` from now.
    pub fn start_once(&self, handle: TimerHandle, timeout_us: u64) -> TimerResult<()> {
        self.start(handle, timeout_us, 0)
    }

    /// Arms a periodic timer. Deadlines advance by exactly `period_us` from
    /// the previous deadline, so the schedule never drifts.
    pub fn start_periodic(&self, handle: TimerHandle, period_us: u64) -> TimerResult<()> {
        if period_us == 0 {
            return Err(TimerError::InvalidArgument("period must be non-zero"));
        }
        self.start(handle, period_us, period_us)
    }

    fn start(&self, handle: TimerHandle, timeout_us: u64, period_us: u64) -> TimerResult<()> {
        let mut state = self.inner.state.lock();
        if state.live(handle)?.is_active() {
            return Err(TimerError::InvalidState("timer is already active"));
        }

        let deadline = self.inner.driver.get_time().saturating_add(timeout_us);
        self.inner.arm(&mut state, handle, deadline, period_us);
        self.inner.reprogram_alarm(&mut state);
        self.inner.release(state);
        Ok(())
    }

    /// Re-arms an active timer as if freshly started with `timeout_us`.
    ///
    /// A periodic timer stays periodic and adopts `timeout_us` as its period.
    pub fn restart(&self, handle: TimerHandle, timeout_us: u64) -> TimerResult<()> {
        let mut state = self.inner.state.lock();
        let record = state.live(handle)?;
        if !record.is_active() {
            return Err(TimerError::InvalidState("timer is not active"));
        }
        let periodic = record.period > 0;
        if periodic && timeout_us == 0 {
            return Err(TimerError::InvalidArgument("period must be non-zero"));
        }

        self.inner.disarm(&mut state, handle);
        let deadline = self.inner.driver.get_time().saturating_add(timeout_us);
        let period = if periodic { timeout_us } else { 0 };
        self.inner.arm(&mut state, handle, deadline, period);
        self.inner.reprogram_alarm(&mut state);
        self.inner.release(state);
        Ok(())
    }

    /// Disarms an active timer. A callback that is already running is not
    /// interrupted.
    pub fn stop(&self, handle: TimerHandle) -> TimerResult<()> {
        let mut state = self.inner.state.lock();
        if !state.live(handle)?.is_active() {
            self.inner.release(state);
            self.inner.trace.emit(Note::disarm_attempt(handle));
            return Err(TimerError::InvalidState("timer is not active"));
        }

        self.inner.disarm(&mut state, handle);
        self.inner.reprogram_alarm(&mut state);
        self.inner.release(state);
        Ok(())
    }

    /// Disarms the timer and waits up to `timeout` for a running callback to
    /// return.
    ///
    /// Called from the timer's own callback it returns right after disarming.
    /// Fails with `InvalidState` if the timer is neither armed nor running.
    ///
    /// # Panics
    ///
    /// Panics when called in interrupt context.
    pub fn stop_blocking(&self, handle: TimerHandle, timeout: Duration) -> TimerResult<()> {
        assert!(
            !context::in_isr(),
            "stop_blocking must not be called from interrupt context"
        );

        let mut state = self.inner.state.lock();
        let record = state.live(handle)?;
        let active = record.is_active();
        if !active && !record.in_flight {
            self.inner.release(state);
            self.inner.trace.emit(Note::disarm_attempt(handle));
            return Err(TimerError::InvalidState("timer is not running"));
        }
        if active {
            self.inner.disarm(&mut state, handle);
            self.inner.reprogram_alarm(&mut state);
        }
        self.inner.release(state);

        if context::running_callback() == Some((self.inner.id, handle)) {
            return Ok(());
        }

        let deadline = Instant::now() + timeout;
        let in_flight = |state: &State| {
            state.registry.get(handle).is_some_and(|record| record.in_flight)
        };
        let mut state = self.inner.state.lock();
        while in_flight(&*state) {
            if self.inner.callback_done.wait_until(&mut state, deadline).timed_out() && in_flight(&*state) {
                return Err(TimerError::Timeout);
            }
        }
        Ok(())
    }

    /// `false` for idle timers and stale handles.
    pub fn is_active(&self, handle: TimerHandle) -> bool {
        self.inner
            .state
            .lock()
            .live(handle)
            .is_ok_and(|record| record.is_active())
    }

    /// Period in microseconds; zero for one-shot timers.
    pub fn get_period(&self, handle: TimerHandle) -> TimerResult<u64> {
        Ok(self.inner.state.lock().live(handle)?.period)
    }

    /// Absolute deadline of an armed one-shot timer.
    pub fn get_expiry_time(&self, handle: TimerHandle) -> TimerResult<u64> {
        let mut state = self.inner.state.lock();
        let record = state.live(handle)?;
        if record.period > 0 {
            return Err(TimerError::NotSupported("expiry time of a periodic timer"));
        }
        if !record.is_active() {
            return Err(TimerError::InvalidState("timer is not active"));
        }
        Ok(record.deadline)
    }

    /// Earliest deadline over all armed timers.
    pub fn get_next_alarm(&self) -> Option<u64> {
        let state = self.inner.state.lock();
        self.inner.next_deadline(&state, false)
    }

    /// Earliest deadline over armed timers that may wake the system, i.e.
    /// those created without `skip_unhandled_events`.
    pub fn get_next_alarm_for_wake_up(&self) -> Option<u64> {
        let state = self.inner.state.lock();
        self.inner.next_deadline(&state, true)
    }

    /// Current time base value in microseconds.
    pub fn now(&self) -> u64 {
        self.inner.driver.get_time()
    }

    /// Moves the time base forward; armed timers fire against the new time.
    pub fn advance(&self, delta_us: u64) {
        self.inner.driver.advance(delta_us);
        log::debug!("time base advanced by {delta_us} us");
    }

    pub fn driver(&self) -> &dyn AlarmDriver {
        self.inner.driver.as_ref()
    }

    /// Queues `call` to run once on the task worker, after any timer callback
    /// currently executing there.
    pub fn pend_call<F>(&self, call: F) -> TimerResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.inner.state.lock();
        if state.shutdown {
            return Err(TimerError::InvalidState("timer service is shut down"));
        }
        state.pended.push_back(Box::new(call));
        self.inner.task_wake.notify_one();
        Ok(())
    }

    /// Number of live timers.
    pub fn len(&self) -> usize {
        let state = self.inner.state.lock();
        state.registry.iter().filter(|(_, record)| !record.delete_pending).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every live timer: armed ones in firing order, then idle ones.
    pub fn snapshot(&self) -> Vec<TimerInfo> {
        let state = self.inner.state.lock();
        let mut infos = Vec::with_capacity(state.registry.len());
        log::trace!("snapshot: {} armed of {}", state.tracks.len(), state.registry.len());

        let armed = state
            .tracks
            .ordered()
            .into_iter()
            .filter_map(|(_, handle)| state.registry.get(handle).map(|record| record.info(handle)));
        let idle = state
            .registry
            .iter()
            .filter(|(_, record)| !record.is_active() && !record.delete_pending)
            .map(|(handle, record)| record.info(handle));
        infos.extend(armed.chain(idle));
        infos
    }

    /// Information about one timer.
    pub fn info(&self, handle: TimerHandle) -> TimerResult<TimerInfo> {
        let mut state = self.inner.state.lock();
        Ok(state.live(handle)?.info(handle))
    }
}
