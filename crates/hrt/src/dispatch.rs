//! Callback dispatch: the interrupt handler and the task worker.
//!
//! Both contexts drain their own track through [`Timers::process_due`]. The
//! scheduler lock is never held while user code runs.

use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use crate::context::{self, CallbackScope};
use crate::registry::TimerHandle;
use crate::scheduler::{PendedCall, State};
use crate::timer::{DispatchMethod, TimerCallback, TimerContext};
use crate::timers::Timers;
use crate::trace::Note;

impl Timers {
    /// Interrupt thread body: wait for the comparator, run ISR callbacks.
    pub(crate) fn run_isr(&self, poll: Duration) {
        context::mark_isr_thread();
        log::debug!("interrupt dispatcher started");

        while !self.inner.state.lock().shutdown {
            if self.inner.driver.wait_for_alarm(poll) {
                self.process_due(DispatchMethod::Isr);
            }
        }

        log::debug!("interrupt dispatcher stopped");
    }

    /// Task worker body: run pended calls and due task callbacks in order.
    pub(crate) fn run_task_worker(&self) {
        log::debug!("task dispatcher started");

        loop {
            let pended: Vec<PendedCall> = {
                let mut state = self.inner.state.lock();
                while !state.task_pending && state.pended.is_empty() && !state.shutdown {
                    self.inner.task_wake.wait(&mut state);
                }
                if state.shutdown {
                    break;
                }
                state.task_pending = false;
                mem::take(&mut state.pended).into()
            };

            for call in pended {
                if panic::catch_unwind(AssertUnwindSafe(call)).is_err() {
                    log::error!("pended call panicked");
                }
            }

            self.process_due(DispatchMethod::Task);
        }

        log::debug!("task dispatcher stopped");
    }

    /// Pops and runs every timer of `method` whose deadline has passed, then
    /// reprograms the alarm.
    pub(crate) fn process_due(&self, method: DispatchMethod) {
        let sched = &self.inner;

        loop {
            let mut state = sched.state.lock();
            let now = sched.driver.get_time();
            let Some(((deadline, _), handle)) = state.tracks.track_mut(method).pop_due(now) else {
                sched.reprogram_alarm(&mut state);
                sched.release(state);
                return;
            };

            let State {
                registry,
                tracks,
                notes,
                ..
            } = &mut *state;
            let Some(record) = registry.get_mut(handle) else {
                continue;
            };
            record.key = None;

            if record.period > 0 {
                let mut next = deadline.saturating_add(record.period);
                if record.skip_unhandled_events && next <= now {
                    let skipped = (now - deadline) / record.period;
                    record.stats.times_skipped += skipped;
                    next = now.saturating_add(record.period);
                    log::warn!("{handle} lagging, skipped {skipped} period(s)");
                    sched.trace.defer(notes, Note::skip(handle, skipped));
                }
                record.deadline = next;
                record.key = Some(tracks.insert(method, next, handle));
            }
            record.stats.times_triggered += 1;

            let Some(mut callback) = record.callback.take() else {
                sched.release(state);
                continue;
            };
            record.in_flight = true;
            sched.release(state);

            log::trace!("{handle} fired: deadline={deadline} now={now}");
            sched.trace.emit(Note::fire(handle, deadline));

            let started = Instant::now();
            let outcome = {
                let _scope = CallbackScope::enter(sched.id, handle);
                let ctx = TimerContext::new(self, handle, deadline);
                panic::catch_unwind(AssertUnwindSafe(|| callback(&ctx)))
            };
            if outcome.is_err() {
                log::error!("{handle} callback panicked");
            }
            let run_time = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);

            let released = self.finish_callback(handle, callback, run_time);
            drop(released);
        }
    }

    /// Returns the callback to its record, or hands it back for dropping if
    /// the timer was deleted while it ran.
    fn finish_callback(
        &self,
        handle: TimerHandle,
        callback: TimerCallback,
        run_time_us: u64,
    ) -> Option<TimerCallback> {
        let mut state = self.inner.state.lock();
        let keep = match state.registry.get_mut(handle) {
            Some(record) => {
                record.in_flight = false;
                record.stats.callback_run_time_us += run_time_us;
                !record.delete_pending
            }
            None => false,
        };

        let released = if keep {
            if let Some(record) = state.registry.get_mut(handle) {
                record.callback = Some(callback);
            }
            None
        } else {
            state.registry.remove(handle);
            log::debug!("{handle} released after its callback returned");
            Some(callback)
        };

        self.inner.callback_done.notify_all();
        released
    }
}
