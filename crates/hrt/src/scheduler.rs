//! Shared scheduler state and alarm programming.

use std::collections::VecDeque;
use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::alarm::AlarmDriver;
use crate::error::{TimerError, TimerResult};
use crate::queue::Tracks;
use crate::registry::{Registry, TimerHandle};
use crate::timer::{DispatchMethod, TimerRecord};
use crate::trace::{Note, Tracepoints};

static NEXT_SERVICE_ID: AtomicUsize = AtomicUsize::new(1);

/// One-off closure queued for the task worker.
pub(crate) type PendedCall = Box<dyn FnOnce() + Send + 'static>;

pub(crate) struct State {
    pub(crate) registry: Registry<TimerRecord>,
    pub(crate) tracks: Tracks,
    /// The task worker has due timers to process. While set, the task track
    /// is left out of alarm programming.
    pub(crate) task_pending: bool,
    pub(crate) pended: VecDeque<PendedCall>,
    pub(crate) shutdown: bool,
    /// Trace records raised under the lock, flushed by [`Scheduler::release`].
    pub(crate) notes: Vec<Note>,
}

impl State {
    /// Looks up a timer that has not been deleted.
    pub(crate) fn live(&mut self, handle: TimerHandle) -> TimerResult<&mut TimerRecord> {
        self.registry
            .get_mut(handle)
            .filter(|record| !record.delete_pending)
            .ok_or(TimerError::InvalidState("timer handle is not valid"))
    }
}

pub(crate) struct Scheduler {
    pub(crate) id: usize,
    pub(crate) driver: Arc<dyn AlarmDriver>,
    pub(crate) state: Mutex<State>,
    /// Notified every time a callback returns.
    pub(crate) callback_done: Condvar,
    /// Wakes the task worker.
    pub(crate) task_wake: Condvar,
    pub(crate) trace: Tracepoints,
}

impl Scheduler {
    pub(crate) fn new(driver: Arc<dyn AlarmDriver>, max_timers: usize, trace: Tracepoints) -> Self {
        Self {
            id: NEXT_SERVICE_ID.fetch_add(1, Ordering::Relaxed),
            driver,
            state: Mutex::new(State {
                registry: Registry::new(max_timers),
                tracks: Tracks::default(),
                task_pending: false,
                pended: VecDeque::new(),
                shutdown: false,
                notes: Vec::new(),
            }),
            callback_done: Condvar::new(),
            task_wake: Condvar::new(),
            trace,
        }
    }

    /// Unlocks `state`, then hands the trace records collected under it to
    /// the hook.
    pub(crate) fn release(&self, mut state: MutexGuard<'_, State>) {
        let notes = mem::take(&mut state.notes);
        drop(state);
        for note in notes {
            self.trace.emit(note);
        }
    }

    /// Inserts an idle timer into its track.
    pub(crate) fn arm(&self, state: &mut State, handle: TimerHandle, deadline: u64, period: u64) {
        let State {
            registry,
            tracks,
            notes,
            ..
        } = state;
        let Some(record) = registry.get_mut(handle) else {
            return;
        };
        debug_assert!(record.key.is_none(), "{handle} armed twice");

        record.period = period;
        record.deadline = deadline;
        record.key = Some(tracks.insert(record.dispatch, deadline, handle));
        record.stats.times_armed += 1;

        log::trace!("{handle} armed: deadline={deadline} period={period}");
        self.trace.defer(notes, Note::arm(handle, deadline, period));
    }

    /// Removes an armed timer from its track. Returns `false` if it was idle.
    pub(crate) fn disarm(&self, state: &mut State, handle: TimerHandle) -> bool {
        let State {
            registry,
            tracks,
            notes,
            ..
        } = state;
        let Some(record) = registry.get_mut(handle) else {
            return false;
        };
        let Some(key) = record.key.take() else {
            return false;
        };
        tracks.remove(record.dispatch, key);

        log::trace!("{handle} disarmed: deadline={}", key.0);
        self.trace.defer(notes, Note::disarm(handle, key.0));
        true
    }

    /// Points the comparator at the earliest deadline that still needs it.
    ///
    /// A due head on the task track is handed to the worker instead of being
    /// programmed, so a busy worker never keeps the comparator firing.
    pub(crate) fn reprogram_alarm(&self, state: &mut State) {
        let now = self.driver.get_time();
        let mut next: Option<u64> = None;

        for method in DispatchMethod::ALL {
            let Some(((deadline, _), _)) = state.tracks.track(method).peek() else {
                continue;
            };
            if method == DispatchMethod::Task {
                if state.task_pending {
                    continue;
                }
                if deadline <= now {
                    state.task_pending = true;
                    self.task_wake.notify_one();
                    continue;
                }
            }
            next = Some(next.map_or(deadline, |earliest| earliest.min(deadline)));
        }

        let note = match next {
            Some(deadline) => {
                self.driver.set_alarm(deadline);
                Note::alarm_set(deadline)
            }
            None => {
                self.driver.disable_alarm();
                Note::alarm_disable()
            }
        };
        self.trace.defer(&mut state.notes, note);
    }

    /// Earliest armed deadline, optionally ignoring timers that must not wake
    /// the system.
    pub(crate) fn next_deadline(&self, state: &State, wake_up_only: bool) -> Option<u64> {
        DispatchMethod::ALL
            .into_iter()
            .filter_map(|method| {
                state
                    .tracks
                    .track(method)
                    .iter()
                    .find(|(_, handle)| {
                        !wake_up_only
                            || state
                                .registry
                                .get(*handle)
                                .is_some_and(|record| !record.skip_unhandled_events)
                    })
                    .map(|((deadline, _), _)| deadline)
            })
            .min()
    }
}
