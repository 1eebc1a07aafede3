//! Deadline-ordered tracks of armed timers.
//!
//! Each dispatch method owns its own track. Entries are keyed by
//! `(deadline, sequence)` where the sequence number is shared by both tracks
//! and grows on every insertion, so equal deadlines pop in insertion order.

use std::collections::BTreeMap;

use crate::registry::TimerHandle;
use crate::timer::DispatchMethod;

/// Position of an armed timer inside its track.
pub(crate) type QueueKey = (u64, u64);

#[derive(Default)]
pub(crate) struct DeadlineQueue {
    entries: BTreeMap<QueueKey, TimerHandle>,
}

impl DeadlineQueue {
    pub(crate) fn insert(&mut self, key: QueueKey, handle: TimerHandle) {
        self.entries.insert(key, handle);
    }

    pub(crate) fn remove(&mut self, key: QueueKey) -> Option<TimerHandle> {
        self.entries.remove(&key)
    }

    pub(crate) fn peek(&self) -> Option<(QueueKey, TimerHandle)> {
        self.entries.first_key_value().map(|(key, handle)| (*key, *handle))
    }

    /// Removes the head if its deadline is at or before `now`.
    pub(crate) fn pop_due(&mut self, now: u64) -> Option<(QueueKey, TimerHandle)> {
        match self.entries.first_entry() {
            Some(entry) if entry.key().0 <= now => {
                let key = *entry.key();
                Some((key, entry.remove()))
            }
            _ => None,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (QueueKey, TimerHandle)> + '_ {
        self.entries.iter().map(|(key, handle)| (*key, *handle))
    }
}

#[derive(Default)]
pub(crate) struct Tracks {
    queues: [DeadlineQueue; 2],
    next_seq: u64,
}

impl Tracks {
    pub(crate) fn insert(&mut self, method: DispatchMethod, deadline: u64, handle: TimerHandle) -> QueueKey {
        let key = (deadline, self.next_seq);
        self.next_seq += 1;
        self.queues[method.index()].insert(key, handle);
        key
    }

    pub(crate) fn remove(&mut self, method: DispatchMethod, key: QueueKey) -> Option<TimerHandle> {
        self.queues[method.index()].remove(key)
    }

    pub(crate) fn track(&self, method: DispatchMethod) -> &DeadlineQueue {
        &self.queues[method.index()]
    }

    pub(crate) fn track_mut(&mut self, method: DispatchMethod) -> &mut DeadlineQueue {
        &mut self.queues[method.index()]
    }

    pub(crate) fn len(&self) -> usize {
        self.queues.iter().map(DeadlineQueue::len).sum()
    }

    /// Both tracks merged in firing order.
    pub(crate) fn ordered(&self) -> Vec<(QueueKey, TimerHandle)> {
        let mut all: Vec<_> = self.queues.iter().flat_map(DeadlineQueue::iter).collect();
        all.sort_unstable_by_key(|(key, _)| *key);
        all
    }
}
