//! Per-thread execution context markers.
//!
//! The interrupt thread flags itself as interrupt context, and every callback
//! invocation records which service and timer it belongs to, so blocking
//! calls can detect self-waits without consulting the scheduler lock.

use std::cell::Cell;

use crate::registry::TimerHandle;

thread_local! {
    static IN_ISR: Cell<bool> = const { Cell::new(false) };
    static RUNNING: Cell<Option<(usize, TimerHandle)>> = const { Cell::new(None) };
}

/// Returns `true` on the service interrupt thread.
pub fn in_isr() -> bool {
    IN_ISR.with(Cell::get)
}

pub(crate) fn mark_isr_thread() {
    IN_ISR.with(|flag| flag.set(true));
}

/// Timer whose callback is executing on this thread, tagged with the owning
/// service id.
pub(crate) fn running_callback() -> Option<(usize, TimerHandle)> {
    RUNNING.with(Cell::get)
}

/// Restores the previous marker on drop, so nesting and panics unwind cleanly.
pub(crate) struct CallbackScope {
    previous: Option<(usize, TimerHandle)>,
}

impl CallbackScope {
    pub(crate) fn enter(service: usize, handle: TimerHandle) -> Self {
        let previous = RUNNING.with(|cell| cell.replace(Some((service, handle))));
        Self { previous }
    }
}

impl Drop for CallbackScope {
    fn drop(&mut self) {
        RUNNING.with(|cell| cell.set(self.previous));
    }
}
