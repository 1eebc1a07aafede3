//! Trace hook plumbing.
//!
//! With the `trace` feature the hook type comes from `hrt-trace`, so a
//! `TracerHandle::hook()` plugs in directly. Without it, any closure of the
//! same shape still works.

use crate::registry::TimerHandle;
use crate::timer::DispatchMethod;

#[cfg(feature = "trace")]
pub use hrt_trace::{TraceError, TraceHook};

#[cfg(feature = "trace")]
use hrt_trace::records::{alarm, timer};

#[cfg(not(feature = "trace"))]
pub type TraceError = core::convert::Infallible;

#[cfg(not(feature = "trace"))]
pub type TraceHook = std::sync::Arc<dyn Fn(u8, &[u8]) -> Result<(), TraceError> + Send + Sync>;

#[cfg(not(feature = "trace"))]
mod timer {
    pub const CREATE: u8 = 32;
    pub const ARM: u8 = 33;
    pub const DISARM: u8 = 34;
    pub const DISARM_ATTEMPT: u8 = 35;
    pub const FIRE: u8 = 36;
    pub const SKIP: u8 = 37;
    pub const DELETE: u8 = 38;
}

#[cfg(not(feature = "trace"))]
mod alarm {
    pub const SET: u8 = 50;
    pub const DISABLE: u8 = 51;
}

/// Little-endian payload assembled on the stack.
struct Payload {
    buf: [u8; 32],
    len: usize,
}

impl Payload {
    fn new() -> Self {
        Self {
            buf: [0; 32],
            len: 0,
        }
    }

    fn put(mut self, bytes: &[u8]) -> Self {
        self.buf[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
        self
    }

    fn handle(self, handle: TimerHandle) -> Self {
        self.put(&handle.to_bits().to_le_bytes())
    }

    fn u64(self, value: u64) -> Self {
        self.put(&value.to_le_bytes())
    }

    fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

/// One trace record, built where the event happens and handed to the hook
/// later.
pub(crate) struct Note {
    record: u8,
    payload: Payload,
}

impl Note {
    fn new(record: u8, payload: Payload) -> Self {
        Self { record, payload }
    }

    pub(crate) fn create(handle: TimerHandle, dispatch: DispatchMethod) -> Self {
        Self::new(timer::CREATE, Payload::new().handle(handle).put(&[dispatch.as_u8()]))
    }

    pub(crate) fn arm(handle: TimerHandle, deadline: u64, period: u64) -> Self {
        Self::new(timer::ARM, Payload::new().handle(handle).u64(deadline).u64(period))
    }

    pub(crate) fn disarm(handle: TimerHandle, deadline: u64) -> Self {
        Self::new(timer::DISARM, Payload::new().handle(handle).u64(deadline))
    }

    pub(crate) fn disarm_attempt(handle: TimerHandle) -> Self {
        Self::new(timer::DISARM_ATTEMPT, Payload::new().handle(handle))
    }

    pub(crate) fn fire(handle: TimerHandle, deadline: u64) -> Self {
        Self::new(timer::FIRE, Payload::new().handle(handle).u64(deadline))
    }

    pub(crate) fn skip(handle: TimerHandle, skipped: u64) -> Self {
        let skipped = u32::try_from(skipped).unwrap_or(u32::MAX);
        Self::new(timer::SKIP, Payload::new().handle(handle).put(&skipped.to_le_bytes()))
    }

    pub(crate) fn delete(handle: TimerHandle) -> Self {
        Self::new(timer::DELETE, Payload::new().handle(handle))
    }

    pub(crate) fn alarm_set(timestamp: u64) -> Self {
        Self::new(alarm::SET, Payload::new().u64(timestamp))
    }

    pub(crate) fn alarm_disable() -> Self {
        Self::new(alarm::DISABLE, Payload::new())
    }
}

/// Delivers notes to the installed hook.
///
/// The hook may block on I/O, so it is never called with the scheduler lock
/// held. Notes raised under the lock go through [`defer`](Self::defer) and are
/// flushed by `Scheduler::release`.
#[derive(Clone, Default)]
pub(crate) struct Tracepoints {
    hook: Option<TraceHook>,
}

impl Tracepoints {
    pub(crate) fn new(hook: Option<TraceHook>) -> Self {
        Self { hook }
    }

    pub(crate) fn emit(&self, note: Note) {
        if let Some(hook) = &self.hook {
            if let Err(err) = hook(note.record, note.payload.as_slice()) {
                log::trace!("trace record {} dropped: {err}", note.record);
            }
        }
    }

    /// Queues `note` on `pending` for emission once the lock is released.
    pub(crate) fn defer(&self, pending: &mut Vec<Note>, note: Note) {
        if self.hook.is_some() {
            pending.push(note);
        }
    }
}
