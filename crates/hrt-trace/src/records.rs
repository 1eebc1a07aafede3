//! Record identifiers emitted by the timer service.
//!
//! Every timer record starts with the timer handle encoded as `u64` LE
//! (`generation << 32 | index`).

pub mod timer {
    /// Timer created: `handle, dispatch u8` (0 = task, 1 = isr).
    pub const CREATE: u8 = 32;
    /// Timer armed: `handle, deadline u64, period u64`.
    pub const ARM: u8 = 33;
    /// Timer disarmed: `handle, deadline u64`.
    pub const DISARM: u8 = 34;
    /// Stop requested on an idle timer: `handle`.
    pub const DISARM_ATTEMPT: u8 = 35;
    /// Callback dispatched: `handle, deadline u64`.
    pub const FIRE: u8 = 36;
    /// Periods dropped for a lagging timer: `handle, skipped u32`.
    pub const SKIP: u8 = 37;
    /// Timer deleted: `handle`.
    pub const DELETE: u8 = 38;
}

/// Alarm comparator records.
pub mod alarm {
    /// Alarm programmed: `timestamp u64`.
    pub const SET: u8 = 50;
    /// Alarm disabled, no armed timers.
    pub const DISABLE: u8 = 51;
}

/// `true` for records whose payload starts with a timer handle.
pub fn is_timer(record_type: u8) -> bool {
    (timer::CREATE..=timer::DELETE).contains(&record_type)
}

/// Returns a short mnemonic for a record id, used by host-side printers.
pub fn name(record_type: u8) -> &'static str {
    match record_type {
        timer::CREATE => "TIMER_CREATE",
        timer::ARM => "TIMER_ARM",
        timer::DISARM => "TIMER_DISARM",
        timer::DISARM_ATTEMPT => "TIMER_DISARM_ATTEMPT",
        timer::FIRE => "TIMER_FIRE",
        timer::SKIP => "TIMER_SKIP",
        timer::DELETE => "TIMER_DELETE",
        alarm::SET => "ALARM_SET",
        alarm::DISABLE => "ALARM_DISABLE",
        _ => "UNKNOWN",
    }
}
