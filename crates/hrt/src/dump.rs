//! Human-readable timer listing.

use core::fmt::{self, Write};

use crate::timer::TimerInfo;
use crate::timers::Timers;

impl Timers {
    /// Writes every live timer as a table, armed timers first in firing
    /// order. The snapshot is taken under the lock; formatting happens
    /// outside it.
    pub fn dump<W: Write>(&self, out: &mut W) -> fmt::Result {
        write_table(out, &self.snapshot())
    }

    pub fn dump_to_string(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.dump(&mut out);
        out
    }
}

/// Formats `timers` the way [`Timers::dump`] does.
pub fn write_table<W: Write>(out: &mut W, timers: &[TimerInfo]) -> fmt::Result {
    writeln!(
        out,
        "{:<20} {:>12} {:>14} {:>8} {:>10} {:>10} {:>10} {:>12}",
        "name", "period", "alarm", "dispatch", "armed", "triggered", "skipped", "cb time"
    )?;

    for info in timers {
        let name = if info.name.is_empty() { "-" } else { info.name.as_str() };
        let alarm = match info.next_alarm_us {
            Some(deadline) => deadline.to_string(),
            None => "-".to_string(),
        };
        writeln!(
            out,
            "{:<20} {:>12} {:>14} {:>8} {:>10} {:>10} {:>10} {:>12}",
            name,
            info.period_us,
            alarm,
            info.dispatch.to_string(),
            info.stats.times_armed,
            info.stats.times_triggered,
            info.stats.times_skipped,
            info.stats.callback_run_time_us,
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TimerHandle;
    use crate::timer::{DispatchMethod, TimerStats};

    fn info(index: u32, name: &str, alarm: Option<u64>) -> TimerInfo {
        TimerInfo {
            handle: TimerHandle::from_raw(index, 0),
            name: name.to_string(),
            dispatch: DispatchMethod::Isr,
            period_us: 0,
            next_alarm_us: alarm,
            skip_unhandled_events: false,
            stats: TimerStats {
                times_armed: 1,
                ..TimerStats::default()
            },
        }
    }

    #[test]
    fn table_has_header_and_one_row_per_timer() {
        let mut out = String::new();
        write_table(&mut out, &[info(0, "blink", Some(1_000)), info(1, "", None)]).unwrap();

        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("name"));
        assert!(lines[1].starts_with("blink"));
        assert!(lines[1].contains("1000"));
        assert!(lines[1].contains("isr"));
        assert!(lines[2].starts_with('-'));
    }
}
