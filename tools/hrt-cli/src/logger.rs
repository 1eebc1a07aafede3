//! Coloured stderr backend for the `log` facade.

use colored::Colorize;
use log::{Level, LevelFilter, Log, Metadata, Record};
use once_cell::sync::OnceCell;

struct StderrLogger {
    level: LevelFilter,
}

static LOGGER: OnceCell<StderrLogger> = OnceCell::new();

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let level = match record.level() {
            Level::Error => "ERROR".bright_red().bold(),
            Level::Warn => "WARN ".bright_yellow(),
            Level::Info => "INFO ".bright_green(),
            Level::Debug => "DEBUG".bright_blue(),
            Level::Trace => "TRACE".dimmed(),
        };
        let thread = std::thread::current();
        eprintln!(
            "{level} {:12} {}",
            thread.name().unwrap_or("-").dimmed(),
            record.args()
        );
    }

    fn flush(&self) {}
}

/// Installs the logger. `-v` enables info, `-vv` debug, `-vvv` trace.
pub fn init(verbosity: u8) -> anyhow::Result<()> {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let logger = LOGGER.get_or_init(|| StderrLogger { level });
    log::set_logger(logger).map_err(|err| anyhow::anyhow!("installing logger: {err}"))?;
    log::set_max_level(level);
    Ok(())
}
