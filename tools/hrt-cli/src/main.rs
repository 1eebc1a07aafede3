use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use hrt::{AlarmDriver, DispatchMethod, HostAlarm, ServiceConfig, TimerService, TraceHook};
use hrt_trace::{TraceConfig, Tracer, UdpBackend, WriterBackend};

mod decode;
mod logger;
mod scenarios;

#[derive(Parser, Debug)]
#[command(author, version, about = "Timer scenarios and trace decoding for the hrt timer service")]
struct Opts {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    /// Write binary trace frames to this file.
    #[arg(long, value_name = "PATH", global = true)]
    trace_file: Option<PathBuf>,

    /// Stream binary trace frames to this UDP address.
    #[arg(long, value_name = "ADDR", global = true, conflicts_with = "trace_file")]
    trace_udp: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Arm one-shot timers and compare dump order with firing order.
    Order {
        #[arg(default_values_t = [10_000u64, 1_000, 10_000, 5_000, 20_000, 1_000])]
        timeouts: Vec<u64>,
    },
    /// Run a periodic timer and report drift and latency.
    Periodic {
        #[arg(long, default_value_t = 10_000)]
        period_us: u64,
        #[arg(long, default_value_t = 100)]
        count: usize,
        /// Dispatch from the interrupt thread instead of the task worker.
        #[arg(long)]
        isr: bool,
        #[arg(long)]
        skip_unhandled_events: bool,
    },
    /// Run many periodic timers while dumping them concurrently.
    Stress {
        #[arg(long, default_value_t = 200)]
        timers: usize,
        #[arg(long, default_value_t = 1_000)]
        duration_ms: u64,
        #[arg(long, default_value_t = 4)]
        dumpers: usize,
    },
    /// Decode a trace file written with --trace-file.
    Decode {
        path: PathBuf,
        /// The trace was recorded without timestamps.
        #[arg(long)]
        no_timestamps: bool,
    },
}

impl Opts {
    fn trace_hook(&self) -> Result<Option<TraceHook>> {
        if let Some(path) = &self.trace_file {
            let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
            let tracer = Tracer::new(TraceConfig::default(), WriterBackend::new(file)).into_handle();
            return Ok(Some(tracer.hook()));
        }
        if let Some(addr) = &self.trace_udp {
            let backend = UdpBackend::connect(addr).with_context(|| format!("connecting to {addr}"))?;
            let tracer = Tracer::new(TraceConfig::default(), backend).into_handle();
            return Ok(Some(tracer.hook()));
        }
        Ok(None)
    }

    fn service(&self, driver: Arc<dyn AlarmDriver>, max_timers: usize) -> Result<TimerService> {
        let config = ServiceConfig::builder()
            .name("hrt-cli")
            .max_timers(max_timers)
            .build();
        let mut builder = TimerService::with_config(config).driver(driver);
        if let Some(hook) = self.trace_hook()? {
            builder = builder.with_trace_hook(hook);
        }
        Ok(builder.start()?)
    }
}

fn main() -> Result<()> {
    let opts = Opts::parse();
    logger::init(opts.verbose)?;

    let mut service = match &opts.command {
        Command::Order { timeouts } => {
            let service = opts.service(Arc::new(HostAlarm::manual()), timeouts.len().max(1))?;
            scenarios::order(&service, timeouts, opts.json)?;
            service
        }
        Command::Periodic {
            period_us,
            count,
            isr,
            skip_unhandled_events,
        } => {
            let service = opts.service(Arc::new(HostAlarm::new()), 1)?;
            let dispatch = if *isr {
                DispatchMethod::Isr
            } else {
                DispatchMethod::Task
            };
            let periodic = scenarios::PeriodicOptions {
                period_us: *period_us,
                count: *count,
                dispatch,
                skip_unhandled_events: *skip_unhandled_events,
            };
            scenarios::periodic(&service, &periodic, opts.json)?;
            service
        }
        Command::Stress {
            timers,
            duration_ms,
            dumpers,
        } => {
            let service = opts.service(Arc::new(HostAlarm::new()), (*timers).max(1))?;
            let stress = scenarios::StressOptions {
                timers: *timers,
                duration: Duration::from_millis(*duration_ms),
                dumpers: *dumpers,
            };
            scenarios::stress(&service, &stress, opts.json)?;
            service
        }
        Command::Decode {
            path,
            no_timestamps,
        } => return decode::run(path, !no_timestamps, opts.json),
    };

    service.deinit()?;
    Ok(())
}
