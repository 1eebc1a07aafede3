//! # hrt
//!
//! A high-resolution software timer service. Any number of one-shot and
//! periodic timers are multiplexed onto a single monotonic microsecond
//! counter with one alarm comparator.
//!
//! ## Module Overview
//! - [`alarm`]    – The counter/comparator interface and its host emulation.
//! - [`registry`] – Timer handles and the slab that owns timer records.
//! - [`timer`]    – Creation arguments, callbacks and per-timer statistics.
//! - [`timers`]   – The public timer API (`start_once`, `stop_blocking`, ...).
//! - [`service`]  – Service lifecycle and the two dispatcher threads.
//! - [`dump`]     – Diagnostic table output.
//!
//! Callbacks run either on the interrupt thread ([`DispatchMethod::Isr`]) or
//! on a dedicated worker ([`DispatchMethod::Task`]). A slow task callback
//! never delays an interrupt callback.
//!
//! ```no_run
//! use hrt::{TimerArgs, TimerService};
//!
//! let service = TimerService::start()?;
//! let timers = service.timers();
//! let blink = timers.create(TimerArgs::with_callback(|ctx| {
//!     println!("fired at {}", ctx.deadline());
//! }))?;
//! timers.start_periodic(blink, 500_000)?;
//! # Ok::<(), hrt::TimerError>(())
//! ```

pub mod alarm;
pub mod config;
pub mod context;
mod dispatch;
pub mod dump;
pub mod error;
mod queue;
pub mod registry;
mod scheduler;
pub mod service;
pub mod timer;
pub mod timers;
pub mod trace;

pub use alarm::{AlarmDriver, HostAlarm, ALARM_DISABLED};
pub use config::{ServiceConfig, ServiceConfigBuilder};
pub use context::in_isr;
pub use error::{TimerError, TimerResult};
pub use registry::TimerHandle;
pub use service::{TimerService, TimerServiceBuilder};
pub use timer::{DispatchMethod, TimerArgs, TimerCallback, TimerContext, TimerInfo, TimerStats};
pub use timers::Timers;
pub use trace::{TraceError, TraceHook};

#[cfg(test)]
mod tests;
