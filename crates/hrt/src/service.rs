//! Service lifecycle: builder, dispatcher threads and shutdown.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::alarm::{AlarmDriver, HostAlarm};
use crate::config::ServiceConfig;
use crate::error::{TimerError, TimerResult};
use crate::scheduler::Scheduler;
use crate::timers::Timers;
use crate::trace::{TraceHook, Tracepoints};

pub struct TimerServiceBuilder {
    config: ServiceConfig,
    driver: Option<Arc<dyn AlarmDriver>>,
    trace: Option<TraceHook>,
}

impl TimerServiceBuilder {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            config,
            driver: None,
            trace: None,
        }
    }

    /// Time base to run on. Defaults to [`HostAlarm::new`].
    pub fn driver(mut self, driver: Arc<dyn AlarmDriver>) -> Self {
        self.driver = Some(driver);
        self
    }

    pub fn with_trace_hook(mut self, hook: TraceHook) -> Self {
        self.trace = Some(hook);
        self
    }

    /// Spawns the dispatcher threads and returns the running service.
    pub fn start(self) -> TimerResult<TimerService> {
        let driver = self.driver.unwrap_or_else(|| Arc::new(HostAlarm::new()));
        TimerService::spawn(self.config, driver, Tracepoints::new(self.trace))
    }
}

/// A running timer service.
///
/// Owns the task worker and interrupt threads. Dropping the service stops
/// both threads; [`deinit`](Self::deinit) does the same but first checks
/// that no timers are left.
pub struct TimerService {
    timers: Timers,
    config: ServiceConfig,
    task_thread: Option<JoinHandle<()>>,
    isr_thread: Option<JoinHandle<()>>,
}

impl TimerService {
    pub fn builder() -> TimerServiceBuilder {
        TimerServiceBuilder::new(ServiceConfig::default())
    }

    pub fn with_config(config: ServiceConfig) -> TimerServiceBuilder {
        TimerServiceBuilder::new(config)
    }

    /// Starts a service with default settings on the host clock.
    pub fn start() -> TimerResult<Self> {
        Self::builder().start()
    }

    fn spawn(config: ServiceConfig, driver: Arc<dyn AlarmDriver>, trace: Tracepoints) -> TimerResult<Self> {
        driver.disable_alarm();
        let timers = Timers::new(Arc::new(Scheduler::new(driver, config.max_timers, trace)));

        let mut service = Self {
            timers,
            config,
            task_thread: None,
            isr_thread: None,
        };

        let worker = service.timers.clone();
        service.task_thread = Some(spawn_named(
            format!("{}-task", service.config.name),
            service.config.task_stack_size,
            move || worker.run_task_worker(),
        )?);

        let isr = service.timers.clone();
        let poll = service.config.alarm_poll_interval;
        service.isr_thread = Some(spawn_named(
            format!("{}-isr", service.config.name),
            service.config.isr_stack_size,
            move || isr.run_isr(poll),
        )?);

        log::info!(
            "{} timer service started (max {} timers)",
            service.config.name,
            service.config.max_timers
        );
        Ok(service)
    }

    /// Handle used to create and control timers.
    pub fn timers(&self) -> &Timers {
        &self.timers
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Stops the service. Fails with `InvalidState` while timers still exist,
    /// leaving the service running.
    pub fn deinit(&mut self) -> TimerResult<()> {
        if self.is_stopped() {
            return Err(TimerError::InvalidState("timer service is not running"));
        }
        let live = self.timers.len();
        if live > 0 {
            log::warn!("deinit refused: {live} timer(s) still exist");
            return Err(TimerError::InvalidState("delete all timers before deinit"));
        }
        self.shutdown();
        Ok(())
    }

    pub fn is_stopped(&self) -> bool {
        self.task_thread.is_none() && self.isr_thread.is_none()
    }

    fn shutdown(&mut self) {
        if self.is_stopped() {
            return;
        }

        {
            let mut state = self.timers.inner.state.lock();
            state.shutdown = true;
            state.pended.clear();
            self.timers.inner.task_wake.notify_all();
        }
        self.timers.inner.driver.wake();
        self.timers.inner.driver.disable_alarm();

        for handle in [self.task_thread.take(), self.isr_thread.take()].into_iter().flatten() {
            if handle.join().is_err() {
                log::error!("{} dispatcher thread panicked", self.config.name);
            }
        }
        log::info!("{} timer service stopped", self.config.name);
    }
}

impl Drop for TimerService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn spawn_named<F>(name: String, stack_size: usize, body: F) -> TimerResult<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.clone())
        .stack_size(stack_size)
        .spawn(body)
        .map_err(|source| TimerError::Spawn { name, source })
}
