//! Service configuration.

use std::time::Duration;

/// Configuration for a [`TimerService`](crate::TimerService).
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Prefix for the worker (`<name>-task`) and interrupt (`<name>-isr`)
    /// thread names.
    pub name: &'static str,
    /// Maximum number of live timers; `create` fails with `NoMemory` beyond it.
    pub max_timers: usize,
    pub task_stack_size: usize,
    pub isr_stack_size: usize,
    /// Upper bound on how long the interrupt thread sleeps between checks
    /// for shutdown.
    pub alarm_poll_interval: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "hrt",
            max_timers: 1024,
            task_stack_size: 256 * 1024,
            isr_stack_size: 128 * 1024,
            alarm_poll_interval: Duration::from_millis(100),
        }
    }
}

impl ServiceConfig {
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::default()
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug, Clone, Default)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn name(mut self, name: &'static str) -> Self {
        self.config.name = name;
        self
    }

    pub fn max_timers(mut self, max: usize) -> Self {
        self.config.max_timers = max;
        self
    }

    /// Sets the stack sizes of the worker and interrupt threads in bytes.
    pub fn stack_sizes(mut self, task: usize, isr: usize) -> Self {
        self.config.task_stack_size = task;
        self.config.isr_stack_size = isr;
        self
    }

    pub fn alarm_poll_interval(mut self, interval: Duration) -> Self {
        self.config.alarm_poll_interval = interval;
        self
    }

    pub fn build(self) -> ServiceConfig {
        self.config
    }
}
