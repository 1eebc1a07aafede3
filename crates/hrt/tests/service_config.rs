//! Tests for ServiceConfig builder and service construction.

use std::time::Duration;

use hrt::{ServiceConfig, TimerService};

#[test]
fn service_config_builder() {
    let config = ServiceConfig::builder()
        .name("bench")
        .max_timers(32)
        .stack_sizes(64 * 1024, 32 * 1024)
        .alarm_poll_interval(Duration::from_millis(5))
        .build();

    assert_eq!(config.name, "bench");
    assert_eq!(config.max_timers, 32);
    assert_eq!(config.task_stack_size, 64 * 1024);
    assert_eq!(config.isr_stack_size, 32 * 1024);
    assert_eq!(config.alarm_poll_interval, Duration::from_millis(5));
}

#[test]
fn service_config_default() {
    let config = ServiceConfig::default();

    assert_eq!(config.name, "hrt");
    assert_eq!(config.max_timers, 1024);
    assert_eq!(config.alarm_poll_interval, Duration::from_millis(100));
}

#[test]
fn service_with_custom_config() {
    let config = ServiceConfig::builder().name("custom").max_timers(8).build();
    let mut service = TimerService::with_config(config).start().unwrap();

    assert_eq!(service.config().name, "custom");
    assert_eq!(service.config().max_timers, 8);

    service.deinit().unwrap();
    assert!(service.is_stopped());
}
