use std::sync::Arc;
use std::time::Duration;

use crate::alarm::HostAlarm;
use crate::config::ServiceConfig;
use crate::service::TimerService;

mod api;

pub(super) const WAIT: Duration = Duration::from_secs(2);

/// Service on a clock that only moves through `Timers::advance`.
pub(super) fn manual_service() -> TimerService {
    let config = ServiceConfig::builder()
        .name("hrt-test")
        .alarm_poll_interval(Duration::from_millis(10))
        .build();
    TimerService::with_config(config)
        .driver(Arc::new(HostAlarm::manual()))
        .start()
        .unwrap()
}
