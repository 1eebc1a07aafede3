use std::io;

use thiserror::Error;

/// Errors returned by timer operations.
#[derive(Debug, Error)]
pub enum TimerError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
    #[error("timed out waiting for the timer callback to finish")]
    Timeout,
    #[error("timer capacity of {0} exhausted")]
    NoMemory(usize),
    #[error("not supported: {0}")]
    NotSupported(&'static str),
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },
}

pub type TimerResult<T> = Result<T, TimerError>;
