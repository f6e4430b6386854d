//! Scheduler error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while orchestrating a run.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("worker pool is closed")]
    PoolClosed,

    #[error("retry timer is stopped")]
    RetryTimerStopped,

    #[error("results could not be written to {0}")]
    ResultsUnwritable(PathBuf),

    #[error("background task failed: {0}")]
    Task(String),

    #[error("state store error: {0}")]
    State(#[from] probe_state::StateError),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
