//! Scheduler error types

use std::time::Duration;

use thiserror::Error;
use tokio_cron_scheduler::JobSchedulerError;

/// Scheduler-specific errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Scheduler is already running
    #[error("Scheduler already running")]
    AlreadyRunning,

    /// Scheduler is not running
    #[error("Scheduler not running")]
    NotRunning,

    /// Failed to create scheduler
    #[error("Failed to create scheduler: {source}")]
    CreationFailed { source: JobSchedulerError },

    /// Failed to start scheduler
    #[error("Failed to start scheduler: {source}")]
    StartFailed { source: JobSchedulerError },

    /// Failed to stop scheduler
    #[error("Failed to stop scheduler: {source}")]
    StopFailed { source: JobSchedulerError },

    /// Failed to register job
    #[error("Failed to register job: {source}")]
    JobRegistrationFailed { source: JobSchedulerError },

    /// Operation timed out
    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Monitor task join failed
    #[error("Task join failed: {source}")]
    JoinFailed {
        #[from]
        source: tokio::task::JoinError,
    },
}

/// Convenience type alias for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;
