//! Background scheduling

pub mod error;
pub mod poll_scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use poll_scheduler::{ReconcilePoller, ReconcilePollerConfig};
