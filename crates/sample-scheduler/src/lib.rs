//! Sample Scheduler
//!
//! Captures a sample at a fixed rate and forwards it downstream only while
//! the transmission gate is open.

mod scheduler;

pub use scheduler::{SampleScheduler, SampleSource, SchedulerConfig, SchedulerStats, StopHandle};

use thiserror::Error;

/// Scheduler errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Invalid sampling rate: {0} fps")]
    InvalidRate(f64),
}
