//! Alerting System
//!
//! Turns drowsiness episodes into "play alert" requests. Playback failures
//! are logged and counted, never propagated to the detector.

mod manager;
mod sink;

pub use manager::{AlertConfig, AlertDispatcher};
pub use sink::{AlertRequest, AlertSink, CommandAlertSink, LogAlertSink};

use thiserror::Error;

/// Alert playback errors
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("Alert player busy")]
    Busy,

    #[error("Alert playback failed: {0}")]
    Playback(String),
}
