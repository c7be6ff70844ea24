//! Alert dispatch and failure accounting

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, warn};

use crate::sink::{AlertRequest, AlertSink, CommandAlertSink, LogAlertSink};
use crate::AlertError;

/// Alert configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// External player launched per alert (e.g. "aplay"); log-only when unset
    pub player_program: Option<String>,
    /// Arguments passed to the player (e.g. the alarm sound file)
    pub player_args: Vec<String>,
}

impl AlertConfig {
    /// Build the sink this configuration describes
    pub fn build_sink(&self) -> Box<dyn AlertSink> {
        match &self.player_program {
            Some(program) => Box::new(CommandAlertSink::new(
                program.clone(),
                self.player_args.clone(),
            )),
            None => {
                info!("No alert player configured, alerts will only be logged");
                Box::new(LogAlertSink)
            }
        }
    }
}

/// Forwards alert requests to a sink, absorbing failures
pub struct AlertDispatcher {
    sink: Box<dyn AlertSink>,
    fired: AtomicU64,
    failed: AtomicU64,
}

impl AlertDispatcher {
    pub fn new(sink: Box<dyn AlertSink>) -> Self {
        Self {
            sink,
            fired: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &AlertConfig) -> Self {
        Self::new(config.build_sink())
    }

    /// Request playback; returns whether the sink accepted it
    pub fn dispatch(&self, request: &AlertRequest) -> bool {
        self.fired.fetch_add(1, Ordering::Relaxed);
        match self.sink.play(request) {
            Ok(()) => {
                info!("Alert played (closed for {:.1}s)", request.closed_for_secs);
                true
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("alert_playback_failures_total").increment(1);
                match e {
                    AlertError::Busy => warn!("Alert skipped: player still busy"),
                    AlertError::Playback(_) => warn!("Alert playback failed: {}", e),
                }
                false
            }
        }
    }

    /// Alerts requested so far
    pub fn fired_count(&self) -> u64 {
        self.fired.load(Ordering::Relaxed)
    }

    /// Requests the sink could not play
    pub fn failed_count(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

impl Default for AlertDispatcher {
    fn default() -> Self {
        Self::new(Box::new(LogAlertSink))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Records requests; fails every call when `busy` is set
    #[derive(Default)]
    struct RecordingSink {
        played: Arc<Mutex<Vec<AlertRequest>>>,
        busy: bool,
    }

    impl AlertSink for RecordingSink {
        fn play(&self, request: &AlertRequest) -> Result<(), AlertError> {
            if self.busy {
                return Err(AlertError::Busy);
            }
            self.played.lock().unwrap().push(*request);
            Ok(())
        }
    }

    fn request() -> AlertRequest {
        AlertRequest {
            closed_for_secs: 2.5,
            timestamp_secs: 10.0,
        }
    }

    #[test]
    fn test_dispatch_plays_request() {
        let played = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = AlertDispatcher::new(Box::new(RecordingSink {
            played: played.clone(),
            busy: false,
        }));

        assert!(dispatcher.dispatch(&request()));
        assert_eq!(played.lock().unwrap().as_slice(), &[request()]);
        assert_eq!(dispatcher.fired_count(), 1);
        assert_eq!(dispatcher.failed_count(), 0);
    }

    #[test]
    fn test_failures_are_absorbed() {
        let dispatcher = AlertDispatcher::new(Box::new(RecordingSink {
            busy: true,
            ..Default::default()
        }));

        assert!(!dispatcher.dispatch(&request()));
        assert!(!dispatcher.dispatch(&request()));
        assert_eq!(dispatcher.fired_count(), 2);
        assert_eq!(dispatcher.failed_count(), 2);
    }

    #[test]
    fn test_config_without_player_logs_only() {
        let dispatcher = AlertDispatcher::from_config(&AlertConfig::default());
        assert!(dispatcher.dispatch(&request()));
    }
}
