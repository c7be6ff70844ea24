//! Alert sinks

use dms::DetectionEvent;
use serde::{Deserialize, Serialize};
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;
use tracing::{debug, info, warn};

use crate::AlertError;

/// Request to play the drowsiness alert once
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertRequest {
    /// How long the eyes had been closed when the alert fired (seconds)
    pub closed_for_secs: f64,
    /// Sample timestamp that triggered the alert (seconds)
    pub timestamp_secs: f64,
}

impl AlertRequest {
    /// Alert request for episode-start events, `None` for anything else
    pub fn from_event(event: &DetectionEvent) -> Option<Self> {
        match *event {
            DetectionEvent::AlertRaised {
                closed_for_secs,
                timestamp_secs,
            } => Some(Self {
                closed_for_secs,
                timestamp_secs,
            }),
            DetectionEvent::Recovered { .. } => None,
        }
    }
}

/// Something that can play the alert
pub trait AlertSink: Send + Sync {
    fn play(&self, request: &AlertRequest) -> Result<(), AlertError>;
}

/// Sink that only writes the alert to the log
#[derive(Debug, Default)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn play(&self, request: &AlertRequest) -> Result<(), AlertError> {
        warn!(
            "ALERT: eyes closed for {:.1}s (at {:.3}s)",
            request.closed_for_secs, request.timestamp_secs
        );
        Ok(())
    }
}

/// Sink that launches an external audio player per alert
///
/// The player runs detached. While a previous player is still running the
/// sink reports [`AlertError::Busy`] instead of stacking sounds.
pub struct CommandAlertSink {
    program: String,
    args: Vec<String>,
    child: Mutex<Option<Child>>,
}

impl CommandAlertSink {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        let program = program.into();
        info!("Alert player: {} {:?}", program, args);
        Self {
            program,
            args,
            child: Mutex::new(None),
        }
    }

    /// Whether the last launched player is still running
    pub fn is_busy(&self) -> bool {
        match self.child.lock() {
            Ok(mut guard) => Self::still_running(&mut guard),
            Err(_) => false,
        }
    }

    fn still_running(slot: &mut Option<Child>) -> bool {
        let Some(child) = slot.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                debug!("Alert player exited with {}", status);
                *slot = None;
                false
            }
            Err(e) => {
                warn!("Failed to poll alert player: {}", e);
                *slot = None;
                false
            }
        }
    }
}

impl AlertSink for CommandAlertSink {
    fn play(&self, _request: &AlertRequest) -> Result<(), AlertError> {
        let mut slot = self
            .child
            .lock()
            .map_err(|e| AlertError::Playback(format!("Lock error: {}", e)))?;

        if Self::still_running(&mut slot) {
            return Err(AlertError::Busy);
        }

        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| AlertError::Playback(format!("{}: {}", self.program, e)))?;

        debug!("Alert player started (pid {})", child.id());
        *slot = Some(child);
        Ok(())
    }
}

impl Drop for CommandAlertSink {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.child.lock() {
            if let Some(mut child) = slot.take() {
                let _ = child.kill();
                let _ = child.wait();
            }
        }
    }
}
