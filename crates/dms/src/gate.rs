//! Transmission gate observed by the sample scheduler

use tokio::sync::watch;

use crate::state::DetectionState;

/// Read-only view of the monitor's current state
///
/// Holds no state of its own: every query recomputes the gate from the most
/// recently published [`DetectionState`].
#[derive(Debug, Clone)]
pub struct TransmissionGate {
    rx: watch::Receiver<DetectionState>,
}

impl TransmissionGate {
    pub(crate) fn new(rx: watch::Receiver<DetectionState>) -> Self {
        Self { rx }
    }

    /// Whether samples may be forwarded right now
    pub fn is_open(&self) -> bool {
        self.rx.borrow().transmission_open()
    }

    /// Snapshot of the state the gate is derived from
    pub fn snapshot(&self) -> DetectionState {
        *self.rx.borrow()
    }
}

/// Gate for a fixed state, detached from any monitor
impl From<DetectionState> for TransmissionGate {
    fn from(state: DetectionState) -> Self {
        let (_tx, rx) = watch::channel(state);
        Self::new(rx)
    }
}
