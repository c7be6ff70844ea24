//! Best-effort forwarding of detection events and samples

use chrono::Utc;
use dms::DetectionEvent;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{TelemetryEvent, TelemetryTransport};

/// Sends telemetry when a transport is connected, drops it otherwise
pub struct TelemetryForwarder {
    transport: Arc<dyn TelemetryTransport>,
    sent: AtomicU64,
    dropped: AtomicU64,
}

impl TelemetryForwarder {
    pub fn new(transport: Arc<dyn TelemetryTransport>) -> Self {
        Self {
            transport,
            sent: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Forward an episode event; returns whether it was handed to the transport
    pub fn forward(&self, event: &DetectionEvent) -> bool {
        if !self.transport.is_connected() {
            debug!("Telemetry offline, dropping {} event", event.kind());
            self.record_drop();
            return false;
        }

        let message = TelemetryEvent::from_detection(event, Utc::now());
        match self.transport.send_event(&message) {
            Ok(()) => {
                debug!("Telemetry sent: {} ({:.1}s)", event.kind(), message.duration);
                self.sent.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(e) => {
                warn!("Telemetry send failed for {} event: {}", event.kind(), e);
                self.record_drop();
                false
            }
        }
    }

    /// Forward a captured sample as JSON
    pub fn forward_sample<T: Serialize>(&self, sample: &T) -> bool {
        if !self.transport.is_connected() {
            self.record_drop();
            return false;
        }

        let payload = match serde_json::to_vec(sample) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to encode sample: {}", e);
                self.record_drop();
                return false;
            }
        };

        match self.transport.send_sample(payload) {
            Ok(()) => {
                self.sent.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(e) => {
                warn!("Sample send failed: {}", e);
                self.record_drop();
                false
            }
        }
    }

    fn record_drop(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("telemetry_dropped_total").increment(1);
    }

    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
