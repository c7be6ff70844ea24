//! Detection Telemetry
//!
//! Fire-and-forget publishing of episode events and gated samples:
//! - `eyes_closed` / `recovered` events with wall-clock timestamps
//! - MQTT transport with connection tracking
//! - Silent drop while no transport is connected (no queue, no retry)

mod forwarder;
mod mqtt;

pub use forwarder::TelemetryForwarder;
pub use mqtt::MqttTransport;

use chrono::{DateTime, Utc};
use dms::DetectionEvent;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Telemetry error types
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Not connected")]
    NotConnected,

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Telemetry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Connect to the broker at startup
    pub enabled: bool,
    /// MQTT broker host
    pub broker_host: String,
    /// MQTT broker port
    pub broker_port: u16,
    /// Client id, generated when unset
    pub client_id: Option<String>,
    /// Topic prefix; events go to `<prefix>/<client>/detections`
    pub topic_prefix: String,
    /// Keep-alive interval (seconds)
    pub keep_alive_secs: u64,
    /// Delay before polling again after a connection error (seconds)
    pub reconnect_delay_secs: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            broker_host: "localhost".to_string(),
            broker_port: 1883,
            client_id: None,
            topic_prefix: "drowsiness".to_string(),
            keep_alive_secs: 30,
            reconnect_delay_secs: 5,
        }
    }
}

/// Telemetry event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryKind {
    EyesClosed,
    Recovered,
}

/// Event message sent downstream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    #[serde(rename = "type")]
    pub kind: TelemetryKind,
    /// Closed duration or episode length (seconds)
    pub duration: f64,
    /// Emission time, milliseconds since the Unix epoch
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl TelemetryEvent {
    pub fn from_detection(event: &DetectionEvent, timestamp: DateTime<Utc>) -> Self {
        let kind = match event {
            DetectionEvent::AlertRaised { .. } => TelemetryKind::EyesClosed,
            DetectionEvent::Recovered { .. } => TelemetryKind::Recovered,
        };
        Self {
            kind,
            duration: event.duration_secs(),
            timestamp,
        }
    }
}

/// Outbound transport
pub trait TelemetryTransport: Send + Sync {
    /// Whether a live connection exists right now
    fn is_connected(&self) -> bool;

    fn send_event(&self, event: &TelemetryEvent) -> Result<(), TelemetryError>;

    fn send_sample(&self, payload: Vec<u8>) -> Result<(), TelemetryError>;
}

/// Transport that is never connected (telemetry disabled)
#[derive(Debug, Default)]
pub struct OfflineTransport;

impl TelemetryTransport for OfflineTransport {
    fn is_connected(&self) -> bool {
        false
    }

    fn send_event(&self, _event: &TelemetryEvent) -> Result<(), TelemetryError> {
        Err(TelemetryError::NotConnected)
    }

    fn send_sample(&self, _payload: Vec<u8>) -> Result<(), TelemetryError> {
        Err(TelemetryError::NotConnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_event_wire_format() {
        let timestamp = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let event = TelemetryEvent::from_detection(
            &DetectionEvent::AlertRaised {
                closed_for_secs: 2.5,
                timestamp_secs: 12.0,
            },
            timestamp,
        );

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "eyes_closed",
                "duration": 2.5,
                "timestamp": 1_700_000_000_123i64,
            })
        );
    }

    #[test]
    fn test_recovered_event_kind() {
        let event = TelemetryEvent::from_detection(
            &DetectionEvent::Recovered {
                recovered_after_secs: 0.4,
                timestamp_secs: 3.0,
            },
            Utc::now(),
        );
        assert_eq!(event.kind, TelemetryKind::Recovered);
        assert_eq!(event.duration, 0.4);

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"recovered""#));
    }

    #[test]
    fn test_offline_transport_refuses() {
        let transport = OfflineTransport;
        assert!(!transport.is_connected());
        assert!(matches!(
            transport.send_sample(vec![1, 2, 3]),
            Err(TelemetryError::NotConnected)
        ));
    }
}
