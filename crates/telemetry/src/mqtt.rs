//! MQTT transport

use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{TelemetryConfig, TelemetryError, TelemetryEvent, TelemetryTransport};

/// MQTT publisher with live connection tracking
///
/// Publishing is at-most-once and never waits: a message that cannot be
/// queued on the client is reported as a publish error and discarded.
pub struct MqttTransport {
    client: AsyncClient,
    connected: Arc<AtomicBool>,
    events_topic: String,
    samples_topic: String,
    event_loop: JoinHandle<()>,
}

impl MqttTransport {
    /// Start the client and its event loop (requires a Tokio runtime)
    pub fn connect(config: &TelemetryConfig) -> Self {
        let client_id = config
            .client_id
            .clone()
            .unwrap_or_else(|| format!("drowsiness-{}", Uuid::new_v4()));

        let mut options = MqttOptions::new(
            client_id.clone(),
            config.broker_host.clone(),
            config.broker_port,
        );
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));

        let (client, mut eventloop) = AsyncClient::new(options, 10);
        let connected = Arc::new(AtomicBool::new(false));
        let reconnect_delay = Duration::from_secs(config.reconnect_delay_secs);

        let flag = connected.clone();
        let event_loop = tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                        info!("MQTT connected ({:?})", ack.code);
                        flag.store(true, Ordering::Release);
                    }
                    Ok(Event::Incoming(Packet::Disconnect)) => {
                        warn!("MQTT broker closed the session");
                        flag.store(false, Ordering::Release);
                    }
                    Ok(Event::Incoming(incoming)) => {
                        debug!("MQTT incoming: {:?}", incoming);
                    }
                    Ok(Event::Outgoing(_)) => {}
                    Err(e) => {
                        if flag.swap(false, Ordering::AcqRel) {
                            error!("MQTT connection lost: {}", e);
                        } else {
                            debug!("MQTT connect failed: {}", e);
                        }
                        tokio::time::sleep(reconnect_delay).await;
                    }
                }
            }
        });

        let base = format!("{}/{}", config.topic_prefix, client_id);
        info!(
            "MQTT telemetry to {}:{} under {}",
            config.broker_host, config.broker_port, base
        );

        Self {
            client,
            connected,
            events_topic: format!("{}/detections", base),
            samples_topic: format!("{}/frames", base),
            event_loop,
        }
    }

    pub fn events_topic(&self) -> &str {
        &self.events_topic
    }

    pub fn samples_topic(&self) -> &str {
        &self.samples_topic
    }

    fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TelemetryError> {
        if !self.is_connected() {
            return Err(TelemetryError::NotConnected);
        }
        self.client
            .try_publish(topic, QoS::AtMostOnce, false, payload)
            .map_err(|e| TelemetryError::Publish(e.to_string()))
    }
}

impl TelemetryTransport for MqttTransport {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn send_event(&self, event: &TelemetryEvent) -> Result<(), TelemetryError> {
        let payload = serde_json::to_vec(event)?;
        self.publish(&self.events_topic, payload)
    }

    fn send_sample(&self, payload: Vec<u8>) -> Result<(), TelemetryError> {
        self.publish(&self.samples_topic, payload)
    }
}

impl Drop for MqttTransport {
    fn drop(&mut self) {
        self.event_loop.abort();
    }
}
