//! Wiring between the detector core and its sinks

use alerting::{AlertDispatcher, AlertRequest};
use dms::{
    DetectionAnalysis, DetectionEvent, DmsError, DrowsinessMonitor, LandmarkFrame, SessionStats,
    StateKind, TransmissionGate,
};
use sample_scheduler::SampleSource;
use serde::Serialize;
use std::sync::Arc;
use telemetry::TelemetryForwarder;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

/// Status snapshot served by the HTTP API
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub state: StateKind,
    pub status: String,
    pub transmission_open: bool,
    pub session: SessionStats,
    pub rejected_frames: u64,
    pub alerts_requested: u64,
    pub alert_failures: u64,
    pub telemetry_connected: bool,
    pub telemetry_sent: u64,
    pub telemetry_dropped: u64,
}

/// Drives one detection session and routes its events
pub struct MonitorRuntime {
    monitor: DrowsinessMonitor,
    alerts: AlertDispatcher,
    telemetry: Arc<TelemetryForwarder>,
    last_analysis: Option<DetectionAnalysis>,
    rejected_frames: u64,
}

impl MonitorRuntime {
    pub fn new(
        monitor: DrowsinessMonitor,
        alerts: AlertDispatcher,
        telemetry: Arc<TelemetryForwarder>,
    ) -> Self {
        Self {
            monitor,
            alerts,
            telemetry,
            last_analysis: None,
            rejected_frames: 0,
        }
    }

    pub fn start_session(&mut self) {
        self.last_analysis = None;
        self.rejected_frames = 0;
        self.monitor.start_session();
    }

    pub fn stop_session(&mut self) {
        self.monitor.stop_session();
        self.last_analysis = None;
    }

    pub fn gate(&self) -> TransmissionGate {
        self.monitor.gate()
    }

    /// Process one detector frame; malformed frames are counted and skipped
    pub fn handle_frame(&mut self, frame: &LandmarkFrame) -> Result<DetectionAnalysis, DmsError> {
        let analysis = match self.monitor.process_landmarks(frame) {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!("Rejected frame at {:.3}s: {}", frame.timestamp_secs, e);
                self.rejected_frames += 1;
                return Err(e);
            }
        };
        metrics::counter!("dms_frames_total").increment(1);

        if let Some(event) = &analysis.event {
            self.route_event(event);
        }
        self.last_analysis = Some(analysis.clone());
        Ok(analysis)
    }

    fn route_event(&self, event: &DetectionEvent) {
        match event {
            DetectionEvent::AlertRaised { .. } => {
                metrics::counter!("dms_alerts_total").increment(1);
            }
            DetectionEvent::Recovered { .. } => {
                metrics::counter!("dms_recoveries_total").increment(1);
            }
        }

        if let Some(request) = AlertRequest::from_event(event) {
            self.alerts.dispatch(&request);
        }
        self.telemetry.forward(event);
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let state = self.monitor.state();
        StatusSnapshot {
            state: state.kind(),
            status: self
                .last_analysis
                .as_ref()
                .map(|a| a.status.clone())
                .unwrap_or_else(|| "no face".to_string()),
            transmission_open: state.transmission_open(),
            session: self.monitor.stats().clone(),
            rejected_frames: self.rejected_frames,
            alerts_requested: self.alerts.fired_count(),
            alert_failures: self.alerts.failed_count(),
            telemetry_connected: self.telemetry.is_connected(),
            telemetry_sent: self.telemetry.sent_count(),
            telemetry_dropped: self.telemetry.dropped_count(),
        }
    }
}

/// Scheduler source yielding the most recent detector frame
pub struct LatestFrameSource {
    rx: watch::Receiver<Option<LandmarkFrame>>,
}

impl LatestFrameSource {
    pub fn new(rx: watch::Receiver<Option<LandmarkFrame>>) -> Self {
        Self { rx }
    }
}

impl SampleSource for LatestFrameSource {
    type Sample = LandmarkFrame;

    fn capture(&mut self) -> Option<LandmarkFrame> {
        self.rx.borrow().clone()
    }
}

/// Drain scheduled samples to telemetry until the scheduler goes away
///
/// The gate is checked again per sample: anything queued before the gate
/// closed is withheld. Returns the number of withheld samples.
pub async fn forward_samples(
    mut rx: mpsc::Receiver<LandmarkFrame>,
    gate: TransmissionGate,
    telemetry: Arc<TelemetryForwarder>,
) -> u64 {
    let mut withheld = 0;
    while let Some(frame) = rx.recv().await {
        if !gate.is_open() {
            debug!(
                "Gate closed, withholding queued sample from {:.3}s",
                frame.timestamp_secs
            );
            withheld += 1;
            continue;
        }
        telemetry.forward_sample(&frame);
    }
    withheld
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use alerting::{AlertError, AlertSink};
    use dms::{
        DetectionConfig, DetectionState, FaceLandmarks, Point2D, LEFT_EYE_IDX, RIGHT_EYE_IDX,
    };
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use telemetry::{TelemetryError, TelemetryEvent, TelemetryKind, TelemetryTransport};

    /// Face mesh whose eyes have width 1.0 and the given lid gap (= EAR)
    pub(crate) fn face(gap: f64) -> FaceLandmarks {
        let half = gap / 2.0;
        let eye = [
            (0.0, 0.0),
            (0.33, half),
            (0.66, half),
            (1.0, 0.0),
            (0.66, -half),
            (0.33, -half),
        ];
        let mut points = vec![Point2D::default(); 478];
        for (i, &(x, y)) in eye.iter().enumerate() {
            points[LEFT_EYE_IDX[i]] = Point2D::new(x, y);
            points[RIGHT_EYE_IDX[i]] = Point2D::new(x + 2.0, y);
        }
        FaceLandmarks::new(points)
    }

    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub(crate) played: Arc<Mutex<Vec<AlertRequest>>>,
        pub(crate) busy: bool,
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

    #[derive(Default)]
    pub(crate) struct FakeTransport {
        pub(crate) connected: AtomicBool,
        pub(crate) events: Mutex<Vec<TelemetryEvent>>,
    }

    impl TelemetryTransport for FakeTransport {
        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::Relaxed)
        }

        fn send_event(&self, event: &TelemetryEvent) -> Result<(), TelemetryError> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }

        fn send_sample(&self, _payload: Vec<u8>) -> Result<(), TelemetryError> {
            Ok(())
        }
    }

    pub(crate) fn runtime(
        sink: RecordingSink,
        transport: Arc<FakeTransport>,
    ) -> MonitorRuntime {
        let monitor = DrowsinessMonitor::new(DetectionConfig::default()).unwrap();
        let mut runtime = MonitorRuntime::new(
            monitor,
            AlertDispatcher::new(Box::new(sink)),
            Arc::new(TelemetryForwarder::new(transport)),
        );
        runtime.start_session();
        runtime
    }

    fn drive(runtime: &mut MonitorRuntime, frames: &[(f64, f64)]) {
        for &(t, gap) in frames {
            runtime
                .handle_frame(&LandmarkFrame::with_face(t, face(gap)))
                .unwrap();
        }
    }

    #[test]
    fn test_episode_reaches_both_sinks_once() {
        let played = Arc::new(Mutex::new(Vec::new()));
        let transport = Arc::new(FakeTransport::default());
        transport.connected.store(true, Ordering::Relaxed);
        let mut runtime = runtime(
            RecordingSink {
                played: played.clone(),
                busy: false,
            },
            transport.clone(),
        );

        drive(
            &mut runtime,
            &[(0.0, 0.30), (0.5, 0.15), (1.0, 0.10), (2.6, 0.12), (2.8, 0.1), (3.0, 0.30)],
        );

        let played = played.lock().unwrap();
        assert_eq!(played.len(), 1);
        assert!((played[0].closed_for_secs - 2.1).abs() < 1e-9);

        let events = transport.events.lock().unwrap();
        let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![TelemetryKind::EyesClosed, TelemetryKind::Recovered]);
        assert!((events[1].duration - 0.4).abs() < 1e-9);

        let snapshot = runtime.snapshot();
        assert_eq!(snapshot.state, StateKind::Open);
        assert_eq!(snapshot.status, "EAR: 0.300");
        assert_eq!(snapshot.alerts_requested, 1);
        assert_eq!(snapshot.telemetry_sent, 2);
    }

    #[test]
    fn test_sink_failures_do_not_affect_detection() {
        let transport = Arc::new(FakeTransport::default());
        let mut runtime = runtime(
            RecordingSink {
                busy: true,
                ..Default::default()
            },
            transport.clone(),
        );

        drive(&mut runtime, &[(0.0, 0.1), (2.5, 0.1)]);

        let snapshot = runtime.snapshot();
        assert_eq!(snapshot.state, StateKind::Distracted);
        assert!(!snapshot.transmission_open);
        assert_eq!(snapshot.alert_failures, 1);
        assert!(!snapshot.telemetry_connected);
        assert_eq!(snapshot.telemetry_dropped, 1);
        assert!(transport.events.lock().unwrap().is_empty());
        assert!(snapshot.status.starts_with("DISTRACTED (sleep)"));
    }

    #[test]
    fn test_malformed_frame_rejected() {
        let mut runtime = runtime(RecordingSink::default(), Arc::new(FakeTransport::default()));
        let frame = LandmarkFrame::with_face(0.0, FaceLandmarks::new(vec![Point2D::default(); 10]));

        assert!(runtime.handle_frame(&frame).is_err());
        let snapshot = runtime.snapshot();
        assert_eq!(snapshot.rejected_frames, 1);
        assert_eq!(snapshot.session.frames, 0);
        assert_eq!(snapshot.status, "no face");
    }

    #[test]
    fn test_stop_session_reopens_gate() {
        let mut runtime = runtime(RecordingSink::default(), Arc::new(FakeTransport::default()));
        let gate = runtime.gate();
        drive(&mut runtime, &[(0.0, 0.1), (2.5, 0.1)]);
        assert!(!gate.is_open());

        runtime.stop_session();
        assert!(gate.is_open());
        assert_eq!(runtime.snapshot().state, StateKind::NoFace);
    }

    #[test]
    fn test_latest_frame_source() {
        let (tx, rx) = watch::channel(None);
        let mut source = LatestFrameSource::new(rx);
        assert!(source.capture().is_none());

        tx.send_replace(Some(LandmarkFrame::without_face(4.0)));
        assert_eq!(source.capture(), Some(LandmarkFrame::without_face(4.0)));
    }

    async fn drain(gate: TransmissionGate, frames: usize) -> (u64, Arc<TelemetryForwarder>) {
        let transport = Arc::new(FakeTransport::default());
        transport.connected.store(true, Ordering::Relaxed);
        let telemetry = Arc::new(TelemetryForwarder::new(transport));

        let (tx, rx) = mpsc::channel(8);
        for i in 0..frames {
            tx.send(LandmarkFrame::without_face(i as f64)).await.unwrap();
        }
        drop(tx);

        let withheld = forward_samples(rx, gate, telemetry.clone()).await;
        (withheld, telemetry)
    }

    #[tokio::test]
    async fn test_queued_samples_forwarded_while_open() {
        let (withheld, telemetry) = drain(TransmissionGate::from(DetectionState::Open), 3).await;
        assert_eq!(withheld, 0);
        assert_eq!(telemetry.sent_count(), 3);
    }

    #[tokio::test]
    async fn test_queued_samples_withheld_after_gate_closes() {
        let gate = TransmissionGate::from(DetectionState::Distracted {
            closed_since: 0.0,
            distracted_since: 2.5,
        });
        let (withheld, telemetry) = drain(gate, 3).await;
        assert_eq!(withheld, 3);
        assert_eq!(telemetry.sent_count(), 0);
        assert_eq!(telemetry.dropped_count(), 0);
    }
}
