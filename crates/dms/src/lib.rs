//! Drowsiness Monitoring Core
//!
//! Real-time eye-closure analysis from facial landmarks:
//! - Eye aspect ratio (openness) per eye and per frame
//! - Debounced closed-eye detection with one alert per episode
//! - Transmission gate that mutes outbound samples while distracted

pub mod analysis;
pub mod config;
pub mod ear;
pub mod gate;
pub mod geometry;
pub mod landmarks;
pub mod state;

pub use analysis::{DetectionAnalysis, DetectionEvent, StatusLine};
pub use config::DetectionConfig;
pub use ear::{eye_aspect_ratio, frame_openness, EyeLandmarks, OpennessScore};
pub use gate::TransmissionGate;
pub use geometry::{distance, Point2D};
pub use landmarks::{FaceLandmarks, LandmarkFrame, LEFT_EYE_IDX, RIGHT_EYE_IDX};
pub use state::{transition, DetectionState, FrameSample, StateKind, Transition};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// DMS error types
#[derive(Error, Debug)]
pub enum DmsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Landmark {index} missing (frame has {available} points)")]
    KeypointsMissing { index: usize, available: usize },
}

/// Per-session counters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionStats {
    /// Frames processed
    pub frames: u64,
    /// Frames without a face
    pub no_face_frames: u64,
    /// Episodes started
    pub alerts: u64,
    /// Episodes ended by reopened eyes
    pub recoveries: u64,
    /// Longest closed run at the moment an alert fired (seconds)
    pub longest_closed_secs: f64,
    /// Total time spent distracted, summed over recovered episodes (seconds)
    pub distracted_secs: f64,
}

impl SessionStats {
    fn record(&mut self, sample: &FrameSample, event: Option<&DetectionEvent>) {
        self.frames += 1;
        if !sample.face_present() {
            self.no_face_frames += 1;
        }
        match event {
            Some(DetectionEvent::AlertRaised {
                closed_for_secs, ..
            }) => {
                self.alerts += 1;
                self.longest_closed_secs = self.longest_closed_secs.max(*closed_for_secs);
            }
            Some(DetectionEvent::Recovered {
                recovered_after_secs,
                ..
            }) => {
                self.recoveries += 1;
                self.distracted_secs += recovered_after_secs;
            }
            None => {}
        }
    }
}

/// Drowsiness monitor for one detection session
///
/// Single producer: feed samples in nondecreasing timestamp order from one
/// task. Other tasks observe the state only through [`TransmissionGate`].
pub struct DrowsinessMonitor {
    config: DetectionConfig,
    state: DetectionState,
    stats: SessionStats,
    last_timestamp: Option<f64>,
    state_tx: watch::Sender<DetectionState>,
}

impl DrowsinessMonitor {
    /// Create a monitor with validated configuration
    pub fn new(config: DetectionConfig) -> Result<Self, DmsError> {
        config.validate()?;
        info!(
            "Drowsiness monitor: EAR threshold {:.3}, closed duration {:.1}s",
            config.ear_threshold, config.closed_duration_secs
        );
        let (state_tx, _) = watch::channel(DetectionState::NoFace);
        Ok(Self {
            config,
            state: DetectionState::NoFace,
            stats: SessionStats::default(),
            last_timestamp: None,
            state_tx,
        })
    }

    /// Begin a new session with cleared timers and counters
    pub fn start_session(&mut self) {
        info!("Detection session started");
        self.reset();
    }

    /// End the session; the gate reopens
    pub fn stop_session(&mut self) {
        info!(
            "Detection session stopped after {} frames ({} alerts)",
            self.stats.frames, self.stats.alerts
        );
        self.reset();
    }

    fn reset(&mut self) {
        self.state = DetectionState::NoFace;
        self.stats = SessionStats::default();
        self.last_timestamp = None;
        self.state_tx.send_replace(self.state);
    }

    /// Process one sample
    pub fn process(&mut self, sample: &FrameSample) -> DetectionAnalysis {
        if let Some(last) = self.last_timestamp {
            if sample.timestamp_secs < last {
                warn!(
                    "Sample timestamp went backwards ({:.3}s after {:.3}s)",
                    sample.timestamp_secs, last
                );
            }
        }
        self.last_timestamp = Some(sample.timestamp_secs);

        let previous = self.state;
        let Transition { state, event } = transition(previous, sample, &self.config);
        self.state = state;
        self.stats.record(sample, event.as_ref());

        if previous.kind() != state.kind() {
            debug!(
                "State {} -> {} at {:.3}s",
                previous.kind().as_str(),
                state.kind().as_str(),
                sample.timestamp_secs
            );
            self.state_tx.send_replace(state);
        }

        match &event {
            Some(DetectionEvent::AlertRaised {
                closed_for_secs, ..
            }) => {
                warn!("Eyes closed for {:.1}s, raising drowsiness alert", closed_for_secs);
            }
            Some(DetectionEvent::Recovered {
                recovered_after_secs,
                ..
            }) => {
                info!("Recovered after {:.1}s", recovered_after_secs);
            }
            None => {}
        }

        DetectionAnalysis::new(&self.state, sample, event)
    }

    /// Convert a detector frame and process it
    pub fn process_landmarks(
        &mut self,
        frame: &LandmarkFrame,
    ) -> Result<DetectionAnalysis, DmsError> {
        let sample = frame.to_sample()?;
        Ok(self.process(&sample))
    }

    pub fn state(&self) -> DetectionState {
        self.state
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn transmission_open(&self) -> bool {
        self.state.transmission_open()
    }

    /// Gate handle for other tasks
    pub fn gate(&self) -> TransmissionGate {
        TransmissionGate::new(self.state_tx.subscribe())
    }
}
