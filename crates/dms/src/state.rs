//! Debounce state machine for sustained eye closure
//!
//! `transition` is a pure function: the caller owns the current
//! [`DetectionState`] and replaces it with the one returned. `Closing` and
//! `Distracted` are separate variants, so the alert fires only on the edge
//! between them and cannot be raised twice within one episode.

use serde::{Deserialize, Serialize};

use crate::analysis::DetectionEvent;
use crate::config::DetectionConfig;
use crate::ear::OpennessScore;

/// One time-stamped measurement fed into the state machine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameSample {
    /// Capture time in seconds
    pub timestamp_secs: f64,

    /// Frame openness, `None` when no face was detected
    pub openness: Option<OpennessScore>,
}

impl FrameSample {
    pub fn face(timestamp_secs: f64, openness: OpennessScore) -> Self {
        Self {
            timestamp_secs,
            openness: Some(openness),
        }
    }

    pub fn no_face(timestamp_secs: f64) -> Self {
        Self {
            timestamp_secs,
            openness: None,
        }
    }

    pub fn face_present(&self) -> bool {
        self.openness.is_some()
    }
}

/// Detection state (exactly one is current)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DetectionState {
    /// No face in view; nothing to evaluate
    #[default]
    NoFace,

    /// Face present, eyes at or above threshold
    Open,

    /// Eyes below threshold, not yet long enough to alert
    Closing { closed_since: f64 },

    /// Sustained closure confirmed; alert already raised for this episode
    Distracted {
        closed_since: f64,
        distracted_since: f64,
    },
}

/// Fieldless view of [`DetectionState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateKind {
    NoFace,
    Open,
    Closing,
    Distracted,
}

impl StateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoFace => "no_face",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Distracted => "distracted",
        }
    }
}

impl DetectionState {
    pub fn kind(&self) -> StateKind {
        match self {
            Self::NoFace => StateKind::NoFace,
            Self::Open => StateKind::Open,
            Self::Closing { .. } => StateKind::Closing,
            Self::Distracted { .. } => StateKind::Distracted,
        }
    }

    /// Start of the current below-threshold run
    pub fn closed_since(&self) -> Option<f64> {
        match *self {
            Self::Closing { closed_since } | Self::Distracted { closed_since, .. } => {
                Some(closed_since)
            }
            Self::NoFace | Self::Open => None,
        }
    }

    /// Start of the current episode
    pub fn distracted_since(&self) -> Option<f64> {
        match *self {
            Self::Distracted {
                distracted_since, ..
            } => Some(distracted_since),
            _ => None,
        }
    }

    pub fn is_distracted(&self) -> bool {
        matches!(self, Self::Distracted { .. })
    }

    /// Whether captured samples may be forwarded downstream
    pub fn transmission_open(&self) -> bool {
        !self.is_distracted()
    }
}

/// Result of feeding one sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub state: DetectionState,
    pub event: Option<DetectionEvent>,
}

impl Transition {
    fn quiet(state: DetectionState) -> Self {
        Self { state, event: None }
    }
}

/// Advance the state machine by one sample
pub fn transition(
    state: DetectionState,
    sample: &FrameSample,
    config: &DetectionConfig,
) -> Transition {
    let now = sample.timestamp_secs;

    let Some(openness) = sample.openness else {
        // Absence is never read as closed eyes; any running timer is dropped
        return Transition::quiet(DetectionState::NoFace);
    };

    if openness < config.ear_threshold {
        let closed_since = state.closed_since().unwrap_or(now);
        let closed_for = now - closed_since;

        return match state {
            DetectionState::Distracted { .. } => Transition::quiet(state),
            _ if closed_for > config.closed_duration_secs => Transition {
                state: DetectionState::Distracted {
                    closed_since,
                    distracted_since: now,
                },
                event: Some(DetectionEvent::AlertRaised {
                    closed_for_secs: closed_for,
                    timestamp_secs: now,
                }),
            },
            _ => Transition::quiet(DetectionState::Closing { closed_since }),
        };
    }

    let event = state
        .distracted_since()
        .map(|since| DetectionEvent::Recovered {
            recovered_after_secs: now - since,
            timestamp_secs: now,
        });

    Transition {
        state: DetectionState::Open,
        event,
    }
}
