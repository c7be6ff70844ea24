//! Detection events and per-frame analysis results

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ear::OpennessScore;
use crate::state::{DetectionState, FrameSample, StateKind};

/// One-shot episode events
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DetectionEvent {
    /// Eyes stayed closed past the duration threshold (episode start)
    #[serde(rename = "eyes_closed")]
    AlertRaised {
        closed_for_secs: f64,
        timestamp_secs: f64,
    },

    /// Eyes reopened after an alert (episode end)
    Recovered {
        recovered_after_secs: f64,
        timestamp_secs: f64,
    },
}

impl DetectionEvent {
    /// Wire name of the event
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AlertRaised { .. } => "eyes_closed",
            Self::Recovered { .. } => "recovered",
        }
    }

    /// Closed duration for alerts, episode length for recoveries
    pub fn duration_secs(&self) -> f64 {
        match *self {
            Self::AlertRaised {
                closed_for_secs, ..
            } => closed_for_secs,
            Self::Recovered {
                recovered_after_secs,
                ..
            } => recovered_after_secs,
        }
    }

    pub fn timestamp_secs(&self) -> f64 {
        match *self {
            Self::AlertRaised { timestamp_secs, .. } | Self::Recovered { timestamp_secs, .. } => {
                timestamp_secs
            }
        }
    }
}

/// Human-readable status line, derived from state and the latest sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatusLine {
    NoFace,
    Openness(OpennessScore),
    Distracted { closed_for_secs: f64 },
}

impl StatusLine {
    pub fn project(state: &DetectionState, sample: &FrameSample) -> Self {
        match (state, sample.openness) {
            (DetectionState::Distracted { closed_since, .. }, _) => Self::Distracted {
                closed_for_secs: sample.timestamp_secs - closed_since,
            },
            (_, Some(openness)) => Self::Openness(openness),
            (_, None) => Self::NoFace,
        }
    }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoFace => write!(f, "no face"),
            Self::Openness(ear) => write!(f, "EAR: {:.3}", ear),
            Self::Distracted { closed_for_secs } => {
                write!(f, "DISTRACTED (sleep) — {:.1}s", closed_for_secs)
            }
        }
    }
}

/// Complete result of processing one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionAnalysis {
    /// Sample timestamp (seconds)
    pub timestamp_secs: f64,

    /// State after the transition
    pub state: StateKind,

    /// Frame openness (absent without a face)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openness: Option<OpennessScore>,

    /// Status line for display
    pub status: String,

    /// Event emitted by this transition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<DetectionEvent>,

    /// Gate value after the transition
    pub transmission_open: bool,
}

impl DetectionAnalysis {
    pub fn new(
        state: &DetectionState,
        sample: &FrameSample,
        event: Option<DetectionEvent>,
    ) -> Self {
        Self {
            timestamp_secs: sample.timestamp_secs,
            state: state.kind(),
            openness: sample.openness,
            status: StatusLine::project(state, sample).to_string(),
            event,
            transmission_open: state.transmission_open(),
        }
    }

    pub fn has_event(&self) -> bool {
        self.event.is_some()
    }
}
