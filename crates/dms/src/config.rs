//! Detection configuration

use serde::{Deserialize, Serialize};

use crate::DmsError;

/// Drowsiness detection thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Eye aspect ratio below which the eyes count as closed
    pub ear_threshold: f64,

    /// Continuous eye closure required before raising an alert (seconds)
    pub closed_duration_secs: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            ear_threshold: 0.21,
            closed_duration_secs: 2.0,
        }
    }
}

impl DetectionConfig {
    /// Create config with explicit thresholds
    pub fn new(ear_threshold: f64, closed_duration_secs: f64) -> Self {
        Self {
            ear_threshold,
            closed_duration_secs,
        }
    }

    /// Reject thresholds the state machine cannot reason about
    pub fn validate(&self) -> Result<(), DmsError> {
        if !self.ear_threshold.is_finite() || self.ear_threshold < 0.0 {
            return Err(DmsError::Config(format!(
                "ear_threshold must be a non-negative number, got {}",
                self.ear_threshold
            )));
        }
        if !self.closed_duration_secs.is_finite() || self.closed_duration_secs < 0.0 {
            return Err(DmsError::Config(format!(
                "closed_duration_secs must be a non-negative number, got {}",
                self.closed_duration_secs
            )));
        }
        Ok(())
    }
}
