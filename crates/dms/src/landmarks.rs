//! Face mesh landmark frames from the external detector
//!
//! The detector reports one face as a fixed-size ordered point list
//! (468 points, 478 with iris refinement). Each eye's six geometry points sit
//! at fixed indices in that list.

use serde::{Deserialize, Serialize};

use crate::ear::{frame_openness, EyeLandmarks};
use crate::geometry::Point2D;
use crate::state::FrameSample;
use crate::DmsError;

/// Left eye: outer corner, upper-outer, upper-inner, inner corner, lower-inner, lower-outer
pub const LEFT_EYE_IDX: [usize; 6] = [33, 160, 158, 133, 153, 144];

/// Right eye, same role order as [`LEFT_EYE_IDX`]
pub const RIGHT_EYE_IDX: [usize; 6] = [263, 387, 385, 362, 380, 373];

/// One face's worth of landmark points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaceLandmarks {
    pub points: Vec<Point2D>,
}

impl FaceLandmarks {
    pub fn new(points: Vec<Point2D>) -> Self {
        Self { points }
    }

    /// Pick six eye points by index
    pub fn eye(&self, indices: &[usize; 6]) -> Result<EyeLandmarks, DmsError> {
        let mut eye = [Point2D::default(); 6];
        for (slot, &idx) in eye.iter_mut().zip(indices) {
            *slot = *self.points.get(idx).ok_or(DmsError::KeypointsMissing {
                index: idx,
                available: self.points.len(),
            })?;
        }
        Ok(EyeLandmarks::new(eye))
    }

    pub fn left_eye(&self) -> Result<EyeLandmarks, DmsError> {
        self.eye(&LEFT_EYE_IDX)
    }

    pub fn right_eye(&self) -> Result<EyeLandmarks, DmsError> {
        self.eye(&RIGHT_EYE_IDX)
    }
}

/// Detector output for one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkFrame {
    /// Capture time in seconds (monotonic clock)
    pub timestamp_secs: f64,

    /// Landmarks of the first detected face, `None` when no face was found
    #[serde(default)]
    pub landmarks: Option<FaceLandmarks>,
}

impl LandmarkFrame {
    pub fn with_face(timestamp_secs: f64, landmarks: FaceLandmarks) -> Self {
        Self {
            timestamp_secs,
            landmarks: Some(landmarks),
        }
    }

    pub fn without_face(timestamp_secs: f64) -> Self {
        Self {
            timestamp_secs,
            landmarks: None,
        }
    }

    /// Reduce the frame to the sample the state machine consumes
    pub fn to_sample(&self) -> Result<FrameSample, DmsError> {
        match &self.landmarks {
            Some(face) => {
                let left = face.left_eye()?;
                let right = face.right_eye()?;
                Ok(FrameSample::face(
                    self.timestamp_secs,
                    frame_openness(&left, &right),
                ))
            }
            None => Ok(FrameSample::no_face(self.timestamp_secs)),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ear::tests::eye_with_gap;

    pub(crate) const MESH_POINTS: usize = 478;

    /// Synthetic face mesh with both eyes at the given lid gap
    pub(crate) fn mesh_with_gap(gap: f64) -> FaceLandmarks {
        let mut points = vec![Point2D::default(); MESH_POINTS];
        let eye = eye_with_gap(gap);
        for (i, &idx) in LEFT_EYE_IDX.iter().enumerate() {
            points[idx] = eye.0[i];
        }
        for (i, &idx) in RIGHT_EYE_IDX.iter().enumerate() {
            let p = eye.0[i];
            points[idx] = Point2D::new(p.x + 2.0, p.y);
        }
        FaceLandmarks::new(points)
    }

    #[test]
    fn test_face_frame_becomes_openness_sample() {
        let frame = LandmarkFrame::with_face(1.5, mesh_with_gap(0.3));
        let sample = frame.to_sample().unwrap();
        assert!(sample.face_present());
        assert_eq!(sample.timestamp_secs, 1.5);
        assert!((sample.openness.unwrap() - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_no_face_frame_has_no_openness() {
        let sample = LandmarkFrame::without_face(2.0).to_sample().unwrap();
        assert!(!sample.face_present());
        assert_eq!(sample.openness, None);
    }

    #[test]
    fn test_short_point_list_is_rejected() {
        let frame = LandmarkFrame::with_face(0.0, FaceLandmarks::new(vec![Point2D::default(); 100]));
        match frame.to_sample() {
            Err(DmsError::KeypointsMissing { index, available }) => {
                assert_eq!(index, 160);
                assert_eq!(available, 100);
            }
            other => panic!("expected KeypointsMissing, got {:?}", other),
        }
    }
}
