//! Eye openness estimation (eye aspect ratio)
//!
//! EAR = (|p2-p6| + |p3-p5|) / (2 * |p1-p4|), computed per eye and averaged
//! over both eyes for a frame. Open eyes typically land around 0.25-0.35,
//! closed eyes near zero.

use serde::{Deserialize, Serialize};

use crate::geometry::{distance, Point2D};

/// Per-eye or per-frame openness. `0.0` marks a degenerate (zero-width) eye.
pub type OpennessScore = f64;

/// Six ordered eye landmarks
///
/// Index roles: 0 outer corner, 1 upper-outer, 2 upper-inner, 3 inner corner,
/// 4 lower-inner, 5 lower-outer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EyeLandmarks(pub [Point2D; 6]);

impl EyeLandmarks {
    pub fn new(points: [Point2D; 6]) -> Self {
        Self(points)
    }

    pub fn outer_corner(&self) -> Point2D {
        self.0[0]
    }

    pub fn inner_corner(&self) -> Point2D {
        self.0[3]
    }

    /// Eye width (outer to inner corner)
    pub fn width(&self) -> f64 {
        distance(self.outer_corner(), self.inner_corner())
    }
}

impl From<[Point2D; 6]> for EyeLandmarks {
    fn from(points: [Point2D; 6]) -> Self {
        Self(points)
    }
}

/// Eye aspect ratio for one eye
pub fn eye_aspect_ratio(eye: &EyeLandmarks) -> OpennessScore {
    let p = &eye.0;
    let a = distance(p[1], p[5]);
    let b = distance(p[2], p[4]);
    let c = distance(p[0], p[3]);

    // Also catches NaN widths
    if c > 0.0 {
        (a + b) / (2.0 * c)
    } else {
        0.0
    }
}

/// Frame openness: mean EAR of both eyes
pub fn frame_openness(left: &EyeLandmarks, right: &EyeLandmarks) -> OpennessScore {
    (eye_aspect_ratio(left) + eye_aspect_ratio(right)) / 2.0
}
