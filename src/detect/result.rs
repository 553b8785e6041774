use std::cmp::Ordering;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::labels::Category;

/// Per-detection metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionMetadata {
    /// Box exactly as the model produced it: `[y_min, x_min, y_max, x_max]`, relative.
    pub raw_box: [f32; 4],
    pub class: Category,
    /// Confidence in `(0, 1]`.
    pub score: f32,
}

/// A bounding-box detection in pixel coordinates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// `[x, y, w, h]`: top-left corner, width and height in pixels.
    pub state_vector: [f64; 4],
    pub timestamp: SystemTime,
    pub metadata: DetectionMetadata,
}

impl Detection {
    pub fn x(&self) -> f64 {
        self.state_vector[0]
    }

    pub fn y(&self) -> f64 {
        self.state_vector[1]
    }

    pub fn width(&self) -> f64 {
        self.state_vector[2]
    }

    pub fn height(&self) -> f64 {
        self.state_vector[3]
    }

    pub fn score(&self) -> f32 {
        self.metadata.score
    }

    pub fn class(&self) -> &Category {
        &self.metadata.class
    }
}

/// Convert a relative `[y_min, x_min, y_max, x_max]` box to pixel `[x, y, w, h]`.
pub fn box_to_state_vector(raw_box: [f32; 4], frame_width: usize, frame_height: usize) -> [f64; 4] {
    let [y_min, x_min, y_max, x_max] = raw_box.map(f64::from);
    let (w, h) = (frame_width as f64, frame_height as f64);
    [x_min * w, y_min * h, (x_max - x_min) * w, (y_max - y_min) * h]
}

/// Sort detections by descending score. Detection order out of the detector
/// is not meaningful; callers that need one should sort explicitly.
pub fn sort_by_score(detections: &mut [Detection]) {
    detections.sort_by(|a, b| {
        b.metadata
            .score
            .partial_cmp(&a.metadata.score)
            .unwrap_or(Ordering::Equal)
    });
}
