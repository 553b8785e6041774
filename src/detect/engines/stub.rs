use anyhow::{anyhow, Result};
use ndarray::{arr1, Array2, Array3, ArrayView4};

use crate::detect::engine::{
    InferenceEngine, InferenceOutputs, DETECTION_BOXES, DETECTION_CLASSES, DETECTION_SCORES,
    NUM_DETECTIONS,
};

/// Exported detection models pad their outputs to a fixed row count.
const DEFAULT_PADDED_ROWS: usize = 100;

/// One scripted detection in model output terms.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawDetection {
    /// `[y_min, x_min, y_max, x_max]`, relative.
    pub bbox: [f32; 4],
    pub class_id: i64,
    pub score: f32,
}

impl RawDetection {
    pub fn new(bbox: [f32; 4], class_id: i64, score: f32) -> Self {
        Self {
            bbox,
            class_id,
            score,
        }
    }
}

/// Stub engine for testing. Reports the same scripted detections for every
/// frame, laid out the way exported detection models do (padded rows plus
/// `num_detections`).
#[derive(Clone, Debug)]
pub struct StubEngine {
    detections: Vec<RawDetection>,
    padded_rows: usize,
}

impl StubEngine {
    pub fn new(detections: Vec<RawDetection>) -> Self {
        Self {
            detections,
            padded_rows: DEFAULT_PADDED_ROWS,
        }
    }

    /// Override the padded output row count.
    pub fn with_padded_rows(mut self, rows: usize) -> Self {
        self.padded_rows = rows;
        self
    }

    pub fn detections(&self) -> &[RawDetection] {
        &self.detections
    }
}

impl Default for StubEngine {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl InferenceEngine for StubEngine {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn infer(&self, batch: ArrayView4<'_, u8>) -> Result<InferenceOutputs> {
        if batch.shape()[0] != 1 {
            return Err(anyhow!(
                "stub engine expects a batch of one image, got {}",
                batch.shape()[0]
            ));
        }

        let rows = self.padded_rows.max(self.detections.len());
        let mut boxes = Array3::<f32>::zeros((1, rows, 4));
        let mut classes = Array2::<f32>::zeros((1, rows));
        let mut scores = Array2::<f32>::zeros((1, rows));
        for (i, det) in self.detections.iter().enumerate() {
            for (j, v) in det.bbox.iter().enumerate() {
                boxes[[0, i, j]] = *v;
            }
            classes[[0, i]] = det.class_id as f32;
            scores[[0, i]] = det.score;
        }

        Ok(InferenceOutputs::new()
            .with(
                NUM_DETECTIONS,
                arr1(&[self.detections.len() as f32]).into_dyn(),
            )
            .with(DETECTION_BOXES, boxes.into_dyn())
            .with(DETECTION_CLASSES, classes.into_dyn())
            .with(DETECTION_SCORES, scores.into_dyn()))
    }
}
