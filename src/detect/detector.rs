use std::path::Path;

use super::engine::InferenceEngine;
use super::engines::{open_engine, EngineKind};
use super::raw::RawDetectionBatch;
use super::result::{box_to_state_vector, Detection, DetectionMetadata};
use crate::error::{DetectError, Result};
use crate::frame::Frame;
use crate::labels::CategoryIndex;

/// Box object detector.
///
/// Runs an inference engine on one frame and turns the model's relative
/// `[y_min, x_min, y_max, x_max]` boxes into pixel `[x, y, w, h]` detections
/// carrying the raw box, class record and score as metadata.
///
/// The engine and category index are loaded once and only read afterwards,
/// so a detector can be shared across threads without locking.
pub struct BoxObjectDetector<E> {
    engine: E,
    category_index: CategoryIndex,
}

impl<E: InferenceEngine> BoxObjectDetector<E> {
    pub fn new(engine: E, category_index: CategoryIndex) -> Self {
        Self {
            engine,
            category_index,
        }
    }

    /// Build a detector around an engine, loading classes from a label map.
    pub fn with_labelmap<P: AsRef<Path>>(engine: E, labels_path: P) -> Result<Self> {
        let category_index = CategoryIndex::from_labelmap(labels_path)?;
        Ok(Self::new(engine, category_index))
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn category_index(&self) -> &CategoryIndex {
        &self.category_index
    }

    /// Detect objects in a frame.
    ///
    /// No score or box filtering happens here. An unknown class id fails the
    /// whole call; engine errors are returned unchanged as `Inference`.
    pub fn detect(&self, frame: &Frame) -> Result<Vec<Detection>> {
        let batch = frame.as_batch()?;
        let outputs = self
            .engine
            .infer(batch)
            .map_err(DetectError::Inference)?;
        let raw = RawDetectionBatch::from_outputs(outputs)?;

        let (frame_width, frame_height) = (frame.width(), frame.height());
        let mut detections = Vec::with_capacity(raw.len());
        for (raw_box, class_id, score) in raw.iter() {
            let class = self.category_index.lookup(class_id)?.clone();
            detections.push(Detection {
                state_vector: box_to_state_vector(raw_box, frame_width, frame_height),
                timestamp: frame.timestamp,
                metadata: DetectionMetadata {
                    raw_box,
                    class,
                    score,
                },
            });
        }

        log::debug!(
            "{}: {} detections in {}x{} frame",
            self.engine.name(),
            detections.len(),
            frame_width,
            frame_height
        );
        Ok(detections)
    }
}

impl BoxObjectDetector<Box<dyn InferenceEngine>> {
    /// Load a model and label map from disk.
    ///
    /// `input_size` is the `(width, height)` the model is compiled for. Fails
    /// with `MissingDependency` when the engine was not compiled in. The label
    /// map is read first so the stub engine only reports known classes.
    pub fn load<M: AsRef<Path>, L: AsRef<Path>>(
        kind: EngineKind,
        model_path: M,
        labels_path: L,
        input_size: (u32, u32),
    ) -> Result<Self> {
        let category_index = CategoryIndex::from_labelmap(labels_path)?;
        let engine = open_engine(kind, model_path.as_ref(), input_size, &category_index)?;
        engine
            .warm_up()
            .map_err(|e| DetectError::model_load(model_path.as_ref(), e))?;
        Ok(Self::new(engine, category_index))
    }
}
