mod detector;
mod engine;
pub mod engines;
mod raw;
mod result;

pub use detector::BoxObjectDetector;
pub use engine::{
    InferenceEngine, InferenceOutputs, DETECTION_BOXES, DETECTION_CLASSES, DETECTION_SCORES,
    NUM_DETECTIONS,
};
pub use engines::{open_engine, EngineKind, RawDetection, StubEngine};
#[cfg(feature = "backend-tract")]
pub use engines::TractEngine;
pub use raw::RawDetectionBatch;
pub use result::{box_to_state_vector, sort_by_score, Detection, DetectionMetadata};
