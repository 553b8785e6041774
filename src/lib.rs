//! Box object detector
//!
//! Runs a pre-trained object-detection model on video frames and turns its
//! raw outputs into pixel-space bounding-box detections for a downstream
//! tracker.
//!
//! # Pipeline
//!
//! 1. A `FrameSource` yields `Frame`s (pixels + capture timestamp).
//! 2. `BoxObjectDetector::detect` batches the frame, runs the `InferenceEngine`,
//!    trims the outputs to `num_detections` and converts every relative
//!    `[y_min, x_min, y_max, x_max]` box to pixel `[x, y, w, h]`.
//! 3. Each `Detection` carries the raw box, the class record from the label
//!    map and the score.
//!
//! # Module Structure
//!
//! - `frame`: Frame type
//! - `labels`: Label map parsing and the category index
//! - `detect`: Engines, output normalization and the detector
//! - `ingest`: Frame sources (synthetic, image files)
//! - `video`: Drives a detector from a source (sync or latest-frame async)
//! - `config`: File and environment configuration
//! - `error`: Error taxonomy

pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod labels;
pub mod video;

pub use config::DetectorConfig;
pub use detect::{
    open_engine, sort_by_score, BoxObjectDetector, Detection, DetectionMetadata, EngineKind,
    InferenceEngine, InferenceOutputs, RawDetection, RawDetectionBatch, StubEngine,
};
#[cfg(feature = "backend-tract")]
pub use detect::TractEngine;
pub use error::DetectError;
pub use frame::{unix_millis, Frame};
#[cfg(feature = "ingest-image")]
pub use ingest::ImageFileSource;
pub use ingest::{open_source, FrameSource, SyntheticConfig, SyntheticSource};
pub use labels::{Category, CategoryIndex};
pub use video::{FrameDetections, VideoDetector, VideoStats};
