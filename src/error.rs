//! Error taxonomy for the detector API.
//!
//! Glue code (config, sources, engines, binaries) uses `anyhow::Result`. The
//! detector surface returns `DetectError` so callers can tell a configuration
//! mismatch (unknown class id) from an engine failure.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetectError {
    /// An inference engine was requested that this build does not include.
    #[error("missing dependency: {0}")]
    MissingDependency(String),

    /// The model or label map could not be loaded.
    #[error("failed to load {}: {source}", .path.display())]
    ModelLoad {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A label map line could not be parsed or failed validation.
    #[error("label map line {line}: {message}")]
    LabelMap { line: usize, message: String },

    /// The engine reported a class id absent from the category index.
    #[error("class id {0} is not in the category index (label map does not match model)")]
    UnknownClassId(i64),

    /// Engine outputs do not follow the detection output layout.
    #[error("malformed inference output: {0}")]
    MalformedOutput(String),

    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// Engine failure, propagated unchanged.
    #[error(transparent)]
    Inference(anyhow::Error),
}

pub type Result<T> = std::result::Result<T, DetectError>;

impl DetectError {
    pub(crate) fn model_load(path: impl Into<PathBuf>, source: anyhow::Error) -> Self {
        DetectError::ModelLoad {
            path: path.into(),
            source: source.into(),
        }
    }
}

/// Remediation text used when an engine feature was not compiled in.
pub(crate) fn missing_engine(engine: &str, feature: &str) -> DetectError {
    DetectError::MissingDependency(format!(
        "the '{}' inference engine requires the '{}' feature; rebuild with `cargo build --features {}`",
        engine, feature, feature
    ))
}
