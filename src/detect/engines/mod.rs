pub mod stub;

#[cfg(feature = "backend-tract")]
pub mod tract;

use std::path::Path;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

pub use stub::{RawDetection, StubEngine};

#[cfg(feature = "backend-tract")]
pub use tract::TractEngine;

use super::engine::InferenceEngine;
use crate::error::Result;
use crate::labels::CategoryIndex;

/// Engine selection for configuration and the CLI.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Stub,
    Tract,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Stub => "stub",
            EngineKind::Tract => "tract",
        }
    }
}

impl FromStr for EngineKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stub" => Ok(EngineKind::Stub),
            "tract" | "onnx" => Ok(EngineKind::Tract),
            other => Err(anyhow!(
                "unknown inference engine '{}'; expected 'stub' or 'tract'",
                other
            )),
        }
    }
}

/// Open an engine of the requested kind.
///
/// The stub engine ignores the model path and reports a single centred
/// detection on every frame, classed as the lowest id in `categories`.
/// With no categories it reports nothing.
pub fn open_engine(
    kind: EngineKind,
    model_path: &Path,
    input_size: (u32, u32),
    categories: &CategoryIndex,
) -> Result<Box<dyn InferenceEngine>> {
    match kind {
        EngineKind::Stub => {
            let detections = categories
                .iter()
                .next()
                .map(|c| RawDetection::new([0.25, 0.25, 0.75, 0.75], c.id, 0.5))
                .into_iter()
                .collect();
            Ok(Box::new(StubEngine::new(detections)))
        }
        EngineKind::Tract => open_tract(model_path, input_size),
    }
}

#[cfg(feature = "backend-tract")]
fn open_tract(model_path: &Path, (width, height): (u32, u32)) -> Result<Box<dyn InferenceEngine>> {
    let engine = TractEngine::new(model_path, width, height)
        .map_err(|e| crate::error::DetectError::model_load(model_path, e))?;
    Ok(Box::new(engine))
}

#[cfg(not(feature = "backend-tract"))]
fn open_tract(_model_path: &Path, _input_size: (u32, u32)) -> Result<Box<dyn InferenceEngine>> {
    Err(crate::error::missing_engine("tract", "backend-tract"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_engine_names() {
        assert_eq!("stub".parse::<EngineKind>().unwrap(), EngineKind::Stub);
        assert_eq!(" Tract ".parse::<EngineKind>().unwrap(), EngineKind::Tract);
        assert_eq!("onnx".parse::<EngineKind>().unwrap(), EngineKind::Tract);
        assert!("tensorflow".parse::<EngineKind>().is_err());
    }

    #[test]
    fn stub_engine_opens_without_model() {
        let index = CategoryIndex::default();
        let engine = open_engine(EngineKind::Stub, Path::new(""), (64, 64), &index).unwrap();
        assert_eq!(engine.name(), "stub");
    }

    #[test]
    fn stub_engine_reports_a_class_from_the_label_map() {
        use crate::detect::engine::{DETECTION_CLASSES, NUM_DETECTIONS};
        use crate::labels::Category;
        use ndarray::Array4;

        let index =
            CategoryIndex::from_categories([Category::new(7, "dog"), Category::new(3, "car")]);
        let engine = open_engine(EngineKind::Stub, Path::new(""), (8, 8), &index).unwrap();
        let batch = Array4::<u8>::zeros((1, 8, 8, 3));
        let outputs = engine.infer(batch.view()).unwrap();
        assert_eq!(outputs.get(NUM_DETECTIONS).unwrap().iter().next(), Some(&1.0));
        assert_eq!(outputs.get(DETECTION_CLASSES).unwrap().iter().next(), Some(&3.0));

        let empty = open_engine(EngineKind::Stub, Path::new(""), (8, 8), &CategoryIndex::default())
            .unwrap();
        let outputs = empty.infer(batch.view()).unwrap();
        assert_eq!(outputs.get(NUM_DETECTIONS).unwrap().iter().next(), Some(&0.0));
    }
}
