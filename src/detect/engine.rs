use std::collections::HashMap;

use anyhow::Result;
use ndarray::{ArrayD, ArrayView4};

/// Output name carrying the number of valid detection rows.
pub const NUM_DETECTIONS: &str = "num_detections";
/// `[1, M, 4]` boxes as `[y_min, x_min, y_max, x_max]` in relative coordinates.
pub const DETECTION_BOXES: &str = "detection_boxes";
/// `[1, M]` class ids, reported as floats by most exported models.
pub const DETECTION_CLASSES: &str = "detection_classes";
/// `[1, M]` confidence scores in `(0, 1]`.
pub const DETECTION_SCORES: &str = "detection_scores";

/// Named output tensors from one inference call. Every tensor has a leading
/// batch axis of length 1.
#[derive(Clone, Debug, Default)]
pub struct InferenceOutputs {
    tensors: HashMap<String, ArrayD<f32>>,
}

impl InferenceOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, tensor: ArrayD<f32>) -> Self {
        self.insert(name, tensor);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, tensor: ArrayD<f32>) {
        self.tensors.insert(name.into(), tensor);
    }

    pub fn get(&self, name: &str) -> Option<&ArrayD<f32>> {
        self.tensors.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<ArrayD<f32>> {
        self.tensors.remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    pub(crate) fn into_inner(self) -> HashMap<String, ArrayD<f32>> {
        self.tensors
    }
}

/// Inference engine trait.
///
/// An engine wraps a loaded model. It receives a single-image batch shaped
/// `[1, height, width, channels]` and returns the named detection outputs.
/// Engines are loaded once and shared read-only across calls, so `infer`
/// takes `&self` and implementations must be `Send + Sync`.
pub trait InferenceEngine: Send + Sync {
    /// Engine identifier.
    fn name(&self) -> &'static str;

    /// Run the model on a batch of one image.
    fn infer(&self, batch: ArrayView4<'_, u8>) -> Result<InferenceOutputs>;

    /// Optional warm-up hook.
    fn warm_up(&self) -> Result<()> {
        Ok(())
    }
}

impl<E: InferenceEngine + ?Sized> InferenceEngine for Box<E> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn infer(&self, batch: ArrayView4<'_, u8>) -> Result<InferenceOutputs> {
        (**self).infer(batch)
    }

    fn warm_up(&self) -> Result<()> {
        (**self).warm_up()
    }
}
