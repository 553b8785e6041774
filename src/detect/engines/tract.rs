#![cfg(feature = "backend-tract")]

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use ndarray::{ArrayD, ArrayView4, IxDyn};
use tract_onnx::prelude::*;

use crate::detect::engine::{InferenceEngine, InferenceOutputs};

const MODEL_FILE_NAME: &str = "model.onnx";

/// Tract-based engine for ONNX detection models.
///
/// Expects a model exported from an object-detection pipeline: one `u8`
/// input shaped `[1, height, width, 3]` and named outputs `detection_boxes`,
/// `detection_classes`, `detection_scores` and `num_detections`. Output
/// tensors of any numeric type are cast to `f32`.
pub struct TractEngine {
    model: TypedRunnableModel<TypedModel>,
    output_names: Vec<String>,
    width: u32,
    height: u32,
}

impl TractEngine {
    /// Load an ONNX model from a file, or from `model.onnx` inside a directory.
    pub fn new<P: AsRef<Path>>(model_path: P, width: u32, height: u32) -> Result<Self> {
        let model_path = resolve_model_file(model_path.as_ref())?;
        let model = tract_onnx::onnx()
            .model_for_path(&model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    u8::datum_type(),
                    tvec!(1, height as usize, width as usize, 3),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        let graph = model.model();
        let output_names = graph
            .output_outlets()
            .context("model has no outputs")?
            .iter()
            .map(|outlet| {
                graph
                    .outlet_label(*outlet)
                    .map(str::to_string)
                    .unwrap_or_else(|| graph.node(outlet.node).name.clone())
            })
            .collect::<Vec<_>>();

        log::info!(
            "loaded ONNX model {} ({}x{} input, outputs: {})",
            model_path.display(),
            width,
            height,
            output_names.join(", ")
        );

        Ok(Self {
            model,
            output_names,
            width,
            height,
        })
    }

    pub fn input_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn build_input(&self, batch: ArrayView4<'_, u8>) -> Result<Tensor> {
        let shape = batch.shape();
        if shape[1] != self.height as usize || shape[2] != self.width as usize || shape[3] != 3 {
            return Err(anyhow!(
                "frame shape {:?} does not match model input [1, {}, {}, 3]",
                shape,
                self.height,
                self.width
            ));
        }
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, shape[1], shape[2], shape[3]),
            |(n, y, x, c)| batch[[n, y, x, c]],
        );
        Ok(input.into_tensor())
    }
}

impl InferenceEngine for TractEngine {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn infer(&self, batch: ArrayView4<'_, u8>) -> Result<InferenceOutputs> {
        let input = self.build_input(batch)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;

        let mut result = InferenceOutputs::new();
        for (name, value) in self.output_names.iter().zip(outputs.iter()) {
            let as_f32 = value
                .cast_to::<f32>()
                .with_context(|| format!("output '{}' cannot be cast to f32", name))?;
            let view = as_f32.to_array_view::<f32>()?;
            let array = ArrayD::from_shape_vec(IxDyn(view.shape()), view.iter().copied().collect())
                .with_context(|| format!("output '{}' has inconsistent shape", name))?;
            result.insert(name.clone(), array);
        }
        Ok(result)
    }

    fn warm_up(&self) -> Result<()> {
        let blank = ndarray::Array4::<u8>::zeros((1, self.height as usize, self.width as usize, 3));
        self.infer(blank.view()).map(|_| ())
    }
}

fn resolve_model_file(path: &Path) -> Result<PathBuf> {
    if path.is_dir() {
        let candidate = path.join(MODEL_FILE_NAME);
        if !candidate.is_file() {
            return Err(anyhow!(
                "model directory {} does not contain {}",
                path.display(),
                MODEL_FILE_NAME
            ));
        }
        return Ok(candidate);
    }
    if !path.is_file() {
        return Err(anyhow!("model file {} does not exist", path.display()));
    }
    Ok(path.to_path_buf())
}
