use std::collections::HashMap;

use ndarray::{ArrayD, Axis, Ix2, Slice};

use super::engine::{
    InferenceOutputs, DETECTION_BOXES, DETECTION_CLASSES, DETECTION_SCORES, NUM_DETECTIONS,
};
use crate::error::{DetectError, Result};

/// Engine outputs trimmed to the reported detection count, batch axis removed.
///
/// `boxes`, `classes` and `scores` always have the same length.
#[derive(Clone, Debug, Default)]
pub struct RawDetectionBatch {
    /// `[y_min, x_min, y_max, x_max]`, relative coordinates.
    pub boxes: Vec<[f32; 4]>,
    pub classes: Vec<i64>,
    pub scores: Vec<f32>,
    extra: HashMap<String, ArrayD<f32>>,
}

impl RawDetectionBatch {
    pub fn from_outputs(outputs: InferenceOutputs) -> Result<Self> {
        let mut tensors = outputs.into_inner();
        let count = tensors
            .remove(NUM_DETECTIONS)
            .ok_or_else(|| missing(NUM_DETECTIONS))
            .and_then(|t| detection_count(&t))?;

        let mut trimmed = HashMap::with_capacity(tensors.len());
        for (name, tensor) in tensors {
            let rows = first_rows(&name, &tensor, count)?;
            trimmed.insert(name, rows);
        }

        let boxes_t = trimmed
            .remove(DETECTION_BOXES)
            .ok_or_else(|| missing(DETECTION_BOXES))?;
        let classes_t = trimmed
            .remove(DETECTION_CLASSES)
            .ok_or_else(|| missing(DETECTION_CLASSES))?;
        let scores_t = trimmed
            .remove(DETECTION_SCORES)
            .ok_or_else(|| missing(DETECTION_SCORES))?;

        if boxes_t.shape() != [count, 4] {
            return Err(DetectError::MalformedOutput(format!(
                "{} has shape {:?} after trimming, expected [{}, 4]",
                DETECTION_BOXES,
                boxes_t.shape(),
                count
            )));
        }
        for (name, t) in [(DETECTION_CLASSES, &classes_t), (DETECTION_SCORES, &scores_t)] {
            if t.shape() != [count] {
                return Err(DetectError::MalformedOutput(format!(
                    "{} has shape {:?} after trimming, expected [{}]",
                    name,
                    t.shape(),
                    count
                )));
            }
        }

        let boxes = boxes_t
            .into_dimensionality::<Ix2>()
            .map_err(|e| DetectError::MalformedOutput(e.to_string()))?
            .outer_iter()
            .map(|row| [row[0], row[1], row[2], row[3]])
            .collect();
        // Class ids arrive as floats; truncate like an integer cast.
        let classes = classes_t.iter().map(|&c| c as i64).collect();
        let scores = scores_t.iter().copied().collect();

        Ok(Self {
            boxes,
            classes,
            scores,
            extra: trimmed,
        })
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Any additional model output, trimmed the same way as the boxes.
    pub fn extra(&self, name: &str) -> Option<&ArrayD<f32>> {
        self.extra.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = ([f32; 4], i64, f32)> + '_ {
        self.boxes
            .iter()
            .zip(&self.classes)
            .zip(&self.scores)
            .map(|((b, c), s)| (*b, *c, *s))
    }
}

fn missing(name: &str) -> DetectError {
    DetectError::MalformedOutput(format!("model did not produce '{}'", name))
}

fn detection_count(tensor: &ArrayD<f32>) -> Result<usize> {
    let value = tensor.iter().next().copied().ok_or_else(|| {
        DetectError::MalformedOutput(format!("{} is empty", NUM_DETECTIONS))
    })?;
    if !value.is_finite() || value < 0.0 {
        return Err(DetectError::MalformedOutput(format!(
            "{} is {}",
            NUM_DETECTIONS, value
        )));
    }
    Ok(value as usize)
}

/// `tensor[0, :count, ...]`
fn first_rows(name: &str, tensor: &ArrayD<f32>, count: usize) -> Result<ArrayD<f32>> {
    if tensor.ndim() < 2 || tensor.shape()[0] == 0 {
        return Err(DetectError::MalformedOutput(format!(
            "{} has shape {:?}, expected [1, detections, ...]",
            name,
            tensor.shape()
        )));
    }
    let batch = tensor.index_axis(Axis(0), 0);
    if batch.shape()[0] < count {
        return Err(DetectError::MalformedOutput(format!(
            "{} has {} rows but {} is {}",
            name,
            batch.shape()[0],
            NUM_DETECTIONS,
            count
        )));
    }
    Ok(batch.slice_axis(Axis(0), Slice::from(..count)).to_owned())
}
