//! Video frames handed to the detector.
//!
//! A `Frame` is an `(height, width, channels)` pixel array plus the capture
//! timestamp. Detection reads it and never mutates it.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use ndarray::{Array3, ArrayView4, Axis};

use crate::error::{DetectError, Result};

pub const RGB_CHANNELS: usize = 3;

#[derive(Clone, Debug)]
pub struct Frame {
    /// Pixel data laid out as height x width x channels.
    pub pixels: Array3<u8>,
    pub timestamp: SystemTime,
}

/// Milliseconds since the Unix epoch, saturating at zero for pre-epoch times.
pub fn unix_millis(time: SystemTime) -> u128 {
    time.duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis()
}

impl Frame {
    pub fn new(pixels: Array3<u8>, timestamp: SystemTime) -> Self {
        Self { pixels, timestamp }
    }

    /// Build a frame from interleaved RGB bytes.
    pub fn from_rgb(data: Vec<u8>, width: u32, height: u32, timestamp: SystemTime) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(RGB_CHANNELS))
            .ok_or_else(|| DetectError::InvalidFrame("frame dimensions overflow".to_string()))?;
        if data.len() != expected {
            return Err(DetectError::InvalidFrame(format!(
                "expected {} RGB bytes for {}x{}, received {}",
                expected,
                width,
                height,
                data.len()
            )));
        }
        let pixels = Array3::from_shape_vec((height as usize, width as usize, RGB_CHANNELS), data)
            .map_err(|e| DetectError::InvalidFrame(e.to_string()))?;
        Ok(Self { pixels, timestamp })
    }

    pub fn height(&self) -> usize {
        self.pixels.shape()[0]
    }

    pub fn width(&self) -> usize {
        self.pixels.shape()[1]
    }

    pub fn channels(&self) -> usize {
        self.pixels.shape()[2]
    }

    /// Milliseconds since the Unix epoch, saturating at zero for pre-epoch stamps.
    pub fn timestamp_ms(&self) -> u128 {
        unix_millis(self.timestamp)
    }

    /// Single-image batch view with a leading axis of length 1.
    pub fn as_batch(&self) -> Result<ArrayView4<'_, u8>> {
        if self.pixels.is_empty() {
            return Err(DetectError::InvalidFrame(format!(
                "frame has zero-sized shape {:?}",
                self.pixels.shape()
            )));
        }
        Ok(self.pixels.view().insert_axis(Axis(0)))
    }
}
