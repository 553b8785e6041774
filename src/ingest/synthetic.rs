//! Synthetic frame source for tests and demos.
//!
//! Frames are deterministic gradients that shift every frame. Timestamps start
//! at the moment the source is created and advance by one frame period, so a
//! run is reproducible apart from its start time. A realtime source also waits
//! for each frame's due time before producing it, like a live camera.

use std::time::{Duration, Instant, SystemTime};

use anyhow::{anyhow, Result};
use ndarray::Array3;

use super::FrameSource;
use crate::frame::{Frame, RGB_CHANNELS};

#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Frames per second used to space timestamps.
    pub fps: u32,
    /// Stop after this many frames. `None` runs forever.
    pub frame_limit: Option<u64>,
    /// Pace frames to `fps` instead of producing them as fast as asked.
    pub realtime: bool,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            name: "camera".to_string(),
            width: 640,
            height: 480,
            fps: 10,
            frame_limit: None,
            realtime: false,
        }
    }
}

pub struct SyntheticSource {
    config: SyntheticConfig,
    start: SystemTime,
    started_at: Instant,
    frame_count: u64,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Result<Self> {
        if config.width == 0 || config.height == 0 {
            return Err(anyhow!(
                "synthetic source needs a non-empty frame size, got {}x{}",
                config.width,
                config.height
            ));
        }
        if config.fps == 0 {
            return Err(anyhow!("synthetic source fps must be > 0"));
        }
        log::info!(
            "SyntheticSource: stub://{} at {}x{} ({} fps{})",
            config.name,
            config.width,
            config.height,
            config.fps,
            if config.realtime { ", realtime" } else { "" }
        );
        Ok(Self {
            config,
            start: SystemTime::now(),
            started_at: Instant::now(),
            frame_count: 0,
        })
    }

    pub fn frames_captured(&self) -> u64 {
        self.frame_count
    }

    fn frame_period(&self) -> Duration {
        Duration::from_secs(1) / self.config.fps
    }
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self
            .config
            .frame_limit
            .is_some_and(|limit| self.frame_count >= limit)
        {
            return Ok(None);
        }
        let offset = self.frame_count;
        let due = self.frame_period() * offset as u32;
        if self.config.realtime {
            let elapsed = self.started_at.elapsed();
            if due > elapsed {
                std::thread::sleep(due - elapsed);
            }
        }
        let timestamp = self.start + due;
        self.frame_count += 1;

        let shape = (
            self.config.height as usize,
            self.config.width as usize,
            RGB_CHANNELS,
        );
        let pixels = Array3::from_shape_fn(shape, |(y, x, c)| {
            ((x + y + c * 85) as u64 + offset) as u8
        });
        Ok(Some(Frame::new(pixels, timestamp)))
    }

    fn describe(&self) -> String {
        format!("stub://{}", self.config.name)
    }
}
