//! Frame sources.
//!
//! This module provides sources that feed frames to a detector:
//! - Synthetic `stub://` source (testing, demos)
//! - Still image files (feature: ingest-image)
//!
//! Every source produces owned `Frame` values stamped at capture time and
//! returns `Ok(None)` once exhausted.

#[cfg(feature = "ingest-image")]
pub mod image_file;
pub mod synthetic;

use anyhow::Result;

#[cfg(feature = "ingest-image")]
pub use image_file::ImageFileSource;
pub use synthetic::{SyntheticConfig, SyntheticSource};

use crate::frame::Frame;

const STUB_SCHEME: &str = "stub://";

/// A producer of video frames.
pub trait FrameSource: Send {
    /// Capture the next frame, or `None` when the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Human-readable description for logs.
    fn describe(&self) -> String;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        (**self).next_frame()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Open a source from a URI.
///
/// `stub://<name>` opens a synthetic source of `width` x `height` frames paced
/// like a live camera; anything else is treated as a local image file or a
/// directory of images.
pub fn open_source(
    uri: &str,
    width: u32,
    height: u32,
    frame_limit: Option<u64>,
) -> Result<Box<dyn FrameSource>> {
    if let Some(name) = uri.strip_prefix(STUB_SCHEME) {
        let config = SyntheticConfig {
            name: name.to_string(),
            width,
            height,
            frame_limit,
            realtime: true,
            ..SyntheticConfig::default()
        };
        return Ok(Box::new(SyntheticSource::new(config)?));
    }
    open_image_source(uri)
}

#[cfg(feature = "ingest-image")]
fn open_image_source(uri: &str) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(ImageFileSource::open(uri)?))
}

#[cfg(not(feature = "ingest-image"))]
fn open_image_source(uri: &str) -> Result<Box<dyn FrameSource>> {
    Err(anyhow::anyhow!(
        "source '{}' requires the ingest-image feature (only stub:// sources are built in)",
        uri
    ))
}
