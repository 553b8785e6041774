//! Still-image frame source.
//!
//! Decodes a single image or every `jpg`/`jpeg`/`png` file in a directory (in
//! file name order) into RGB frames. Each frame is stamped when it is decoded.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{anyhow, Context, Result};

use super::FrameSource;
use crate::frame::Frame;

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

pub struct ImageFileSource {
    root: PathBuf,
    pending: VecDeque<PathBuf>,
    frames_decoded: u64,
}

impl ImageFileSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        let pending: VecDeque<PathBuf> = if root.is_dir() {
            let mut files = std::fs::read_dir(&root)
                .with_context(|| format!("failed to list {}", root.display()))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && has_image_extension(p))
                .collect::<Vec<_>>();
            files.sort();
            files.into()
        } else if root.is_file() {
            VecDeque::from([root.clone()])
        } else {
            return Err(anyhow!("image source {} does not exist", root.display()));
        };
        if pending.is_empty() {
            return Err(anyhow!("no images found in {}", root.display()));
        }
        log::info!(
            "ImageFileSource: {} image(s) from {}",
            pending.len(),
            root.display()
        );
        Ok(Self {
            root,
            pending,
            frames_decoded: 0,
        })
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }
}

impl FrameSource for ImageFileSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(path) = self.pending.pop_front() else {
            return Ok(None);
        };
        let image = image::open(&path)
            .with_context(|| format!("failed to decode {}", path.display()))?
            .to_rgb8();
        let (width, height) = image.dimensions();
        let frame = Frame::from_rgb(image.into_raw(), width, height, SystemTime::now())?;
        self.frames_decoded += 1;
        log::debug!("decoded {} ({}x{})", path.display(), width, height);
        Ok(Some(frame))
    }

    fn describe(&self) -> String {
        format!("images:{}", self.root.display())
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}
