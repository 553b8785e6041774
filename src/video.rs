//! Video detector driver.
//!
//! Pulls frames from a `FrameSource` and runs a `BoxObjectDetector` on them.
//!
//! - Sync mode processes every frame in capture order.
//! - Async mode captures on a background thread and keeps only the latest
//!   frame; the detection loop always works on the newest frame and frames it
//!   could not keep up with are dropped. The last captured frame is always
//!   processed.

use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::SystemTime;

use anyhow::{anyhow, Result};

use crate::detect::{BoxObjectDetector, Detection, InferenceEngine};
use crate::frame::Frame;
use crate::ingest::FrameSource;

/// Detections for one processed frame.
#[derive(Clone, Debug)]
pub struct FrameDetections {
    pub timestamp: SystemTime,
    pub detections: Vec<Detection>,
}

/// Counters for a finished run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VideoStats {
    pub frames_processed: u64,
    /// Frames overwritten before the detector reached them (async mode only).
    pub frames_dropped: u64,
    pub detections: u64,
}

pub struct VideoDetector<S, E> {
    source: S,
    detector: BoxObjectDetector<E>,
    run_async: bool,
    max_frames: Option<u64>,
}

impl<S, E> VideoDetector<S, E>
where
    S: FrameSource + 'static,
    E: InferenceEngine,
{
    pub fn new(source: S, detector: BoxObjectDetector<E>) -> Self {
        Self {
            source,
            detector,
            run_async: false,
            max_frames: None,
        }
    }

    /// Detect on the latest frame only, capturing on a background thread.
    pub fn with_async(mut self, run_async: bool) -> Self {
        self.run_async = run_async;
        self
    }

    /// Stop after processing this many frames.
    pub fn with_max_frames(mut self, max_frames: Option<u64>) -> Self {
        self.max_frames = max_frames;
        self
    }

    pub fn detector(&self) -> &BoxObjectDetector<E> {
        &self.detector
    }

    /// Run until the source is exhausted, `max_frames` is reached, or `sink`
    /// returns `false`.
    pub fn run<F>(self, sink: F) -> Result<VideoStats>
    where
        F: FnMut(FrameDetections) -> Result<bool>,
    {
        log::info!(
            "video detector starting on {} ({} mode)",
            self.source.describe(),
            if self.run_async { "async" } else { "sync" }
        );
        let stats = if self.run_async {
            self.run_latest(sink)?
        } else {
            self.run_sequential(sink)?
        };
        log::info!(
            "video detector finished: {} frames processed, {} dropped, {} detections",
            stats.frames_processed,
            stats.frames_dropped,
            stats.detections
        );
        Ok(stats)
    }

    fn run_sequential<F>(mut self, mut sink: F) -> Result<VideoStats>
    where
        F: FnMut(FrameDetections) -> Result<bool>,
    {
        let mut stats = VideoStats::default();
        while !self.reached_limit(&stats) {
            let Some(frame) = self.source.next_frame()? else {
                break;
            };
            if !process(&self.detector, &frame, &mut stats, &mut sink)? {
                break;
            }
        }
        Ok(stats)
    }

    fn run_latest<F>(self, mut sink: F) -> Result<VideoStats>
    where
        F: FnMut(FrameDetections) -> Result<bool>,
    {
        let Self {
            mut source,
            detector,
            max_frames,
            ..
        } = self;
        let shared = Arc::new((Mutex::new(LatestFrame::default()), Condvar::new()));

        let capture_shared = Arc::clone(&shared);
        let capture = thread::Builder::new()
            .name("frame-capture".to_string())
            .spawn(move || capture_loop(&mut source, &capture_shared))?;

        let mut stats = VideoStats::default();
        let outcome = (|| -> Result<()> {
            loop {
                if max_frames.is_some_and(|max| stats.frames_processed >= max) {
                    return Ok(());
                }
                let frame = {
                    let (lock, cvar) = &*shared;
                    let mut slot = lock.lock().map_err(|_| anyhow!("frame slot lock poisoned"))?;
                    while slot.frame.is_none() && !slot.finished {
                        slot = cvar
                            .wait(slot)
                            .map_err(|_| anyhow!("frame slot lock poisoned"))?;
                    }
                    match slot.frame.take() {
                        Some(frame) => frame,
                        None => {
                            return match slot.error.take() {
                                Some(err) => Err(err),
                                None => Ok(()),
                            }
                        }
                    }
                };
                if !process(&detector, &frame, &mut stats, &mut sink)? {
                    return Ok(());
                }
            }
        })();

        {
            let (lock, _) = &*shared;
            if let Ok(mut slot) = lock.lock() {
                slot.stop = true;
                stats.frames_dropped = slot.dropped;
            }
        }
        if capture.join().is_err() {
            log::warn!("frame capture thread panicked");
        }
        outcome.map(|_| stats)
    }

    fn reached_limit(&self, stats: &VideoStats) -> bool {
        self.max_frames
            .is_some_and(|max| stats.frames_processed >= max)
    }
}

#[derive(Default)]
struct LatestFrame {
    frame: Option<Frame>,
    finished: bool,
    stop: bool,
    dropped: u64,
    error: Option<anyhow::Error>,
}

fn capture_loop<S: FrameSource>(source: &mut S, shared: &(Mutex<LatestFrame>, Condvar)) {
    let (lock, cvar) = shared;
    loop {
        let next = source.next_frame();
        let Ok(mut slot) = lock.lock() else {
            return;
        };
        if slot.stop {
            return;
        }
        match next {
            Ok(Some(frame)) => {
                if slot.frame.replace(frame).is_some() {
                    slot.dropped += 1;
                }
            }
            Ok(None) => {
                slot.finished = true;
            }
            Err(err) => {
                slot.error = Some(err);
                slot.finished = true;
            }
        }
        let finished = slot.finished;
        drop(slot);
        cvar.notify_one();
        if finished {
            return;
        }
    }
}

fn process<E, F>(
    detector: &BoxObjectDetector<E>,
    frame: &Frame,
    stats: &mut VideoStats,
    sink: &mut F,
) -> Result<bool>
where
    E: InferenceEngine,
    F: FnMut(FrameDetections) -> Result<bool>,
{
    let detections = detector.detect(frame)?;
    stats.frames_processed += 1;
    stats.detections += detections.len() as u64;
    sink(FrameDetections {
        timestamp: frame.timestamp,
        detections,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{RawDetection, StubEngine};
    use crate::ingest::{SyntheticConfig, SyntheticSource};
    use crate::labels::{Category, CategoryIndex};

    fn detector() -> BoxObjectDetector<StubEngine> {
        let engine = StubEngine::new(vec![RawDetection::new([0.0, 0.0, 0.5, 0.5], 1, 0.7)]);
        BoxObjectDetector::new(
            engine,
            CategoryIndex::from_categories([Category::new(1, "person")]),
        )
    }

    fn source(limit: u64) -> SyntheticSource {
        SyntheticSource::new(SyntheticConfig {
            width: 16,
            height: 8,
            frame_limit: Some(limit),
            ..SyntheticConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn sync_mode_processes_every_frame() -> Result<()> {
        let mut stamps = Vec::new();
        let stats = VideoDetector::new(source(4), detector()).run(|fd| {
            assert_eq!(fd.detections.len(), 1);
            assert_eq!(fd.detections[0].state_vector, [0.0, 0.0, 8.0, 4.0]);
            stamps.push(fd.timestamp);
            Ok(true)
        })?;
        assert_eq!(stats.frames_processed, 4);
        assert_eq!(stats.frames_dropped, 0);
        assert_eq!(stats.detections, 4);
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
        Ok(())
    }

    #[test]
    fn max_frames_caps_processing() -> Result<()> {
        let stats = VideoDetector::new(source(10), detector())
            .with_max_frames(Some(3))
            .run(|_| Ok(true))?;
        assert_eq!(stats.frames_processed, 3);
        Ok(())
    }

    #[test]
    fn sink_can_stop_the_run() -> Result<()> {
        let stats = VideoDetector::new(source(10), detector()).run(|_| Ok(false))?;
        assert_eq!(stats.frames_processed, 1);
        Ok(())
    }

    #[test]
    fn async_mode_accounts_for_every_frame() -> Result<()> {
        let mut seen = 0u64;
        let stats = VideoDetector::new(source(6), detector())
            .with_async(true)
            .run(|fd| {
                assert_eq!(fd.detections.len(), 1);
                seen += 1;
                Ok(true)
            })?;
        assert!(stats.frames_processed >= 1);
        assert_eq!(stats.frames_processed, seen);
        assert_eq!(stats.frames_processed + stats.frames_dropped, 6);
        Ok(())
    }

    #[test]
    fn async_mode_propagates_detection_errors() {
        let engine = StubEngine::new(vec![RawDetection::new([0.0, 0.0, 0.5, 0.5], 9, 0.7)]);
        let detector = BoxObjectDetector::new(
            engine,
            CategoryIndex::from_categories([Category::new(1, "person")]),
        );
        let result = VideoDetector::new(source(3), detector)
            .with_async(true)
            .run(|_| Ok(true));
        assert!(result.is_err());
    }
}
