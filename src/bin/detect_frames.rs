//! detect_frames - run the box object detector over a frame source
//!
//! This binary:
//! 1. Loads configuration (file named by BOX_DETECTOR_CONFIG, env, then flags)
//! 2. Loads the model and label map once
//! 3. Runs detection on every frame (or the latest frame with --async)
//! 4. Prints one JSON line per processed frame to stdout
//!
//! Score thresholding (--min-score) is applied here, after detection.

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use box_detector::{
    open_source, sort_by_score, unix_millis, BoxObjectDetector, Detection, DetectorConfig,
    EngineKind, VideoDetector,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Detect objects in video frames and emit pixel bounding boxes as JSON lines"
)]
struct Args {
    /// Configuration file (JSON, or TOML with a .toml extension).
    #[arg(long, env = "BOX_DETECTOR_CONFIG")]
    config: Option<PathBuf>,

    /// ONNX model file, or a directory containing model.onnx.
    #[arg(long)]
    model: Option<PathBuf>,

    /// Label map (*.pbtxt) mapping class ids to names.
    #[arg(long)]
    labels: Option<PathBuf>,

    /// Frame source: stub://<name>, an image file, or a directory of images.
    #[arg(long)]
    source: Option<String>,

    /// Inference engine: stub or tract. The stub reports one box per frame
    /// classed as the lowest id in the label map.
    #[arg(long)]
    engine: Option<EngineKind>,

    /// Drop detections scoring below this value before printing.
    #[arg(long)]
    min_score: Option<f32>,

    /// Stop after this many processed frames.
    #[arg(long)]
    max_frames: Option<u64>,

    /// Capture frames on a background thread and detect on the latest only.
    #[arg(long = "async")]
    run_async: bool,
}

#[derive(Serialize)]
struct FrameRecord<'a> {
    timestamp_ms: u128,
    detections: &'a [Detection],
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = DetectorConfig::load_from(args.config.as_deref())?;
    if let Some(model) = args.model {
        cfg.model.path = model;
    }
    if let Some(labels) = args.labels {
        cfg.labels_path = labels;
    }
    if let Some(source) = args.source {
        cfg.source.uri = source;
    }
    if let Some(engine) = args.engine {
        cfg.model.engine = engine;
    }
    if args.min_score.is_some() {
        cfg.min_score = args.min_score;
    }
    if args.max_frames.is_some() {
        cfg.source.max_frames = args.max_frames;
    }
    cfg.source.run_async |= args.run_async;
    cfg.validate()?;

    log::info!("detect_frames starting");
    log::info!(
        "  Engine: {} ({})",
        cfg.model.engine.as_str(),
        cfg.model.path.display()
    );
    log::info!("  Labels: {}", cfg.labels_path.display());
    log::info!(
        "  Input: {}x{}",
        cfg.model.input_width,
        cfg.model.input_height
    );
    log::info!("  Source: {}", cfg.source.uri);
    log::info!(
        "  Min score: {}",
        cfg.min_score
            .map(|s| s.to_string())
            .unwrap_or_else(|| "none".to_string())
    );

    let detector = BoxObjectDetector::load(
        cfg.model.engine,
        &cfg.model.path,
        &cfg.labels_path,
        (cfg.model.input_width, cfg.model.input_height),
    )
    .context("failed to construct detector")?;
    log::info!(
        "detector ready with {} categories",
        detector.category_index().len()
    );

    let source = open_source(
        &cfg.source.uri,
        cfg.model.input_width,
        cfg.model.input_height,
        None,
    )?;

    let stop = Arc::new(AtomicBool::new(false));
    let stop_handler = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        log::info!("shutdown signal received, stopping...");
        stop_handler.store(true, Ordering::SeqCst);
    })
    .expect("error setting Ctrl-C handler");

    let min_score = cfg.min_score;
    let stdout = std::io::stdout();
    let stats = VideoDetector::new(source, detector)
        .with_async(cfg.source.run_async)
        .with_max_frames(cfg.source.max_frames)
        .run(|frame| {
            let mut detections = frame.detections;
            if let Some(min) = min_score {
                detections.retain(|d| d.score() >= min);
            }
            sort_by_score(&mut detections);
            let record = FrameRecord {
                timestamp_ms: unix_millis(frame.timestamp),
                detections: &detections,
            };
            let line = serde_json::to_string(&record)?;
            writeln!(stdout.lock(), "{}", line)?;
            Ok(!stop.load(Ordering::SeqCst))
        })?;

    log::info!(
        "done: {} frames, {} dropped, {} detections",
        stats.frames_processed,
        stats.frames_dropped,
        stats.detections
    );
    Ok(())
}
