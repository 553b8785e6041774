use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::detect::EngineKind;

const DEFAULT_MODEL_PATH: &str = "model";
const DEFAULT_LABELS_PATH: &str = "labels.pbtxt";
const DEFAULT_ENGINE: EngineKind = EngineKind::Stub;
const DEFAULT_INPUT_WIDTH: u32 = 640;
const DEFAULT_INPUT_HEIGHT: u32 = 480;
const DEFAULT_SOURCE: &str = "stub://front_camera";

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    model: Option<ModelConfigFile>,
    labels: Option<LabelsConfigFile>,
    source: Option<SourceConfigFile>,
    output: Option<OutputConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    path: Option<PathBuf>,
    engine: Option<EngineKind>,
    input_width: Option<u32>,
    input_height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct LabelsConfigFile {
    path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    uri: Option<String>,
    run_async: Option<bool>,
    max_frames: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct OutputConfigFile {
    min_score: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub model: ModelSettings,
    pub labels_path: PathBuf,
    pub source: SourceSettings,
    /// Post-detection score threshold applied by the caller. The detector itself
    /// never filters.
    pub min_score: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub path: PathBuf,
    pub engine: EngineKind,
    pub input_width: u32,
    pub input_height: u32,
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub uri: String,
    pub run_async: bool,
    pub max_frames: Option<u64>,
}

impl DetectorConfig {
    /// Load from the file named by `BOX_DETECTOR_CONFIG` (if set), then apply
    /// environment overrides and validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("BOX_DETECTOR_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Load from an explicit file, then apply environment overrides and validate.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: DetectorConfigFile) -> Self {
        let model = file.model.unwrap_or_default();
        let source = file.source.unwrap_or_default();
        Self {
            model: ModelSettings {
                path: model
                    .path
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH)),
                engine: model.engine.unwrap_or(DEFAULT_ENGINE),
                input_width: model.input_width.unwrap_or(DEFAULT_INPUT_WIDTH),
                input_height: model.input_height.unwrap_or(DEFAULT_INPUT_HEIGHT),
            },
            labels_path: file
                .labels
                .and_then(|labels| labels.path)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LABELS_PATH)),
            source: SourceSettings {
                uri: source.uri.unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
                run_async: source.run_async.unwrap_or(false),
                max_frames: source.max_frames,
            },
            min_score: file.output.and_then(|output| output.min_score),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(path) = non_empty_env("BOX_DETECTOR_MODEL_PATH") {
            self.model.path = PathBuf::from(path);
        }
        if let Some(path) = non_empty_env("BOX_DETECTOR_LABELS_PATH") {
            self.labels_path = PathBuf::from(path);
        }
        if let Some(engine) = non_empty_env("BOX_DETECTOR_ENGINE") {
            self.model.engine = engine.parse()?;
        }
        if let Some(width) = non_empty_env("BOX_DETECTOR_INPUT_WIDTH") {
            self.model.input_width = width
                .parse()
                .map_err(|_| anyhow!("BOX_DETECTOR_INPUT_WIDTH must be a positive integer"))?;
        }
        if let Some(height) = non_empty_env("BOX_DETECTOR_INPUT_HEIGHT") {
            self.model.input_height = height
                .parse()
                .map_err(|_| anyhow!("BOX_DETECTOR_INPUT_HEIGHT must be a positive integer"))?;
        }
        if let Some(score) = non_empty_env("BOX_DETECTOR_MIN_SCORE") {
            let score: f32 = score
                .parse()
                .map_err(|_| anyhow!("BOX_DETECTOR_MIN_SCORE must be a number"))?;
            self.min_score = Some(score);
        }
        if let Some(uri) = non_empty_env("BOX_DETECTOR_SOURCE") {
            self.source.uri = uri;
        }
        Ok(())
    }

    /// Check invariants. Also called after CLI overrides.
    pub fn validate(&self) -> Result<()> {
        if self.model.input_width == 0 || self.model.input_height == 0 {
            return Err(anyhow!(
                "model input size must be non-zero, got {}x{}",
                self.model.input_width,
                self.model.input_height
            ));
        }
        if self.model.engine == EngineKind::Tract && self.model.path.as_os_str().is_empty() {
            return Err(anyhow!("model path must be set for the tract engine"));
        }
        if self.labels_path.as_os_str().is_empty() {
            return Err(anyhow!("labels path must be set"));
        }
        if let Some(score) = self.min_score {
            if !(0.0..=1.0).contains(&score) {
                return Err(anyhow!("min_score must be within [0, 1], got {}", score));
            }
        }
        if self.source.uri.trim().is_empty() {
            return Err(anyhow!("source uri must be set"));
        }
        if self.source.max_frames == Some(0) {
            return Err(anyhow!("max_frames must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<DetectorConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
