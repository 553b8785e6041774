use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use tempfile::{Builder, NamedTempFile};

use box_detector::config::DetectorConfig;
use box_detector::EngineKind;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "BOX_DETECTOR_CONFIG",
        "BOX_DETECTOR_MODEL_PATH",
        "BOX_DETECTOR_LABELS_PATH",
        "BOX_DETECTOR_ENGINE",
        "BOX_DETECTOR_INPUT_WIDTH",
        "BOX_DETECTOR_INPUT_HEIGHT",
        "BOX_DETECTOR_MIN_SCORE",
        "BOX_DETECTOR_SOURCE",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn defaults_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = DetectorConfig::load().expect("load config");
    assert_eq!(cfg.model.engine, EngineKind::Stub);
    assert_eq!(cfg.model.path, PathBuf::from("model"));
    assert_eq!(cfg.labels_path, PathBuf::from("labels.pbtxt"));
    assert_eq!((cfg.model.input_width, cfg.model.input_height), (640, 480));
    assert_eq!(cfg.source.uri, "stub://front_camera");
    assert!(!cfg.source.run_async);
    assert_eq!(cfg.source.max_frames, None);
    assert_eq!(cfg.min_score, None);
}

#[test]
fn loads_json_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "model": {
            "path": "/models/ssd_mobilenet",
            "engine": "tract",
            "input_width": 320,
            "input_height": 320
        },
        "labels": { "path": "/models/mscoco_label_map.pbtxt" },
        "source": { "uri": "/frames", "run_async": true, "max_frames": 50 },
        "output": { "min_score": 0.4 }
    }"#;
    file.write_all(json.as_bytes()).expect("write config");

    std::env::set_var("BOX_DETECTOR_CONFIG", file.path());
    std::env::set_var("BOX_DETECTOR_INPUT_HEIGHT", "300");
    std::env::set_var("BOX_DETECTOR_MIN_SCORE", "0.6");

    let cfg = DetectorConfig::load().expect("load config");

    assert_eq!(cfg.model.path, PathBuf::from("/models/ssd_mobilenet"));
    assert_eq!(cfg.model.engine, EngineKind::Tract);
    assert_eq!(cfg.model.input_width, 320);
    assert_eq!(cfg.model.input_height, 300);
    assert_eq!(cfg.labels_path, PathBuf::from("/models/mscoco_label_map.pbtxt"));
    assert_eq!(cfg.source.uri, "/frames");
    assert!(cfg.source.run_async);
    assert_eq!(cfg.source.max_frames, Some(50));
    assert_eq!(cfg.min_score, Some(0.6));

    clear_env();
}

#[test]
fn loads_toml_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = Builder::new().suffix(".toml").tempfile().expect("temp config");
    let toml = r#"
[model]
engine = "stub"
input_width = 128
input_height = 96

[labels]
path = "labels/coco.pbtxt"

[source]
uri = "stub://bench"
"#;
    file.write_all(toml.as_bytes()).expect("write config");

    let cfg = DetectorConfig::load_from(Some(file.path())).expect("load config");
    assert_eq!(cfg.model.engine, EngineKind::Stub);
    assert_eq!((cfg.model.input_width, cfg.model.input_height), (128, 96));
    assert_eq!(cfg.labels_path, PathBuf::from("labels/coco.pbtxt"));
    assert_eq!(cfg.source.uri, "stub://bench");
}

#[test]
fn rejects_out_of_range_min_score() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("BOX_DETECTOR_MIN_SCORE", "1.5");
    assert!(DetectorConfig::load().is_err());

    clear_env();
}

#[test]
fn rejects_unknown_engine() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("BOX_DETECTOR_ENGINE", "tensorflow");
    let err = DetectorConfig::load().unwrap_err();
    assert!(err.to_string().contains("tensorflow"));

    clear_env();
}

#[test]
fn rejects_malformed_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    file.write_all(b"{ not json").expect("write config");
    assert!(DetectorConfig::load_from(Some(file.path())).is_err());
}
