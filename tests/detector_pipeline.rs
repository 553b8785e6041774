use std::io::Write;
use std::time::{Duration, UNIX_EPOCH};

use anyhow::anyhow;
use ndarray::ArrayView4;
use tempfile::NamedTempFile;

use box_detector::{
    BoxObjectDetector, Category, CategoryIndex, DetectError, EngineKind, Frame, InferenceEngine,
    InferenceOutputs, RawDetection, StubEngine,
};

const LABEL_MAP: &str = r#"
item {
  id: 1
  name: 'person'
}
item {
  id: 3
  name: '/m/0k4j'
  display_name: 'car'
}
"#;

fn label_map_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp label map");
    file.write_all(LABEL_MAP.as_bytes()).expect("write label map");
    file
}

fn frame(width: u32, height: u32) -> Frame {
    Frame::from_rgb(
        vec![0u8; (width * height * 3) as usize],
        width,
        height,
        UNIX_EPOCH + Duration::from_millis(1_234),
    )
    .expect("frame")
}

#[test]
fn car_example_from_label_map_file() {
    let labels = label_map_file();
    let engine = StubEngine::new(vec![RawDetection::new([0.1, 0.2, 0.5, 0.6], 3, 0.9)]);
    let detector = BoxObjectDetector::with_labelmap(engine, labels.path()).expect("detector");

    let frame = frame(200, 100);
    let detections = detector.detect(&frame).expect("detect");

    assert_eq!(detections.len(), 1);
    let det = &detections[0];
    for (got, want) in det.state_vector.iter().zip([40.0, 10.0, 80.0, 40.0]) {
        assert!((got - want).abs() < 1e-4, "state vector {:?}", det.state_vector);
    }
    assert_eq!(det.timestamp, frame.timestamp);
    assert_eq!(det.metadata.raw_box, [0.1, 0.2, 0.5, 0.6]);
    assert_eq!(det.metadata.class, Category::new(3, "car"));
    assert_eq!(det.metadata.score, 0.9);
}

#[test]
fn returns_one_detection_per_reported_row() {
    let labels = label_map_file();
    let raw = vec![
        RawDetection::new([0.0, 0.0, 0.1, 0.1], 1, 0.95),
        RawDetection::new([0.2, 0.2, 0.4, 0.5], 3, 0.75),
        RawDetection::new([0.5, 0.1, 0.9, 0.3], 1, 0.30),
    ];
    let detector =
        BoxObjectDetector::with_labelmap(StubEngine::new(raw.clone()), labels.path()).unwrap();
    let (w, h) = (320usize, 240usize);
    let detections = detector.detect(&frame(w as u32, h as u32)).unwrap();

    assert_eq!(detections.len(), raw.len());
    for r in &raw {
        let det = detections
            .iter()
            .find(|d| d.metadata.raw_box == r.bbox)
            .expect("every raw box is reported");
        let [y_min, x_min, y_max, x_max] = r.bbox.map(f64::from);
        let expected = [
            x_min * w as f64,
            y_min * h as f64,
            (x_max - x_min) * w as f64,
            (y_max - y_min) * h as f64,
        ];
        for (got, want) in det.state_vector.iter().zip(expected) {
            assert!((got - want).abs() < 1e-6);
        }
        assert_eq!(det.metadata.class.id, r.class_id);
        assert_eq!(det.metadata.score, r.score);
    }
}

#[test]
fn value_identical_detections_are_kept() {
    let labels = label_map_file();
    let twin = RawDetection::new([0.1, 0.1, 0.2, 0.2], 1, 0.5);
    let detector =
        BoxObjectDetector::with_labelmap(StubEngine::new(vec![twin, twin]), labels.path())
            .unwrap();
    let detections = detector.detect(&frame(64, 64)).unwrap();
    assert_eq!(detections.len(), 2);
    assert_eq!(detections[0], detections[1]);
}

#[test]
fn empty_result_when_nothing_detected() {
    let labels = label_map_file();
    let detector = BoxObjectDetector::with_labelmap(StubEngine::default(), labels.path()).unwrap();
    assert!(detector.detect(&frame(64, 48)).unwrap().is_empty());
}

#[test]
fn class_missing_from_label_map_fails() {
    let labels = label_map_file();
    let engine = StubEngine::new(vec![RawDetection::new([0.1, 0.1, 0.2, 0.2], 2, 0.5)]);
    let detector = BoxObjectDetector::with_labelmap(engine, labels.path()).unwrap();
    match detector.detect(&frame(64, 48)) {
        Err(DetectError::UnknownClassId(2)) => {}
        other => panic!("expected UnknownClassId(2), got {:?}", other),
    }
}

#[test]
fn background_class_is_not_a_category() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(
        b"item { id: 0 name: 'bg' display_name: 'background' }\n\
          item { id: 1 name: 'person' }\n\
          item { id: 1 name: 'pedestrian' }\n",
    )
    .unwrap();
    let engine = StubEngine::new(vec![
        RawDetection::new([0.1, 0.1, 0.2, 0.2], 1, 0.8),
        RawDetection::new([0.0, 0.0, 1.0, 1.0], 0, 0.4),
    ]);
    let detector = BoxObjectDetector::with_labelmap(engine, file.path()).unwrap();
    assert_eq!(
        detector.category_index().get(1),
        Some(&Category::new(1, "person"))
    );
    match detector.detect(&frame(64, 48)) {
        Err(DetectError::UnknownClassId(0)) => {}
        other => panic!("expected UnknownClassId(0), got {:?}", other),
    }
}

#[test]
fn stub_engine_follows_the_label_map() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"item { id: 5 name: 'truck' }").unwrap();
    let detector =
        BoxObjectDetector::load(EngineKind::Stub, "unused", file.path(), (64, 48)).unwrap();
    let detections = detector.detect(&frame(64, 48)).unwrap();
    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0].metadata.class, Category::new(5, "truck"));
}

#[test]
fn unreadable_label_map_is_a_model_load_failure() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.pbtxt");
    let err = BoxObjectDetector::with_labelmap(StubEngine::default(), &missing)
        .err()
        .expect("construction must fail");
    assert!(matches!(err, DetectError::ModelLoad { .. }));
    assert!(err.to_string().contains("absent.pbtxt"));
}

#[test]
fn invalid_label_map_is_a_model_load_failure() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"item { id: 0 name: 'person' }").unwrap();
    let err = BoxObjectDetector::with_labelmap(StubEngine::default(), file.path())
        .err()
        .expect("construction must fail");
    assert!(matches!(err, DetectError::ModelLoad { .. }));
}

struct FailingEngine;

impl InferenceEngine for FailingEngine {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn infer(&self, batch: ArrayView4<'_, u8>) -> anyhow::Result<InferenceOutputs> {
        Err(anyhow!("input shape {:?} rejected", batch.shape()))
    }
}

#[test]
fn engine_errors_propagate_unchanged_and_detector_stays_usable() {
    let index = CategoryIndex::from_categories([Category::new(1, "person")]);
    let detector = BoxObjectDetector::new(FailingEngine, index);
    for _ in 0..2 {
        let err = detector.detect(&frame(8, 4)).unwrap_err();
        assert!(matches!(err, DetectError::Inference(_)));
        assert_eq!(err.to_string(), "input shape [1, 4, 8, 3] rejected");
    }
}
