//! End-to-end plate and color pipeline tests

use image::{Rgb, RgbImage};
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

use rover_vision::capture::{CapturedFrame, DetectionWorker, FrameSlot, StopToken};
use rover_vision::config::{AppConfig, ColorSettings};
use rover_vision::vision::ocr::FixtureOcr;
use rover_vision::vision::{BoundingBox, ColorRecognizer, FloorColor, PlateDetector, RawOcr};

fn fragments() -> Vec<RawOcr> {
    vec![
        RawOcr::new("8800", 0.97, BoundingBox::new(62, 12, 120, 38)),
        RawOcr::new("640오", 0.91, BoundingBox::new(10, 10, 60, 40)),
    ]
}

#[test]
fn test_fragmented_plate_is_detected() {
    let mut detector = PlateDetector::new(Box::new(FixtureOcr::new(fragments())));

    let result = detector
        .detect(&RgbImage::new(160, 60), "640오8800")
        .unwrap()
        .expect("plate should be found");

    assert_eq!(result.text, "640오8800");
    assert_eq!(result.bbox, BoundingBox::new(10, 10, 120, 40));
    assert!((result.similarity - 100.0).abs() < 1e-3);
}

#[test]
fn test_other_plate_is_not_reported() {
    let mut detector = PlateDetector::new(Box::new(FixtureOcr::new(fragments())));
    let result = detector.detect(&RgbImage::new(160, 60), "123가4567").unwrap();
    assert!(result.is_none());
}

#[test]
fn test_debug_mode_replays_fixture_file() {
    let mut fixture = NamedTempFile::new().unwrap();
    write!(
        fixture,
        r#"{{"rec_texts": ["640오", "8800"], "rec_scores": [0.91, 0.97],
            "rec_polys": [[[10,10],[60,10],[60,40],[10,40]], [[62,12],[120,12],[120,38],[62,38]]]}}"#
    )
    .unwrap();

    let mut config = AppConfig::default();
    config.ocr.backend = "cloud".to_string();
    config.ocr.debug = true;
    config.ocr.fixture_path = Some(fixture.path().to_path_buf());

    let mut detector = PlateDetector::from_config(&config).unwrap();
    assert_eq!(detector.engine_name(), "fixture");

    let result = detector.detect(&RgbImage::new(160, 60), "640오8800").unwrap();
    assert_eq!(result.map(|r| r.text), Some("640오8800".to_string()));
}

#[test]
fn test_unknown_backend_fails_construction() {
    let mut config = AppConfig::default();
    config.ocr.backend = "tesseract".to_string();
    assert!(PlateDetector::from_config(&config).is_err());
}

#[test]
fn test_worker_reports_floor_color() {
    let settings = ColorSettings {
        enhance_brightness: false,
        white_balance: false,
        ..ColorSettings::default()
    };
    let recognizer = ColorRecognizer::new(settings);

    // White floor in the middle band, green marker across the bottom half
    let mut frame = RgbImage::from_pixel(100, 100, Rgb([0, 0, 0]));
    for y in 25..100 {
        for x in 0..100 {
            let pixel = if y < 50 { Rgb([255, 255, 255]) } else { Rgb([0, 200, 0]) };
            frame.put_pixel(x, y, pixel);
        }
    }

    let slot = FrameSlot::new();
    let mut worker = DetectionWorker::spawn(
        slot.clone(),
        StopToken::new(),
        Duration::from_millis(5),
        move |f: &CapturedFrame| recognizer.recognize(&f.image, None).map(|r| r.color),
    );

    slot.publish(CapturedFrame::new(frame, 1));
    let message = worker.results().recv_timeout(Duration::from_secs(10)).unwrap();
    worker.stop();

    assert_eq!(message.sequence, 1);
    assert_eq!(message.output, Some(FloorColor::Green));
}
