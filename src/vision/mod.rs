//! Vision Layer
//!
//! Per-frame detection for the robot's forward camera:
//! - Floor color recognition (floor mask + HSV color buckets)
//! - License plate detection (OCR backend + fragment merge + plate matching)
//!
//! Both detectors are stateless between frames; only their configuration is
//! kept for the lifetime of the instance.

pub mod color;
pub mod detector;
pub mod floor;
pub mod hsv;
pub mod ocr;
pub mod plate;
pub mod preprocess;

pub use color::{ColorRecognitionResult, ColorRecognizer, ColorTable, FloorColor};
pub use detector::{PlateDetector, PlateResult};
pub use ocr::{build_engine, BoundingBox, OcrBackend, OcrEngine, RawOcr};
pub use plate::{is_plate_like, similarity, PlateGrammar};
pub use preprocess::{PreprocessSettings, PreprocessStep};
