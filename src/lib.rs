//! RoverVision - per-frame floor color and license plate detection
//!
//! Two independent detectors for a rover's forward camera:
//! - [`vision::ColorRecognizer`] reports the dominant floor marker color
//! - [`vision::PlateDetector`] finds a target license plate through OCR
//!
//! [`capture`] hands frames from a producer to a detection worker.

pub mod capture;
pub mod config;
pub mod error;
pub mod storage;
pub mod vision;

pub use error::{Result, VisionError};
