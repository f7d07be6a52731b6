//! OCR (Optical Character Recognition) module
//!
//! Engines turn a frame into raw (text, confidence, box) triples. Backends:
//! - Local model process (PaddleOCR-style output)
//! - Cloud OCR HTTP API
//! - Fixture replay for offline/debug runs

pub mod cloud;
pub mod fixture;
pub mod local;
pub mod merge;

pub use cloud::CloudOcr;
pub use fixture::FixtureOcr;
pub use local::LocalOcr;
pub use merge::{merge_boxes, MergeConfig};

use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::info;

use crate::config::OcrSettings;
use crate::error::{Result, VisionError};

/// Axis-aligned bounding box `(x1, y1)` top-left to `(x2, y2)` bottom-right
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }

    /// Vertical center
    pub fn center_y(&self) -> f32 {
        (self.y1 + self.y2) as f32 / 2.0
    }

    /// Box from a quadrilateral, using its first (top-left) and third
    /// (bottom-right) corners
    pub fn from_quad(points: &[(f32, f32)]) -> Option<Self> {
        let p1 = points.first()?;
        let p3 = points.get(2)?;
        Some(Self::new(p1.0 as i32, p1.1 as i32, p3.0 as i32, p3.1 as i32))
    }
}

/// Single raw OCR detection
#[derive(Debug, Clone, PartialEq)]
pub struct RawOcr {
    /// Recognized text
    pub text: String,
    /// Recognition confidence (0.0 - 1.0)
    pub confidence: f32,
    /// Text location
    pub bbox: BoundingBox,
}

impl RawOcr {
    pub fn new(text: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            text: text.into(),
            confidence,
            bbox,
        }
    }
}

/// Text recognition capability
///
/// Everything downstream of `recognize` is backend-agnostic.
pub trait OcrEngine: Send {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Run OCR on a frame and return unmerged detections
    fn recognize(&mut self, image: &RgbImage) -> Result<Vec<RawOcr>>;
}

/// OCR backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrBackend {
    /// Local model process
    Local,
    /// Cloud HTTP API
    Cloud,
}

impl FromStr for OcrBackend {
    type Err = VisionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "paddle" => Ok(OcrBackend::Local),
            "cloud" | "clova" => Ok(OcrBackend::Cloud),
            other => Err(VisionError::UnsupportedBackend(other.to_string())),
        }
    }
}

/// Build the engine selected by the settings
///
/// Debug mode swaps in fixture replay regardless of the chosen backend; the
/// backend name is still validated.
pub fn build_engine(settings: &OcrSettings) -> Result<Box<dyn OcrEngine>> {
    let backend: OcrBackend = settings.backend.parse()?;

    if settings.debug {
        let path = settings.fixture_path.as_ref().ok_or_else(|| {
            VisionError::Config("debug mode requires ocr.fixture_path".to_string())
        })?;
        info!("OCR debug mode: replaying {:?} instead of {:?} backend", path, backend);
        return Ok(Box::new(FixtureOcr::from_file(path)?));
    }

    info!("Initializing {:?} OCR backend", backend);
    match backend {
        OcrBackend::Local => Ok(Box::new(LocalOcr::new(settings.local_command.clone())?)),
        OcrBackend::Cloud => Ok(Box::new(CloudOcr::from_settings(settings)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parsing() {
        assert_eq!("local".parse::<OcrBackend>().unwrap(), OcrBackend::Local);
        assert_eq!(" Cloud ".parse::<OcrBackend>().unwrap(), OcrBackend::Cloud);
        assert_eq!("paddle".parse::<OcrBackend>().unwrap(), OcrBackend::Local);

        let err = "tesseract".parse::<OcrBackend>().unwrap_err();
        assert!(matches!(err, VisionError::UnsupportedBackend(ref name) if name == "tesseract"));
    }

    #[test]
    fn test_build_engine_rejects_unknown_backend() {
        let settings = OcrSettings {
            backend: "easyocr".to_string(),
            ..OcrSettings::default()
        };
        assert!(matches!(build_engine(&settings), Err(VisionError::UnsupportedBackend(_))));
    }

    #[test]
    fn test_debug_mode_requires_fixture() {
        let settings = OcrSettings {
            debug: true,
            ..OcrSettings::default()
        };
        assert!(matches!(build_engine(&settings), Err(VisionError::Config(_))));
    }

    #[test]
    fn test_bbox_from_quad() {
        let quad = [(10.0, 12.0), (60.0, 12.0), (60.5, 40.9), (10.0, 40.0)];
        let bbox = BoundingBox::from_quad(&quad).unwrap();
        assert_eq!(bbox, BoundingBox::new(10, 12, 60, 40));
        assert_eq!(bbox.width(), 50);
        assert_eq!(bbox.height(), 28);
        assert!(BoundingBox::from_quad(&quad[..2]).is_none());
    }
}
