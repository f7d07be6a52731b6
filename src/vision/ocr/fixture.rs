//! Fixture replay backend
//!
//! Returns previously captured OCR output for every frame, so the rest of the
//! pipeline can run without model weights, network access or API costs.
//! Accepts either cloud response JSON or local model prediction JSON.

use image::RgbImage;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

use super::cloud::{fields_to_raw, CloudField, CloudImage};
use super::local::PaddleOutput;
use super::{OcrEngine, RawOcr};
use crate::error::{Result, VisionError};

#[derive(Debug, Deserialize)]
struct CloudFixture {
    images: Vec<CloudImage>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FixtureFile {
    /// Full cloud response
    Cloud(CloudFixture),
    /// Just the cloud `fields` list
    Fields(Vec<CloudField>),
    /// Local model prediction
    Local(PaddleOutput),
}

impl FixtureFile {
    fn into_raw(self) -> Result<Vec<RawOcr>> {
        match self {
            FixtureFile::Cloud(response) => {
                let image = response
                    .images
                    .into_iter()
                    .next()
                    .ok_or_else(|| VisionError::Response("fixture has no images".to_string()))?;
                Ok(fields_to_raw(&image.fields))
            }
            FixtureFile::Fields(fields) => Ok(fields_to_raw(&fields)),
            FixtureFile::Local(prediction) => Ok(prediction.into_raw()),
        }
    }
}

/// OCR engine replaying canned results
#[derive(Debug, Clone)]
pub struct FixtureOcr {
    results: Vec<RawOcr>,
}

impl FixtureOcr {
    /// Engine that always returns `results`
    pub fn new(results: Vec<RawOcr>) -> Self {
        Self { results }
    }

    /// Load canned results from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let results = Self::parse(&content)?;
        info!("Loaded {} OCR fixture results from {:?}", results.len(), path);
        Ok(Self::new(results))
    }

    /// Parse fixture JSON
    pub fn parse(json: &str) -> Result<Vec<RawOcr>> {
        let file: FixtureFile = serde_json::from_str(json)?;
        file.into_raw()
    }
}

impl OcrEngine for FixtureOcr {
    fn name(&self) -> &'static str {
        "fixture"
    }

    fn recognize(&mut self, image: &RgbImage) -> Result<Vec<RawOcr>> {
        debug!(
            "Fixture OCR: replaying {} results for {}x{} frame",
            self.results.len(),
            image.width(),
            image.height()
        );
        Ok(self.results.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::ocr::BoundingBox;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_local_prediction() {
        let json = r#"{"rec_texts": ["123가4567"], "rec_scores": [0.88],
                       "rec_polys": [[[0,0],[80,0],[80,20],[0,20]]]}"#;
        let results = FixtureOcr::parse(json).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].bbox, BoundingBox::new(0, 0, 80, 20));
    }

    #[test]
    fn test_parse_cloud_response() {
        let json = r#"{"images": [{"inferResult": "SUCCESS", "fields": [
            {"inferText": "8800", "inferConfidence": 0.99,
             "boundingPoly": {"vertices": [{"x": 62, "y": 12}, {"x": 120, "y": 12},
                                           {"x": 120, "y": 38}, {"x": 62, "y": 38}]}}
        ]}]}"#;
        let results = FixtureOcr::parse(json).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].text, "8800");
    }

    #[test]
    fn test_parse_bare_fields() {
        let json = r#"[{"inferText": "640오", "inferConfidence": 0.9,
            "boundingPoly": {"vertices": [{"x": 10, "y": 10}, {"x": 60, "y": 10},
                                          {"x": 60, "y": 40}, {"x": 10, "y": 40}]}}]"#;
        let results = FixtureOcr::parse(json).unwrap();
        assert_eq!(results[0].bbox, BoundingBox::new(10, 10, 60, 40));
    }

    #[test]
    fn test_from_file_replays_every_call() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"rec_texts": ["630모8800"], "rec_scores": [0.95], "rec_polys": [[[5,5],[90,5],[90,30],[5,30]]]}}"#
        )
        .unwrap();

        let mut engine = FixtureOcr::from_file(file.path()).unwrap();
        let frame = RgbImage::new(8, 8);
        let first = engine.recognize(&frame).unwrap();
        let second = engine.recognize(&frame).unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0].text, "630모8800");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = FixtureOcr::from_file(Path::new("/nonexistent/fixture.json"));
        assert!(matches!(result, Err(VisionError::Io(_))));
    }
}
