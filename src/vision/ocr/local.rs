//! Local OCR model backend
//!
//! Runs a PaddleOCR-style model as a child process. The frame is written to the
//! process as PNG on stdin; the process prints one JSON object on stdout:
//!
//! ```json
//! { "rec_texts": ["640오"], "rec_scores": [0.93], "rec_polys": [[[10,10],[60,10],[60,40],[10,40]]] }
//! ```

use image::{ImageFormat, RgbImage};
use serde::Deserialize;
use std::io::{Cursor, Write};
use std::process::{Command, Stdio};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::{BoundingBox, OcrEngine, RawOcr};
use crate::error::{Result, VisionError};

/// Prediction output of a PaddleOCR-style model
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaddleOutput {
    #[serde(default)]
    pub rec_texts: Vec<String>,
    #[serde(default)]
    pub rec_scores: Vec<f32>,
    /// Quadrilateral per text, corners clockwise from top-left
    #[serde(default)]
    pub rec_polys: Vec<Vec<(f32, f32)>>,
}

impl PaddleOutput {
    /// Convert to raw detections; an incomplete prediction yields nothing
    pub fn into_raw(self) -> Vec<RawOcr> {
        if self.rec_texts.is_empty() || self.rec_scores.is_empty() || self.rec_polys.is_empty() {
            return vec![];
        }

        self.rec_texts
            .into_iter()
            .zip(self.rec_scores)
            .zip(self.rec_polys)
            .filter_map(|((text, score), poly)| {
                let bbox = BoundingBox::from_quad(&poly);
                if bbox.is_none() {
                    warn!("Skipping OCR result '{}' with {}-point polygon", text, poly.len());
                }
                bbox.map(|bbox| RawOcr::new(text, score, bbox))
            })
            .collect()
    }
}

/// OCR engine backed by a local model process
pub struct LocalOcr {
    program: String,
    args: Vec<String>,
}

impl LocalOcr {
    /// Create an engine from a command line (program followed by arguments)
    pub fn new(command: Vec<String>) -> Result<Self> {
        let mut parts = command.into_iter();
        let program = parts
            .next()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| VisionError::Config("ocr.local_command is empty".to_string()))?;
        let args: Vec<String> = parts.collect();

        info!("Local OCR engine: {} {}", program, args.join(" "));
        Ok(Self { program, args })
    }

    fn run_model(&self, png: Vec<u8>) -> Result<Vec<u8>> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| VisionError::Engine(format!("failed to start '{}': {}", self.program, e)))?;

        // Feed stdin from a separate thread so a chatty model cannot deadlock us
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| VisionError::Engine("model stdin unavailable".to_string()))?;
        let writer = std::thread::spawn(move || stdin.write_all(&png));

        let output = child.wait_with_output()?;
        writer
            .join()
            .map_err(|_| VisionError::Engine("stdin writer panicked".to_string()))??;

        if !output.status.success() {
            return Err(VisionError::Engine(format!(
                "'{}' exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(output.stdout)
    }
}

impl OcrEngine for LocalOcr {
    fn name(&self) -> &'static str {
        "local"
    }

    fn recognize(&mut self, image: &RgbImage) -> Result<Vec<RawOcr>> {
        let start = Instant::now();

        let mut png = Vec::new();
        image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;

        let stdout = self.run_model(png)?;
        let text = String::from_utf8_lossy(&stdout);
        if text.trim().is_empty() {
            return Ok(vec![]);
        }

        let prediction: PaddleOutput = serde_json::from_str(text.trim())?;
        let results = prediction.into_raw();

        debug!(
            "Local OCR complete in {:?}: {} text regions",
            start.elapsed(),
            results.len()
        );
        Ok(results)
    }
}
