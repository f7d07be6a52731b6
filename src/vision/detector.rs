//! Plate detection
//!
//! Runs OCR on a frame, repairs fragmented detections, filters them by plate
//! shape and returns the candidate most similar to the target plate.

use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, trace};

use super::ocr::{build_engine, merge_boxes, BoundingBox, MergeConfig, OcrEngine};
use super::plate::{strip_whitespace, PlateGrammar};
use super::preprocess::{apply_preprocessing, PreprocessSettings};
use crate::config::AppConfig;
use crate::error::Result;

/// Default minimum similarity for a match
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 80.0;

/// A plate candidate that matched the target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlateResult {
    /// Candidate text with whitespace removed
    pub text: String,
    /// Similarity to the target (0 - 100)
    pub similarity: f32,
    /// Location in the frame
    pub bbox: BoundingBox,
}

/// Plate detector over any OCR backend
pub struct PlateDetector {
    engine: Box<dyn OcrEngine>,
    merge: MergeConfig,
    threshold: f32,
    grammar: PlateGrammar,
    preprocess: PreprocessSettings,
}

impl PlateDetector {
    /// Create a detector with default thresholds
    pub fn new(engine: Box<dyn OcrEngine>) -> Self {
        Self {
            engine,
            merge: MergeConfig::default(),
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
            grammar: PlateGrammar::default(),
            preprocess: PreprocessSettings::default(),
        }
    }

    /// Build the engine and thresholds from the application config
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let engine = build_engine(&config.ocr)?;
        info!(
            "Plate detector ready: {} engine, threshold {}",
            engine.name(),
            config.ocr.plate_similarity_threshold
        );

        Ok(Self::new(engine)
            .with_merge(config.ocr.merge)
            .with_threshold(config.ocr.plate_similarity_threshold)
            .with_preprocessing(config.preprocess.clone()))
    }

    pub fn with_merge(mut self, merge: MergeConfig) -> Self {
        self.merge = merge;
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_grammar(mut self, grammar: PlateGrammar) -> Self {
        self.grammar = grammar;
        self
    }

    pub fn with_preprocessing(mut self, preprocess: PreprocessSettings) -> Self {
        self.preprocess = preprocess;
        self
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    /// Find the target plate in a frame
    ///
    /// `Ok(None)` means no candidate reached the threshold; engine failures
    /// are returned as errors.
    pub fn detect(&mut self, frame: &RgbImage, target: &str) -> Result<Option<PlateResult>> {
        let start = Instant::now();

        let input = apply_preprocessing(frame, &self.preprocess);
        let raw = self.engine.recognize(&input)?;
        let raw_count = raw.len();
        let candidates = merge_boxes(raw, &self.merge);

        let mut best: Option<PlateResult> = None;
        for candidate in candidates {
            let text = strip_whitespace(&candidate.text);
            if !self.grammar.is_plate_like(&text) {
                trace!("Discarding '{}': not plate-shaped", text);
                continue;
            }

            let similarity = self.grammar.similarity(target, &text);
            debug!("Candidate '{}' similarity {:.2}", text, similarity);

            if similarity < self.threshold {
                continue;
            }
            // A zero score never matches, even with a zero threshold
            if similarity > best.as_ref().map_or(0.0, |b| b.similarity) {
                best = Some(PlateResult {
                    text,
                    similarity,
                    bbox: candidate.bbox,
                });
            }
        }

        debug!(
            "Plate detection complete in {:?}: {} raw results, match {:?}",
            start.elapsed(),
            raw_count,
            best.as_ref().map(|b| (&b.text, b.similarity))
        );

        Ok(best)
    }
}
