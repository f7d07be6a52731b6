//! Application Configuration
//!
//! Detector settings stored in TOML format. Every section has defaults, so a
//! partial file only needs the values it changes.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::vision::ocr::MergeConfig;
use crate::vision::preprocess::PreprocessSettings;

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Plate OCR settings
    pub ocr: OcrSettings,
    /// Floor color settings
    pub color: ColorSettings,
    /// Frame preprocessing before plate OCR
    pub preprocess: PreprocessSettings,
    /// Frame hand-off settings
    pub capture: CaptureSettings,
}

/// Plate detection / OCR backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// Backend name: "local" or "cloud"
    pub backend: String,
    /// Replay canned results from `fixture_path` instead of running inference
    pub debug: bool,
    /// JSON fixture used in debug mode
    pub fixture_path: Option<PathBuf>,
    /// Local model command (program followed by arguments)
    pub local_command: Vec<String>,
    /// Cloud OCR endpoint (falls back to `ROVER_OCR_API_URL`)
    pub api_url: Option<String>,
    /// Cloud OCR secret (falls back to `ROVER_OCR_API_SECRET`)
    pub api_secret: Option<String>,
    /// Cloud request timeout in seconds
    pub request_timeout_secs: u64,
    /// Minimum similarity (0 - 100) for a candidate to count as the target
    pub plate_similarity_threshold: f32,
    /// Fragment merge thresholds
    pub merge: MergeConfig,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            backend: "local".to_string(),
            debug: false,
            fixture_path: None,
            local_command: vec!["paddleocr-cli".to_string(), "--lang".to_string(), "korean".to_string()],
            api_url: None,
            api_secret: None,
            request_timeout_secs: 30,
            plate_similarity_threshold: 80.0,
            merge: MergeConfig::default(),
        }
    }
}

/// Floor color recognition settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorSettings {
    /// Top share of the frame never treated as floor
    pub exclude_top_ratio: f32,
    /// Rows from this share downwards always count as floor
    pub include_bottom_ratio: f32,
    /// Minimum frame share for a color to be reported
    pub min_area_ratio: f32,
    /// Apply luma CLAHE before classification
    pub enhance_brightness: bool,
    /// CLAHE clip limit for brightness enhancement
    pub clahe_clip_limit: f32,
    /// Apply percentile white balance before classification
    pub white_balance: bool,
    /// Percentile clipped at each end of every channel
    pub white_balance_percentile: f32,
    /// Include the winning color mask in results
    pub return_mask: bool,
}

impl Default for ColorSettings {
    fn default() -> Self {
        Self {
            exclude_top_ratio: 0.25,
            include_bottom_ratio: 0.5,
            min_area_ratio: 0.09,
            enhance_brightness: true,
            clahe_clip_limit: 3.0,
            white_balance: true,
            white_balance_percentile: 0.5,
            return_mask: false,
        }
    }
}

/// Frame hand-off settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Consumer sleep between polls of an empty slot
    pub poll_interval_ms: u64,
    /// Delay between frames when replaying a directory
    pub replay_interval_ms: u64,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10,
            replay_interval_ms: 500,
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {:?}", path))?;
    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {:?}", path))?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
