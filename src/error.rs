//! Error types for the vision pipeline

use thiserror::Error;

/// Errors surfaced by detector construction and detection calls.
///
/// A clean "nothing found" is never an error: detectors return `Ok(None)`.
#[derive(Debug, Error)]
pub enum VisionError {
    /// OCR backend name not recognized
    #[error("Unsupported OCR backend: {0} (supported: 'local', 'cloud')")]
    UnsupportedBackend(String),

    /// Invalid or incomplete configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Frame could not be encoded for transmission
    #[error("Image encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    /// HTTP request to the cloud OCR service failed
    #[error("OCR request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// OCR service answered with something we cannot use
    #[error("Unexpected OCR response: {0}")]
    Response(String),

    /// Local OCR model process failed
    #[error("OCR engine failure: {0}")]
    Engine(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, VisionError>;
