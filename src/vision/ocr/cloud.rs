//! Cloud OCR backend
//!
//! Sends the frame as a JPEG in a multipart request and reads back a list of
//! recognized fields with confidence and a bounding quadrilateral.

use image::{ImageFormat, RgbImage};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::runtime::Runtime;
use tracing::{debug, info};

use super::{BoundingBox, OcrEngine, RawOcr};
use crate::config::OcrSettings;
use crate::error::{Result, VisionError};

/// Environment variable consulted when no API URL is configured
pub const API_URL_ENV: &str = "ROVER_OCR_API_URL";
/// Environment variable consulted when no API secret is configured
pub const API_SECRET_ENV: &str = "ROVER_OCR_API_SECRET";

const SECRET_HEADER: &str = "X-OCR-SECRET";

/// Request metadata sent in the `message` form field
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestMessage {
    images: Vec<RequestImage>,
    request_id: String,
    version: &'static str,
    lang: &'static str,
    timestamp: u64,
}

#[derive(Debug, Serialize)]
struct RequestImage {
    format: &'static str,
    name: &'static str,
}

/// OCR API response body
#[derive(Debug, Deserialize)]
pub struct CloudResponse {
    #[serde(default)]
    pub images: Vec<CloudImage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudImage {
    #[serde(default)]
    pub infer_result: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub fields: Vec<CloudField>,
}

/// One recognized text field
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudField {
    pub infer_text: String,
    pub infer_confidence: f32,
    pub bounding_poly: BoundingPoly,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BoundingPoly {
    pub vertices: Vec<Vertex>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Vertex {
    pub x: f32,
    pub y: f32,
}

impl CloudField {
    /// Convert to a raw detection (vertex 0 top-left, vertex 2 bottom-right)
    pub fn to_raw(&self) -> Option<RawOcr> {
        let quad: Vec<(f32, f32)> = self.bounding_poly.vertices.iter().map(|v| (v.x, v.y)).collect();
        let bbox = BoundingBox::from_quad(&quad)?;
        Some(RawOcr::new(self.infer_text.clone(), self.infer_confidence, bbox))
    }
}

/// Convert recognized fields to raw detections, skipping malformed polygons
pub fn fields_to_raw(fields: &[CloudField]) -> Vec<RawOcr> {
    fields.iter().filter_map(CloudField::to_raw).collect()
}

/// OCR engine backed by a cloud HTTP API
pub struct CloudOcr {
    api_url: String,
    api_secret: String,
    client: reqwest::Client,
    runtime: Runtime,
}

impl CloudOcr {
    /// Create an engine for the given endpoint and secret
    pub fn new(api_url: String, api_secret: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        info!("Cloud OCR engine targeting {}", api_url);
        Ok(Self {
            api_url,
            api_secret,
            client,
            runtime,
        })
    }

    /// Create an engine from settings, falling back to environment variables
    pub fn from_settings(settings: &OcrSettings) -> Result<Self> {
        let api_url = setting_or_env(settings.api_url.as_deref(), API_URL_ENV)?;
        let api_secret = setting_or_env(settings.api_secret.as_deref(), API_SECRET_ENV)?;
        Self::new(
            api_url,
            api_secret,
            Duration::from_secs(settings.request_timeout_secs),
        )
    }

    fn request_message() -> Result<String> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        let message = RequestMessage {
            images: vec![RequestImage {
                format: "jpg",
                name: "demo",
            }],
            request_id: uuid::Uuid::new_v4().to_string(),
            version: "V2",
            lang: "ko",
            timestamp,
        };
        Ok(serde_json::to_string(&message)?)
    }

    async fn send_request(&self, jpeg: Vec<u8>) -> Result<CloudResponse> {
        let file = Part::bytes(jpeg)
            .file_name("plate.jpg")
            .mime_str("image/jpeg")?;
        let form = Form::new()
            .text("message", Self::request_message()?)
            .part("file", file);

        let response = self
            .client
            .post(&self.api_url)
            .header(SECRET_HEADER, &self.api_secret)
            .multipart(form)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json::<CloudResponse>().await?)
    }
}

impl OcrEngine for CloudOcr {
    fn name(&self) -> &'static str {
        "cloud"
    }

    fn recognize(&mut self, image: &RgbImage) -> Result<Vec<RawOcr>> {
        let start = Instant::now();

        let mut jpeg = Vec::new();
        image.write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)?;

        let response = self.runtime.block_on(self.send_request(jpeg))?;
        let image_result = response
            .images
            .into_iter()
            .next()
            .ok_or_else(|| VisionError::Response("no image in response".to_string()))?;

        if let Some(result) = image_result.infer_result.as_deref() {
            if !result.eq_ignore_ascii_case("SUCCESS") {
                return Err(VisionError::Response(format!(
                    "inference {}: {}",
                    result,
                    image_result.message.as_deref().unwrap_or("no message")
                )));
            }
        }

        let results = fields_to_raw(&image_result.fields);
        debug!(
            "Cloud OCR complete in {:?}: {} text regions",
            start.elapsed(),
            results.len()
        );
        Ok(results)
    }
}

fn setting_or_env(value: Option<&str>, env_key: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.to_string()),
        _ => std::env::var(env_key).map_err(|_| {
            VisionError::Config(format!("cloud OCR requires a value in config or ${}", env_key))
        }),
    }
}
