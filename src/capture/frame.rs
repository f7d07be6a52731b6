//! Frame data structures for captured camera content

use image::RgbImage;
use std::time::Instant;

/// A captured camera frame
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// RGB pixel data
    pub image: RgbImage,
    /// Producer-assigned sequence number, increasing per frame
    pub sequence: u64,
    /// Timestamp when frame was captured
    pub timestamp: Instant,
}

impl CapturedFrame {
    /// Create a new captured frame
    pub fn new(image: RgbImage, sequence: u64) -> Self {
        Self {
            image,
            sequence,
            timestamp: Instant::now(),
        }
    }

    /// Get frame dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}
