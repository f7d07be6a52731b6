//! HSV color space conversion and range thresholding
//!
//! Uses the 8-bit convention: hue in [0, 180), saturation and value in [0, 255].

use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

/// Three-channel HSV image (H, S, V stored in an `Rgb` pixel)
pub type HsvImage = ImageBuffer<Rgb<u8>, Vec<u8>>;

/// Inclusive HSV interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsvRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HsvRange {
    pub const fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    /// Check whether an HSV triple lies inside the interval on every channel
    #[inline]
    pub fn contains(&self, hsv: &[u8; 3]) -> bool {
        (0..3).all(|c| hsv[c] >= self.lower[c] && hsv[c] <= self.upper[c])
    }
}

/// Convert a single RGB pixel to 8-bit HSV
pub fn rgb_pixel_to_hsv(r: u8, g: u8, b: u8) -> [u8; 3] {
    let (r, g, b) = (r as f32, g as f32, b as f32);
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = v - min;

    let s = if v > 0.0 { diff * 255.0 / v } else { 0.0 };

    let mut h = if diff == 0.0 {
        0.0
    } else if v == r {
        60.0 * (g - b) / diff
    } else if v == g {
        120.0 + 60.0 * (b - r) / diff
    } else {
        240.0 + 60.0 * (r - g) / diff
    };
    if h < 0.0 {
        h += 360.0;
    }

    // Halve to fit a byte; a rounded 180 wraps back to red
    let h = (h / 2.0).round() as u32 % 180;

    [h as u8, s.round().min(255.0) as u8, v as u8]
}

/// Convert an RGB frame to HSV
pub fn rgb_to_hsv(img: &RgbImage) -> HsvImage {
    let (width, height) = img.dimensions();
    let mut hsv = HsvImage::new(width, height);

    for (src, dst) in img.pixels().zip(hsv.pixels_mut()) {
        let [r, g, b] = src.0;
        *dst = Rgb(rgb_pixel_to_hsv(r, g, b));
    }

    hsv
}

/// Threshold an HSV image against one or more ranges (union)
///
/// Pixels inside any range become 255, others 0.
pub fn in_ranges(hsv: &HsvImage, ranges: &[HsvRange]) -> GrayImage {
    let (width, height) = hsv.dimensions();
    let mut mask = GrayImage::new(width, height);

    for (src, dst) in hsv.pixels().zip(mask.pixels_mut()) {
        if ranges.iter().any(|r| r.contains(&src.0)) {
            *dst = Luma([255]);
        }
    }

    mask
}

/// Pixel-wise AND of two binary masks of equal size
pub fn mask_and(a: &GrayImage, b: &GrayImage) -> GrayImage {
    let (width, height) = a.dimensions();
    let mut out = GrayImage::new(width, height);

    for ((pa, pb), dst) in a.pixels().zip(b.pixels()).zip(out.pixels_mut()) {
        if pa.0[0] > 0 && pb.0[0] > 0 {
            *dst = Luma([255]);
        }
    }

    out
}

/// Count nonzero pixels in a mask
pub fn count_nonzero(mask: &GrayImage) -> usize {
    mask.pixels().filter(|p| p.0[0] > 0).count()
}
