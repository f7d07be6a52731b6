//! Floor color recognition
//!
//! Classifies the floor area of a frame into one of six hue buckets and reports
//! the bucket covering the largest share of the frame.

use image::{GrayImage, RgbImage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::{debug, trace};

use super::floor::{floor_mask, WHITE_RANGE};
use super::hsv::{count_nonzero, in_ranges, mask_and, rgb_to_hsv, HsvRange};
use super::preprocess::{apply_clahe, apply_white_balance};
use crate::config::ColorSettings;

/// Floor marker colors, in bucket priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FloorColor {
    Red,
    Orange,
    Yellow,
    Green,
    Blue,
    Purple,
}

impl FloorColor {
    /// All colors in the order buckets are evaluated; earlier wins ties
    pub const ALL: [FloorColor; 6] = [
        FloorColor::Red,
        FloorColor::Orange,
        FloorColor::Yellow,
        FloorColor::Green,
        FloorColor::Blue,
        FloorColor::Purple,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FloorColor::Red => "red",
            FloorColor::Orange => "orange",
            FloorColor::Yellow => "yellow",
            FloorColor::Green => "green",
            FloorColor::Blue => "blue",
            FloorColor::Purple => "purple",
        }
    }
}

impl fmt::Display for FloorColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// HSV ranges for one color bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorBucket {
    pub color: FloorColor,
    /// One interval, or two for red (both ends of the hue circle)
    pub ranges: Vec<HsvRange>,
}

/// Static HSV lookup table for floor and marker colors
#[derive(Debug, Clone)]
pub struct ColorTable {
    pub white: HsvRange,
    pub buckets: Vec<ColorBucket>,
}

impl Default for ColorTable {
    fn default() -> Self {
        let bucket = |color, ranges: &[([u8; 3], [u8; 3])]| ColorBucket {
            color,
            ranges: ranges.iter().map(|&(lo, hi)| HsvRange::new(lo, hi)).collect(),
        };

        Self {
            white: WHITE_RANGE,
            buckets: vec![
                bucket(
                    FloorColor::Red,
                    &[([0, 70, 115], [7, 255, 255]), ([167, 80, 83], [179, 255, 255])],
                ),
                bucket(FloorColor::Orange, &[([9, 70, 87], [19, 255, 255])]),
                bucket(FloorColor::Yellow, &[([21, 68, 121], [34, 255, 255])]),
                bucket(FloorColor::Green, &[([43, 83, 114], [88, 255, 255])]),
                bucket(FloorColor::Blue, &[([100, 70, 116], [116, 255, 255])]),
                bucket(FloorColor::Purple, &[([120, 61, 82], [151, 255, 255])]),
            ],
        }
    }
}

/// Result of a color recognition call
#[derive(Debug, Clone)]
pub struct ColorRecognitionResult {
    /// Dominant floor color
    pub color: FloorColor,
    /// Share of the whole frame covered by that color on the floor (0.0 - 1.0)
    pub area_ratio: f32,
    /// Floor pixels of the winning color, when requested
    pub mask: Option<GrayImage>,
}

/// Floor color recognizer
pub struct ColorRecognizer {
    settings: ColorSettings,
    table: ColorTable,
}

impl ColorRecognizer {
    /// Create a recognizer with the default color table
    pub fn new(settings: ColorSettings) -> Self {
        Self::with_table(settings, ColorTable::default())
    }

    /// Create a recognizer with a custom color table
    pub fn with_table(settings: ColorSettings, table: ColorTable) -> Self {
        Self { settings, table }
    }

    pub fn settings(&self) -> &ColorSettings {
        &self.settings
    }

    /// Recognize the dominant floor color
    ///
    /// `min_area_ratio` overrides the configured threshold. Returns `None`
    /// while no color covers enough of the floor.
    pub fn recognize(
        &self,
        frame: &RgbImage,
        min_area_ratio: Option<f32>,
    ) -> Option<ColorRecognitionResult> {
        let start = Instant::now();
        let min_area_ratio = min_area_ratio.unwrap_or(self.settings.min_area_ratio);
        let (width, height) = frame.dimensions();
        let total = width as usize * height as usize;
        if total == 0 {
            return None;
        }

        let enhanced = self.enhance(frame);
        let hsv = rgb_to_hsv(enhanced.as_ref().unwrap_or(frame));

        let floor = floor_mask(
            &hsv,
            &self.table.white,
            self.settings.exclude_top_ratio,
            self.settings.include_bottom_ratio,
        );

        let mut best: Option<(FloorColor, f32, GrayImage)> = None;
        for bucket in &self.table.buckets {
            let color_mask = mask_and(&floor, &in_ranges(&hsv, &bucket.ranges));
            let area_ratio = count_nonzero(&color_mask) as f32 / total as f32;
            trace!("{}: area ratio {:.4}", bucket.color, area_ratio);

            let best_ratio = best.as_ref().map_or(0.0, |(_, r, _)| *r);
            if area_ratio > best_ratio {
                best = Some((bucket.color, area_ratio, color_mask));
            }
        }

        debug!(
            "Color recognition complete in {:?}: {:?}",
            start.elapsed(),
            best.as_ref().map(|(c, r, _)| (c, r))
        );

        let (color, area_ratio, mask) = best?;
        if area_ratio < min_area_ratio {
            return None;
        }

        Some(ColorRecognitionResult {
            color,
            area_ratio,
            mask: self.settings.return_mask.then_some(mask),
        })
    }

    /// Apply the configured brightness and white-balance corrections
    fn enhance(&self, frame: &RgbImage) -> Option<RgbImage> {
        let mut img: Option<RgbImage> = None;

        if self.settings.enhance_brightness {
            img = Some(apply_clahe(frame, self.settings.clahe_clip_limit, (8, 8)));
        }
        if self.settings.white_balance {
            let src = img.as_ref().unwrap_or(frame);
            img = Some(apply_white_balance(src, self.settings.white_balance_percentile));
        }

        img
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
    const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
    const RED: Rgb<u8> = Rgb([200, 20, 20]);
    const GREEN: Rgb<u8> = Rgb([0, 200, 0]);
    const BLUE: Rgb<u8> = Rgb([0, 100, 200]);

    fn raw_settings() -> ColorSettings {
        ColorSettings {
            enhance_brightness: false,
            white_balance: false,
            ..ColorSettings::default()
        }
    }

    /// 100x100 frame: dark background band on top, white floor below
    fn floor_frame() -> RgbImage {
        let mut img = RgbImage::from_pixel(100, 100, WHITE);
        for y in 0..25 {
            for x in 0..100 {
                img.put_pixel(x, y, BLACK);
            }
        }
        img
    }

    fn paint(img: &mut RgbImage, x0: u32, y0: u32, x1: u32, y1: u32, color: Rgb<u8>) {
        for y in y0..y1 {
            for x in x0..x1 {
                img.put_pixel(x, y, color);
            }
        }
    }

    #[test]
    fn test_default_table_shape() {
        let table = ColorTable::default();
        assert_eq!(table.buckets.len(), 6);
        for bucket in &table.buckets {
            let expected = if bucket.color == FloorColor::Red { 2 } else { 1 };
            assert_eq!(bucket.ranges.len(), expected, "{}", bucket.color);
        }
        let order: Vec<_> = table.buckets.iter().map(|b| b.color).collect();
        assert_eq!(order, FloorColor::ALL.to_vec());
    }

    #[test]
    fn test_recognizes_red_marker() {
        let mut img = floor_frame();
        paint(&mut img, 20, 60, 60, 90, RED);

        let recognizer = ColorRecognizer::new(raw_settings());
        let result = recognizer.recognize(&img, None).expect("red should be detected");

        assert_eq!(result.color, FloorColor::Red);
        assert!((result.area_ratio - 0.12).abs() < 1e-6);
        assert!(result.mask.is_none());
    }

    #[test]
    fn test_recognizes_blue_and_returns_mask() {
        let mut img = floor_frame();
        paint(&mut img, 0, 50, 100, 80, BLUE);

        let settings = ColorSettings {
            return_mask: true,
            ..raw_settings()
        };
        let result = ColorRecognizer::new(settings).recognize(&img, None).unwrap();

        assert_eq!(result.color, FloorColor::Blue);
        let mask = result.mask.expect("mask requested");
        assert_eq!(count_nonzero(&mask), 3000);
    }

    #[test]
    fn test_marker_above_roi_is_ignored() {
        // Colored patch in the excluded top band
        let mut img = floor_frame();
        paint(&mut img, 0, 0, 100, 20, GREEN);

        let result = ColorRecognizer::new(raw_settings()).recognize(&img, Some(0.01));
        assert!(result.is_none());
    }

    #[test]
    fn test_below_min_area_is_searching() {
        let mut img = floor_frame();
        paint(&mut img, 10, 60, 20, 70, GREEN);

        let recognizer = ColorRecognizer::new(raw_settings());
        assert!(recognizer.recognize(&img, None).is_none());
        // Same frame passes with a lower threshold
        let result = recognizer.recognize(&img, Some(0.01)).unwrap();
        assert_eq!(result.color, FloorColor::Green);
    }

    #[test]
    fn test_tie_keeps_first_bucket() {
        let mut img = floor_frame();
        paint(&mut img, 0, 60, 30, 90, GREEN);
        paint(&mut img, 50, 60, 80, 90, RED);

        let result = ColorRecognizer::new(raw_settings())
            .recognize(&img, None)
            .unwrap();
        assert_eq!(result.color, FloorColor::Red);
    }

    #[test]
    fn test_no_white_never_detects() {
        let img = RgbImage::from_pixel(50, 50, RED);
        let recognizer = ColorRecognizer::new(raw_settings());
        assert!(recognizer.recognize(&img, Some(0.0)).is_none());
        assert!(recognizer.recognize(&img, None).is_none());
    }

    #[test]
    fn test_recognition_is_deterministic() {
        let mut img = floor_frame();
        paint(&mut img, 20, 40, 80, 95, GREEN);

        let recognizer = ColorRecognizer::new(ColorSettings::default());
        let a = recognizer.recognize(&img, Some(0.0)).map(|r| (r.color, r.area_ratio));
        let b = recognizer.recognize(&img, Some(0.0)).map(|r| (r.color, r.area_ratio));
        assert_eq!(a, b);
    }
}
