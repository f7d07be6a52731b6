//! Image preprocessing filters
//!
//! Optional enhancements applied to a frame before color classification or OCR.
//! Every filter is a pure transform returning a new image.

use image::{GrayImage, Luma, Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A single preprocessing filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreprocessStep {
    /// Non-linear brightness (gamma > 1.0 brightens)
    Gamma,
    /// Linear contrast/brightness scaling
    Contrast,
    /// Contrast-limited adaptive histogram equalization on luma
    Clahe,
    /// Per-channel percentile stretch
    WhiteBalance,
}

/// Preprocessing settings for plate OCR input
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessSettings {
    /// Whether preprocessing runs at all
    pub enabled: bool,
    /// Filters to apply, in order
    pub steps: Vec<PreprocessStep>,
    pub gamma: f32,
    pub clahe_clip_limit: f32,
    pub clahe_tiles: u32,
    pub contrast_alpha: f32,
    pub contrast_beta: f32,
    pub white_balance_percentile: f32,
}

impl Default for PreprocessSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            steps: vec![PreprocessStep::Clahe],
            gamma: 1.5,
            clahe_clip_limit: 2.0,
            clahe_tiles: 8,
            contrast_alpha: 1.5,
            contrast_beta: 0.0,
            white_balance_percentile: 0.5,
        }
    }
}

/// Apply the configured filters to a frame
pub fn apply_preprocessing(img: &RgbImage, settings: &PreprocessSettings) -> RgbImage {
    if !settings.enabled || settings.steps.is_empty() {
        return img.clone();
    }

    debug!("Preprocessing {}x{} frame: {:?}", img.width(), img.height(), settings.steps);

    let mut result = img.clone();
    for step in &settings.steps {
        result = match step {
            PreprocessStep::Gamma => adjust_gamma(&result, settings.gamma),
            PreprocessStep::Contrast => {
                adjust_contrast_linear(&result, settings.contrast_alpha, settings.contrast_beta)
            }
            PreprocessStep::Clahe => apply_clahe(
                &result,
                settings.clahe_clip_limit,
                (settings.clahe_tiles, settings.clahe_tiles),
            ),
            PreprocessStep::WhiteBalance => {
                apply_white_balance(&result, settings.white_balance_percentile)
            }
        };
    }

    result
}

/// Gamma correction through a lookup table
pub fn adjust_gamma(img: &RgbImage, gamma: f32) -> RgbImage {
    if gamma <= 0.0 {
        return img.clone();
    }

    let inv_gamma = 1.0 / gamma;
    let mut table = [0u8; 256];
    for (i, v) in table.iter_mut().enumerate() {
        *v = ((i as f32 / 255.0).powf(inv_gamma) * 255.0) as u8;
    }

    map_channels(img, |v| table[v as usize])
}

/// Linear contrast: `saturate(|alpha * v + beta|)`
pub fn adjust_contrast_linear(img: &RgbImage, alpha: f32, beta: f32) -> RgbImage {
    map_channels(img, |v| (alpha * v as f32 + beta).abs().round().min(255.0) as u8)
}

/// Automatic white balance
///
/// Each channel's bottom and top `p` percentiles are mapped to 0 and 255 and
/// the rest is rescaled linearly. Channels with no spread are left as-is.
pub fn apply_white_balance(img: &RgbImage, p: f32) -> RgbImage {
    let n = img.width() as usize * img.height() as usize;
    if n == 0 {
        return img.clone();
    }

    let mut luts = [[0u8; 256]; 3];
    for (c, lut) in luts.iter_mut().enumerate() {
        let mut hist = [0usize; 256];
        for px in img.pixels() {
            hist[px.0[c] as usize] += 1;
        }

        let low = percentile(&hist, n, p);
        let high = percentile(&hist, n, 100.0 - p);

        for (v, out) in lut.iter_mut().enumerate() {
            *out = if high > low {
                ((v as f32 - low) / (high - low) * 255.0).clamp(0.0, 255.0) as u8
            } else {
                v as u8
            };
        }
    }

    let mut out = img.clone();
    for px in out.pixels_mut() {
        for c in 0..3 {
            px.0[c] = luts[c][px.0[c] as usize];
        }
    }
    out
}

/// Percentile of a histogram with linear interpolation between ranks
fn percentile(hist: &[usize; 256], n: usize, p: f32) -> f32 {
    let rank = (p.clamp(0.0, 100.0) / 100.0) * (n - 1) as f32;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f32;

    let value_at = |k: usize| -> f32 {
        let mut seen = 0usize;
        for (v, &count) in hist.iter().enumerate() {
            seen += count;
            if seen > k {
                return v as f32;
            }
        }
        255.0
    };

    let v_lo = value_at(lo);
    let v_hi = value_at(hi);
    v_lo + (v_hi - v_lo) * frac
}

/// CLAHE applied to the luma channel only
///
/// The frame is split into `tiles` regions; each gets a clipped, equalized
/// lookup table and pixels are bilinearly interpolated between neighbouring
/// tables. Chroma is preserved by shifting every channel by the luma change.
pub fn apply_clahe(img: &RgbImage, clip_limit: f32, tiles: (u32, u32)) -> RgbImage {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return img.clone();
    }

    let luma = to_luma_bt601(img);
    let equalized = clahe_channel(&luma, clip_limit, tiles);

    let mut out = img.clone();
    for ((px, y), y_eq) in out.pixels_mut().zip(luma.pixels()).zip(equalized.pixels()) {
        let delta = y_eq.0[0] as i32 - y.0[0] as i32;
        for c in 0..3 {
            px.0[c] = (px.0[c] as i32 + delta).clamp(0, 255) as u8;
        }
    }
    out
}

/// Contrast-limited adaptive histogram equalization of a single channel
pub fn clahe_channel(src: &GrayImage, clip_limit: f32, tiles: (u32, u32)) -> GrayImage {
    let (width, height) = src.dimensions();
    if width == 0 || height == 0 {
        return src.clone();
    }

    let tile_w = width.div_ceil(tiles.0.clamp(1, width));
    let tile_h = height.div_ceil(tiles.1.clamp(1, height));
    let tiles_x = width.div_ceil(tile_w);
    let tiles_y = height.div_ceil(tile_h);

    let mut luts = vec![[0u8; 256]; (tiles_x * tiles_y) as usize];

    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(width);
            let y1 = (y0 + tile_h).min(height);
            let area = ((x1 - x0) * (y1 - y0)) as usize;

            let mut hist = [0usize; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    hist[src.get_pixel(x, y).0[0] as usize] += 1;
                }
            }

            if clip_limit > 0.0 {
                clip_histogram(&mut hist, ((clip_limit * area as f32 / 256.0) as usize).max(1));
            }

            let lut = &mut luts[(ty * tiles_x + tx) as usize];
            let scale = 255.0 / area as f32;
            let mut cdf = 0usize;
            for (v, count) in hist.iter().enumerate() {
                cdf += count;
                lut[v] = (cdf as f32 * scale).round().min(255.0) as u8;
            }
        }
    }

    let mut out = GrayImage::new(width, height);
    for y in 0..height {
        let (ty0, ty1, wy) = tile_neighbours(y, tile_h, tiles_y);
        for x in 0..width {
            let (tx0, tx1, wx) = tile_neighbours(x, tile_w, tiles_x);
            let v = src.get_pixel(x, y).0[0] as usize;

            let lut = |tx: u32, ty: u32| luts[(ty * tiles_x + tx) as usize][v] as f32;
            let top = lut(tx0, ty0) * (1.0 - wx) + lut(tx1, ty0) * wx;
            let bottom = lut(tx0, ty1) * (1.0 - wx) + lut(tx1, ty1) * wx;
            let value = top * (1.0 - wy) + bottom * wy;

            out.put_pixel(x, y, Luma([value.round().clamp(0.0, 255.0) as u8]));
        }
    }

    out
}

/// Clip histogram bins and redistribute the excess evenly
fn clip_histogram(hist: &mut [usize; 256], clip: usize) {
    let mut excess = 0usize;
    for bin in hist.iter_mut() {
        if *bin > clip {
            excess += *bin - clip;
            *bin = clip;
        }
    }

    let per_bin = excess / 256;
    let mut residual = excess - per_bin * 256;
    for bin in hist.iter_mut() {
        *bin += per_bin;
    }

    if residual > 0 {
        let step = (256 / residual).max(1);
        let mut i = 0;
        while i < 256 && residual > 0 {
            hist[i] += 1;
            residual -= 1;
            i += step;
        }
    }
}

/// Two neighbouring tile indices around a pixel and the weight of the second
fn tile_neighbours(pos: u32, tile_size: u32, tile_count: u32) -> (u32, u32, f32) {
    let f = (pos as f32 + 0.5) / tile_size as f32 - 0.5;
    let base = f.floor();
    let weight = f - base;

    let t0 = (base.max(0.0) as u32).min(tile_count - 1);
    let t1 = ((base + 1.0).max(0.0) as u32).min(tile_count - 1);
    (t0, t1, weight)
}

/// Luma (BT.601) of an RGB frame
fn to_luma_bt601(img: &RgbImage) -> GrayImage {
    let mut gray = GrayImage::new(img.width(), img.height());
    for (src, dst) in img.pixels().zip(gray.pixels_mut()) {
        let [r, g, b] = src.0;
        let y = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
        *dst = Luma([y.round().min(255.0) as u8]);
    }
    gray
}

/// Convert to single-channel grayscale
pub fn to_grayscale(img: &RgbImage) -> GrayImage {
    to_luma_bt601(img)
}

/// Binary threshold: values above `threshold` become 255, or 0 when `inverse`
pub fn binarize(gray: &GrayImage, threshold: u8, inverse: bool) -> GrayImage {
    let (above, below) = if inverse { (0, 255) } else { (255, 0) };
    let mut out = gray.clone();
    for px in out.pixels_mut() {
        px.0[0] = if px.0[0] > threshold { above } else { below };
    }
    out
}

/// Adaptive threshold against a Gaussian-weighted local mean
///
/// A pixel becomes 255 when it is brighter than its neighbourhood mean minus
/// `c`. `block_size` is the neighbourhood width, forced odd and at least 3.
pub fn binarize_adaptive(gray: &GrayImage, block_size: u32, c: f32) -> GrayImage {
    let block = block_size.max(3) | 1;
    // Sigma that a Gaussian kernel of this width would use by default
    let sigma = 0.3 * ((block as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let local_mean = imageproc::filter::gaussian_blur_f32(gray, sigma);

    let mut out = GrayImage::new(gray.width(), gray.height());
    for ((src, mean), dst) in gray.pixels().zip(local_mean.pixels()).zip(out.pixels_mut()) {
        *dst = Luma([if src.0[0] as f32 > mean.0[0] as f32 - c { 255 } else { 0 }]);
    }
    debug!("Adaptive threshold: block {}, sigma {:.2}, c {}", block, sigma, c);
    out
}

fn map_channels(img: &RgbImage, f: impl Fn(u8) -> u8) -> RgbImage {
    let mut out = img.clone();
    for px in out.pixels_mut() {
        let [r, g, b] = px.0;
        *px = Rgb([f(r), f(g), f(b)]);
    }
    out
}
