//! Floor region extraction
//!
//! Builds a binary mask of the floor visible in front of the robot: near-white
//! pixels, minus a background band at the top, plus a band near the camera that
//! always counts as floor. Only the largest outer region survives, filled solid
//! so tile seams and colored markers inside it are kept.

use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point;
use tracing::trace;

use super::hsv::{count_nonzero, in_ranges, HsvImage, HsvRange};

/// Near-white band used to find the floor
pub const WHITE_RANGE: HsvRange = HsvRange::new([0, 0, 163], [179, 50, 255]);

/// Compute the floor mask of an HSV frame
///
/// Rows `[0, h * exclude_top_ratio)` are cleared and rows
/// `[h * include_bottom_ratio, h)` are forced on (the bottom band wins where
/// the two overlap). A frame with no near-white pixels at all has no visible
/// floor and yields an all-zero mask.
pub fn floor_mask(
    hsv: &HsvImage,
    white: &HsvRange,
    exclude_top_ratio: f32,
    include_bottom_ratio: f32,
) -> GrayImage {
    let (width, height) = hsv.dimensions();
    let mut mask = in_ranges(hsv, std::slice::from_ref(white));

    if width == 0 || height == 0 || count_nonzero(&mask) == 0 {
        return GrayImage::new(width, height);
    }

    let top_limit = band_row(height, exclude_top_ratio);
    let bottom_limit = band_row(height, include_bottom_ratio);

    for y in 0..top_limit {
        for x in 0..width {
            mask.put_pixel(x, y, Luma([0]));
        }
    }
    for y in bottom_limit..height {
        for x in 0..width {
            mask.put_pixel(x, y, Luma([255]));
        }
    }

    largest_region_filled(&mask)
}

/// Row index for a height ratio, truncated and clamped to the frame
fn band_row(height: u32, ratio: f32) -> u32 {
    ((height as f32 * ratio.max(0.0)) as u32).min(height)
}

/// Keep only the outer contour with the largest enclosed area, filled solid
pub fn largest_region_filled(mask: &GrayImage) -> GrayImage {
    let (width, height) = mask.dimensions();
    let mut filled = GrayImage::new(width, height);

    let contours: Vec<Contour<i32>> = find_contours(mask);

    let mut largest: Option<(&Contour<i32>, f64)> = None;
    for contour in contours
        .iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
    {
        let area = contour_area(&contour.points);
        if largest.map_or(true, |(_, best)| area > best) {
            largest = Some((contour, area));
        }
    }

    let Some((contour, area)) = largest else {
        return filled;
    };

    trace!(
        "Floor region: {} contours, largest area {:.1} ({} border points)",
        contours.len(),
        area,
        contour.points.len()
    );

    fill_contour(&mut filled, &contour.points);
    filled
}

/// Enclosed area of a closed contour (shoelace formula)
pub fn contour_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }

    let mut twice_area = 0i64;
    for (i, p) in points.iter().enumerate() {
        let q = &points[(i + 1) % points.len()];
        twice_area += p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64;
    }

    (twice_area as f64 / 2.0).abs()
}

/// Fill the interior of a contour and paint its border pixels
fn fill_contour(canvas: &mut GrayImage, points: &[Point<i32>]) {
    let mut poly = points.to_vec();
    poly.dedup();
    // The polygon drawer rejects a closing point equal to the first
    while poly.len() > 1 && poly.first() == poly.last() {
        poly.pop();
    }

    if poly.len() >= 3 {
        draw_polygon_mut(canvas, &poly, Luma([255]));
    }

    for p in points {
        if p.x >= 0 && p.y >= 0 && (p.x as u32) < canvas.width() && (p.y as u32) < canvas.height() {
            canvas.put_pixel(p.x as u32, p.y as u32, Luma([255]));
        }
    }
}
