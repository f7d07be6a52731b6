//! Fragment merging for raw OCR output
//!
//! OCR engines often split one physical string at a character gap, e.g.
//! "640오8800" comes back as "640오" and "8800". Neighbouring boxes on the same
//! line, of similar height and nearly touching, are joined back together.

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::{BoundingBox, RawOcr};

/// Geometric thresholds for merging two boxes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Max vertical center offset, relative to the smaller box height
    pub y_center_ratio: f32,
    /// Min ratio of the smaller to the larger box height
    pub min_height_ratio: f32,
    /// Max horizontal gap, relative to the mean box width
    pub max_spacing_ratio: f32,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            y_center_ratio: 0.2,
            min_height_ratio: 0.6,
            max_spacing_ratio: 0.1,
        }
    }
}

impl MergeConfig {
    /// Whether `next` continues the text in `current`
    pub fn should_merge(&self, current: &BoundingBox, next: &BoundingBox) -> bool {
        let (h1, h2) = (current.height() as f32, next.height() as f32);
        let (w1, w2) = (current.width() as f32, next.width() as f32);

        let y_aligned =
            (current.center_y() - next.center_y()).abs() <= h1.min(h2) * self.y_center_ratio;

        let max_h = h1.max(h2);
        let height_ok = max_h > 0.0 && h1.min(h2) / max_h >= self.min_height_ratio;

        let gap = (next.x1 - current.x2) as f32;
        let spacing_ok = gap <= (w1 + w2) / 2.0 * self.max_spacing_ratio;

        trace!(
            "merge check {:?} -> {:?}: aligned={} height={} spacing={}",
            current,
            next,
            y_aligned,
            height_ok,
            spacing_ok
        );

        y_aligned && height_ok && spacing_ok
    }
}

/// Merge fragmented detections, scanning left to right
///
/// Each candidate is compared against the running merge target only. Merged
/// text is target followed by candidate, confidence is the lower of the two
/// and the box spans both.
pub fn merge_boxes(mut results: Vec<RawOcr>, config: &MergeConfig) -> Vec<RawOcr> {
    if results.is_empty() {
        return results;
    }

    results.sort_by_key(|r| r.bbox.x1);

    let mut iter = results.into_iter();
    let mut merged: Vec<RawOcr> = Vec::new();
    let Some(mut current) = iter.next() else {
        return merged;
    };

    for next in iter {
        if config.should_merge(&current.bbox, &next.bbox) {
            current.text.push_str(&next.text);
            current.confidence = current.confidence.min(next.confidence);
            current.bbox = BoundingBox::new(
                current.bbox.x1,
                current.bbox.y1.min(next.bbox.y1),
                next.bbox.x2,
                current.bbox.y2.max(next.bbox.y2),
            );
        } else {
            merged.push(std::mem::replace(&mut current, next));
        }
    }
    merged.push(current);

    merged
}
