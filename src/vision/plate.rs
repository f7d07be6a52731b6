//! Plate Verification
//!
//! Shape check and segment-weighted fuzzy similarity for license plates of
//! the form `123가4567`: three digits, one tolerant character (Hangul
//! syllable, Latin letter or digit, since OCR often misreads it) and four
//! digits.

use once_cell::sync::Lazy;
use regex::Regex;

static PLATE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{3}[가-힣A-Za-z0-9][0-9]{4}$").expect("valid plate regex"));

/// Remove every whitespace character
pub fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Characters in the front / middle / back segments of a plate
pub const SEGMENT_LENGTHS: [usize; 3] = [3, 1, 4];

/// Total characters in a plate
pub const PLATE_LEN: usize = SEGMENT_LENGTHS[0] + SEGMENT_LENGTHS[1] + SEGMENT_LENGTHS[2];

/// Similarity weights over the fixed plate shape
#[derive(Debug, Clone, PartialEq)]
pub struct PlateGrammar {
    /// Weight of the front / middle / back segment; sums to 1
    pub weights: [f32; 3],
}

impl Default for PlateGrammar {
    fn default() -> Self {
        Self {
            // The middle character is the most frequently misread one
            weights: [0.45, 0.10, 0.45],
        }
    }
}

impl PlateGrammar {
    pub fn with_weights(weights: [f32; 3]) -> Self {
        Self { weights }
    }

    /// Whether `text` has the plate shape once whitespace is removed
    pub fn is_plate_like(&self, text: &str) -> bool {
        PLATE_PATTERN.is_match(&strip_whitespace(text))
    }

    /// Weighted similarity (0 - 100) between a target plate and a candidate
    ///
    /// Either operand of the wrong length scores 0.
    pub fn similarity(&self, target: &str, candidate: &str) -> f32 {
        let target: Vec<char> = strip_whitespace(target).chars().collect();
        let candidate: Vec<char> = strip_whitespace(candidate).chars().collect();

        if target.len() != PLATE_LEN || candidate.len() != PLATE_LEN {
            return 0.0;
        }

        let mut start = 0;
        let mut score = 0.0f64;
        for (&seg_len, &weight) in SEGMENT_LENGTHS.iter().zip(&self.weights) {
            let range = start..start + seg_len;
            score += weight as f64 * indel_ratio(&target[range.clone()], &candidate[range]) * 100.0;
            start += seg_len;
        }

        score.clamp(0.0, 100.0) as f32
    }
}

/// Normalized indel similarity (0.0 - 1.0): `1 - (insertions + deletions) / (len_a + len_b)`
///
/// Only insertions and deletions count, so a shifted or transposed digit
/// costs less than under Levenshtein distance.
pub fn indel_ratio(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    let distance = total - 2 * lcs_len(a, b);
    1.0 - distance as f64 / total as f64
}

/// Length of the longest common subsequence
fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut row = vec![0usize; b.len() + 1];
    for &ca in a {
        let mut diagonal = 0;
        for (j, &cb) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if ca == cb {
                diagonal + 1
            } else {
                above.max(row[j])
            };
            diagonal = above;
        }
    }
    row[b.len()]
}

/// Shape check with the default grammar
pub fn is_plate_like(text: &str) -> bool {
    PlateGrammar::default().is_plate_like(text)
}

/// Similarity with the default grammar
pub fn similarity(target: &str, candidate: &str) -> f32 {
    PlateGrammar::default().similarity(target, candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plate_shape() {
        assert!(is_plate_like("123가4567"));
        assert!(is_plate_like("630모8800"));
        assert!(is_plate_like("630 모 8800"));
        assert!(is_plate_like("123A4567"));
        assert!(is_plate_like("12304567"));

        assert!(!is_plate_like("12가3456"));
        assert!(!is_plate_like("abcdefgh"));
        assert!(!is_plate_like("123가45678"));
        assert!(!is_plate_like("123ㄱ4567"));
        assert!(!is_plate_like(""));
    }

    #[test]
    fn test_identical_plates() {
        assert!((similarity("630모8800", "630모8800") - 100.0).abs() < 1e-4);
        assert!((similarity("630 모8800", "630모 8800") - 100.0).abs() < 1e-4);
    }

    #[test]
    fn test_wrong_length_scores_zero() {
        assert_eq!(similarity("630모880", "630모8800"), 0.0);
        assert_eq!(similarity("630모8800", "630모88000"), 0.0);
        assert_eq!(similarity("", ""), 0.0);
    }

    #[test]
    fn test_middle_character_weighs_least() {
        let middle_wrong = similarity("630모8800", "630보8800");
        let back_digit_wrong = similarity("630모8800", "630모8801");

        assert!((middle_wrong - 90.0).abs() < 1e-3);
        // One of four back characters differs: 0.45 * 75
        assert!((back_digit_wrong - (45.0 + 10.0 + 33.75)).abs() < 1e-3);
        assert!(middle_wrong > back_digit_wrong);
    }

    #[test]
    fn test_completely_different() {
        assert!(similarity("111가1111", "222나2222").abs() < 1e-4);
    }

    #[test]
    fn test_grammar_defaults() {
        let grammar = PlateGrammar::default();
        assert_eq!(PLATE_LEN, 8);
        assert!((grammar.weights.iter().sum::<f32>() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_shifted_digits_use_indel_distance() {
        // "8800" vs "8008" shares "800": one deletion plus one insertion
        assert!((similarity("630모8800", "630모8008") - 88.75).abs() < 1e-3);
        assert!((similarity("123가4567", "123가5678") - 88.75).abs() < 1e-3);
    }

    #[test]
    fn test_indel_ratio() {
        let chars = |s: &str| s.chars().collect::<Vec<_>>();
        assert_eq!(indel_ratio(&chars("1234"), &chars("1234")), 1.0);
        assert_eq!(indel_ratio(&chars("12"), &chars("34")), 0.0);
        assert_eq!(indel_ratio(&chars("12"), &chars("21")), 0.5);
        assert_eq!(indel_ratio(&[], &[]), 1.0);
    }

    #[test]
    fn test_custom_weights_keep_plate_shape() {
        let grammar = PlateGrammar::with_weights([0.4, 0.2, 0.4]);
        assert!(grammar.is_plate_like("630모8800"));
        assert!(!grammar.is_plate_like("63모88000"));
        assert!((grammar.similarity("630모8800", "630보8800") - 80.0).abs() < 1e-3);
    }
}
