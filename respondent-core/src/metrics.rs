//! Pure scoring heuristics for (expected, actual) answer pairs.
//!
//! Every function here is total and deterministic: any pair of strings maps
//! to a score in [0, 10] without panicking, including empty strings and
//! unicode. An empty actual answer scores 0 on all dimensions.
//!
//! Concrete formulas:
//! - `accuracy` — 10 on a normalized exact match or token-boundary
//!   containment, otherwise Jaccard overlap of the token sets scaled to
//!   0–10.
//! - `completeness` — fraction of the expected answer's distinct content
//!   tokens present in the actual answer, scaled to 0–10.
//! - `relevance` — overlap coefficient (intersection over the smaller set)
//!   of the content token sets, scaled to 0–10.

use crate::dataset::ScoreSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Common English function words excluded when measuring coverage and
/// topical overlap.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "do", "does", "for", "from", "has",
    "have", "how", "if", "in", "into", "is", "it", "its", "no", "not", "of", "on", "or", "such",
    "that", "the", "their", "then", "there", "these", "they", "this", "to", "was", "what", "when",
    "which", "who", "will", "with",
];

/// Lowercased tokens split on non-alphanumeric boundaries.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn token_set(text: &str) -> BTreeSet<String> {
    tokenize(text).into_iter().collect()
}

/// Distinct tokens with stopwords removed. Falls back to the full token set
/// when filtering would leave nothing (e.g. the answer "it is").
fn content_tokens(text: &str) -> BTreeSet<String> {
    let all = token_set(text);
    let content: BTreeSet<String> = all
        .iter()
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
        .cloned()
        .collect();
    if content.is_empty() { all } else { content }
}

fn normalize(text: &str) -> String {
    tokenize(text).join(" ")
}

fn scale(ratio: f64) -> f64 {
    (ratio * 10.0).clamp(0.0, 10.0)
}

/// Factual overlap between the expected and actual answers, in [0, 10].
///
/// 10 means the answers match exactly after normalization, or the whole
/// normalized expected answer appears inside the actual one on token
/// boundaries. Anything else is scored by Jaccard overlap of the token
/// sets.
pub fn accuracy(expected: &str, actual: &str) -> f64 {
    let e = normalize(expected);
    let a = normalize(actual);
    if e.is_empty() || a.is_empty() {
        return 0.0;
    }
    // Normalized forms are space-joined, so padding both with one space
    // makes containment respect token boundaries ("paris" never matches
    // inside "comparison").
    if e == a || format!(" {a} ").contains(&format!(" {e} ")) {
        return 10.0;
    }
    let expected_tokens = token_set(expected);
    let actual_tokens = token_set(actual);
    let intersection = expected_tokens.intersection(&actual_tokens).count() as f64;
    let union = expected_tokens.union(&actual_tokens).count() as f64;
    if union == 0.0 {
        0.0
    } else {
        scale(intersection / union)
    }
}

/// Coverage of the expected answer's information units, in [0, 10].
///
/// Information units are the distinct content tokens of the expected
/// answer; the score is the fraction of them present in the actual answer.
pub fn completeness(expected: &str, actual: &str) -> f64 {
    let units = content_tokens(expected);
    let actual_tokens = token_set(actual);
    if units.is_empty() || actual_tokens.is_empty() {
        return 0.0;
    }
    let covered = units.iter().filter(|t| actual_tokens.contains(*t)).count() as f64;
    scale(covered / units.len() as f64)
}

/// Topical alignment independent of exact wording, in [0, 10].
///
/// Overlap coefficient of the content token sets: the intersection divided
/// by the smaller set, so a short expected answer fully contained in a
/// longer actual one still scores 10.
pub fn relevance(expected: &str, actual: &str) -> f64 {
    let expected_tokens = content_tokens(expected);
    let actual_tokens = content_tokens(actual);
    if expected_tokens.is_empty() || actual_tokens.is_empty() {
        return 0.0;
    }
    let intersection = expected_tokens.intersection(&actual_tokens).count() as f64;
    let smaller = expected_tokens.len().min(actual_tokens.len()) as f64;
    scale(intersection / smaller)
}

/// Compute all three scores for a pair; `overall` is derived by
/// [`ScoreSet::new`].
pub fn score_pair(expected: &str, actual: &str) -> ScoreSet {
    ScoreSet::new(
        accuracy(expected, actual),
        completeness(expected, actual),
        relevance(expected, actual),
    )
}

/// Descriptive band for a 0–10 score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreLevel {
    Excellent,
    Good,
    Average,
    BelowAverage,
    Poor,
}

impl ScoreLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 9.0 {
            Self::Excellent
        } else if score >= 7.0 {
            Self::Good
        } else if score >= 5.0 {
            Self::Average
        } else if score >= 3.0 {
            Self::BelowAverage
        } else {
            Self::Poor
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Average => "Average",
            Self::BelowAverage => "Below Average",
            Self::Poor => "Poor",
        }
    }
}

/// Format a score with its descriptive band, e.g. `8.3/10 (Good)`.
pub fn format_score(score: f64) -> String {
    format!("{score:.1}/10 ({})", ScoreLevel::from_score(score).as_str())
}

/// Aggregate statistics for one score dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionStats {
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub std_dev: f64,
}

impl DimensionStats {
    /// Returns `None` for an empty sample (mean is undefined).
    pub fn from_scores(scores: &[f64]) -> Option<Self> {
        if scores.is_empty() {
            return None;
        }
        let n = scores.len() as f64;
        let mean = scores.iter().sum::<f64>() / n;
        let mut sorted = scores.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };
        let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
        Some(Self {
            mean,
            median,
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            std_dev: variance.sqrt(),
        })
    }
}

/// Count of scores rounding to each integer bin 0..=10.
pub fn distribution(scores: &[f64]) -> Vec<usize> {
    let mut bins = vec![0usize; 11];
    for score in scores {
        let bin = score.round().clamp(0.0, 10.0) as usize;
        bins[bin] += 1;
    }
    bins
}
