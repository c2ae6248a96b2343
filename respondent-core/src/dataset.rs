//! Shared record model for question/answer evaluation, plus JSON file IO.
//!
//! An [`EvaluationItem`] moves through the pipeline in one direction:
//! created by conversion (no actual answer, no scores), filled in once by
//! the generator, scored once by the evaluator. Items are value-like
//! records owned by their batch; nothing is shared across items.

use crate::error::EvalError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One question / expected-answer / generated-answer record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationItem {
    /// Unique within a batch.
    pub id: String,
    pub question: String,
    pub expected_answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scores: Option<ScoreSet>,
    #[serde(default)]
    pub status: ItemStatus,
}

impl EvaluationItem {
    pub fn new(
        id: impl Into<String>,
        question: impl Into<String>,
        expected_answer: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            question: question.into(),
            expected_answer: expected_answer.into(),
            actual_answer: None,
            scores: None,
            status: ItemStatus::Pending,
        }
    }
}

/// Processing state of one item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum ItemStatus {
    #[default]
    Pending,
    Scored,
    /// Excluded from summary means; the reason travels with the record so
    /// the final report can name every skipped item.
    Skipped(String),
}

impl ItemStatus {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }
}

/// The three component scores plus their derived overall score,
/// each in [0, 10].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreSet {
    pub accuracy: f64,
    pub completeness: f64,
    pub relevance: f64,
    pub overall: f64,
}

impl ScoreSet {
    /// Build a score set from the three components, clamping each to
    /// [0, 10]. `overall` is always their unweighted mean and is never
    /// stored independently of its inputs.
    pub fn new(accuracy: f64, completeness: f64, relevance: f64) -> Self {
        let accuracy = accuracy.clamp(0.0, 10.0);
        let completeness = completeness.clamp(0.0, 10.0);
        let relevance = relevance.clamp(0.0, 10.0);
        Self {
            accuracy,
            completeness,
            relevance,
            overall: (accuracy + completeness + relevance) / 3.0,
        }
    }
}

/// An ordered batch of items.
///
/// The batch exclusively owns its items. Summary statistics are a view
/// recomputed from the item sequence (see [`crate::evaluator::summarize`]),
/// never patched incrementally.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationBatch {
    pub items: Vec<EvaluationItem>,
}

impl EvaluationBatch {
    pub fn new(items: Vec<EvaluationItem>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Load raw JSON values from a file holding an array of records.
pub fn load_raw(path: &Path) -> Result<Vec<serde_json::Value>, EvalError> {
    let text = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&text)?;
    match value {
        serde_json::Value::Array(values) => Ok(values),
        _ => Err(EvalError::schema(format!(
            "{}: expected a top-level JSON array of records",
            path.display()
        ))),
    }
}

/// Load already-validated items from a JSON file.
pub fn load_items(path: &Path) -> Result<Vec<EvaluationItem>, EvalError> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Write items as a pretty-printed JSON array.
pub fn write_items(path: &Path, items: &[EvaluationItem]) -> Result<(), EvalError> {
    write_json(path, &items)
}

/// Write any serializable value as pretty-printed JSON.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), EvalError> {
    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');
    std::fs::write(path, text)?;
    Ok(())
}

/// Sibling path for converted records: `qa.xlsx` → `qa_input.json`.
pub fn input_json_path(input: &Path) -> PathBuf {
    sibling(input, "_input.json")
}

/// Sibling path for scored records: `qa_input.json` → `qa_output.json`.
pub fn output_path(input: &Path) -> PathBuf {
    sibling(input, "_output.json")
}

/// Sibling path for the summary report: `qa_input.json` → `qa_report.json`.
pub fn report_path(input: &Path) -> PathBuf {
    sibling(input, "_report.json")
}

fn sibling(input: &Path, suffix: &str) -> PathBuf {
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("batch");
    let stem = stem.strip_suffix("_input").unwrap_or(stem);
    input.with_file_name(format!("{stem}{suffix}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_overall_is_mean_of_components() {
        let scores = ScoreSet::new(9.0, 6.0, 3.0);
        assert_eq!(scores.overall, 6.0);
    }

    #[test]
    fn test_score_set_clamps_components() {
        let scores = ScoreSet::new(12.0, -1.0, 5.0);
        assert_eq!(scores.accuracy, 10.0);
        assert_eq!(scores.completeness, 0.0);
        assert_eq!(scores.overall, 5.0);
    }

    #[test]
    fn test_item_roundtrip_preserves_status_reason() {
        let mut item = EvaluationItem::new("q-1", "Capital of France?", "Paris");
        item.status = ItemStatus::Skipped("generation failed: timeout".into());
        let json = serde_json::to_string(&item).unwrap();
        let parsed: EvaluationItem = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, item);
    }

    #[test]
    fn test_optional_fields_omitted_when_absent() {
        let item = EvaluationItem::new("q-1", "Q?", "A");
        let json = serde_json::to_string(&item).unwrap();
        assert!(!json.contains("actual_answer"));
        assert!(!json.contains("scores"));
    }

    #[test]
    fn test_input_record_without_status_deserializes_as_pending() {
        let json = r#"{"id":"1","question":"Q?","expected_answer":"A"}"#;
        let item: EvaluationItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.status, ItemStatus::Pending);
    }

    #[test]
    fn test_output_path_naming() {
        assert_eq!(
            output_path(Path::new("/tmp/qa_input.json")),
            PathBuf::from("/tmp/qa_output.json")
        );
        assert_eq!(
            report_path(Path::new("qa.xlsx")),
            PathBuf::from("qa_report.json")
        );
        assert_eq!(
            input_json_path(Path::new("/data/batch.xlsx")),
            PathBuf::from("/data/batch_input.json")
        );
    }

    #[test]
    fn test_load_raw_rejects_non_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"id": "1"}"#).unwrap();
        assert!(matches!(load_raw(&path), Err(EvalError::Schema(_))));
    }

    #[test]
    fn test_write_then_load_items() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.json");
        let items = vec![
            EvaluationItem::new("1", "Q1?", "A1"),
            EvaluationItem::new("2", "Q2?", "A2"),
        ];
        write_items(&path, &items).unwrap();
        let loaded = load_items(&path).unwrap();
        assert_eq!(loaded, items);
    }
}
