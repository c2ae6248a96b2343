//! Spreadsheet ingestion: Excel workbook → evaluation items.
//!
//! The first row is treated as headers. Column matching is
//! case-insensitive; the sheet must carry a question column and an expected
//! answer column, while an id column is optional (row ids are synthesized
//! when absent). Row mapping is separated from file reading so it can be
//! tested without a workbook on disk.

use crate::dataset::EvaluationItem;
use crate::error::EvalError;
use calamine::{Data, Reader, open_workbook_auto};
use std::path::Path;

const ID_HEADERS: &[&str] = &["id"];
const QUESTION_HEADERS: &[&str] = &["question"];
const EXPECTED_HEADERS: &[&str] = &["expected answer", "expected_answer"];

/// Read a workbook and map its rows to items. Uses the first worksheet
/// unless a sheet name is given.
pub fn convert_workbook(path: &Path, sheet: Option<&str>) -> Result<Vec<EvaluationItem>, EvalError> {
    tracing::info!(path = %path.display(), "reading workbook");
    let mut workbook = open_workbook_auto(path)?;
    let range = match sheet {
        Some(name) => workbook.worksheet_range(name)?,
        None => workbook
            .worksheet_range_at(0)
            .ok_or_else(|| EvalError::conversion("workbook has no worksheets"))??,
    };

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .ok_or_else(|| EvalError::conversion("worksheet is empty"))?
        .iter()
        .map(|cell| cell_value(cell).unwrap_or_default())
        .collect();
    let data: Vec<Vec<Option<String>>> = rows
        .map(|row| row.iter().map(cell_value).collect())
        .collect();

    let items = rows_to_items(&headers, &data)?;
    tracing::info!(count = items.len(), "converted workbook rows to items");
    Ok(items)
}

/// Map header-addressed rows to items.
///
/// Rows missing a question or an expected answer are skipped with a warning
/// (trailing blank rows are common in real spreadsheets and skipped
/// silently).
pub fn rows_to_items(
    headers: &[String],
    rows: &[Vec<Option<String>>],
) -> Result<Vec<EvaluationItem>, EvalError> {
    let find = |names: &[&str]| {
        headers
            .iter()
            .position(|h| names.contains(&h.trim().to_lowercase().as_str()))
    };
    let id_col = find(ID_HEADERS);
    let question_col =
        find(QUESTION_HEADERS).ok_or_else(|| EvalError::schema("missing 'Question' column"))?;
    let expected_col = find(EXPECTED_HEADERS)
        .ok_or_else(|| EvalError::schema("missing 'Expected Answer' column"))?;

    let mut items = Vec::new();
    for (row_idx, row) in rows.iter().enumerate() {
        let question = row.get(question_col).cloned().flatten();
        let expected = row.get(expected_col).cloned().flatten();
        let (Some(question), Some(expected_answer)) = (question, expected) else {
            if row.iter().any(Option::is_some) {
                // 1-based, plus the header row
                tracing::warn!(
                    row = row_idx + 2,
                    "skipping row with missing question or expected answer"
                );
            }
            continue;
        };
        let id = id_col
            .and_then(|col| row.get(col).cloned().flatten())
            .unwrap_or_else(|| format!("item-{:04}", items.len() + 1));
        items.push(EvaluationItem::new(id, question, expected_answer));
    }
    Ok(items)
}

/// Cell → cleaned text: trimmed, CRLF normalized, empty cells become
/// missing values.
fn cell_value(cell: &Data) -> Option<String> {
    let text = match cell {
        Data::Empty | Data::Error(_) => return None,
        Data::String(s) => s.clone(),
        Data::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.as_f64().to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
    };
    let cleaned = text.replace("\r\n", "\n").trim().to_string();
    if cleaned.is_empty() { None } else { Some(cleaned) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn row(cells: &[Option<&str>]) -> Vec<Option<String>> {
        cells.iter().map(|c| c.map(str::to_string)).collect()
    }

    #[test]
    fn test_maps_rows_with_explicit_ids() {
        let items = rows_to_items(
            &headers(&["Id", "Question", "Expected Answer"]),
            &[
                row(&[Some("q-1"), Some("Capital of France?"), Some("Paris")]),
                row(&[Some("q-2"), Some("Boiling point?"), Some("100 C")]),
            ],
        )
        .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "q-1");
        assert_eq!(items[1].expected_answer, "100 C");
    }

    #[test]
    fn test_header_matching_is_case_insensitive() {
        let items = rows_to_items(
            &headers(&["QUESTION", "expected_answer"]),
            &[row(&[Some("Q?"), Some("A")])],
        )
        .unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_ids_synthesized_when_column_absent() {
        let items = rows_to_items(
            &headers(&["Question", "Expected Answer"]),
            &[
                row(&[Some("Q1?"), Some("A1")]),
                row(&[Some("Q2?"), Some("A2")]),
            ],
        )
        .unwrap();
        assert_eq!(items[0].id, "item-0001");
        assert_eq!(items[1].id, "item-0002");
    }

    #[test]
    fn test_missing_question_column_is_schema_error() {
        let err = rows_to_items(&headers(&["Expected Answer"]), &[]).unwrap_err();
        assert!(matches!(err, EvalError::Schema(_)));
    }

    #[test]
    fn test_incomplete_rows_are_skipped() {
        let items = rows_to_items(
            &headers(&["Question", "Expected Answer"]),
            &[
                row(&[Some("Q1?"), Some("A1")]),
                row(&[Some("Q2?"), None]),
                row(&[None, None]),
                row(&[Some("Q3?"), Some("A3")]),
            ],
        )
        .unwrap();
        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["item-0001", "item-0002"]);
        assert_eq!(items[1].question, "Q3?");
    }

    #[test]
    fn test_cell_cleanup() {
        assert_eq!(
            cell_value(&Data::String("  line one\r\nline two  ".into())),
            Some("line one\nline two".into())
        );
        assert_eq!(cell_value(&Data::String("   ".into())), None);
        assert_eq!(cell_value(&Data::Empty), None);
        assert_eq!(cell_value(&Data::Float(42.0)), Some("42".into()));
        assert_eq!(cell_value(&Data::Int(7)), Some("7".into()));
    }
}
