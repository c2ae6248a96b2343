//! Schema validation for raw JSON records entering the pipeline.
//!
//! The validator reports every error it finds rather than stopping at the
//! first; the orchestrator decides whether errors abort the run or drop the
//! offending records (see [`crate::config::ValidationPolicy`]).

use crate::dataset::{EvaluationItem, ItemStatus};
use crate::error::ValidationError;
use serde_json::Value;
use std::collections::HashMap;

/// Check one raw record. On failure, returns every violation found in it.
pub fn validate_item(raw: &Value, index: usize) -> Result<EvaluationItem, Vec<ValidationError>> {
    let Some(obj) = raw.as_object() else {
        return Err(vec![ValidationError::NotAnObject { index }]);
    };

    let mut errors = Vec::new();
    let id = string_field(obj, "id", index, &mut errors);
    let question = string_field(obj, "question", index, &mut errors);
    let expected_answer = string_field(obj, "expected_answer", index, &mut errors);

    let actual_answer = match obj.get("actual_answer") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            errors.push(ValidationError::WrongType {
                index,
                field: "actual_answer",
            });
            None
        }
    };

    match (id, question, expected_answer) {
        (Some(id), Some(question), Some(expected_answer)) if errors.is_empty() => {
            Ok(EvaluationItem {
                id,
                question,
                expected_answer,
                actual_answer,
                scores: None,
                status: ItemStatus::Pending,
            })
        }
        _ => Err(errors),
    }
}

/// Check every record plus id uniqueness across the batch. Either all
/// records pass and come back in input order, or the full error list is
/// returned.
pub fn validate_batch(raw: &[Value]) -> Result<Vec<EvaluationItem>, Vec<ValidationError>> {
    let (items, errors) = validate_batch_lenient(raw);
    if errors.is_empty() { Ok(items) } else { Err(errors) }
}

/// Lenient variant for the drop-invalid policy: returns the records that
/// passed (later duplicates of an id are dropped) together with every error
/// found.
pub fn validate_batch_lenient(raw: &[Value]) -> (Vec<EvaluationItem>, Vec<ValidationError>) {
    let mut errors = Vec::new();
    let mut items = Vec::with_capacity(raw.len());
    let mut seen: HashMap<String, usize> = HashMap::new();

    for (index, value) in raw.iter().enumerate() {
        let item = match validate_item(value, index) {
            Ok(item) => item,
            Err(mut errs) => {
                errors.append(&mut errs);
                continue;
            }
        };
        if let Some(&first_index) = seen.get(&item.id) {
            errors.push(ValidationError::DuplicateId {
                id: item.id.clone(),
                first_index,
                second_index: index,
            });
            continue;
        }
        seen.insert(item.id.clone(), index);
        items.push(item);
    }

    (items, errors)
}

fn string_field(
    obj: &serde_json::Map<String, Value>,
    field: &'static str,
    index: usize,
    errors: &mut Vec<ValidationError>,
) -> Option<String> {
    match obj.get(field) {
        None | Some(Value::Null) => {
            errors.push(ValidationError::MissingField { index, field });
            None
        }
        Some(Value::String(s)) if s.trim().is_empty() => {
            errors.push(ValidationError::EmptyField { index, field });
            None
        }
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            errors.push(ValidationError::WrongType { index, field });
            None
        }
    }
}
