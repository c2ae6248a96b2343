//! Applies the scoring metrics over a batch and derives summary statistics.
//!
//! Items are independent, so batch scoring runs on a bounded worker pool;
//! output order always matches input order regardless of completion order.
//! A single unscorable item is marked skipped and never aborts the batch.

use crate::dataset::{EvaluationBatch, EvaluationItem, ItemStatus, ScoreSet};
use crate::error::EvalError;
use crate::metrics::{self, DimensionStats};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Aggregate statistics over a scored batch.
///
/// Always derived from the item sequence; `total_items` counts every item
/// while the means and `pass_count` cover scored items only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryStats {
    pub total_items: usize,
    pub scored_items: usize,
    pub skipped_items: usize,
    pub mean_accuracy: f64,
    pub mean_completeness: f64,
    pub mean_relevance: f64,
    pub mean_overall: f64,
    /// Scored items with `overall >= pass_threshold`.
    pub pass_count: usize,
    pub pass_threshold: f64,
    /// Every skipped item with the reason it was excluded. Never silently
    /// dropped from the report.
    pub skipped: Vec<SkippedItem>,
    /// Per-dimension mean/median/min/max/std over scored items.
    pub dimensions: BTreeMap<String, DimensionStats>,
    /// Count of scores rounding to each integer bin 0..=10, per dimension.
    pub distribution: BTreeMap<String, Vec<usize>>,
    pub generated_at: DateTime<Utc>,
}

/// One skipped item and why it was excluded from the means.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedItem {
    pub id: String,
    pub reason: String,
}

/// Score a single item, returning a new value with `scores` and `status`
/// filled in.
///
/// A missing actual answer or an empty expected answer marks the item
/// skipped with a reason instead of failing; an item already skipped by an
/// earlier stage keeps its original reason.
pub fn evaluate_item(item: &EvaluationItem) -> EvaluationItem {
    let mut out = item.clone();
    if out.status.is_skipped() {
        return out;
    }
    if out.expected_answer.trim().is_empty() {
        out.scores = None;
        out.status = ItemStatus::Skipped("empty expected_answer".to_string());
        return out;
    }
    let Some(actual) = out.actual_answer.as_deref() else {
        out.status = ItemStatus::Skipped("missing actual_answer".to_string());
        return out;
    };
    out.scores = Some(metrics::score_pair(&out.expected_answer, actual));
    out.status = ItemStatus::Scored;
    out
}

/// Score every item in the batch on a bounded worker pool.
///
/// Output length and order always equal the input's; a failed scoring task
/// leaves its item in place marked skipped rather than dropping it.
pub async fn evaluate_batch(batch: EvaluationBatch, workers: usize) -> EvaluationBatch {
    let semaphore = Arc::new(tokio::sync::Semaphore::new(workers.max(1)));
    // Original items stay in place as the fallback for a failed task.
    let mut results = batch.items.clone();
    let mut handles = Vec::with_capacity(results.len());

    for item in batch.items {
        let sem = semaphore.clone();
        handles.push(tokio::spawn(async move {
            let _permit = sem.acquire().await.ok();
            evaluate_item(&item)
        }));
    }

    // Awaiting the handles in spawn order keeps the output ordering equal
    // to the input ordering regardless of completion order.
    for (idx, handle) in handles.into_iter().enumerate() {
        settle(&mut results, idx, handle.await);
    }
    tracing::debug!(total = results.len(), "batch scoring complete");
    EvaluationBatch::new(results)
}

/// Fold one scoring-task outcome back into its slot. The slot keeps the
/// original record marked skipped when the task failed, so the summary
/// still accounts for every input item.
fn settle(
    results: &mut [EvaluationItem],
    idx: usize,
    outcome: Result<EvaluationItem, tokio::task::JoinError>,
) {
    match outcome {
        Ok(item) => results[idx] = item,
        Err(e) => {
            tracing::error!(id = %results[idx].id, error = %e, "scoring task failed");
            results[idx].status = ItemStatus::Skipped(format!("scoring task failed: {e}"));
        }
    }
}

/// Per-dimension statistics and integer-bin distributions over the scored
/// items of a batch.
pub fn detailed_stats(
    batch: &EvaluationBatch,
) -> (BTreeMap<String, DimensionStats>, BTreeMap<String, Vec<usize>>) {
    let scored: Vec<&ScoreSet> = batch.items.iter().filter_map(|i| i.scores.as_ref()).collect();
    let columns: [(&str, Vec<f64>); 4] = [
        ("accuracy", scored.iter().map(|s| s.accuracy).collect()),
        ("completeness", scored.iter().map(|s| s.completeness).collect()),
        ("relevance", scored.iter().map(|s| s.relevance).collect()),
        ("overall", scored.iter().map(|s| s.overall).collect()),
    ];

    let mut dimensions = BTreeMap::new();
    let mut distributions = BTreeMap::new();
    for (name, values) in columns {
        if let Some(stats) = DimensionStats::from_scores(&values) {
            dimensions.insert(name.to_string(), stats);
        }
        distributions.insert(name.to_string(), metrics::distribution(&values));
    }
    (dimensions, distributions)
}

/// Compute the summary report for a batch.
///
/// Fails with [`EvalError::EmptyBatch`] when the batch holds no items or no
/// scored items, since the means would be undefined.
pub fn summarize(batch: &EvaluationBatch, pass_threshold: f64) -> Result<SummaryStats, EvalError> {
    if batch.is_empty() {
        return Err(EvalError::empty_batch("batch contains no items"));
    }

    let skipped: Vec<SkippedItem> = batch
        .items
        .iter()
        .filter_map(|item| match &item.status {
            ItemStatus::Skipped(reason) => Some(SkippedItem {
                id: item.id.clone(),
                reason: reason.clone(),
            }),
            _ => None,
        })
        .collect();

    let scored: Vec<&ScoreSet> = batch.items.iter().filter_map(|i| i.scores.as_ref()).collect();
    if scored.is_empty() {
        return Err(EvalError::empty_batch("batch contains no scored items"));
    }

    let n = scored.len() as f64;
    let mean_accuracy = scored.iter().map(|s| s.accuracy).sum::<f64>() / n;
    let mean_completeness = scored.iter().map(|s| s.completeness).sum::<f64>() / n;
    let mean_relevance = scored.iter().map(|s| s.relevance).sum::<f64>() / n;
    let mean_overall = scored.iter().map(|s| s.overall).sum::<f64>() / n;
    let pass_count = scored.iter().filter(|s| s.overall >= pass_threshold).count();
    let (dimensions, distribution) = detailed_stats(batch);

    Ok(SummaryStats {
        total_items: batch.len(),
        scored_items: scored.len(),
        skipped_items: skipped.len(),
        mean_accuracy,
        mean_completeness,
        mean_relevance,
        mean_overall,
        pass_count,
        pass_threshold,
        skipped,
        dimensions,
        distribution,
        generated_at: Utc::now(),
    })
}
