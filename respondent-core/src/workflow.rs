//! End-to-end pipeline orchestration: convert → validate → generate →
//! evaluate → report.
//!
//! The orchestrator owns all the glue the scoring core must not touch:
//! file paths, step selection, the validation policy, and cancellation.
//! Scored items are persisted before the summary is computed so a failing
//! summary step never loses per-item results.

use crate::config::{PipelineConfig, ValidationPolicy};
use crate::convert;
use crate::dataset::{self, EvaluationBatch, EvaluationItem};
use crate::error::EvalError;
use crate::evaluator::{self, SummaryStats};
use crate::generator::{AnswerGenerator, generate_batch};
use crate::validate;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Which pipeline steps to run. Skipping a step feeds the input records
/// straight into the next one.
#[derive(Debug, Clone, Copy)]
pub struct StepSelection {
    pub convert: bool,
    pub generate: bool,
    pub evaluate: bool,
}

impl Default for StepSelection {
    fn default() -> Self {
        Self {
            convert: true,
            generate: true,
            evaluate: true,
        }
    }
}

impl StepSelection {
    /// Offline scoring of already-generated records.
    pub fn evaluate_only() -> Self {
        Self {
            convert: false,
            generate: false,
            evaluate: true,
        }
    }
}

/// Artifacts produced by a pipeline run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Scored (or generated) items.
    pub items_path: PathBuf,
    /// Summary report.
    pub report_path: PathBuf,
    pub summary: SummaryStats,
}

/// Sequences the pipeline stages over one input file.
pub struct Workflow {
    config: PipelineConfig,
    generator: Option<Arc<dyn AnswerGenerator>>,
}

impl Workflow {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            generator: None,
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn AnswerGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Run the selected steps over `input`, writing outputs next to it (or
    /// under `output_dir` when given).
    pub async fn run(
        &self,
        input: &Path,
        output_dir: Option<&Path>,
        steps: StepSelection,
        cancel: &CancellationToken,
    ) -> Result<RunOutput, EvalError> {
        let started = Instant::now();
        tracing::info!(input = %input.display(), "starting evaluation workflow");

        let items = if steps.convert && is_spreadsheet(input) {
            tracing::info!("step 1: converting spreadsheet to records");
            let items = convert::convert_workbook(input, None)?;
            let converted_path = place(dataset::input_json_path(input), output_dir);
            dataset::write_items(&converted_path, &items)?;
            tracing::info!(path = %converted_path.display(), "wrote converted records");
            items
        } else {
            tracing::info!("step 1: loading and validating JSON records");
            let raw = dataset::load_raw(input)?;
            self.validated(&raw)?
        };
        if items.is_empty() {
            return Err(EvalError::empty_batch("input contains no records"));
        }
        tracing::info!(count = items.len(), "records loaded");

        let items = if steps.generate {
            let Some(generator) = &self.generator else {
                return Err(EvalError::config(
                    "generation step requires a configured generator",
                ));
            };
            tracing::info!(workers = self.config.workers, "step 2: generating model responses");
            generate_batch(items, generator.clone(), &self.config, cancel).await
        } else {
            tracing::info!("step 2: generation skipped");
            items
        };

        let batch = if steps.evaluate {
            tracing::info!("step 3: scoring generated answers");
            evaluator::evaluate_batch(EvaluationBatch::new(items), self.config.workers).await
        } else {
            tracing::info!("step 3: evaluation skipped");
            EvaluationBatch::new(items)
        };

        // Per-item results land on disk before the summary is attempted.
        let items_path = place(dataset::output_path(input), output_dir);
        dataset::write_items(&items_path, &batch.items)?;

        let summary = evaluator::summarize(&batch, self.config.pass_threshold)?;
        let report_path = place(dataset::report_path(input), output_dir);
        dataset::write_json(&report_path, &summary)?;

        for skipped in &summary.skipped {
            tracing::warn!(id = %skipped.id, reason = %skipped.reason, "item skipped");
        }
        tracing::info!(
            elapsed_secs = started.elapsed().as_secs_f64(),
            total = summary.total_items,
            scored = summary.scored_items,
            skipped = summary.skipped_items,
            pass = summary.pass_count,
            items = %items_path.display(),
            report = %report_path.display(),
            "workflow completed"
        );

        Ok(RunOutput {
            items_path,
            report_path,
            summary,
        })
    }

    fn validated(&self, raw: &[serde_json::Value]) -> Result<Vec<EvaluationItem>, EvalError> {
        match self.config.validation_policy {
            ValidationPolicy::Abort => {
                validate::validate_batch(raw).map_err(|errors| {
                    for err in &errors {
                        tracing::error!(error = %err, "validation error");
                    }
                    EvalError::Validation(errors)
                })
            }
            ValidationPolicy::DropInvalid => {
                let (items, errors) = validate::validate_batch_lenient(raw);
                for err in &errors {
                    tracing::warn!(error = %err, "dropping invalid record");
                }
                Ok(items)
            }
        }
    }
}

fn is_spreadsheet(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .as_deref(),
        Some("xlsx") | Some("xls") | Some("xlsb") | Some("ods")
    )
}

/// Re-root a derived output path under `output_dir` when one is given.
fn place(path: PathBuf, output_dir: Option<&Path>) -> PathBuf {
    match (output_dir, path.file_name()) {
        (Some(dir), Some(name)) => dir.join(name),
        _ => path,
    }
}
