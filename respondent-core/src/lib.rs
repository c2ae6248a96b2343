//! # respondent-core — question/answer evaluation pipeline
//!
//! Converts spreadsheet question/answer sets into scored evaluation
//! batches: Excel → JSON records → generated model responses → per-item
//! scores → summary report.
//!
//! Modules, leaf first:
//! - [`dataset`] — the shared record model and JSON file IO
//! - [`metrics`] — pure scoring heuristics (accuracy, completeness, relevance)
//! - [`evaluator`] — batch scoring and summary statistics
//! - [`validate`] — schema checks for records entering the pipeline
//! - [`convert`] — spreadsheet ingestion
//! - [`generator`] — remote answer generation with retry and a bounded pool
//! - [`workflow`] — end-to-end orchestration
//!
//! The scoring core never touches storage or the network directly; the
//! [`workflow`] orchestrator wires in file paths and the configured
//! [`generator::AnswerGenerator`].

pub mod config;
pub mod convert;
pub mod dataset;
pub mod error;
pub mod evaluator;
pub mod generator;
pub mod metrics;
pub mod validate;
pub mod workflow;

pub use config::{PipelineConfig, RetryConfig, ValidationPolicy};
pub use dataset::{EvaluationBatch, EvaluationItem, ItemStatus, ScoreSet};
pub use error::{EvalError, GenerationError, ValidationError};
pub use evaluator::{SkippedItem, SummaryStats};
pub use generator::{AnswerGenerator, HttpGenerator};
pub use workflow::{RunOutput, StepSelection, Workflow};
