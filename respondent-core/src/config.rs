//! Pipeline configuration.
//!
//! All options are explicit struct fields passed in at construction time;
//! the core never reads environment variables or other ambient state.

use crate::error::EvalError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration for a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Remote generation endpoint URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Model identifier forwarded to the generation endpoint.
    #[serde(default = "default_model")]
    pub model: String,
    /// Maximum concurrent workers for generation and scoring.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Overall-score cutoff for counting passing items.
    #[serde(default = "default_pass_threshold")]
    pub pass_threshold: f64,
    /// Per-request timeout for generation calls (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// What to do when input records fail schema validation.
    #[serde(default)]
    pub validation_policy: ValidationPolicy,
    /// Retry behavior for transient generation failures.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            workers: default_workers(),
            pass_threshold: default_pass_threshold(),
            request_timeout_secs: default_request_timeout(),
            validation_policy: ValidationPolicy::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a TOML file. Missing fields take defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self, EvalError> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| EvalError::config(format!("{}: {e}", path.display())))
    }
}

fn default_endpoint() -> String {
    "http://localhost:8080/generate".to_string()
}

fn default_model() -> String {
    "default".to_string()
}

fn default_workers() -> usize {
    5
}

fn default_pass_threshold() -> f64 {
    7.0
}

fn default_request_timeout() -> u64 {
    30
}

/// How the orchestrator reacts to validation errors in the input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationPolicy {
    /// Any validation error fails the run.
    #[default]
    Abort,
    /// Offending records are dropped (and logged); the run continues.
    DropInvalid,
}

/// Exponential backoff settings for transient generation failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_backoff_ms: default_max_backoff_ms(),
            jitter: true,
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    2000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.workers, 5);
        assert_eq!(config.pass_threshold, 7.0);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.validation_policy, ValidationPolicy::Abort);
        assert_eq!(config.retry.max_retries, 3);
        assert!(config.retry.jitter);
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = PipelineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.workers, config.workers);
        assert_eq!(parsed.retry.initial_backoff_ms, config.retry.initial_backoff_ms);
    }

    #[test]
    fn test_partial_toml_takes_defaults() {
        let config: PipelineConfig = toml::from_str(
            r#"
            endpoint = "https://eval.internal/generate"
            workers = 8
            validation_policy = "drop_invalid"
            "#,
        )
        .unwrap();
        assert_eq!(config.endpoint, "https://eval.internal/generate");
        assert_eq!(config.workers, 8);
        assert_eq!(config.validation_policy, ValidationPolicy::DropInvalid);
        assert_eq!(config.pass_threshold, 7.0);
        assert_eq!(config.retry.max_retries, 3);
    }
}
