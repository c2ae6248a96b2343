//! Remote answer generation: client trait, HTTP implementation, retry with
//! exponential backoff, and a bounded-concurrency batch driver.
//!
//! Generation failures are local to one item: an exhausted retry budget or
//! a permanent rejection marks that item skipped and the batch continues.

use crate::config::{PipelineConfig, RetryConfig};
use crate::dataset::{EvaluationItem, ItemStatus};
use crate::error::GenerationError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Supplies the actual answer for a question via a remote model endpoint.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(&self, question: &str) -> Result<String, GenerationError>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    question: &'a str,
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    answer: String,
}

/// HTTP client for a JSON generation endpoint.
///
/// Sends `{ "question": ..., "model": ... }` and expects
/// `{ "answer": ... }` back. Status codes map onto the error taxonomy:
/// 429 and 5xx are transient, other non-success codes are permanent.
pub struct HttpGenerator {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    timeout: Duration,
}

impl HttpGenerator {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        request_timeout_secs: u64,
    ) -> Result<Self, GenerationError> {
        let timeout = Duration::from_secs(request_timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError::Connection {
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            model: model.into(),
            timeout,
        })
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self, GenerationError> {
        Self::new(
            config.endpoint.clone(),
            config.model.clone(),
            config.request_timeout_secs,
        )
    }
}

#[async_trait]
impl AnswerGenerator for HttpGenerator {
    async fn generate(&self, question: &str) -> Result<String, GenerationError> {
        let request = GenerateRequest {
            question,
            model: &self.model,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout {
                        timeout_secs: self.timeout.as_secs(),
                    }
                } else {
                    GenerationError::Connection {
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(1);
            return Err(GenerationError::RateLimited { retry_after_secs });
        }
        if status.is_server_error() {
            return Err(GenerationError::Server {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        if !status.is_success() {
            return Err(GenerationError::Rejected {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let body: GenerateResponse =
            response
                .json()
                .await
                .map_err(|e| GenerationError::ResponseParse {
                    message: e.to_string(),
                })?;
        Ok(body.answer)
    }
}

/// Execute an async operation with exponential backoff retry on transient
/// errors. Permanent errors return immediately.
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, operation: F) -> Result<T, GenerationError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, GenerationError>>,
{
    let mut last_err = None;
    for attempt in 0..=config.max_retries {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(e) => {
                if !e.is_transient() || attempt == config.max_retries {
                    return Err(e);
                }
                let backoff_ms = compute_backoff(config, attempt, &e);
                tracing::warn!(
                    attempt = attempt + 1,
                    max = config.max_retries,
                    backoff_ms,
                    error = %e,
                    "retrying after transient error"
                );
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| GenerationError::Connection {
        message: "all retry attempts exhausted".to_string(),
    }))
}

/// Backoff delay, respecting a rate-limit retry-after hint when present.
fn compute_backoff(config: &RetryConfig, attempt: u32, err: &GenerationError) -> u64 {
    if let GenerationError::RateLimited { retry_after_secs } = err {
        // the parsed header value is unbounded; saturate instead of
        // overflowing
        let server_ms = retry_after_secs.saturating_mul(1000);
        return server_ms.max(exponential_backoff(config, attempt));
    }
    exponential_backoff(config, attempt)
}

fn exponential_backoff(config: &RetryConfig, attempt: u32) -> u64 {
    let base = config.initial_backoff_ms as f64 * config.backoff_multiplier.powi(attempt as i32);
    let capped = base.min(config.max_backoff_ms as f64) as u64;
    if config.jitter {
        // up to 25% jitter to spread concurrent retries
        let jitter = (capped as f64 * 0.25 * rand::random::<f64>()) as u64;
        capped + jitter
    } else {
        capped
    }
}

/// Fill `actual_answer` for every pending item, bounded by
/// `config.workers` concurrent requests.
///
/// Output order matches input order regardless of completion order: each
/// task writes its result back into the slot it was issued from. A
/// cancelled token stops new requests from starting; in-flight requests
/// finish and their results are kept, while never-started items are marked
/// skipped rather than reported as complete.
pub async fn generate_batch(
    items: Vec<EvaluationItem>,
    generator: Arc<dyn AnswerGenerator>,
    config: &PipelineConfig,
    cancel: &CancellationToken,
) -> Vec<EvaluationItem> {
    let semaphore = Arc::new(tokio::sync::Semaphore::new(config.workers.max(1)));
    // Pre-sized, index-addressed result slots; originals stay in place as
    // the fallback if a task fails.
    let mut results: Vec<EvaluationItem> = items.clone();
    let mut handles = Vec::new();

    for (idx, item) in items.into_iter().enumerate() {
        if item.actual_answer.is_some() || item.status.is_skipped() {
            continue;
        }
        let generator = generator.clone();
        let retry = config.retry.clone();
        let sem = semaphore.clone();
        let cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            let _permit = sem.acquire().await.ok();
            if cancel.is_cancelled() {
                let mut item = item;
                item.status = ItemStatus::Skipped("cancelled before generation".to_string());
                return item;
            }

            let mut item = item;
            let question = item.question.clone();
            let outcome = with_retry(&retry, || generator.generate(&question)).await;
            match outcome {
                Ok(answer) => {
                    tracing::debug!(id = %item.id, "generated answer");
                    item.actual_answer = Some(answer);
                }
                Err(e) => {
                    tracing::warn!(id = %item.id, error = %e, "generation failed, item skipped");
                    item.status = ItemStatus::Skipped(format!("generation failed: {e}"));
                }
            }
            item
        });
        handles.push((idx, handle));
    }

    for (idx, handle) in handles {
        match handle.await {
            Ok(item) => results[idx] = item,
            Err(e) => {
                tracing::error!(id = %results[idx].id, error = %e, "generation task failed");
                results[idx].status = ItemStatus::Skipped(format!("generation task failed: {e}"));
            }
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Test double with a programmable per-call script.
    struct ScriptedGenerator {
        calls: AtomicU32,
        fail_first: u32,
        transient: bool,
        delay_ms: u64,
    }

    impl ScriptedGenerator {
        fn ok() -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail_first: 0,
                transient: true,
                delay_ms: 0,
            }
        }

        fn failing(fail_first: u32, transient: bool) -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail_first,
                transient,
                delay_ms: 0,
            }
        }
    }

    #[async_trait]
    impl AnswerGenerator for ScriptedGenerator {
        async fn generate(&self, question: &str) -> Result<String, GenerationError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.delay_ms > 0 {
                // pseudo-random per-question delay so completion order
                // differs from issue order
                let jitter = question.len() as u64 * 7 % self.delay_ms;
                tokio::time::sleep(Duration::from_millis(jitter)).await;
            }
            if call < self.fail_first {
                if self.transient {
                    return Err(GenerationError::Connection {
                        message: "flaky".into(),
                    });
                }
                return Err(GenerationError::Rejected {
                    status: 400,
                    message: "bad request".into(),
                });
            }
            Ok(format!("answer to: {question}"))
        }
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            initial_backoff_ms: 1,
            backoff_multiplier: 1.0,
            max_backoff_ms: 5,
            jitter: false,
        }
    }

    fn test_config() -> PipelineConfig {
        PipelineConfig {
            workers: 4,
            retry: fast_retry(),
            ..PipelineConfig::default()
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failures() {
        let generator = ScriptedGenerator::failing(2, true);
        let answer = with_retry(&fast_retry(), || generator.generate("Q?"))
            .await
            .unwrap();
        assert_eq!(answer, "answer to: Q?");
        assert_eq!(generator.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let generator = ScriptedGenerator::failing(10, false);
        let err = with_retry(&fast_retry(), || generator.generate("Q?"))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Rejected { status: 400, .. }));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_return_last_error() {
        let generator = ScriptedGenerator::failing(10, true);
        let err = with_retry(&fast_retry(), || generator.generate("Q?"))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Connection { .. }));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_backoff_growth_and_cap() {
        let config = RetryConfig {
            max_retries: 5,
            initial_backoff_ms: 100,
            backoff_multiplier: 2.0,
            max_backoff_ms: 300,
            jitter: false,
        };
        assert_eq!(exponential_backoff(&config, 0), 100);
        assert_eq!(exponential_backoff(&config, 1), 200);
        assert_eq!(exponential_backoff(&config, 2), 300);
        assert_eq!(exponential_backoff(&config, 3), 300);
    }

    #[test]
    fn test_backoff_respects_rate_limit_hint() {
        let config = RetryConfig {
            jitter: false,
            ..fast_retry()
        };
        let err = GenerationError::RateLimited { retry_after_secs: 2 };
        assert_eq!(compute_backoff(&config, 0, &err), 2000);
    }

    #[test]
    fn test_backoff_saturates_on_huge_rate_limit_hint() {
        let config = RetryConfig {
            jitter: false,
            ..fast_retry()
        };
        let err = GenerationError::RateLimited {
            retry_after_secs: u64::MAX,
        };
        assert_eq!(compute_backoff(&config, 0, &err), u64::MAX);
    }

    #[tokio::test]
    async fn test_generate_batch_preserves_input_order() {
        let items: Vec<EvaluationItem> = (0..20)
            .map(|i| EvaluationItem::new(format!("item-{i}"), "q".repeat(i + 1), "expected"))
            .collect();
        let generator = Arc::new(ScriptedGenerator {
            delay_ms: 20,
            ..ScriptedGenerator::ok()
        });
        let cancel = CancellationToken::new();
        let out = generate_batch(items, generator, &test_config(), &cancel).await;
        let ids: Vec<String> = out.iter().map(|i| i.id.clone()).collect();
        let expected: Vec<String> = (0..20).map(|i| format!("item-{i}")).collect();
        assert_eq!(ids, expected);
        assert!(out.iter().all(|i| i.actual_answer.is_some()));
    }

    #[tokio::test]
    async fn test_failed_item_is_skipped_batch_continues() {
        // first question fails permanently, the rest succeed
        let items = vec![
            EvaluationItem::new("bad", "q-bad", "expected"),
            EvaluationItem::new("good", "q-good", "expected"),
        ];
        let generator = Arc::new(ScriptedGenerator::failing(1, false));
        let cancel = CancellationToken::new();
        let config = PipelineConfig {
            workers: 1,
            retry: fast_retry(),
            ..PipelineConfig::default()
        };
        let out = generate_batch(items, generator, &config, &cancel).await;
        assert!(out[0].status.is_skipped());
        assert!(out[0].actual_answer.is_none());
        assert_eq!(out[1].actual_answer.as_deref(), Some("answer to: q-good"));
    }

    #[tokio::test]
    async fn test_already_answered_items_are_not_regenerated() {
        let mut item = EvaluationItem::new("1", "Q?", "expected");
        item.actual_answer = Some("existing".into());
        let generator = Arc::new(ScriptedGenerator::ok());
        let cancel = CancellationToken::new();
        let out = generate_batch(vec![item], generator.clone(), &test_config(), &cancel).await;
        assert_eq!(out[0].actual_answer.as_deref(), Some("existing"));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancellation_skips_unstarted_items() {
        let items: Vec<EvaluationItem> = (0..5)
            .map(|i| EvaluationItem::new(format!("item-{i}"), "Q?", "expected"))
            .collect();
        let generator = Arc::new(ScriptedGenerator::ok());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let out = generate_batch(items, generator.clone(), &test_config(), &cancel).await;
        assert!(out.iter().all(|i| i.status.is_skipped()));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }
}
