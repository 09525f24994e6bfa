//! Annotation client for binary causal judgments.
//!
//! Wraps the provider adapter with a linear-backoff retry loop and
//! per-attempt usage records. Calls are independent: no state is carried
//! between sentences, so a batch is safely reorderable.

pub mod error;
pub mod extract;
pub mod provider;
pub mod usage;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use tokio::time::sleep;
use uuid::Uuid;

pub use error::AnnotationError;
pub use extract::{extract_reply_text, ExtractionStrategy, STRATEGIES};
pub use provider::{ApiFlavor, Judgment, JudgmentProvider, JudgmentRequest, ProviderAdapter};
pub use usage::{CallRecord, CallStatus, NoopUsageSink, StderrUsageSink, UsageSink};

/// One successful judgment. Never created for a failed call.
#[derive(Debug, Clone, Serialize)]
pub struct AnnotationResult {
    pub text: String,
    pub label: u8,
    pub confidence: f64,
}

/// Client configuration, constructed once at the process boundary and
/// read-only for the rest of the run.
#[derive(Debug, Clone)]
pub struct AnnotatorConfig {
    pub model: String,
    pub flavor: ApiFlavor,
    pub temperature: f32,
    /// Total attempts per sentence, including the first.
    pub max_attempts: u32,
    /// Backoff unit: the delay after the k-th failed attempt is unit × k.
    pub retry_unit_delay: Duration,
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".into(),
            flavor: ApiFlavor::ChatCompletions,
            temperature: 0.2,
            max_attempts: 3,
            retry_unit_delay: Duration::from_secs(1),
        }
    }
}

/// Seam for batch drivers and tests.
#[async_trait]
pub trait SentenceAnnotator: Send + Sync {
    async fn annotate(&self, sentence: &str) -> Result<AnnotationResult, AnnotationError>;
}

/// Retrying annotation client.
pub struct AnnotationClient<U: UsageSink> {
    provider: ProviderAdapter,
    usage_sink: Arc<U>,
    config: AnnotatorConfig,
    run_id: Option<Uuid>,
}

#[async_trait]
impl<U: UsageSink> SentenceAnnotator for AnnotationClient<U> {
    async fn annotate(&self, sentence: &str) -> Result<AnnotationResult, AnnotationError> {
        self.call(sentence).await
    }
}

impl<U: UsageSink> AnnotationClient<U> {
    pub fn from_env(usage_sink: Arc<U>) -> Result<Self, AnnotationError> {
        let provider = ProviderAdapter::from_env()?;
        Ok(Self::with_config(provider, usage_sink, AnnotatorConfig::default()))
    }

    pub fn with_config(
        provider: ProviderAdapter,
        usage_sink: Arc<U>,
        config: AnnotatorConfig,
    ) -> Self {
        Self {
            provider,
            usage_sink,
            config,
            run_id: None,
        }
    }

    /// Tag subsequent call records with a batch run id.
    pub fn for_run(mut self, run_id: Uuid) -> Self {
        self.run_id = Some(run_id);
        self
    }

    /// Obtain one judgment for a sentence, retrying transient failures.
    ///
    /// A non-success status or malformed body retries up to
    /// `max_attempts` with linear backoff; exhaustion fails terminally
    /// with the last observed status and a truncated body for
    /// diagnostics. Configuration errors are returned immediately.
    pub async fn call(&self, sentence: &str) -> Result<AnnotationResult, AnnotationError> {
        let req = JudgmentRequest {
            sentence: sentence.to_string(),
            model: self.config.model.clone(),
            flavor: self.config.flavor,
            temperature: self.config.temperature,
        };

        let mut last: Option<AnnotationError> = None;
        for attempt in 1..=self.config.max_attempts {
            let start = Instant::now();
            let result = self.provider.judge(&req).await;
            let latency = start.elapsed().as_millis() as i32;

            match result {
                Ok(judgment) => {
                    self.usage_sink
                        .record(
                            CallRecord::new(&self.config.model, self.config.flavor.path(), attempt)
                                .latency(latency)
                                .run(self.run_id),
                        )
                        .await;
                    return Ok(AnnotationResult {
                        text: sentence.to_string(),
                        label: judgment.label,
                        confidence: judgment.confidence,
                    });
                }
                Err(err) => {
                    self.usage_sink
                        .record(
                            CallRecord::new(&self.config.model, self.config.flavor.path(), attempt)
                                .latency(latency)
                                .run(self.run_id)
                                .error(err.code()),
                        )
                        .await;

                    if !err.is_retryable() {
                        return Err(err);
                    }
                    if attempt < self.config.max_attempts {
                        sleep(backoff_delay(self.config.retry_unit_delay, attempt)).await;
                    }
                    last = Some(err);
                }
            }
        }

        let (last_status, body_snippet) = match last {
            Some(err) => (
                err.http_status(),
                err.snippet().unwrap_or_default().to_string(),
            ),
            None => (None, String::new()),
        };
        Err(AnnotationError::Exhausted {
            attempts: self.config.max_attempts,
            last_status,
            body_snippet,
        })
    }
}

/// Delay before the next attempt, after `failed_attempts` failures.
/// Pure so retry pacing is testable without sleeping.
pub fn backoff_delay(unit: Duration, failed_attempts: u32) -> Duration {
    unit * failed_attempts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_is_linear_in_attempts() {
        let unit = Duration::from_millis(250);
        assert_eq!(backoff_delay(unit, 1), Duration::from_millis(250));
        assert_eq!(backoff_delay(unit, 2), Duration::from_millis(500));
        assert_eq!(backoff_delay(unit, 3), Duration::from_millis(750));
        assert_eq!(backoff_delay(Duration::ZERO, 5), Duration::ZERO);
    }

    #[test]
    fn config_defaults_match_reference_policy() {
        let cfg = AnnotatorConfig::default();
        assert_eq!(cfg.max_attempts, 3);
        assert_eq!(cfg.retry_unit_delay, Duration::from_secs(1));
        assert_eq!(cfg.flavor, ApiFlavor::ChatCompletions);
    }
}
