//! Batch annotation driver.
//!
//! Feeds sentences to a [`SentenceAnnotator`] and assembles prediction
//! rows. A terminal failure for one sentence is recorded and skipped;
//! it never aborts the rest of the batch and never fabricates a label.

use std::time::Duration;

use futures::stream::{self, StreamExt};

use crate::annotator::{AnnotationResult, SentenceAnnotator};

/// Batch behavior knobs.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Only annotate the first N sentences.
    pub limit: Option<usize>,
    /// Fixed delay between calls. Only honored in sequential mode
    /// (`concurrency` <= 1); concurrent runs pace themselves on the
    /// provider's latency instead.
    pub sleep_between: Duration,
    /// Number of in-flight calls. 1 reproduces the sequential reference
    /// behavior.
    pub concurrency: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            limit: None,
            sleep_between: Duration::ZERO,
            concurrency: 1,
        }
    }
}

/// One sentence whose retries were exhausted.
#[derive(Debug, Clone)]
pub struct BatchFailure {
    /// Input row index, for reproducing the failure.
    pub index: usize,
    pub text: String,
    pub error: String,
}

/// Everything a batch run produced. Failed sentences appear only in
/// `failures`; results keep input order.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub results: Vec<AnnotationResult>,
    pub failures: Vec<BatchFailure>,
}

/// Annotate a batch of sentences. Blank sentences are skipped.
pub async fn annotate_batch(
    annotator: &dyn SentenceAnnotator,
    sentences: &[String],
    options: &BatchOptions,
) -> BatchOutcome {
    let take = options.limit.unwrap_or(usize::MAX);
    let work: Vec<(usize, &str)> = sentences
        .iter()
        .take(take)
        .enumerate()
        .map(|(i, s)| (i, s.trim()))
        .filter(|(_, s)| !s.is_empty())
        .collect();

    if options.concurrency <= 1 {
        sequential(annotator, &work, options).await
    } else {
        concurrent(annotator, &work, options.concurrency).await
    }
}

async fn sequential(
    annotator: &dyn SentenceAnnotator,
    work: &[(usize, &str)],
    options: &BatchOptions,
) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();
    for &(index, text) in work {
        match annotator.annotate(text).await {
            Ok(result) => outcome.results.push(result),
            Err(err) => {
                eprintln!("[annotate] error on row {index}: {err}");
                outcome.failures.push(BatchFailure {
                    index,
                    text: text.to_string(),
                    error: err.to_string(),
                });
            }
        }
        if options.sleep_between > Duration::ZERO {
            tokio::time::sleep(options.sleep_between).await;
        }
        if (index + 1) % 20 == 0 {
            eprintln!("[annotate] labeled {} sentences...", index + 1);
        }
    }
    outcome
}

async fn concurrent(
    annotator: &dyn SentenceAnnotator,
    work: &[(usize, &str)],
    concurrency: usize,
) -> BatchOutcome {
    let tasks = work.iter().map(|&(index, text)| async move {
        let result = annotator.annotate(text).await;
        if let Err(err) = &result {
            eprintln!("[annotate] error on row {index}: {err}");
        }
        (index, text, result)
    });

    let mut completed: Vec<_> = stream::iter(tasks)
        .buffer_unordered(concurrency)
        .collect()
        .await;
    // Restore input order so concurrent and sequential runs write the
    // same file.
    completed.sort_by_key(|(index, _, _)| *index);

    let mut outcome = BatchOutcome::default();
    for (index, text, result) in completed {
        match result {
            Ok(r) => outcome.results.push(r),
            Err(err) => outcome.failures.push(BatchFailure {
                index,
                text: text.to_string(),
                error: err.to_string(),
            }),
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotator::AnnotationError;
    use async_trait::async_trait;

    /// Fails any sentence containing "boom", succeeds otherwise.
    struct FlakyAnnotator;

    #[async_trait]
    impl SentenceAnnotator for FlakyAnnotator {
        async fn annotate(&self, sentence: &str) -> Result<AnnotationResult, AnnotationError> {
            if sentence.contains("boom") {
                return Err(AnnotationError::Exhausted {
                    attempts: 3,
                    last_status: Some(500),
                    body_snippet: "server error".into(),
                });
            }
            Ok(AnnotationResult {
                text: sentence.to_string(),
                label: 1,
                confidence: 0.8,
            })
        }
    }

    #[tokio::test]
    async fn failures_are_isolated_per_sentence() {
        let sentences = vec![
            "first".to_string(),
            "boom town".to_string(),
            "third".to_string(),
        ];
        let outcome =
            annotate_batch(&FlakyAnnotator, &sentences, &BatchOptions::default()).await;
        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].index, 1);
        // No fabricated label for the failed sentence.
        assert!(outcome.results.iter().all(|r| !r.text.contains("boom")));
    }

    #[tokio::test]
    async fn blank_sentences_and_limit_are_respected() {
        let sentences = vec![
            "one".to_string(),
            "   ".to_string(),
            "three".to_string(),
            "four".to_string(),
        ];
        let options = BatchOptions {
            limit: Some(3),
            ..Default::default()
        };
        let outcome = annotate_batch(&FlakyAnnotator, &sentences, &options).await;
        // Limit keeps rows 0..3; the blank row is skipped inside that.
        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.results[0].text, "one");
        assert_eq!(outcome.results[1].text, "three");
    }

    #[tokio::test]
    async fn concurrent_output_keeps_input_order() {
        let sentences: Vec<String> = (0..9).map(|i| format!("s{i}")).collect();
        let options = BatchOptions {
            concurrency: 4,
            ..Default::default()
        };
        let outcome = annotate_batch(&FlakyAnnotator, &sentences, &options).await;
        let texts: Vec<String> = outcome.results.iter().map(|r| r.text.clone()).collect();
        let expected: Vec<String> = (0..9).map(|i| format!("s{i}")).collect();
        assert_eq!(texts, expected);
    }
}
