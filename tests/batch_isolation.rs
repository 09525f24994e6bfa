use std::sync::Arc;
use std::time::Duration;

use cira_harness::annotator::{
    AnnotationClient, AnnotatorConfig, ApiFlavor, NoopUsageSink, ProviderAdapter,
};
use cira_harness::batch::{annotate_batch, BatchOptions};
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn one_failing_sentence_never_aborts_the_batch() {
    let server = MockServer::start().await;

    // Requests carrying the poisoned sentence always fail.
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("poisoned"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "{\"label\": 1, \"confidence\": 0.9}"}}]
        })))
        .mount(&server)
        .await;

    let adapter =
        ProviderAdapter::with_config("sk-test", server.uri(), Duration::from_secs(5)).unwrap();
    let client = AnnotationClient::with_config(
        adapter,
        Arc::new(NoopUsageSink),
        AnnotatorConfig {
            model: "test-model".into(),
            flavor: ApiFlavor::ChatCompletions,
            max_attempts: 2,
            retry_unit_delay: Duration::ZERO,
            ..Default::default()
        },
    );

    let sentences = vec![
        "Load causes latency.".to_string(),
        "This one is poisoned.".to_string(),
        "Heat causes expansion.".to_string(),
    ];
    let outcome = annotate_batch(&client, &sentences, &BatchOptions::default()).await;

    assert_eq!(outcome.results.len(), 2);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].index, 1);
    assert!(outcome.failures[0].error.contains("500"));
    // The failed sentence produced no row at all, no fabricated label.
    assert!(outcome.results.iter().all(|r| !r.text.contains("poisoned")));

    // Two successes, plus two attempts for the poisoned sentence.
    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 4);
}
