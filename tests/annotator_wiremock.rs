use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cira_harness::annotator::{
    AnnotationClient, AnnotationError, AnnotatorConfig, ApiFlavor, NoopUsageSink, ProviderAdapter,
};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn client(server: &MockServer, flavor: ApiFlavor, max_attempts: u32) -> AnnotationClient<NoopUsageSink> {
    let adapter =
        ProviderAdapter::with_config("sk-test", server.uri(), Duration::from_secs(5)).unwrap();
    AnnotationClient::with_config(
        adapter,
        Arc::new(NoopUsageSink),
        AnnotatorConfig {
            model: "test-model".into(),
            flavor,
            max_attempts,
            retry_unit_delay: Duration::ZERO,
            ..Default::default()
        },
    )
}

#[tokio::test]
async fn chat_completion_envelope_parses() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": { "content": "{\"label\": 1, \"confidence\": 0.85}" }
            }]
        })))
        .mount(&server)
        .await;

    let result = client(&server, ApiFlavor::ChatCompletions, 3)
        .call("Because of X, Y happens.")
        .await
        .unwrap();
    assert_eq!(result.label, 1);
    assert!((result.confidence - 0.85).abs() < 1e-12);
    assert_eq!(result.text, "Because of X, Y happens.");
}

#[tokio::test]
async fn responses_envelope_shapes_all_parse() {
    let bodies = vec![
        json!({"output_text": "{\"label\": 1, \"confidence\": 0.7}"}),
        json!({"output": {"text": "{\"label\": 1, \"confidence\": 0.7}"}}),
        json!({"output": {"choices": [{"message": {"content": [
            {"text": "{\"label\": 1, \"confidence\": 0.7}"}
        ]}}]}}),
        json!({"output": [
            {"type": "reasoning", "content": []},
            {"type": "message", "content": [{"text": "{\"label\": 1, \"confidence\": 0.7}"}]}
        ]}),
    ];

    for body in bodies {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/responses"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body.clone()))
            .mount(&server)
            .await;

        let result = client(&server, ApiFlavor::Responses, 3)
            .call("sentence")
            .await
            .unwrap_or_else(|e| panic!("envelope {body} failed: {e}"));
        assert_eq!(result.label, 1);
        assert!((result.confidence - 0.7).abs() < 1e-12);
    }
}

/// Responds with each template in turn, repeating the last.
struct SequenceResponder {
    calls: Arc<AtomicUsize>,
    responses: Vec<ResponseTemplate>,
}

impl Respond for SequenceResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses[n.min(self.responses.len() - 1)].clone()
    }
}

#[tokio::test]
async fn retries_transient_failures_and_returns_third_attempt() {
    let server = MockServer::start().await;

    let failure = ResponseTemplate::new(500).set_body_string("internal error");
    let success = ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{"message": {"content": "{\"label\": 0, \"confidence\": 0.6}"}}]
    }));

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(SequenceResponder {
            calls: Arc::new(AtomicUsize::new(0)),
            responses: vec![failure.clone(), failure, success],
        })
        .mount(&server)
        .await;

    let result = client(&server, ApiFlavor::ChatCompletions, 3)
        .call("sentence")
        .await
        .unwrap();
    assert_eq!(result.label, 0);

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 3);
}

#[tokio::test]
async fn exhausted_retries_carry_last_status_and_truncated_body() {
    let server = MockServer::start().await;
    let long_body = "x".repeat(1000);

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string(long_body))
        .mount(&server)
        .await;

    let err = client(&server, ApiFlavor::ChatCompletions, 3)
        .call("sentence")
        .await
        .unwrap_err();

    match &err {
        AnnotationError::Exhausted {
            attempts,
            last_status,
            body_snippet,
        } => {
            assert_eq!(*attempts, 3);
            assert_eq!(*last_status, Some(503));
            assert_eq!(body_snippet.len(), 300);
        }
        other => panic!("expected Exhausted, got {other:?}"),
    }
    let message = err.to_string();
    assert!(message.contains("503"), "message: {message}");

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 3);
}

#[tokio::test]
async fn malformed_success_bodies_also_exhaust() {
    let server = MockServer::start().await;

    // 200 with a payload no extraction strategy applies to: retried,
    // never silently defaulted.
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": "nothing here"})))
        .mount(&server)
        .await;

    let err = client(&server, ApiFlavor::ChatCompletions, 2)
        .call("sentence")
        .await
        .unwrap_err();

    match err {
        AnnotationError::Exhausted {
            attempts,
            last_status,
            ..
        } => {
            assert_eq!(attempts, 2);
            // The reply was HTTP 200; the status still travels with the
            // malformed-body diagnosis.
            assert_eq!(last_status, Some(200));
        }
        other => panic!("expected Exhausted, got {other:?}"),
    }

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 2);
}
