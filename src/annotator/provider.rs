//! HTTP adapter for the annotation provider.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use serde_json::Value;

use super::error::AnnotationError;
use super::extract::extract_reply_text;
use crate::prompts::render_sentence_prompt;

/// Maximum allowed response body length (1MB).
const MAX_RESPONSE_LEN: usize = 1_024 * 1_024;

/// Which API surface of the provider family to call. Both deliver the
/// same JSON judgment, wrapped in different envelope shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFlavor {
    /// Classic chat completions endpoint.
    ChatCompletions,
    /// Structured-output "responses" endpoint.
    Responses,
}

impl ApiFlavor {
    pub fn path(&self) -> &'static str {
        match self {
            ApiFlavor::ChatCompletions => "/chat/completions",
            ApiFlavor::Responses => "/responses",
        }
    }
}

/// One judgment request: the sentence plus the per-run model settings.
#[derive(Debug, Clone)]
pub struct JudgmentRequest {
    pub sentence: String,
    pub model: String,
    pub flavor: ApiFlavor,
    pub temperature: f32,
}

/// Normalized judgment extracted from a successful reply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Judgment {
    pub label: u8,
    pub confidence: f64,
}

/// Trait for judgment providers.
#[async_trait]
pub trait JudgmentProvider: Send + Sync {
    async fn judge(&self, req: &JudgmentRequest) -> Result<Judgment, AnnotationError>;
}

// =============================================================================
// ADAPTER
// =============================================================================

/// Provider API adapter.
#[derive(Debug, Clone)]
pub struct ProviderAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl ProviderAdapter {
    /// Create from API key with default base URL and timeout.
    pub fn new(api_key: impl Into<String>) -> Result<Self, AnnotationError> {
        Self::with_config(api_key, "https://api.openai.com/v1", Duration::from_secs(60))
    }

    /// Create from environment variables. The only place the environment
    /// is read; a missing credential is a configuration error before any
    /// request goes out.
    pub fn from_env() -> Result<Self, AnnotationError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| AnnotationError::Config("OPENAI_API_KEY not set".into()))?;

        let base_url = std::env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".into());

        let timeout = std::env::var("OPENAI_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(60));

        Self::with_config(api_key, base_url, timeout)
    }

    /// Create with custom configuration.
    pub fn with_config(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AnnotationError> {
        let api_key = api_key.into();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let auth_value = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| AnnotationError::Config("Invalid API key format".into()))?;
        headers.insert(AUTHORIZATION, auth_value);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .gzip(true)
            .build()
            .map_err(|e| AnnotationError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Serialize)]
struct ChatApiRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Serialize)]
struct ResponsesApiRequest<'a> {
    model: &'a str,
    input: String,
}

// =============================================================================
// JUDGMENT PROVIDER IMPL
// =============================================================================

#[async_trait]
impl JudgmentProvider for ProviderAdapter {
    async fn judge(&self, req: &JudgmentRequest) -> Result<Judgment, AnnotationError> {
        let prompt = render_sentence_prompt(&req.sentence);
        let url = format!("{}{}", self.base_url, req.flavor.path());

        let request = self.client.post(&url);
        let request = match req.flavor {
            ApiFlavor::ChatCompletions => request.json(&ChatApiRequest {
                model: &req.model,
                messages: vec![
                    ApiMessage {
                        role: "system",
                        content: prompt.system,
                    },
                    ApiMessage {
                        role: "user",
                        content: prompt.user,
                    },
                ],
                temperature: req.temperature,
                response_format: ResponseFormat {
                    format_type: "json_object",
                },
            }),
            ApiFlavor::Responses => request.json(&ResponsesApiRequest {
                model: &req.model,
                input: prompt.combined_input(),
            }),
        };

        let mut response = request.send().await?;
        let status = response.status();

        // Stream response to enforce size limit
        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            let new_len = bytes.len() + chunk.len();
            if new_len > MAX_RESPONSE_LEN {
                return Err(AnnotationError::malformed(
                    format!("response too large: {new_len} bytes"),
                    status.as_u16(),
                    "",
                ));
            }
            bytes.extend_from_slice(&chunk);
        }
        let body = String::from_utf8_lossy(&bytes).to_string();

        if !status.is_success() {
            return Err(AnnotationError::status(status.as_u16(), &body));
        }

        let payload: Value = serde_json::from_str(&body).map_err(|e| {
            AnnotationError::malformed(format!("invalid JSON: {e}"), status.as_u16(), &body)
        })?;

        let Some((_strategy, text)) = extract_reply_text(&payload) else {
            return Err(AnnotationError::malformed(
                "no extraction strategy applied",
                status.as_u16(),
                &body,
            ));
        };

        parse_judgment(&text)
            .map_err(|reason| AnnotationError::malformed(reason, status.as_u16(), &body))
    }
}

/// Parse and normalize the extracted judgment text.
///
/// The label must be integer-like and coerces to exactly 1 only when it
/// equals 1; negative or out-of-range values map to 0, not an error.
/// Confidence defaults to 0.5 when absent and is clamped to [0, 1].
fn parse_judgment(text: &str) -> Result<Judgment, String> {
    let obj: Value =
        serde_json::from_str(text.trim()).map_err(|e| format!("reply is not JSON: {e}"))?;

    let label_raw = obj
        .get("label")
        .and_then(integer_like)
        .ok_or("label missing or not integer-like")?;

    let confidence = match obj.get("confidence") {
        None | Some(Value::Null) => 0.5,
        Some(v) => numeric_like(v).ok_or("confidence not numeric")?,
    };

    Ok(Judgment {
        label: if label_raw == 1 { 1 } else { 0 },
        confidence: confidence.clamp(0.0, 1.0),
    })
}

/// Integer from a JSON number or numeric string, float-then-int.
fn integer_like(v: &Value) -> Option<i64> {
    if let Some(i) = v.as_i64() {
        return Some(i);
    }
    let f = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    f.is_finite().then_some(f.trunc() as i64)
}

fn numeric_like(v: &Value) -> Option<f64> {
    let f = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    f.is_finite().then_some(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn judgment_normalizes_label_and_confidence() {
        let j = parse_judgment(r#"{"label": 1, "confidence": 0.9}"#).unwrap();
        assert_eq!(j, Judgment { label: 1, confidence: 0.9 });

        // Out-of-range labels map to 0, never an error.
        assert_eq!(parse_judgment(r#"{"label": 2}"#).unwrap().label, 0);
        assert_eq!(parse_judgment(r#"{"label": -1}"#).unwrap().label, 0);
        assert_eq!(parse_judgment(r#"{"label": "1"}"#).unwrap().label, 1);
        assert_eq!(parse_judgment(r#"{"label": 1.0}"#).unwrap().label, 1);
    }

    #[test]
    fn missing_confidence_defaults_to_half() {
        let j = parse_judgment(r#"{"label": 0}"#).unwrap();
        assert_eq!(j.confidence, 0.5);
    }

    #[test]
    fn confidence_is_clamped() {
        assert_eq!(
            parse_judgment(r#"{"label": 1, "confidence": 1.7}"#).unwrap().confidence,
            1.0
        );
        assert_eq!(
            parse_judgment(r#"{"label": 1, "confidence": -0.2}"#).unwrap().confidence,
            0.0
        );
    }

    #[test]
    fn bad_shapes_are_errors() {
        assert!(parse_judgment("not json").is_err());
        assert!(parse_judgment(r#"{"confidence": 0.9}"#).is_err());
        assert!(parse_judgment(r#"{"label": "maybe"}"#).is_err());
        assert!(parse_judgment(r#"{"label": 1, "confidence": "high"}"#).is_err());
    }
}
