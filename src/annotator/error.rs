//! Error types for the annotation client.

use thiserror::Error;

/// How many characters of a reply body are kept for diagnostics.
const BODY_SNIPPET_LEN: usize = 300;

/// Truncate a reply body to the diagnostic snippet length.
pub fn body_snippet(body: &str) -> String {
    body.chars().take(BODY_SNIPPET_LEN).collect()
}

/// Errors from obtaining one causal judgment.
#[derive(Debug, Error)]
pub enum AnnotationError {
    /// Configuration error (missing credential, bad base URL). Terminal,
    /// raised before any request is sent.
    #[error("configuration error: {0}")]
    Config(String),

    /// Provider returned a non-success HTTP status. Retried.
    #[error("provider returned HTTP {status}: {body_snippet}")]
    Status { status: u16, body_snippet: String },

    /// Reply arrived but no extraction strategy applied, or the extracted
    /// text was not the expected JSON object. Retried. Keeps the HTTP
    /// status the reply came with.
    #[error("malformed reply (HTTP {status}): {reason} (body: {body_snippet})")]
    Malformed {
        reason: String,
        status: u16,
        body_snippet: String,
    },

    /// HTTP/network error from the transport.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// All attempts exhausted. Carries the last observed status and body
    /// snippet so the failure can be reproduced.
    #[error("annotation failed after {attempts} attempts. status={last_status:?} body={body_snippet}")]
    Exhausted {
        attempts: u32,
        last_status: Option<u16>,
        body_snippet: String,
    },
}

impl AnnotationError {
    pub fn malformed(reason: impl Into<String>, status: u16, body: &str) -> Self {
        Self::Malformed {
            reason: reason.into(),
            status,
            body_snippet: body_snippet(body),
        }
    }

    pub fn status(status: u16, body: &str) -> Self {
        Self::Status {
            status,
            body_snippet: body_snippet(body),
        }
    }

    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status { .. } => true,
            Self::Malformed { .. } => true,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Config(_) => false,
            Self::Exhausted { .. } => false,
        }
    }

    /// Short error code for call records.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "config_error",
            Self::Status { .. } => "http_status",
            Self::Malformed { .. } => "malformed_reply",
            Self::Http(_) => "http_error",
            Self::Exhausted { .. } => "exhausted",
        }
    }

    /// HTTP status observed for this failure, if any.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Malformed { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::Exhausted { last_status, .. } => *last_status,
            Self::Config(_) => None,
        }
    }

    /// Diagnostic body snippet carried by this failure, if any.
    pub fn snippet(&self) -> Option<&str> {
        match self {
            Self::Status { body_snippet, .. }
            | Self::Malformed { body_snippet, .. }
            | Self::Exhausted { body_snippet, .. } => Some(body_snippet),
            _ => None,
        }
    }
}
