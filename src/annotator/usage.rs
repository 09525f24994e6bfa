//! Per-attempt call records through the UsageSink trait.
//!
//! The client reports every provider attempt through a UsageSink, which
//! decouples telemetry from storage: the CLI uses StderrUsageSink, tests
//! use NoopUsageSink.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Outcome of one provider attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    Success,
    Error,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Success => "success",
            CallStatus::Error => "error",
        }
    }
}

/// Record of one provider attempt.
#[derive(Debug, Clone)]
pub struct CallRecord {
    /// Model used.
    pub model: String,
    /// API endpoint path, e.g. "/chat/completions".
    pub endpoint: &'static str,
    /// 1-based attempt number within the call.
    pub attempt: u32,
    /// Latency in milliseconds.
    pub latency_ms: i32,
    pub status: CallStatus,
    /// Error code if status is Error.
    pub error_code: Option<String>,
    /// Batch run this call belongs to, if any.
    pub run_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
}

impl CallRecord {
    pub fn new(model: impl Into<String>, endpoint: &'static str, attempt: u32) -> Self {
        Self {
            model: model.into(),
            endpoint,
            attempt,
            latency_ms: 0,
            status: CallStatus::Success,
            error_code: None,
            run_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn latency(mut self, ms: i32) -> Self {
        self.latency_ms = ms;
        self
    }

    pub fn run(mut self, run_id: Option<Uuid>) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn error(mut self, code: impl Into<String>) -> Self {
        self.status = CallStatus::Error;
        self.error_code = Some(code.into());
        self
    }
}

/// Recording seam for provider attempts. Failures to record should be
/// swallowed, never propagated into the annotation path.
#[async_trait]
pub trait UsageSink: Send + Sync {
    async fn record(&self, record: CallRecord);
}

/// Discards all records.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopUsageSink;

#[async_trait]
impl UsageSink for NoopUsageSink {
    async fn record(&self, _record: CallRecord) {}
}

/// Writes one JSON line per attempt to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrUsageSink;

#[async_trait]
impl UsageSink for StderrUsageSink {
    async fn record(&self, record: CallRecord) {
        eprintln!(
            r#"{{"model":"{}","endpoint":"{}","attempt":{},"latency_ms":{},"status":"{}","error":{}}}"#,
            record.model,
            record.endpoint,
            record.attempt,
            record.latency_ms,
            record.status.as_str(),
            record
                .error_code
                .as_deref()
                .map(|c| format!("\"{c}\""))
                .unwrap_or_else(|| "null".into()),
        );
    }
}
