//! Typed wire structures for backend requests and responses.
//!
//! Parse errors happen at the serde boundary, not scattered through parsing logic.
//! Every response field is optional with `#[serde(default)]` so that a backend
//! that adds or omits fields still decodes.

use docchat_types::{Citation, HistoryEntry, UNKNOWN_SOURCE_LABEL};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `POST /ask`.
#[derive(Debug, Clone, Serialize)]
pub struct AskRequest {
    pub question: String,
    pub use_cache: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<HistoryEntry>>,
}

impl AskRequest {
    #[must_use]
    pub fn new(question: impl Into<String>, use_cache: bool) -> Self {
        Self {
            question: question.into(),
            use_cache,
            history: None,
        }
    }

    #[must_use]
    pub fn with_history(mut self, history: Vec<HistoryEntry>) -> Self {
        self.history = Some(history);
        self
    }
}

/// One JSON record carried by a `data:` line of the answer stream.
#[derive(Debug, Default, Deserialize)]
pub struct AnswerRecord {
    /// Cumulative answer text so far.
    #[serde(default)]
    pub chunk: Option<String>,
    #[serde(default)]
    pub metadata: Option<Vec<SourceMetadata>>,
    /// Relevance scores aligned by index with `metadata`.
    #[serde(default)]
    pub scores: Option<Vec<Option<f64>>>,
    #[serde(default)]
    pub error: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SourceMetadata {
    #[serde(default)]
    pub source: Option<String>,
}

impl AnswerRecord {
    /// Error text if the record reports one.
    ///
    /// Empty strings, `null` and `false` do not count as errors.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        match self.error.as_ref()? {
            Value::Null | Value::Bool(false) => None,
            Value::String(message) if message.is_empty() => None,
            Value::String(message) => Some(message.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Citation batch built from `metadata` and the index-aligned `scores`.
    #[must_use]
    pub fn citations(&self) -> Vec<Citation> {
        let scores = self.scores.as_deref().unwrap_or_default();
        self.metadata
            .as_deref()
            .unwrap_or_default()
            .iter()
            .enumerate()
            .map(|(idx, meta)| {
                let label = meta.source.as_deref().unwrap_or(UNKNOWN_SOURCE_LABEL);
                Citation::new(label, scores.get(idx).copied().flatten())
            })
            .collect()
    }
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HealthReport {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub rag_pipeline: Option<String>,
}

impl HealthReport {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status.as_deref() == Some("ok")
    }
}

/// Success body of `POST /upload`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadAck {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

/// Failure body of `POST /upload` and FastAPI's default error shape.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub detail: Option<Value>,
}

impl ErrorBody {
    pub(crate) fn into_reason(self) -> Option<String> {
        self.error.filter(|e| !e.is_empty()).or_else(|| match self.detail? {
            Value::String(detail) => Some(detail),
            Value::Null => None,
            other => Some(other.to_string()),
        })
    }
}
