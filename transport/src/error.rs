//! Transport error taxonomy.
//!
//! Each failure class maps to a different recovery at the session level:
//! connectivity problems downgrade the connection indicator, read faults end
//! the current answer with an error turn, and upload failures surface as a
//! transient notice.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
#[error("failed to build HTTP client: {0}")]
pub struct ClientBuildError(#[from] pub reqwest::Error);

/// The backend could not be reached, or refused the request before streaming.
#[derive(Debug, thiserror::Error)]
pub enum ConnectivityError {
    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("request failed after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },
    #[error("backend returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("malformed health response: {0}")]
    MalformedHealth(#[source] reqwest::Error),
}

/// The answer stream broke after it was established.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("stream interrupted: {0}")]
    Interrupted(#[source] reqwest::Error),
    #[error("no data received for {}s", .0.as_secs())]
    IdleTimeout(Duration),
    #[error("stream exceeded maximum size ({limit} bytes)")]
    BufferLimit { limit: usize },
    #[error("received invalid UTF-8 from stream")]
    InvalidUtf8,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("file type not allowed: {name} (allowed: {allowed})")]
    UnsupportedType { name: String, allowed: String },
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("upload rejected ({status}): {reason}")]
    Rejected { status: StatusCode, reason: String },
    #[error("upload failed: {0}")]
    Network(#[source] reqwest::Error),
}

impl UploadError {
    /// Short human-readable reason for a transient notice.
    #[must_use]
    pub fn reason(&self) -> String {
        match self {
            Self::Rejected { reason, .. } => reason.clone(),
            other => other.to_string(),
        }
    }
}
