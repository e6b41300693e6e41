//! HTTP transport for the document question-answering backend.
//!
//! # Architecture
//!
//! [`BackendClient`] owns one pooled [`reqwest::Client`] and exposes the three
//! backend calls:
//!
//! | Call | Endpoint | Shape |
//! |------|----------|-------|
//! | [`BackendClient::submit_question`] | `POST /ask` | Long-lived stream, see [`QuestionStream`] |
//! | [`BackendClient::upload_document`] | `POST /upload` | Single multipart request/response |
//! | [`BackendClient::probe_health`] | `GET /health` | Single request, short timeout, no retries |
//!
//! # Error Handling
//!
//! Failures before the answer stream starts are [`ConnectivityError`]s. Once
//! bytes flow, faults are reported per increment as [`ReadError`]. Uploads have
//! their own [`UploadError`]. Backend-reported answer errors are *not* transport
//! errors: they arrive as ordinary stream content and are classified by the
//! frame parser.

mod error;
pub mod retry;
mod stream;
mod upload;
pub mod wire;

use std::time::Duration;

pub use reqwest::StatusCode;

pub use error::{ClientBuildError, ConnectivityError, ReadError, UploadError};
pub use stream::QuestionStream;
pub use upload::{ALLOWED_EXTENSIONS, check_upload_path};
pub use wire::{AnswerRecord, AskRequest, HealthReport, UploadAck};

use retry::RetryConfig;

/// Default backend address (local development server).
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

const CONNECT_TIMEOUT_SECS: u64 = 10;
const TCP_KEEPALIVE_SECS: u64 = 60;
const POOL_MAX_IDLE_PER_HOST: usize = 8;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
const DEFAULT_HEALTH_TIMEOUT_SECS: u64 = 5;
const DEFAULT_STREAM_IDLE_TIMEOUT_SECS: u64 = 60;

/// Upper bound on the cumulative answer buffer.
pub const DEFAULT_MAX_STREAM_BYTES: usize = 4 * 1024 * 1024;

const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

/// Connection settings for [`BackendClient`].
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    /// Whole-request timeout for uploads.
    pub request_timeout: Duration,
    pub health_timeout: Duration,
    /// Maximum silence between reads of an answer stream.
    pub stream_idle_timeout: Duration,
    pub max_stream_bytes: usize,
    pub retry: RetryConfig,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            health_timeout: Duration::from_secs(DEFAULT_HEALTH_TIMEOUT_SECS),
            stream_idle_timeout: Duration::from_secs(DEFAULT_STREAM_IDLE_TIMEOUT_SECS),
            max_stream_bytes: DEFAULT_MAX_STREAM_BYTES,
            retry: RetryConfig::default(),
        }
    }
}

impl BackendConfig {
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Client for one backend. Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    config: BackendConfig,
}

fn client_builder() -> reqwest::ClientBuilder {
    use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

    let mut default_headers = HeaderMap::new();
    default_headers.insert(
        USER_AGENT,
        HeaderValue::from_static(concat!("docchat/", env!("CARGO_PKG_VERSION"))),
    );

    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
        .default_headers(default_headers)
}

impl BackendClient {
    pub fn new(config: BackendConfig) -> Result<Self, ClientBuildError> {
        let http = client_builder().build()?;
        Ok(Self { http, config })
    }

    #[must_use]
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{name}", self.config.base_url.trim_end_matches('/'))
    }

    /// Open the answer stream for one question.
    ///
    /// Resolves once response headers arrive with a success status; the body is
    /// consumed through the returned [`QuestionStream`].
    pub async fn submit_question(
        &self,
        request: &AskRequest,
    ) -> Result<QuestionStream, ConnectivityError> {
        let url = self.endpoint("ask");
        tracing::debug!(
            %url,
            use_cache = request.use_cache,
            history_len = request.history.as_ref().map_or(0, Vec::len),
            "Submitting question"
        );

        let outcome = retry::send_with_retry(
            || {
                self.http
                    .post(&url)
                    .header(reqwest::header::ACCEPT, "text/event-stream")
                    .header(reqwest::header::CACHE_CONTROL, "no-cache")
                    .json(request)
            },
            &self.config.retry,
        )
        .await;
        let response = outcome.into_response().await?;

        Ok(QuestionStream::new(
            response,
            self.config.stream_idle_timeout,
            self.config.max_stream_bytes,
        ))
    }

    /// Probe backend health. `Ok(false)` means reachable but not reporting `ok`.
    pub async fn probe_health(&self) -> Result<bool, ConnectivityError> {
        self.health_report().await.map(|report| report.is_ok())
    }

    pub async fn health_report(&self) -> Result<HealthReport, ConnectivityError> {
        let response = self
            .http
            .get(self.endpoint("health"))
            .timeout(self.config.health_timeout)
            .send()
            .await
            .map_err(ConnectivityError::Request)?;

        let status = response.status();
        if !status.is_success() {
            let body = read_capped_error_body(response).await;
            return Err(ConnectivityError::Status { status, body });
        }

        let report = response
            .json::<HealthReport>()
            .await
            .map_err(ConnectivityError::MalformedHealth)?;
        tracing::trace!(
            status = report.status.as_deref().unwrap_or("missing"),
            rag_pipeline = report.rag_pipeline.as_deref().unwrap_or("unknown"),
            "Health probe"
        );
        Ok(report)
    }
}

pub async fn read_capped_error_body(mut response: reqwest::Response) -> String {
    let mut body = Vec::new();
    while let Ok(Some(chunk)) = response.chunk().await {
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}
