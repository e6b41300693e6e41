//! Shared test utilities and fixtures
//!
//! Common infrastructure for integration tests.

#![allow(dead_code)]

use std::time::Duration;

use docchat_engine::{BackendClient, BackendConfig, Session, SessionSettings};
use docchat_transport::retry::RetryConfig;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A backend address nothing listens on.
pub const UNREACHABLE_URL: &str = "http://127.0.0.1:9";

/// Session against `base_url` with fast retries and short timeouts.
pub fn session_for(base_url: &str) -> Session {
    session_with(base_url, SessionSettings::default())
}

pub fn session_with(base_url: &str, settings: SessionSettings) -> Session {
    Session::new(
        BackendClient::new(test_backend_config(base_url)).unwrap(),
        settings,
    )
}

/// Session that gives up on a silent answer stream after `idle`.
pub fn session_with_idle_timeout(base_url: &str, idle: Duration) -> Session {
    let mut config = test_backend_config(base_url);
    config.stream_idle_timeout = idle;
    Session::new(
        BackendClient::new(config).unwrap(),
        SessionSettings::default(),
    )
}

fn test_backend_config(base_url: &str) -> BackendConfig {
    let mut config = BackendConfig::default().with_base_url(base_url);
    config.retry = RetryConfig {
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        ..RetryConfig::default()
    };
    config.health_timeout = Duration::from_secs(2);
    config.stream_idle_timeout = Duration::from_secs(5);
    config
}

/// Backend that answers one question with `first`, then goes silent for
/// `stall` while still promising more body.
pub async fn serve_stalled_answer(first: &str, stall: Duration) -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind local listener");
    let address = listener.local_addr().expect("listener local_addr");
    let first = first.to_string();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept connection");

        let mut request = [0u8; 4096];
        let _ = socket.read(&mut request).await;

        let header = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            first.len() + 1024
        );
        socket
            .write_all(header.as_bytes())
            .await
            .expect("write headers");
        socket
            .write_all(first.as_bytes())
            .await
            .expect("write first answer bytes");
        socket.flush().await.expect("flush first answer bytes");
        tokio::time::sleep(stall).await;
    });

    (format!("http://{address}"), handle)
}

/// `data:` record carrying a cumulative chunk and its sources.
pub fn chunk_record(text: &str, sources: &[(&str, f64)]) -> String {
    let metadata: Vec<_> = sources
        .iter()
        .map(|(source, _)| serde_json::json!({ "source": source }))
        .collect();
    let scores: Vec<_> = sources.iter().map(|(_, score)| *score).collect();
    serde_json::json!({ "chunk": text, "metadata": metadata, "scores": scores }).to_string()
}

pub fn error_record(message: &str) -> String {
    serde_json::json!({ "error": message }).to_string()
}

/// Frame each payload as `data: <payload>\n\n`.
pub fn sse_body(payloads: &[&str]) -> String {
    payloads
        .iter()
        .map(|payload| format!("data: {payload}\n\n"))
        .collect()
}

/// Mount `POST /ask` answering with `body` as an event stream.
pub async fn mount_answer_stream(server: &MockServer, body: &str) {
    mount_delayed_answer_stream(server, body, Duration::ZERO).await;
}

pub async fn mount_delayed_answer_stream(server: &MockServer, body: &str, delay: Duration) {
    Mock::given(method("POST"))
        .and(path("/ask"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body)
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

pub async fn mount_health(server: &MockServer, status: &str) {
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": status,
            "service": "RAG Chatbot Backend",
            "rag_pipeline": "initialized"
        })))
        .mount(server)
        .await;
}

pub async fn mount_upload_ok(server: &MockServer, filename: &str) {
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "message": "File uploaded and processed successfully",
            "filename": filename
        })))
        .mount(server)
        .await;
}

pub async fn mount_upload_error(server: &MockServer, status: u16, error: &str) {
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(
            ResponseTemplate::new(status).set_body_json(serde_json::json!({ "error": error })),
        )
        .mount(server)
        .await;
}

/// Write a document fixture into `dir` and return its path.
pub fn write_document(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}
