//! Document uploads alongside question cycles.

use std::time::Duration;

use docchat_engine::{NoticeLevel, Role, UploadStart};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{
    chunk_record, mount_delayed_answer_stream, mount_upload_error, mount_upload_ok, session_for,
    sse_body, write_document,
};

#[tokio::test]
async fn successful_upload_appends_system_turn_and_notice() {
    let server = MockServer::start().await;
    mount_upload_ok(&server, "notes.pdf").await;
    let dir = tempfile::tempdir().unwrap();
    let file = write_document(&dir, "notes.pdf", "%PDF-1.4");

    let mut session = session_for(&server.uri());
    assert!(matches!(session.start_upload(&file), UploadStart::Started));
    assert_eq!(session.wait_for_upload().await, Some(true));

    let turn = session.conversation().last().unwrap();
    assert_eq!(turn.role(), Role::System);
    assert!(turn.content().contains("notes.pdf"));

    let notices = session.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level(), NoticeLevel::Info);
    assert_eq!(notices[0].text(), "Successfully uploaded and processed: notes.pdf");

    let requests = server.received_requests().await.unwrap();
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("name=\"file\""));
    assert!(body.contains("filename=\"notes.pdf\""));
}

#[tokio::test]
async fn disallowed_type_never_reaches_backend() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let file = write_document(&dir, "setup.exe", "MZ");

    let mut session = session_for(&server.uri());
    assert!(matches!(session.start_upload(&file), UploadStart::Rejected(_)));
    assert!(!session.upload_in_flight());
    assert!(session.conversation().is_empty());

    let notices = session.take_notices();
    assert_eq!(notices.len(), 1);
    assert!(notices[0].is_error());
}

#[tokio::test]
async fn backend_rejection_surfaces_reason_as_notice() {
    let server = MockServer::start().await;
    mount_upload_error(&server, 500, "Failed to process document").await;
    let dir = tempfile::tempdir().unwrap();
    let file = write_document(&dir, "notes.md", "# Notes");

    let mut session = session_for(&server.uri());
    session.start_upload(&file);
    assert_eq!(session.wait_for_upload().await, Some(false));

    assert!(session.conversation().is_empty());
    let notices = session.take_notices();
    assert_eq!(notices.len(), 1);
    assert!(notices[0].is_error());
    assert_eq!(notices[0].text(), "Failed to process document");
}

#[tokio::test]
async fn upload_during_question_lands_after_the_answer() {
    let server = MockServer::start().await;
    mount_delayed_answer_stream(
        &server,
        &sse_body(&[&chunk_record("Answer", &[]), "[DONE]"]),
        Duration::from_millis(500),
    )
    .await;
    mount_upload_ok(&server, "notes.txt").await;
    let dir = tempfile::tempdir().unwrap();
    let file = write_document(&dir, "notes.txt", "hello");

    let mut session = session_for(&server.uri());
    session.submit("q");
    session.start_upload(&file);

    assert_eq!(session.wait_for_upload().await, Some(true));
    assert!(session.state().pending);
    assert!(session.conversation().is_empty());

    session.wait_for_cycle().await;
    let roles: Vec<_> = session.snapshot().iter().map(|turn| turn.role()).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant, Role::System]);
}
