//! Reachability tracking and transport failures.

use std::time::Duration;

use docchat_engine::{
    CycleOutcome, CyclePhase, FailureReason, NoticeLevel, SessionUpdate, SubmitOutcome,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{
    UNREACHABLE_URL, chunk_record, mount_answer_stream, mount_health, serve_stalled_answer,
    session_for, session_with_idle_timeout, sse_body,
};

#[tokio::test]
async fn unreachable_backend_records_question_and_error() {
    let mut session = session_for(UNREACHABLE_URL);
    assert!(matches!(session.submit("Hello?"), SubmitOutcome::Started(_)));

    let outcome = session.wait_for_cycle().await.unwrap();
    assert!(matches!(
        outcome,
        CycleOutcome::Failed(FailureReason::Connectivity(_))
    ));

    let turns = session.snapshot();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].content(), "Hello?");
    assert_eq!(turns[1].content(), "Error: Failed to send message");
    assert!(!session.state().connected);
    assert!(!session.state().pending);

    let notices = session.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level(), NoticeLevel::Error);
    assert_eq!(
        notices[0].text(),
        "Cannot connect to backend server. Please make sure it is running."
    );
}

#[tokio::test]
async fn stalled_answer_fails_after_streaming_started() {
    let body = sse_body(&[&chunk_record("The capital", &[])]);
    let (url, server) = serve_stalled_answer(&body, Duration::from_secs(30)).await;

    let mut session = session_with_idle_timeout(&url, Duration::from_millis(300));
    session.submit("Capital?");

    let mut saw_partial = false;
    let outcome = loop {
        match session.next_update().await.unwrap() {
            SessionUpdate::Streamed => {
                let last = session.conversation().last().unwrap();
                saw_partial |= last.is_streaming() && last.content() == "The capital";
            }
            SessionUpdate::CycleEnded(outcome) => break outcome,
            SessionUpdate::UploadEnded { .. } | SessionUpdate::Health { .. } => {}
        }
    };
    server.abort();

    assert!(saw_partial);
    assert!(matches!(
        outcome,
        CycleOutcome::Failed(FailureReason::Interrupted(_))
    ));
    let turns = session.snapshot();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].content(), "Capital?");
    assert!(turns[1].is_error());
    assert_eq!(turns[1].content(), "Error: Failed to send message");
    assert!(turns.iter().all(|turn| !turn.is_streaming()));
    assert!(!session.state().pending);
    assert_eq!(session.phase(), CyclePhase::Failed);
}

#[tokio::test]
async fn transient_server_error_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ask"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_answer_stream(&server, &sse_body(&[&chunk_record("ok", &[]), "[DONE]"])).await;

    let mut session = session_for(&server.uri());
    session.submit("q");
    assert_eq!(session.wait_for_cycle().await, Some(CycleOutcome::Completed));
    assert_eq!(session.conversation().last().unwrap().content(), "ok");
}

#[tokio::test]
async fn health_probe_tracks_backend_status() {
    let server = MockServer::start().await;
    mount_health(&server, "ok").await;

    let mut session = session_for(&server.uri());
    assert!(session.check_health().await);
    assert!(session.state().connected);
    assert!(session.take_notices().is_empty());
}

#[tokio::test]
async fn degraded_health_counts_as_disconnected() {
    let server = MockServer::start().await;
    mount_health(&server, "degraded").await;

    let mut session = session_for(&server.uri());
    assert!(!session.check_health().await);
    assert!(!session.state().connected);
    assert_eq!(session.take_notices().len(), 1);
}

#[tokio::test]
async fn recovery_clears_disconnected_flag() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_health(&server, "ok").await;

    let mut session = session_for(&server.uri());
    assert!(!session.check_health().await);
    assert!(session.check_health().await);
    assert!(session.state().connected);
}

#[tokio::test]
async fn health_polling_reports_through_updates() {
    let mut session = session_for(UNREACHABLE_URL);
    session.start_health_polling();
    assert!(session.has_work_in_flight());

    let update = tokio::time::timeout(Duration::from_secs(10), session.next_update())
        .await
        .unwrap();
    assert_eq!(update, Some(SessionUpdate::Health { connected: false }));
    assert!(!session.state().connected);
}

#[tokio::test]
async fn tick_drain_applies_finished_cycle() {
    let server = MockServer::start().await;
    mount_answer_stream(&server, &sse_body(&[&chunk_record("done", &[]), "[DONE]"])).await;

    let mut session = session_for(&server.uri());
    session.submit("q");

    let mut updates = Vec::new();
    let ended = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            updates.extend(session.process_pending_updates());
            if !session.state().pending {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(ended.is_ok());
    assert_eq!(
        updates.last(),
        Some(&SessionUpdate::CycleEnded(CycleOutcome::Completed))
    );
    assert_eq!(session.conversation().last().unwrap().content(), "done");
}
