//! Question cycles end to end against a mock backend.

use docchat_engine::{
    Conversation, CycleOutcome, FailureReason, FrameEffect, FrameParser, Role, SessionSettings,
    SessionUpdate, parse_buffer,
};
use wiremock::MockServer;

use crate::common::{
    chunk_record, error_record, mount_answer_stream, session_for, session_with, sse_body,
};

#[tokio::test]
async fn cumulative_chunks_settle_into_one_answer() {
    let server = MockServer::start().await;
    let first = chunk_record("The", &[]);
    let second = chunk_record("The capital is Paris.", &[]);
    mount_answer_stream(&server, &sse_body(&[&first, &second, "[DONE]"])).await;

    let mut session = session_for(&server.uri());
    session.submit("What is the capital?");
    assert_eq!(session.wait_for_cycle().await, Some(CycleOutcome::Completed));

    let turns = session.snapshot();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].role(), Role::User);
    assert_eq!(turns[0].content(), "What is the capital?");
    assert_eq!(turns[1].role(), Role::Assistant);
    assert_eq!(turns[1].content(), "The capital is Paris.");
    assert!(!turns[1].is_streaming());
    assert!(!session.state().pending);
}

#[tokio::test]
async fn backend_error_frame_yields_single_error_turn() {
    let server = MockServer::start().await;
    mount_answer_stream(&server, &sse_body(&[&error_record("index unavailable")])).await;

    let mut session = session_for(&server.uri());
    session.submit("anything");
    let outcome = session.wait_for_cycle().await.unwrap();

    assert_eq!(
        outcome,
        CycleOutcome::Failed(FailureReason::Backend("index unavailable".into()))
    );
    let turns = session.snapshot();
    let errors: Vec<_> = turns.iter().filter(|turn| turn.is_error()).collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].content(), "Error: index unavailable");
    assert!(!session.state().pending);
    assert!(turns.iter().all(|turn| !turn.is_streaming()));
}

#[tokio::test]
async fn answer_without_trailing_newline_is_kept() {
    let server = MockServer::start().await;
    let first = chunk_record("The", &[]);
    let last = chunk_record("The capital is Paris.", &[("geo.pdf", 0.93)]);
    mount_answer_stream(&server, &format!("data: {first}\n\ndata: {last}")).await;

    let mut session = session_for(&server.uri());
    session.submit("What is the capital?");
    assert_eq!(session.wait_for_cycle().await, Some(CycleOutcome::Completed));

    let answer = session.conversation().last().unwrap().clone();
    assert_eq!(answer.content(), "The capital is Paris.");
    assert_eq!(answer.citations()[0].source_label(), "geo.pdf");
    assert!(!answer.is_streaming());
}

#[tokio::test]
async fn error_without_trailing_newline_fails_the_cycle() {
    let server = MockServer::start().await;
    let partial = chunk_record("The", &[]);
    let error = error_record("index unavailable");
    mount_answer_stream(&server, &format!("data: {partial}\n\ndata: {error}")).await;

    let mut session = session_for(&server.uri());
    session.submit("anything");
    assert_eq!(
        session.wait_for_cycle().await,
        Some(CycleOutcome::Failed(FailureReason::Backend(
            "index unavailable".into()
        )))
    );
    let turns = session.snapshot();
    assert_eq!(turns.len(), 2);
    assert!(turns[1].is_error());
    assert_eq!(turns[1].content(), "Error: index unavailable");
}

#[tokio::test]
async fn citations_follow_latest_chunk() {
    let server = MockServer::start().await;
    let first = chunk_record("Paris", &[("geo.pdf", 0.91)]);
    let second = chunk_record("Paris, France", &[("geo.pdf", 0.91), ("europe.md", 1.4)]);
    mount_answer_stream(&server, &sse_body(&[&first, &second, "[DONE]"])).await;

    let mut session = session_for(&server.uri());
    session.submit("Where?");
    session.wait_for_cycle().await;

    let answer = session.conversation().last().unwrap().clone();
    let labels: Vec<_> = answer.citations().iter().map(|c| c.source_label()).collect();
    assert_eq!(labels, vec!["geo.pdf", "europe.md"]);
    assert_eq!(answer.citations()[1].relevance_score(), Some(1.0));
}

#[tokio::test]
async fn malformed_lines_do_not_abort_the_answer() {
    let server = MockServer::start().await;
    let good = chunk_record("Still here", &[]);
    mount_answer_stream(&server, &sse_body(&["{broken", &good, "[DONE]"])).await;

    let mut session = session_for(&server.uri());
    session.submit("q");
    assert_eq!(session.wait_for_cycle().await, Some(CycleOutcome::Completed));
    assert_eq!(session.conversation().last().unwrap().content(), "Still here");
}

#[tokio::test]
async fn every_update_before_the_end_is_streamed() {
    let server = MockServer::start().await;
    mount_answer_stream(&server, &sse_body(&[&chunk_record("A", &[]), "[DONE]"])).await;

    let mut session = session_for(&server.uri());
    session.submit("q");

    let mut updates = Vec::new();
    while let Some(update) = session.next_update().await {
        let ended = matches!(update, SessionUpdate::CycleEnded(_));
        updates.push(update);
        if ended {
            break;
        }
    }
    assert_eq!(
        updates.last(),
        Some(&SessionUpdate::CycleEnded(CycleOutcome::Completed))
    );
    assert!(
        updates[..updates.len() - 1]
            .iter()
            .all(|update| *update == SessionUpdate::Streamed)
    );
}

#[tokio::test]
async fn history_is_sent_when_enabled() {
    let server = MockServer::start().await;
    mount_answer_stream(&server, &sse_body(&[&chunk_record("Paris", &[]), "[DONE]"])).await;

    let settings = SessionSettings {
        include_history: true,
        ..SessionSettings::default()
    };
    let mut session = session_with(&server.uri(), settings);
    session.submit("Capital?");
    session.wait_for_cycle().await;
    session.set_caching(false);
    session.submit("And population?");
    session.wait_for_cycle().await;

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);

    let first: serde_json::Value = requests[0].body_json().unwrap();
    assert!(first.get("history").unwrap().as_array().unwrap().is_empty());

    let second: serde_json::Value = requests[1].body_json().unwrap();
    assert_eq!(second["question"], "And population?");
    assert_eq!(second["use_cache"], false);
    assert_eq!(
        second["history"],
        serde_json::json!([
            { "role": "user", "content": "Capital?" },
            { "role": "assistant", "content": "Paris" }
        ])
    );
}

#[tokio::test]
async fn history_is_omitted_by_default() {
    let server = MockServer::start().await;
    mount_answer_stream(&server, "data: [DONE]\n\n").await;

    let mut session = session_for(&server.uri());
    session.submit("Capital?");
    session.wait_for_cycle().await;

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = requests[0].body_json().unwrap();
    assert_eq!(
        body,
        serde_json::json!({ "question": "Capital?", "use_cache": true })
    );
}

#[test]
fn identical_increment_leaves_store_unchanged() {
    let buffer = sse_body(&[&chunk_record("The capital is Paris.", &[("geo.pdf", 0.8)])]);
    let mut parser = FrameParser::new();
    let mut conversation = Conversation::new();
    conversation.begin_user_turn("What is the capital?");
    conversation.begin_assistant_placeholder();

    for frame in parser.feed(&buffer) {
        conversation.apply_frame(frame);
    }
    let before = conversation.snapshot();

    assert!(parser.feed(&buffer).is_empty());
    for frame in parse_buffer(&buffer) {
        assert_eq!(conversation.apply_frame(frame), FrameEffect::Unchanged);
    }
    assert_eq!(conversation.snapshot(), before);
}

#[test]
fn resplit_stream_produces_same_store() {
    let body = sse_body(&[
        &chunk_record("Über", &[]),
        &chunk_record("Über café", &[("menu.txt", 0.5)]),
        &error_record("late failure"),
    ]);

    let mut reference = Conversation::new();
    reference.begin_assistant_placeholder();
    for frame in parse_buffer(&body) {
        reference.apply_frame(frame);
    }

    let boundaries: Vec<usize> = body.char_indices().map(|(i, _)| i).skip(1).collect();
    for step in [1, 3, 7, 19] {
        let mut parser = FrameParser::new();
        let mut conversation = Conversation::new();
        conversation.begin_assistant_placeholder();
        for end in boundaries.iter().step_by(step).copied().chain([body.len()]) {
            for frame in parser.feed(&body[..end]) {
                conversation.apply_frame(frame);
            }
        }
        assert_eq!(conversation.snapshot(), reference.snapshot(), "step {step}");
    }
}
