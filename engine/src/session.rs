//! Question cycle controller.
//!
//! # Architecture
//!
//! [`Session`] is the single owner of the [`Conversation`] and
//! [`SessionState`]. Network work runs in spawned tasks that never touch that
//! state; they report over channels and the session applies what they send on
//! the caller's task:
//!
//! | Work | Task output | Channel |
//! |------|-------------|---------|
//! | Question cycle | cumulative increments, then an end marker | bounded `mpsc`, FIFO |
//! | Upload | one result | `oneshot` |
//! | Health polling | latest reachability | `watch` |
//!
//! Callers either tick with [`Session::process_pending_updates`] or await
//! [`Session::next_update`].
//!
//! # Question cycle
//!
//! ```text
//! Idle -> Submitting -> Streaming -> Completed
//!              |             |
//!              +-------------+----> Failed
//! ```
//!
//! The user turn and the assistant placeholder are recorded on the first
//! increment, not on submit. A cycle that fails before any increment still
//! records the user turn, followed by an error turn.

use std::fmt;
use std::path::{Path, PathBuf};

use docchat_transport::{
    AskRequest, BackendClient, ConnectivityError, ReadError, UploadAck, UploadError,
    check_upload_path,
};
use docchat_types::{
    CycleOutcome, CyclePhase, FailureReason, Frame, Notice, SessionState, Turn,
};
use futures_util::future::{AbortHandle, Abortable};
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::config::SessionSettings;
use crate::conversation::Conversation;
use crate::errors::{
    BACKEND_UNREACHABLE_NOTICE, SEND_FAILURE_MESSAGE, connectivity_notice,
    upload_failure_notice, upload_success_notice, upload_success_turn,
};
use crate::frames::FrameParser;
use crate::health::{self, HealthPoller};
use crate::notifications::NoticeQueue;

const CYCLE_EVENT_CHANNEL_CAPACITY: usize = 64;
const UPLOAD_TASK_LOST: &str = "Failed to upload file";
const STREAM_CLOSED_UNEXPECTEDLY: &str = "answer stream closed without an end marker";

/// Identifies one question cycle in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CycleId(Uuid);

impl CycleId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for CycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// A question cycle is already in flight.
    Pending,
    /// Blank input.
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Started(CycleId),
    Ignored(IgnoreReason),
}

#[derive(Debug)]
pub enum UploadStart {
    Started,
    /// Another upload is still running.
    Ignored,
    /// Refused before any IO. An error notice has been raised.
    Rejected(UploadError),
}

/// What one applied event changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    /// An increment was applied to the streaming turn.
    Streamed,
    CycleEnded(CycleOutcome),
    UploadEnded { file_name: String, succeeded: bool },
    Health { connected: bool },
}

enum CycleEvent {
    Increment(String),
    Ended,
    Failed(CycleFailure),
}

enum CycleFailure {
    Connectivity(ConnectivityError),
    Read(ReadError),
}

struct ActiveCycle {
    id: CycleId,
    question: String,
    rx: mpsc::Receiver<CycleEvent>,
    abort_handle: AbortHandle,
    parser: FrameParser,
    /// Most recent cumulative buffer.
    latest: String,
    /// User turn and placeholder have been recorded.
    started: bool,
}

struct ActiveUpload {
    file_name: String,
    rx: oneshot::Receiver<Result<UploadAck, UploadError>>,
    abort_handle: AbortHandle,
}

enum Incoming {
    Cycle(Option<CycleEvent>),
    Upload(Result<Result<UploadAck, UploadError>, oneshot::error::RecvError>),
    Health(Option<bool>),
}

pub struct Session {
    client: BackendClient,
    settings: SessionSettings,
    state: SessionState,
    phase: CyclePhase,
    conversation: Conversation,
    notices: NoticeQueue,
    cycle: Option<ActiveCycle>,
    upload: Option<ActiveUpload>,
    health: Option<HealthPoller>,
    /// System turns held back while a turn streams, so the streaming turn stays last.
    deferred: Vec<String>,
}

impl Session {
    #[must_use]
    pub fn new(client: BackendClient, settings: SessionSettings) -> Self {
        Self {
            client,
            settings,
            state: SessionState::new(settings.use_cache),
            phase: CyclePhase::Idle,
            conversation: Conversation::new(),
            notices: NoticeQueue::new(),
            cycle: None,
            upload: None,
            health: None,
            deferred: Vec::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    #[must_use]
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<Turn> {
        self.conversation.snapshot()
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.notices.take()
    }

    pub fn set_caching(&mut self, enabled: bool) {
        self.state.caching = enabled;
        tracing::debug!(enabled, "Answer cache preference changed");
    }

    #[must_use]
    pub fn upload_in_flight(&self) -> bool {
        self.upload.is_some()
    }

    /// Some background task may still produce an update.
    #[must_use]
    pub fn has_work_in_flight(&self) -> bool {
        self.cycle.is_some() || self.upload.is_some() || self.health.is_some()
    }

    /// Start a question cycle.
    pub fn submit(&mut self, text: &str) -> SubmitOutcome {
        if self.state.pending {
            return SubmitOutcome::Ignored(IgnoreReason::Pending);
        }
        if text.trim().is_empty() {
            return SubmitOutcome::Ignored(IgnoreReason::Empty);
        }

        let mut request = AskRequest::new(text, self.state.caching);
        if self.settings.include_history {
            request = request.with_history(self.conversation.history());
        }

        let id = CycleId::new();
        let (tx, rx) = mpsc::channel(CYCLE_EVENT_CHANNEL_CAPACITY);
        let (abort_handle, abort_registration) = AbortHandle::new_pair();
        let client = self.client.clone();

        tracing::info!(
            cycle_id = %id,
            use_cache = request.use_cache,
            question_bytes = text.len(),
            "Question submitted"
        );

        let task = async move {
            let mut stream = match client.submit_question(&request).await {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::warn!(cycle_id = %id, %e, "Question request failed");
                    let _ = tx
                        .send(CycleEvent::Failed(CycleFailure::Connectivity(e)))
                        .await;
                    return;
                }
            };

            while let Some(increment) = stream.next_increment().await {
                let event = match increment {
                    Ok(text) => CycleEvent::Increment(text),
                    Err(e) => {
                        tracing::warn!(cycle_id = %id, %e, "Answer stream failed");
                        let _ = tx.send(CycleEvent::Failed(CycleFailure::Read(e))).await;
                        return;
                    }
                };
                if tx.send(event).await.is_err() {
                    return;
                }
            }
            let _ = tx.send(CycleEvent::Ended).await;
        };

        tokio::spawn(async move {
            let _ = Abortable::new(task, abort_registration).await;
        });

        self.cycle = Some(ActiveCycle {
            id,
            question: text.to_string(),
            rx,
            abort_handle,
            parser: FrameParser::new(),
            latest: String::new(),
            started: false,
        });
        self.state.pending = true;
        self.phase = CyclePhase::Submitting;
        SubmitOutcome::Started(id)
    }

    /// Upload a document in the background.
    pub fn start_upload(&mut self, path: impl AsRef<Path>) -> UploadStart {
        if self.upload.is_some() {
            return UploadStart::Ignored;
        }

        let path: PathBuf = path.as_ref().to_path_buf();
        let file_name = match check_upload_path(&path) {
            Ok(name) => name,
            Err(e) => {
                self.notices.push(Notice::error(upload_failure_notice(&e)));
                return UploadStart::Rejected(e);
            }
        };

        let (tx, rx) = oneshot::channel();
        let (abort_handle, abort_registration) = AbortHandle::new_pair();
        let client = self.client.clone();

        let task = async move {
            let result = client.upload_document(&path).await;
            let _ = tx.send(result);
        };
        tokio::spawn(async move {
            let _ = Abortable::new(task, abort_registration).await;
        });

        self.upload = Some(ActiveUpload {
            file_name,
            rx,
            abort_handle,
        });
        UploadStart::Started
    }

    /// Begin periodic health probes. The first probe runs immediately.
    pub fn start_health_polling(&mut self) {
        if self.health.is_none() {
            self.health = Some(HealthPoller::spawn(
                self.client.clone(),
                self.settings.health_interval,
            ));
        }
    }

    /// Probe health once and fold the result into the connection flag.
    pub async fn check_health(&mut self) -> bool {
        let healthy = health::probe(&self.client).await;
        self.apply_health(healthy);
        healthy
    }

    /// Apply every event that is already available, without waiting.
    pub fn process_pending_updates(&mut self) -> Vec<SessionUpdate> {
        let mut updates = Vec::new();

        while let Some(cycle) = self.cycle.as_mut() {
            let event = match cycle.rx.try_recv() {
                Ok(event) => Some(event),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => None,
            };
            updates.push(self.apply_cycle_event(event));
        }

        if let Some(upload) = self.upload.as_mut() {
            match upload.rx.try_recv() {
                Ok(result) => updates.push(self.apply_upload_result(Ok(result))),
                Err(oneshot::error::TryRecvError::Empty) => {}
                Err(oneshot::error::TryRecvError::Closed) => {
                    updates.push(self.apply_upload_result(Err(UPLOAD_TASK_LOST.to_string())));
                }
            }
        }

        if let Some(healthy) = self.health.as_mut().and_then(HealthPoller::try_latest) {
            updates.push(self.apply_health(healthy));
        }

        updates
    }

    /// Wait for the next event from any background task and apply it.
    ///
    /// Returns `None` when nothing is in flight.
    pub async fn next_update(&mut self) -> Option<SessionUpdate> {
        loop {
            let incoming = tokio::select! {
                event = recv_cycle(self.cycle.as_mut()), if self.cycle.is_some() => {
                    Incoming::Cycle(event)
                }
                result = recv_upload(self.upload.as_mut()), if self.upload.is_some() => {
                    Incoming::Upload(result)
                }
                healthy = recv_health(self.health.as_mut()), if self.health.is_some() => {
                    Incoming::Health(healthy)
                }
                else => return None,
            };

            let update = match incoming {
                Incoming::Cycle(event) => self.apply_cycle_event(event),
                Incoming::Upload(Ok(result)) => self.apply_upload_result(Ok(result)),
                Incoming::Upload(Err(_)) => {
                    self.apply_upload_result(Err(UPLOAD_TASK_LOST.to_string()))
                }
                Incoming::Health(Some(healthy)) => self.apply_health(healthy),
                Incoming::Health(None) => {
                    tracing::debug!("Health poller stopped");
                    self.health = None;
                    continue;
                }
            };
            return Some(update);
        }
    }

    /// Drive the current question cycle to its end.
    ///
    /// Uploads and health results that arrive meanwhile are applied too.
    pub async fn wait_for_cycle(&mut self) -> Option<CycleOutcome> {
        if self.cycle.is_none() {
            return None;
        }
        while let Some(update) = self.next_update().await {
            if let SessionUpdate::CycleEnded(outcome) = update {
                return Some(outcome);
            }
        }
        None
    }

    /// Drive the current upload to its end. Returns whether it succeeded.
    pub async fn wait_for_upload(&mut self) -> Option<bool> {
        if self.upload.is_none() {
            return None;
        }
        while let Some(update) = self.next_update().await {
            if let SessionUpdate::UploadEnded { succeeded, .. } = update {
                return Some(succeeded);
            }
        }
        None
    }

    fn apply_cycle_event(&mut self, event: Option<CycleEvent>) -> SessionUpdate {
        let Some(cycle) = self.cycle.as_mut() else {
            return SessionUpdate::Streamed;
        };

        match event {
            Some(CycleEvent::Increment(text)) => {
                if !cycle.started {
                    cycle.started = true;
                    self.conversation.begin_user_turn(cycle.question.clone());
                    self.conversation.begin_assistant_placeholder();
                    self.phase = CyclePhase::Streaming;
                }

                let frames = cycle.parser.feed(&text);
                cycle.latest = text;
                self.apply_frames(frames).unwrap_or(SessionUpdate::Streamed)
            }
            Some(CycleEvent::Ended) => {
                if !cycle.started {
                    self.conversation.begin_user_turn(cycle.question.clone());
                    self.conversation.begin_assistant_placeholder();
                }
                let id = cycle.id;
                let latest = std::mem::take(&mut cycle.latest);
                let tail = cycle.parser.finish(&latest);
                if let Some(update) = self.apply_frames(tail) {
                    return update;
                }
                tracing::debug!(cycle_id = %id, "Stream ended without terminator");
                self.conversation.apply_frame(Frame::Terminator);
                self.finish_cycle(CycleOutcome::Completed)
            }
            Some(CycleEvent::Failed(failure)) => {
                if !cycle.started {
                    self.conversation.begin_user_turn(cycle.question.clone());
                }
                self.conversation.fail_active_turn(SEND_FAILURE_MESSAGE);
                let reason = match failure {
                    CycleFailure::Connectivity(e) => {
                        if !matches!(e, ConnectivityError::Status { .. }) {
                            self.state.connected = false;
                        }
                        self.notices.push(Notice::error(connectivity_notice(&e)));
                        FailureReason::Connectivity(e.to_string())
                    }
                    CycleFailure::Read(e) => FailureReason::Interrupted(e.to_string()),
                };
                self.finish_cycle(CycleOutcome::Failed(reason))
            }
            None => {
                if !cycle.started {
                    self.conversation.begin_user_turn(cycle.question.clone());
                }
                self.conversation.fail_active_turn(SEND_FAILURE_MESSAGE);
                self.finish_cycle(CycleOutcome::Failed(FailureReason::Interrupted(
                    STREAM_CLOSED_UNEXPECTEDLY.to_string(),
                )))
            }
        }
    }

    /// Apply parsed frames in order. Returns the cycle's end once a frame settles it.
    fn apply_frames(&mut self, frames: Vec<Frame>) -> Option<SessionUpdate> {
        for frame in frames {
            let backend_error = match &frame {
                Frame::Error { message } => Some(message.clone()),
                Frame::Chunk { .. } | Frame::Terminator => None,
            };
            let effect = self.conversation.apply_frame(frame);
            if !effect.is_terminal() {
                continue;
            }
            let outcome = match backend_error {
                Some(message) => CycleOutcome::Failed(FailureReason::Backend(message)),
                None => CycleOutcome::Completed,
            };
            return Some(self.finish_cycle(outcome));
        }
        None
    }

    fn finish_cycle(&mut self, outcome: CycleOutcome) -> SessionUpdate {
        if let Some(cycle) = self.cycle.take() {
            cycle.abort_handle.abort();
            match &outcome {
                CycleOutcome::Completed => {
                    tracing::info!(cycle_id = %cycle.id, "Question cycle completed");
                }
                CycleOutcome::Failed(reason) => {
                    tracing::warn!(cycle_id = %cycle.id, reason = reason.detail(), "Question cycle failed");
                }
            }
        }
        self.state.pending = false;
        self.phase = outcome.phase();

        for text in self.deferred.drain(..) {
            self.conversation.append_system_notice(text);
        }

        SessionUpdate::CycleEnded(outcome)
    }

    fn apply_upload_result(
        &mut self,
        result: Result<Result<UploadAck, UploadError>, String>,
    ) -> SessionUpdate {
        let Some(upload) = self.upload.take() else {
            return SessionUpdate::UploadEnded {
                file_name: String::new(),
                succeeded: false,
            };
        };
        upload.abort_handle.abort();
        let file_name = upload.file_name;

        let succeeded = match result {
            Ok(Ok(ack)) => {
                tracing::info!(
                    file = %file_name,
                    message = ack.message.as_deref().unwrap_or(""),
                    "Document uploaded"
                );
                let turn = upload_success_turn(&file_name);
                if self.cycle.is_some() {
                    self.deferred.push(turn);
                } else {
                    self.conversation.append_system_notice(turn);
                }
                self.notices
                    .push(Notice::info(upload_success_notice(&file_name)));
                true
            }
            Ok(Err(e)) => {
                self.notices.push(Notice::error(upload_failure_notice(&e)));
                false
            }
            Err(reason) => {
                tracing::error!(file = %file_name, "Upload task ended without a result");
                self.notices.push(Notice::error(reason));
                false
            }
        };

        SessionUpdate::UploadEnded {
            file_name,
            succeeded,
        }
    }

    fn apply_health(&mut self, healthy: bool) -> SessionUpdate {
        let was_connected = self.state.connected;
        self.state.connected = healthy;
        if was_connected && !healthy {
            self.notices.push(Notice::error(BACKEND_UNREACHABLE_NOTICE));
        } else if !was_connected && healthy {
            tracing::info!("Backend reachable again");
        }
        SessionUpdate::Health { connected: healthy }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(cycle) = &self.cycle {
            cycle.abort_handle.abort();
        }
        if let Some(upload) = &self.upload {
            upload.abort_handle.abort();
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("phase", &self.phase)
            .field("turns", &self.conversation.len())
            .field("cycle", &self.cycle.as_ref().map(|c| c.id))
            .field("upload", &self.upload.as_ref().map(|u| &u.file_name))
            .finish_non_exhaustive()
    }
}

async fn recv_cycle(cycle: Option<&mut ActiveCycle>) -> Option<CycleEvent> {
    match cycle {
        Some(cycle) => cycle.rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn recv_upload(
    upload: Option<&mut ActiveUpload>,
) -> Result<Result<UploadAck, UploadError>, oneshot::error::RecvError> {
    match upload {
        Some(upload) => (&mut upload.rx).await,
        None => std::future::pending().await,
    }
}

async fn recv_health(health: Option<&mut HealthPoller>) -> Option<bool> {
    match health {
        Some(poller) => poller.changed().await,
        None => std::future::pending().await,
    }
}
