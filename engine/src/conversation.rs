//! Append-only conversation log.
//!
//! # Invariants
//!
//! - Turns are never removed or reordered.
//! - At most one turn is streaming, and it is always the last one.
//! - A streaming turn's content is the latest cumulative answer, replaced
//!   wholesale by each differing chunk and never concatenated.

use docchat_types::{Frame, HistoryEntry, Role, Turn};

use crate::errors::format_backend_error;

/// What applying a frame did to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameEffect {
    /// Streaming content and citations were replaced.
    Updated,
    /// Chunk identical to the current content; nothing changed.
    Unchanged,
    /// Terminator ended the streaming turn.
    Finished,
    /// Error frame ended the streaming turn with an error.
    Failed,
    /// No turn was streaming.
    Ignored,
}

impl FrameEffect {
    /// The streaming turn ended.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }
}

#[derive(Debug, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_user_turn(&mut self, text: impl Into<String>) {
        self.push(Turn::user(text));
    }

    /// Append the empty assistant turn that chunks will fill.
    ///
    /// Calling this while another turn streams is a caller bug. Debug builds
    /// panic; release builds finish the old turn first so only one streams.
    pub fn begin_assistant_placeholder(&mut self) {
        debug_assert!(
            self.streaming_turn().is_none(),
            "assistant placeholder opened while another turn is streaming"
        );
        if let Some(turn) = self.streaming_turn_mut() {
            tracing::error!("Assistant placeholder opened while a turn is streaming");
            turn.finish();
        }
        self.turns.push(Turn::assistant_placeholder());
    }

    /// Reconcile one parsed frame into the streaming turn.
    pub fn apply_frame(&mut self, frame: Frame) -> FrameEffect {
        let Some(turn) = self.streaming_turn_mut() else {
            tracing::debug!(?frame, "Frame arrived with no streaming turn");
            return FrameEffect::Ignored;
        };

        match frame {
            Frame::Chunk { payload, citations } => {
                if turn.content() == payload {
                    return FrameEffect::Unchanged;
                }
                turn.replace_content(payload, citations);
                FrameEffect::Updated
            }
            Frame::Error { message } => {
                turn.fail(format_backend_error(&message));
                FrameEffect::Failed
            }
            Frame::Terminator => {
                turn.finish();
                FrameEffect::Finished
            }
        }
    }

    /// Record a transport failure as an error turn.
    ///
    /// Replaces the streaming placeholder when there is one, so the log never
    /// keeps a turn that will stream forever.
    pub fn fail_active_turn(&mut self, message: impl Into<String>) {
        let message = message.into();
        match self.streaming_turn_mut() {
            Some(turn) => turn.fail(message),
            None => self.turns.push(Turn::assistant_error(message)),
        }
    }

    pub fn append_system_notice(&mut self, text: impl Into<String>) {
        self.push(Turn::system(text));
    }

    /// Deep copy of the log for consumers.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.clone()
    }

    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    #[must_use]
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    #[must_use]
    pub fn streaming_turn(&self) -> Option<&Turn> {
        self.turns.last().filter(|turn| turn.is_streaming())
    }

    /// Settled, non-error user and assistant turns, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.turns
            .iter()
            .filter(|turn| !turn.is_streaming() && !turn.is_error())
            .filter(|turn| matches!(turn.role(), Role::User | Role::Assistant))
            .filter(|turn| !turn.content().is_empty())
            .map(|turn| HistoryEntry {
                role: turn.role(),
                content: turn.content().to_string(),
            })
            .collect()
    }

    fn streaming_turn_mut(&mut self) -> Option<&mut Turn> {
        self.turns.last_mut().filter(|turn| turn.is_streaming())
    }

    /// Append a settled turn. A streaming turn must stay last, so one still
    /// open here is finished first. The session defers notices to avoid this.
    fn push(&mut self, turn: Turn) {
        if let Some(streaming) = self.streaming_turn_mut() {
            tracing::warn!(role = turn.role().as_str(), "Turn appended while a turn is streaming");
            streaming.finish();
        }
        self.turns.push(turn);
    }
}
