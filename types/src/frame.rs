//! Parsed units of the answer stream.

use crate::Citation;

/// Line prefix that marks a frame in the answer stream.
pub const FRAME_PREFIX: &str = "data:";

/// Token that terminates the answer stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// One parsed unit of a streamed answer.
///
/// Frames are ephemeral: the parser produces them and the conversation store
/// consumes them within a single increment.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Cumulative answer-so-far with the full citation batch.
    Chunk {
        payload: String,
        citations: Vec<Citation>,
    },
    /// Backend reported an error; terminates the turn.
    Error { message: String },
    /// End-of-stream sentinel.
    Terminator,
}

impl Frame {
    #[must_use]
    pub fn chunk(payload: impl Into<String>) -> Self {
        Self::Chunk {
            payload: payload.into(),
            citations: Vec::new(),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
