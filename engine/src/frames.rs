//! Frame parsing for the cumulative answer stream.
//!
//! The transport hands over the *entire* text received so far on every
//! increment. Frames are `data:` lines terminated by `\n`; a line without its
//! terminating newline is still in flight and is left for a later increment.
//!
//! Malformed lines are logged and dropped. A single bad line never aborts the
//! stream.

use docchat_transport::AnswerRecord;
use docchat_types::{DONE_SENTINEL, FRAME_PREFIX, Frame};

#[derive(Debug, thiserror::Error)]
pub enum FrameParseError {
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("record carries neither `chunk` nor `error`")]
    EmptyRecord,
}

/// Parse one complete line.
///
/// Returns `None` for lines that are not frames (blank separators, comments,
/// other SSE fields).
pub fn parse_line(line: &str) -> Option<Result<Frame, FrameParseError>> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let token = line.strip_prefix(FRAME_PREFIX)?;
    let token = token.strip_prefix(' ').unwrap_or(token);

    if token == DONE_SENTINEL {
        return Some(Ok(Frame::Terminator));
    }

    let record = match serde_json::from_str::<AnswerRecord>(token) {
        Ok(record) => record,
        Err(e) => return Some(Err(e.into())),
    };

    if let Some(message) = record.error_message() {
        return Some(Ok(Frame::Error { message }));
    }

    let citations = record.citations();
    Some(match record.chunk {
        Some(payload) => Ok(Frame::Chunk { payload, citations }),
        None => Err(FrameParseError::EmptyRecord),
    })
}

/// Parse every complete line of `buffer` into frames, in order.
#[must_use]
pub fn parse_buffer(buffer: &str) -> Vec<Frame> {
    parse_complete_lines(complete_prefix(buffer))
}

fn complete_prefix(buffer: &str) -> &str {
    buffer.rfind('\n').map_or("", |end| &buffer[..=end])
}

fn parse_complete_lines(text: &str) -> Vec<Frame> {
    text.lines()
        .filter_map(|line| match parse_line(line)? {
            Ok(frame) => Some(frame),
            Err(e) => {
                tracing::warn!(%e, payload_bytes = line.len(), "Dropping malformed frame");
                None
            }
        })
        .collect()
}

/// Incremental parser over a cumulative buffer.
///
/// Remembers the complete lines it has already consumed, so feeding the same
/// buffer twice yields nothing the second time. Across any split of the same
/// final text, the frames returned by successive `feed` calls concatenate to
/// exactly `parse_buffer(final)`.
#[derive(Debug, Default)]
pub struct FrameParser {
    consumed: String,
}

impl FrameParser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one increment and return frames completed since the last call.
    pub fn feed(&mut self, cumulative: &str) -> Vec<Frame> {
        if !cumulative.starts_with(self.consumed.as_str()) {
            tracing::warn!(
                consumed_bytes = self.consumed.len(),
                buffer_bytes = cumulative.len(),
                "Stream buffer does not extend consumed text; reparsing from start"
            );
            self.consumed.clear();
        }

        let fresh = complete_prefix(&cumulative[self.consumed.len()..]);
        if fresh.is_empty() {
            return Vec::new();
        }

        let frames = parse_complete_lines(fresh);
        self.consumed.push_str(fresh);
        frames
    }

    /// Parse the final buffer once the stream has ended.
    ///
    /// Nothing will complete an unterminated last line any more, so it is
    /// parsed as a line of its own after any newly completed ones.
    pub fn finish(&mut self, cumulative: &str) -> Vec<Frame> {
        let mut frames = self.feed(cumulative);
        let tail = &cumulative[self.consumed.len()..];
        if !tail.is_empty() {
            frames.extend(parse_complete_lines(tail));
            self.consumed.push_str(tail);
        }
        frames
    }

    /// Bytes of complete lines consumed so far.
    #[must_use]
    pub fn consumed_len(&self) -> usize {
        self.consumed.len()
    }
}
