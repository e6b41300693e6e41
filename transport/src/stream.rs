//! Cumulative reader over a streamed answer body.
//!
//! The backend's answer stream is consumed the way a progress-event transport
//! exposes it: every increment is the *whole* text received so far, not the
//! newly arrived bytes. Downstream parsing is written against that contract.

use std::time::Duration;

use futures_util::Stream;

use crate::ReadError;

/// Handle to an open answer stream.
///
/// Not restartable: once [`next_increment`](Self::next_increment) returns
/// `None` or an error, the stream is finished.
#[derive(Debug)]
pub struct QuestionStream {
    response: reqwest::Response,
    text: String,
    /// Trailing bytes of a UTF-8 sequence split across reads.
    partial: Vec<u8>,
    received_bytes: usize,
    idle_timeout: Duration,
    max_bytes: usize,
    finished: bool,
}

impl QuestionStream {
    pub(crate) fn new(response: reqwest::Response, idle_timeout: Duration, max_bytes: usize) -> Self {
        Self {
            response,
            text: String::new(),
            partial: Vec::new(),
            received_bytes: 0,
            idle_timeout,
            max_bytes,
            finished: false,
        }
    }

    /// Total text received so far.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Wait for more bytes and return the cumulative text.
    ///
    /// Reads that only deliver part of a multi-byte character do not produce an
    /// increment; the character is exposed once complete.
    pub async fn next_increment(&mut self) -> Option<Result<String, ReadError>> {
        if self.finished {
            return None;
        }

        loop {
            let chunk = match tokio::time::timeout(self.idle_timeout, self.response.chunk()).await
            {
                Err(_) => return Some(Err(self.fail(ReadError::IdleTimeout(self.idle_timeout)))),
                Ok(Err(e)) => return Some(Err(self.fail(ReadError::Interrupted(e)))),
                Ok(Ok(None)) => {
                    self.finished = true;
                    if !self.partial.is_empty() {
                        tracing::warn!(
                            trailing_bytes = self.partial.len(),
                            "Stream ended inside a UTF-8 sequence"
                        );
                    }
                    return None;
                }
                Ok(Ok(Some(chunk))) => chunk,
            };

            self.received_bytes = self.received_bytes.saturating_add(chunk.len());
            if self.received_bytes > self.max_bytes {
                return Some(Err(self.fail(ReadError::BufferLimit {
                    limit: self.max_bytes,
                })));
            }

            self.partial.extend_from_slice(&chunk);
            match self.absorb_partial() {
                Ok(true) => return Some(Ok(self.text.clone())),
                Ok(false) => {}
                Err(e) => return Some(Err(self.fail(e))),
            }
        }
    }

    /// Lazy sequence of cumulative increments.
    pub fn into_updates(self) -> impl Stream<Item = Result<String, ReadError>> + Send {
        futures_util::stream::unfold(self, |mut stream| async move {
            let item = stream.next_increment().await?;
            Some((item, stream))
        })
    }

    /// Move the longest valid UTF-8 prefix of `partial` into `text`.
    ///
    /// Returns whether `text` grew.
    fn absorb_partial(&mut self) -> Result<bool, ReadError> {
        let valid_len = match std::str::from_utf8(&self.partial) {
            Ok(_) => self.partial.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => return Err(ReadError::InvalidUtf8),
        };
        if valid_len == 0 {
            return Ok(false);
        }

        let rest = self.partial.split_off(valid_len);
        let valid = std::mem::replace(&mut self.partial, rest);
        match String::from_utf8(valid) {
            Ok(valid) => {
                self.text.push_str(&valid);
                Ok(true)
            }
            Err(_) => Err(ReadError::InvalidUtf8),
        }
    }

    fn fail(&mut self, error: ReadError) -> ReadError {
        self.finished = true;
        error
    }
}
