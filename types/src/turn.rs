//! Conversation turns.

use serde::{Deserialize, Serialize};

use crate::Citation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

/// One logical message in the conversation log.
///
/// Turns are owned by the conversation store; consumers only ever see copies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Turn {
    role: Role,
    content: String,
    citations: Vec<Citation>,
    is_streaming: bool,
    is_error: bool,
}

impl Turn {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::settled(Role::User, content.into())
    }

    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::settled(Role::System, content.into())
    }

    /// Empty assistant turn awaiting the first chunk.
    #[must_use]
    pub fn assistant_placeholder() -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            citations: Vec::new(),
            is_streaming: true,
            is_error: false,
        }
    }

    #[must_use]
    pub fn assistant_error(content: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::settled(Role::Assistant, content.into())
        }
    }

    fn settled(role: Role, content: String) -> Self {
        Self {
            role,
            content,
            citations: Vec::new(),
            is_streaming: false,
            is_error: false,
        }
    }

    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    #[must_use]
    pub fn citations(&self) -> &[Citation] {
        &self.citations
    }

    #[must_use]
    pub const fn is_streaming(&self) -> bool {
        self.is_streaming
    }

    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.is_error
    }

    /// Replace the answer-so-far and its citation batch wholesale.
    pub fn replace_content(&mut self, content: String, citations: Vec<Citation>) {
        self.content = content;
        self.citations = citations;
    }

    /// Stop streaming, keeping the content as last set.
    pub fn finish(&mut self) {
        self.is_streaming = false;
    }

    /// Terminate the turn with an error message in place of its content.
    pub fn fail(&mut self, content: String) {
        self.content = content;
        self.citations.clear();
        self.is_streaming = false;
        self.is_error = true;
    }
}

/// Prior exchange forwarded to the backend as conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}
