//! Core engine for docchat: answer stream reconciliation and session control.
//!
//! This crate owns the conversation state and has no terminal dependencies.
//! The presentation layer drives a [`Session`] and renders its snapshots and
//! notices.

pub mod config;
pub mod conversation;
pub mod errors;
pub mod frames;
mod health;
pub mod notifications;
pub mod session;

pub use config::{ConfigError, DocchatConfig, SessionSettings, config_path, docchat_home};
pub use conversation::{Conversation, FrameEffect};
pub use frames::{FrameParseError, FrameParser, parse_buffer, parse_line};
pub use notifications::NoticeQueue;
pub use session::{
    CycleId, IgnoreReason, Session, SessionUpdate, SubmitOutcome, UploadStart,
};

// Re-export from crates for public API
pub use docchat_transport::{self, BackendClient, BackendConfig, ClientBuildError, UploadError};
pub use docchat_types::{
    Citation, CycleOutcome, CyclePhase, FailureReason, Frame, HistoryEntry, Notice, NoticeLevel,
    Role, SessionState, Turn,
};
