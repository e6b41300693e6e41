//! Core domain types for docchat.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

mod citation;
mod frame;
mod notice;
mod session;
mod turn;

pub use citation::{Citation, UNKNOWN_SOURCE_LABEL};
pub use frame::{DONE_SENTINEL, FRAME_PREFIX, Frame};
pub use notice::{Notice, NoticeLevel};
pub use session::{CycleOutcome, CyclePhase, FailureReason, SessionState};
pub use turn::{HistoryEntry, Role, Turn};
