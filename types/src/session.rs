//! Session-wide flags and question cycle states.

/// Process-wide flags for the lifetime of an open session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionState {
    /// Last known backend reachability. Starts optimistic.
    pub connected: bool,
    /// Whether questions ask the backend to use its answer cache.
    pub caching: bool,
    /// A question cycle is in flight.
    pub pending: bool,
}

impl SessionState {
    #[must_use]
    pub const fn new(caching: bool) -> Self {
        Self {
            connected: true,
            caching,
            pending: false,
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Phase of the current (or most recent) question cycle.
///
/// ```text
/// Idle -> Submitting -> Streaming -> Completed
///              |             |
///              +-------------+----> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CyclePhase {
    #[default]
    Idle,
    /// Request issued, no bytes received yet.
    Submitting,
    /// At least one increment applied.
    Streaming,
    Completed,
    Failed,
}

impl CyclePhase {
    /// Returns true while a cycle owns the conversation.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Submitting | Self::Streaming)
    }
}

/// Why a question cycle ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The backend reported an error frame.
    Backend(String),
    /// The request could not be established.
    Connectivity(String),
    /// The stream broke after it was established.
    Interrupted(String),
}

impl FailureReason {
    #[must_use]
    pub fn detail(&self) -> &str {
        match self {
            Self::Backend(detail) | Self::Connectivity(detail) | Self::Interrupted(detail) => {
                detail
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed,
    Failed(FailureReason),
}

impl CycleOutcome {
    #[must_use]
    pub const fn phase(&self) -> CyclePhase {
        match self {
            Self::Completed => CyclePhase::Completed,
            Self::Failed(_) => CyclePhase::Failed,
        }
    }
}
