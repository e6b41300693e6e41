//! Transient notices for the presentation layer.
//!
//! Upload results and connectivity problems are banners, not conversation
//! turns. They accumulate here until the presentation drains them.

use docchat_types::Notice;

/// Queue for pending notices.
///
/// Consecutive duplicates are collapsed so a backend that stays down does not
/// flood the banner with the same message on every health probe.
#[derive(Debug, Default)]
pub struct NoticeQueue {
    pending: Vec<Notice>,
}

impl NoticeQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, notice: Notice) {
        if self.pending.last() == Some(&notice) {
            return;
        }
        if notice.is_error() {
            tracing::warn!(notice = %notice, "Notice");
        } else {
            tracing::info!(notice = %notice, "Notice");
        }
        self.pending.push(notice);
    }

    /// Take all pending notices in the order they were raised.
    pub fn take(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.pending)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }
}
