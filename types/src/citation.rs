//! Source citations attached to assistant answers.

use serde::{Deserialize, Serialize};

/// Label used when the backend omits the `source` of a metadata entry.
pub const UNKNOWN_SOURCE_LABEL: &str = "Unknown source";

/// A retrieved source backing an answer, with its relevance score.
///
/// Scores are normalised on construction: non-finite values are dropped and
/// finite values are clamped into `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    source_label: String,
    relevance_score: Option<f64>,
}

impl Citation {
    #[must_use]
    pub fn new(source_label: impl Into<String>, relevance_score: Option<f64>) -> Self {
        let source_label = source_label.into();
        let source_label = if source_label.trim().is_empty() {
            UNKNOWN_SOURCE_LABEL.to_string()
        } else {
            source_label
        };

        Self {
            source_label,
            relevance_score: relevance_score
                .filter(|score| score.is_finite())
                .map(|score| score.clamp(0.0, 1.0)),
        }
    }

    #[must_use]
    pub fn source_label(&self) -> &str {
        &self.source_label
    }

    #[must_use]
    pub const fn relevance_score(&self) -> Option<f64> {
        self.relevance_score
    }

    /// Score as a percentage, for "93.4% match" style display.
    #[must_use]
    pub fn match_percent(&self) -> Option<f64> {
        self.relevance_score.map(|score| score * 100.0)
    }
}
