//! Line-oriented transcript rendering.
//!
//! The terminal is append-only, so a cumulative answer is printed by writing
//! only the suffix that extends what is already on screen. When a new snapshot
//! does not extend it, the full answer is printed again on a fresh line.

use docchat_types::{Citation, Notice, NoticeLevel, Role, Turn};

#[derive(Debug, Default)]
pub struct Transcript {
    /// Turns fully written to the terminal.
    printed_turns: usize,
    /// Visible text of the assistant turn currently being written.
    partial: String,
}

impl Transcript {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Text to write so the terminal reflects `turns`.
    pub fn render(&mut self, turns: &[Turn]) -> String {
        let mut out = String::new();

        while let Some(turn) = turns.get(self.printed_turns) {
            match turn.role() {
                // Echoed by the terminal as it was typed.
                Role::User => {}
                Role::System => {
                    out.push_str(turn.content());
                    out.push('\n');
                }
                Role::Assistant => {
                    self.render_answer(turn, &mut out);
                    if turn.is_streaming() {
                        return out;
                    }
                    out.push('\n');
                    for citation in turn.citations() {
                        out.push_str(&format_citation(citation));
                        out.push('\n');
                    }
                    self.partial.clear();
                }
            }
            self.printed_turns += 1;
        }

        out
    }

    fn render_answer(&mut self, turn: &Turn, out: &mut String) {
        let content = turn.content();
        match content.strip_prefix(self.partial.as_str()) {
            Some(suffix) => out.push_str(suffix),
            None => {
                out.push('\n');
                out.push_str(content);
            }
        }
        self.partial.clear();
        self.partial.push_str(content);
    }
}

#[must_use]
pub fn format_citation(citation: &Citation) -> String {
    match citation.match_percent() {
        Some(percent) => format!("  📄 {} ⭐ {percent:.1}% match", citation.source_label()),
        None => format!("  📄 {}", citation.source_label()),
    }
}

#[must_use]
pub fn format_notice(notice: &Notice) -> String {
    match notice.level() {
        NoticeLevel::Info => format!("[info] {}", notice.text()),
        NoticeLevel::Error => format!("[error] {}", notice.text()),
    }
}
