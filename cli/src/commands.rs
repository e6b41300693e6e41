//! Input line parsing.

use std::path::PathBuf;

pub const HELP_TEXT: &str = "\
Type a question and press Enter.

  /upload <path>   index a document (.txt .pdf .md .doc .docx)
  /cache on|off    use the backend answer cache
  /status          show connection and cache state
  /help            show this help
  /quit            exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ask(String),
    Upload(PathBuf),
    Cache(bool),
    Status,
    Help,
    Quit,
    /// Slash command that could not be understood, with a hint.
    Invalid(String),
    Blank,
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Self::Blank;
        }
        let Some(rest) = trimmed.strip_prefix('/') else {
            return Self::Ask(trimmed.to_string());
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };

        match name.to_ascii_lowercase().as_str() {
            "upload" if arg.is_empty() => Self::Invalid("usage: /upload <path>".into()),
            "upload" => Self::Upload(PathBuf::from(unquote(arg))),
            "cache" => match arg.to_ascii_lowercase().as_str() {
                "on" | "true" | "1" => Self::Cache(true),
                "off" | "false" | "0" => Self::Cache(false),
                _ => Self::Invalid("usage: /cache on|off".into()),
            },
            "status" => Self::Status,
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            other => Self::Invalid(format!("unknown command: /{other} (try /help)")),
        }
    }
}

fn unquote(arg: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = arg
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    arg
}
