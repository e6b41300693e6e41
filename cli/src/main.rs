//! docchat CLI - Binary entry point and interactive loop.
//!
//! # Architecture
//!
//! The CLI is the presentation layer over [`docchat_engine::Session`]: it
//! turns input lines into session calls and writes conversation snapshots and
//! notices to the terminal.
//!
//! ```text
//! main() -> init_tracing() -> DocchatConfig::load() -> Session -> run()
//!                                                                  |
//!                              stdin line | session.next_update() <+
//! ```
//!
//! Logs go to a file so they never interleave with the transcript.

mod commands;
mod render;

use anyhow::Result;
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
    sync::Mutex,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use docchat_engine::errors::BACKEND_UNREACHABLE_NOTICE;
use docchat_engine::{
    BackendClient, DocchatConfig, IgnoreReason, Session, SubmitOutcome, UploadStart, docchat_home,
};

use commands::{Command, HELP_TEXT};
use render::{Transcript, format_notice};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // No log file: stay silent rather than interleave logs with the transcript.
    tracing_subscriber::registry().with(env_filter).init();
}

fn open_log_file() -> (Option<(PathBuf, fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new().create(true).append(true).open(&candidate) {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => warnings.push(format!(
                "Failed to open log file {}: {e}",
                candidate.display()
            )),
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: ~/.docchat/logs/docchat.log
    if let Some(home) = docchat_home() {
        candidates.push(home.join("logs").join("docchat.log"));
    }

    // Fallback: ./.docchat/logs/docchat.log
    candidates.push(PathBuf::from(".docchat").join("logs").join("docchat.log"));

    candidates
}

fn load_config() -> DocchatConfig {
    match DocchatConfig::load() {
        Ok(config) => config.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(path = %e.path().display(), %e, "Ignoring config file");
            eprintln!("warning: {e}; using defaults");
            DocchatConfig::default()
        }
    }
}

struct Terminal {
    transcript: Transcript,
}

impl Terminal {
    fn write(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }

    fn line(&self, text: &str) {
        self.write(&format!("{text}\n"));
    }

    /// Bring the terminal up to date with the session.
    fn sync(&mut self, session: &mut Session) {
        let output = self.transcript.render(session.conversation().turns());
        self.write(&output);
        for notice in session.take_notices() {
            self.line(&format_notice(&notice));
        }
    }
}

/// Handle one input line. Returns `false` to quit.
async fn handle_line(session: &mut Session, terminal: &mut Terminal, line: &str) -> bool {
    match Command::parse(line) {
        Command::Blank => {}
        Command::Quit => return false,
        Command::Help => terminal.line(HELP_TEXT),
        Command::Invalid(hint) => terminal.line(&hint),
        Command::Status => {
            let state = session.state();
            terminal.line(&format!(
                "backend: {} | cache: {} | answering: {}",
                if state.connected { "connected" } else { "disconnected" },
                if state.caching { "on" } else { "off" },
                if session.phase().is_active() { "yes" } else { "no" },
            ));
        }
        Command::Cache(enabled) => {
            session.set_caching(enabled);
            terminal.line(&format!("cache {}", if enabled { "on" } else { "off" }));
        }
        Command::Upload(path) => match session.start_upload(&path) {
            UploadStart::Started => terminal.line(&format!("uploading {}...", path.display())),
            UploadStart::Ignored => terminal.line("an upload is already in progress"),
            UploadStart::Rejected(_) => {}
        },
        Command::Ask(question) => {
            if !session.state().connected && !session.check_health().await {
                terminal.line(&format!("[error] {BACKEND_UNREACHABLE_NOTICE}"));
                return true;
            }
            match session.submit(&question) {
                SubmitOutcome::Started(_) | SubmitOutcome::Ignored(IgnoreReason::Empty) => {}
                SubmitOutcome::Ignored(IgnoreReason::Pending) => {
                    terminal.line("still answering the previous question");
                }
            }
        }
    }
    terminal.sync(session);
    true
}

async fn run(session: &mut Session) -> Result<()> {
    let mut terminal = Terminal {
        transcript: Transcript::new(),
    };
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    terminal.line("docchat - ask questions about your documents. /help for commands.");
    session.start_health_polling();

    loop {
        let in_flight = session.has_work_in_flight();
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !handle_line(session, &mut terminal, &line).await {
                    break;
                }
            }
            update = session.next_update(), if in_flight => {
                if update.is_some() {
                    terminal.sync(session);
                }
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = load_config();
    let backend = config.backend_config();
    tracing::info!(url = %backend.base_url, "Starting docchat");

    let client = BackendClient::new(backend)?;
    let mut session = Session::new(client, config.session_settings());

    run(&mut session).await
}
