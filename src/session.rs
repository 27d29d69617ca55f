//! Interactive chat session.
//!
//! Reads one line at a time, maps it to a shell operation and renders the
//! resulting state changes. Lines starting with `/` are commands; anything
//! else is a question for the backend.
//!
//! | Input | Action |
//! |-------|--------|
//! | `/select <path>` | pick a file for upload |
//! | `/ingest` | upload the selected file |
//! | `/upload <path>` | pick a file and upload it |
//! | `/clear` | clear the knowledge base (asks first) |
//! | `/status` | show the current ingestion state |
//! | `/help` | list commands |
//! | `/quit` | leave the session |

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use tracing::warn;

use crate::backend::Backend;
use crate::shell::{Confirm, Shell};
use crate::upload::SelectedFile;
use crate::view::Renderer;

pub const HELP: &str = "\
Commands:
  /select <path>   pick a document or .zip archive to upload
  /ingest          upload the selected file
  /upload <path>   pick a file and upload it right away
  /clear           clear the knowledge base
  /status          show ingestion status
  /help            show this help
  /quit            leave
Anything else is sent as a question.";

/// A parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ask(String),
    Select(PathBuf),
    Ingest,
    Upload(PathBuf),
    Clear,
    Status,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Command::Empty;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Command::Ask(line.to_string());
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };
        match (name, arg.is_empty()) {
            ("select", false) => Command::Select(PathBuf::from(arg)),
            ("upload", false) => Command::Upload(PathBuf::from(arg)),
            ("ingest", true) => Command::Ingest,
            ("clear", true) => Command::Clear,
            ("status", true) => Command::Status,
            ("help", _) => Command::Help,
            ("quit" | "exit", true) => Command::Quit,
            _ => Command::Unknown(line.to_string()),
        }
    }
}

/// Line-oriented input, also used to confirm destructive actions.
///
/// Confirmation prompts are written to stderr so stdout carries only the
/// conversation.
pub struct Terminal<R> {
    lines: Mutex<Lines<R>>,
}

impl Terminal<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R: AsyncBufRead + Unpin> Terminal<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: Mutex::new(reader.lines()),
        }
    }

    /// Next input line, or `None` at end of input.
    pub async fn read_line(&self) -> std::io::Result<Option<String>> {
        self.lines.lock().await.next_line().await
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> Confirm for Terminal<R> {
    async fn confirm(&self, prompt: &str) -> bool {
        write_prompt(&mut std::io::stderr().lock(), prompt);
        match self.read_line().await {
            Ok(Some(answer)) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
            _ => false,
        }
    }
}

/// Run the interactive loop until `/quit` or end of input.
pub async fn run_session<B, R, W>(
    shell: &Shell<B>,
    terminal: &Terminal<R>,
    renderer: &mut Renderer<W>,
) -> Result<()>
where
    B: Backend,
    R: AsyncBufRead + Unpin + Send,
    W: Write,
{
    renderer.refresh();
    loop {
        emit(renderer, "> ", false);
        let Some(line) = terminal.read_line().await? else {
            break;
        };

        match Command::parse(&line) {
            Command::Ask(question) => {
                let mut input = question;
                renderer.run(shell.send_message(&mut input)).await;
            }
            Command::Select(path) => {
                shell.select_file(SelectedFile::from_path(&path));
                renderer.refresh();
            }
            Command::Ingest => renderer.run(shell.upload_and_ingest()).await,
            Command::Upload(path) => {
                if shell.select_file(SelectedFile::from_path(&path)) {
                    renderer.run(shell.upload_and_ingest()).await;
                } else {
                    renderer.refresh();
                }
            }
            Command::Clear => {
                renderer.run(shell.clear_knowledge_base(terminal)).await;
            }
            Command::Status => {
                let state = shell.snapshot();
                let selected = state
                    .selected_file
                    .as_ref()
                    .map(|f| format!("{} ({})", f.name, f.media_type))
                    .unwrap_or_else(|| "none".to_string());
                let summary = format!(
                    "status:         {}\nselected file:  {}\nknowledge base: {}\nmessages:       {}",
                    state.status.message,
                    selected,
                    if state.docs_ingested { "populated" } else { "empty" },
                    state.transcript.len()
                );
                emit(renderer, &summary, true);
            }
            Command::Help => emit(renderer, HELP, true),
            Command::Quit => break,
            Command::Empty => {}
            Command::Unknown(input) => {
                emit(renderer, &format!("Unknown command: {} (try /help)", input), true)
            }
        }
    }
    Ok(())
}

fn write_prompt(out: &mut dyn Write, prompt: &str) {
    if let Err(e) = write!(out, "{} [y/N] ", prompt).and_then(|_| out.flush()) {
        warn!(error = %e, "could not write confirmation prompt");
    }
}

fn emit<W: Write>(renderer: &mut Renderer<W>, text: &str, newline: bool) {
    let out = renderer.out();
    let res = if newline {
        writeln!(out, "{}", text)
    } else {
        write!(out, "{}", text)
    };
    if let Err(e) = res.and_then(|_| out.flush()) {
        warn!(error = %e, "could not write to terminal");
    }
}
