//! The application shell: the single stateful component of the client.
//!
//! [`Shell`] owns all UI state in a [`ShellState`] published through a
//! [`tokio::sync::watch`] channel. Every mutation goes through the channel,
//! so subscribers (the view, tests) are notified after each transition and
//! never observe a half-applied update. The shell never holds the state
//! across an `.await`.
//!
//! # Ingestion
//!
//! ```text
//! Idle ──select_file──▶ FileSelected ──upload_and_ingest──▶ Ingesting
//!                                                        │
//!                              ┌─────────────────────────┴──────────┐
//!                              ▼                                    ▼
//!                       IngestedSuccess                       IngestedError
//! ```
//!
//! # Chat
//!
//! ```text
//! Idle ──send_message──▶ Sending ──response / failure──▶ Idle
//! ```
//!
//! Shell operations never fail: every outcome, including transport errors,
//! becomes visible state (the status banner for ingestion, an `error`
//! transcript entry for chat). The busy flags are reset by drop guards, so
//! they return to `false` on every path.

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{error, info};

use crate::backend::{Backend, TransportError};
use crate::models::{ChatMessage, ChatOutcome, ChatRequest, IngestOutcome};
use crate::upload::{is_allowed, SelectedFile, Upload};

pub const INITIAL_STATUS: &str = "Upload documents to begin.";
pub const UNSUPPORTED_FILE_TYPE: &str = "File type not supported. Please select a valid document.";
pub const NO_FILE_SELECTED: &str = "No file selected.";
pub const WELCOME: &str =
    "Knowledge base updated. You can now ask me questions about your documents.";
pub const CLEAR_PROMPT: &str =
    "Are you sure you want to clear the entire knowledge base? This action cannot be undone.";
pub const CLEARED: &str = "Knowledge base cleared. Upload new documents to begin.";
pub const CHAT_FALLBACK_ERROR: &str = "Failed to get a response.";

/// Classification of the ingestion status banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Success,
    Error,
}

/// The single active ingestion status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionStatus {
    pub kind: StatusKind,
    pub message: String,
}

impl IngestionStatus {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Info,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Error,
            message: message.into(),
        }
    }
}

/// Append-only chat transcript.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
    /// Number of times the transcript has been cleared.
    generation: u64,
}

impl Transcript {
    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Drop every entry. Only the knowledge-base reset does this.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.generation += 1;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }
}

/// Everything the UI renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellState {
    pub selected_file: Option<SelectedFile>,
    pub is_ingesting: bool,
    pub status: IngestionStatus,
    /// Set once an ingestion succeeded; cleared with the knowledge base.
    pub docs_ingested: bool,
    pub transcript: Transcript,
    pub is_bot_typing: bool,
}

impl Default for ShellState {
    fn default() -> Self {
        Self {
            selected_file: None,
            is_ingesting: false,
            status: IngestionStatus::info(INITIAL_STATUS),
            docs_ingested: false,
            transcript: Transcript::default(),
            is_bot_typing: false,
        }
    }
}

/// Interactive confirmation for destructive actions.
#[async_trait]
pub trait Confirm: Send + Sync {
    async fn confirm(&self, prompt: &str) -> bool;
}

/// A [`Confirm`] that gives the same answer without asking.
pub struct Assume(pub bool);

#[async_trait]
impl Confirm for Assume {
    async fn confirm(&self, _prompt: &str) -> bool {
        self.0
    }
}

#[derive(Clone, Copy)]
enum BusyFlag {
    Ingesting,
    BotTyping,
}

/// Clears a busy flag when dropped, whatever path the request took.
struct BusyGuard<'a> {
    state: &'a watch::Sender<ShellState>,
    flag: BusyFlag,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        let flag = self.flag;
        self.state.send_modify(|s| match flag {
            BusyFlag::Ingesting => s.is_ingesting = false,
            BusyFlag::BotTyping => s.is_bot_typing = false,
        });
    }
}

/// Owner of the client's state and orchestrator of backend calls.
pub struct Shell<B> {
    backend: B,
    state: watch::Sender<ShellState>,
}

impl<B: Backend> Shell<B> {
    pub fn new(backend: B) -> Self {
        let (state, _) = watch::channel(ShellState::default());
        Self { backend, state }
    }

    /// Subscribe to state changes. The receiver sees every published
    /// transition (coalesced if it falls behind).
    pub fn subscribe(&self) -> watch::Receiver<ShellState> {
        self.state.subscribe()
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> ShellState {
        self.state.borrow().clone()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Offer a file for upload. Returns whether it was accepted.
    ///
    /// A rejected file clears any previous selection but leaves the
    /// transcript and the populated flag alone.
    pub fn select_file(&self, file: SelectedFile) -> bool {
        let accepted = is_allowed(&file.media_type);
        self.state.send_modify(|s| {
            if accepted {
                s.status = IngestionStatus::info(format!("Selected: {}", file.name));
                s.selected_file = Some(file);
            } else {
                s.selected_file = None;
                s.status = IngestionStatus::error(UNSUPPORTED_FILE_TYPE);
            }
        });
        accepted
    }

    /// Upload the selected file to the matching ingest endpoint.
    pub async fn upload_and_ingest(&self) {
        let mut selected = None;
        self.state.send_if_modified(|s| {
            if s.is_ingesting {
                return false;
            }
            match &s.selected_file {
                None => {
                    s.status = IngestionStatus::error(NO_FILE_SELECTED);
                }
                Some(file) => {
                    s.is_ingesting = true;
                    s.status = IngestionStatus::info(format!("Processing {}...", file.name));
                    selected = Some(file.clone());
                }
            }
            true
        });
        let Some(file) = selected else {
            return;
        };

        let _busy = BusyGuard {
            state: &self.state,
            flag: BusyFlag::Ingesting,
        };

        let upload = Upload::new(file);
        let name = upload.file.name.clone();
        match self.backend.ingest(&upload).await {
            Ok(response) => match response.outcome() {
                IngestOutcome::Ingested { num_chunks } => {
                    info!(file = %name, num_chunks, "ingestion succeeded");
                    self.state.send_modify(|s| {
                        s.status = IngestionStatus::success(format!(
                            "Successfully added {} new chunks from {}.",
                            num_chunks, name
                        ));
                        s.docs_ingested = true;
                        s.selected_file = None;
                        if s.transcript.is_empty() {
                            s.transcript.push(ChatMessage::bot(WELCOME, None));
                        }
                    });
                }
                IngestOutcome::Failed { error } => {
                    let message = error.unwrap_or_else(|| format!("Failed to process {}.", name));
                    self.state
                        .send_modify(|s| s.status = IngestionStatus::error(message));
                }
            },
            Err(TransportError::Read { source, .. }) => {
                error!(file = %name, error = %source, "could not read selected file");
                self.state.send_modify(|s| {
                    s.status =
                        IngestionStatus::error(format!("Could not read {}: {}", name, source));
                });
            }
            Err(err) => {
                error!(file = %name, error = %err, "ingest request failed");
                self.state.send_modify(|s| {
                    s.status = IngestionStatus::error(format!(
                        "Error: {} - Is the backend server running?",
                        err.status_text()
                    ));
                });
            }
        }
    }

    /// Reset the backend knowledge base and local state after confirmation.
    ///
    /// Returns `true` only when the backend confirmed the reset.
    pub async fn clear_knowledge_base(&self, confirm: &dyn Confirm) -> bool {
        if !confirm.confirm(CLEAR_PROMPT).await {
            return false;
        }

        match self.backend.clear_knowledge_base().await {
            Ok(_) => {
                info!("knowledge base cleared");
                self.state.send_modify(|s| {
                    s.status = IngestionStatus::info(CLEARED);
                    s.docs_ingested = false;
                    s.transcript.clear();
                    s.selected_file = None;
                });
                true
            }
            Err(err) => {
                error!(error = %err, "clear request failed");
                self.state.send_modify(|s| {
                    s.status = IngestionStatus::error(format!(
                        "Error clearing knowledge base: {}",
                        err.status_text()
                    ));
                });
                false
            }
        }
    }

    /// Send the question held in `input`.
    ///
    /// Blank input, or a send while another is outstanding, is ignored and
    /// leaves `input` untouched. Otherwise `input` is cleared, the question
    /// is appended as a `user` entry, and exactly one `bot` or `error`
    /// entry follows once the request settles.
    pub async fn send_message(&self, input: &mut String) {
        let question = input.trim().to_string();
        if question.is_empty() {
            return;
        }

        let accepted = self.state.send_if_modified(|s| {
            if s.is_bot_typing {
                return false;
            }
            s.transcript.push(ChatMessage::user(question.clone()));
            s.is_bot_typing = true;
            true
        });
        if !accepted {
            return;
        }
        input.clear();

        let _busy = BusyGuard {
            state: &self.state,
            flag: BusyFlag::BotTyping,
        };

        let reply = match self.backend.chat(&ChatRequest { question }).await {
            Ok(response) => match response.outcome() {
                ChatOutcome::Answered { answer, citations } => {
                    ChatMessage::bot(answer, Some(citations))
                }
                ChatOutcome::Failed { error } => {
                    ChatMessage::error(error.unwrap_or_else(|| CHAT_FALLBACK_ERROR.to_string()))
                }
            },
            Err(err) => {
                error!(error = %err, "chat request failed");
                ChatMessage::error(format!(
                    "Error: {}. Could not connect to the chat backend.",
                    err.status_text()
                ))
            }
        };
        self.state.send_modify(|s| s.transcript.push(reply));
    }
}
