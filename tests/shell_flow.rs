//! Ingest, clear and chat flows of the shell against an in-memory backend.
//!
//! The backend records every call and can be made to pause inside a
//! request, so the tests can observe the shell while a request is in
//! flight.

use async_trait::async_trait;
use doc_chat::backend::{Backend, TransportError};
use doc_chat::models::{
    ChatMessage, ChatRequest, ChatResponse, Citation, ClearResponse, IngestResponse, Role,
};
use doc_chat::shell::{
    Assume, Shell, StatusKind, CHAT_FALLBACK_ERROR, CLEARED, NO_FILE_SELECTED,
    UNSUPPORTED_FILE_TYPE, WELCOME,
};
use doc_chat::upload::{SelectedFile, Upload, UploadRoute, ALLOWED_MEDIA_TYPES};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

// ─── Test Backend ───────────────────────────────────────────────────

type Reply<T> = Box<dyn Fn() -> Result<T, TransportError> + Send + Sync>;

/// Pauses a request until the test releases it.
#[derive(Default)]
struct Gate {
    entered: Notify,
    release: Notify,
}

impl Gate {
    async fn pass(&self) {
        self.entered.notify_one();
        self.release.notified().await;
    }
}

struct ScriptedBackend {
    ingest_reply: Reply<IngestResponse>,
    clear_reply: Reply<ClearResponse>,
    chat_reply: Reply<ChatResponse>,
    uploads: Mutex<Vec<Upload>>,
    questions: Mutex<Vec<String>>,
    clears: Mutex<usize>,
    gate: Option<Arc<Gate>>,
}

impl ScriptedBackend {
    fn new() -> Self {
        Self {
            ingest_reply: Box::new(|| {
                Ok(IngestResponse {
                    status: "ingested".to_string(),
                    num_chunks: Some(1),
                    error: None,
                })
            }),
            clear_reply: Box::new(|| {
                Ok(ClearResponse {
                    status: "cleared".to_string(),
                })
            }),
            chat_reply: Box::new(|| {
                Ok(ChatResponse {
                    answer: Some("ok".to_string()),
                    citations: vec![],
                    error: None,
                })
            }),
            uploads: Mutex::new(Vec::new()),
            questions: Mutex::new(Vec::new()),
            clears: Mutex::new(0),
            gate: None,
        }
    }

    fn on_ingest(
        mut self,
        reply: impl Fn() -> Result<IngestResponse, TransportError> + Send + Sync + 'static,
    ) -> Self {
        self.ingest_reply = Box::new(reply);
        self
    }

    fn on_clear(
        mut self,
        reply: impl Fn() -> Result<ClearResponse, TransportError> + Send + Sync + 'static,
    ) -> Self {
        self.clear_reply = Box::new(reply);
        self
    }

    fn on_chat(
        mut self,
        reply: impl Fn() -> Result<ChatResponse, TransportError> + Send + Sync + 'static,
    ) -> Self {
        self.chat_reply = Box::new(reply);
        self
    }

    fn gated(mut self, gate: Arc<Gate>) -> Self {
        self.gate = Some(gate);
        self
    }

    fn uploads(&self) -> Vec<Upload> {
        self.uploads.lock().unwrap().clone()
    }

    fn questions(&self) -> Vec<String> {
        self.questions.lock().unwrap().clone()
    }

    fn clears(&self) -> usize {
        *self.clears.lock().unwrap()
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn ingest(&self, upload: &Upload) -> Result<IngestResponse, TransportError> {
        self.uploads.lock().unwrap().push(upload.clone());
        if let Some(gate) = &self.gate {
            gate.pass().await;
        }
        (self.ingest_reply)()
    }

    async fn clear_knowledge_base(&self) -> Result<ClearResponse, TransportError> {
        *self.clears.lock().unwrap() += 1;
        (self.clear_reply)()
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, TransportError> {
        self.questions.lock().unwrap().push(request.question.clone());
        if let Some(gate) = &self.gate {
            gate.pass().await;
        }
        (self.chat_reply)()
    }
}

fn bad_gateway() -> TransportError {
    TransportError::Status {
        code: 502,
        status_text: "Bad Gateway".to_string(),
    }
}

fn pdf() -> SelectedFile {
    SelectedFile::new("handbook.pdf", "application/pdf", "/docs/handbook.pdf")
}

// ─── File selection ─────────────────────────────────────────────────

#[test]
fn test_unsupported_types_are_rejected() {
    let shell = Shell::new(ScriptedBackend::new());
    for media_type in [
        "image/png",
        "application/octet-stream",
        "text/html",
        "application/x-tar",
        "video/mp4",
    ] {
        shell.select_file(pdf());
        let accepted = shell.select_file(SelectedFile::new("x", media_type, "x"));
        let state = shell.snapshot();
        assert!(!accepted, "{} accepted", media_type);
        assert!(state.selected_file.is_none());
        assert_eq!(state.status.kind, StatusKind::Error);
        assert_eq!(state.status.message, UNSUPPORTED_FILE_TYPE);
    }
}

#[test]
fn test_supported_types_are_accepted() {
    let shell = Shell::new(ScriptedBackend::new());
    for (i, media_type) in ALLOWED_MEDIA_TYPES.iter().enumerate() {
        let name = format!("doc-{}", i);
        assert!(shell.select_file(SelectedFile::new(name.clone(), *media_type, "f")));
        let state = shell.snapshot();
        assert_eq!(state.selected_file.unwrap().name, name);
        assert_eq!(state.status.kind, StatusKind::Info);
        assert!(state.status.message.contains(&name));
    }
}

#[tokio::test]
async fn test_rejection_keeps_ingested_state() {
    let shell = Shell::new(ScriptedBackend::new());
    shell.select_file(pdf());
    shell.upload_and_ingest().await;

    shell.select_file(SelectedFile::new("pic.png", "image/png", "pic.png"));
    let state = shell.snapshot();
    assert!(state.docs_ingested);
    assert_eq!(state.transcript.len(), 1);
}

// ─── Ingestion ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_upload_without_file_makes_no_call() {
    let shell = Shell::new(ScriptedBackend::new());
    shell.upload_and_ingest().await;

    let state = shell.snapshot();
    assert!(shell.backend().uploads().is_empty());
    assert_eq!(state.status.kind, StatusKind::Error);
    assert_eq!(state.status.message, NO_FILE_SELECTED);
    assert!(!state.is_ingesting);
}

#[tokio::test]
async fn test_zip_goes_to_folder_endpoint() {
    let shell = Shell::new(ScriptedBackend::new());
    shell.select_file(SelectedFile::new("bundle.zip", "application/zip", "bundle.zip"));
    shell.upload_and_ingest().await;
    shell.select_file(pdf());
    shell.upload_and_ingest().await;

    let uploads = shell.backend().uploads();
    assert_eq!(uploads.len(), 2);
    assert_eq!(uploads[0].route, UploadRoute::Folder);
    assert_eq!(uploads[0].route.path(), "/ingest-folder");
    assert_eq!(uploads[0].route.field(), "folder");
    assert_eq!(uploads[1].route, UploadRoute::File);
    assert_eq!(uploads[1].route.path(), "/ingest-file");
    assert_eq!(uploads[1].route.field(), "file");
}

#[tokio::test]
async fn test_pdf_ingest_end_to_end() {
    let backend = ScriptedBackend::new().on_ingest(|| {
        Ok(IngestResponse {
            status: "ingested".to_string(),
            num_chunks: Some(5),
            error: None,
        })
    });
    let shell = Shell::new(backend);
    assert!(shell.select_file(pdf()));
    shell.upload_and_ingest().await;

    let state = shell.snapshot();
    assert_eq!(state.status.kind, StatusKind::Success);
    assert!(state.status.message.contains('5'));
    assert!(state.status.message.contains("new chunks"));
    assert_eq!(
        state.status.message,
        "Successfully added 5 new chunks from handbook.pdf."
    );
    assert!(state.docs_ingested);
    assert!(!state.is_ingesting);
    assert!(state.selected_file.is_none());
    assert_eq!(state.transcript.messages(), &[ChatMessage::bot(WELCOME, None)]);
}

#[tokio::test]
async fn test_welcome_only_seeds_empty_transcript() {
    let shell = Shell::new(ScriptedBackend::new());
    let mut input = "hello".to_string();
    shell.send_message(&mut input).await;

    for _ in 0..2 {
        shell.select_file(pdf());
        shell.upload_and_ingest().await;
    }

    let state = shell.snapshot();
    assert_eq!(shell.backend().uploads().len(), 2);
    assert_eq!(state.transcript.len(), 2);
    assert!(state
        .transcript
        .messages()
        .iter()
        .all(|m| m.content != WELCOME));
}

#[tokio::test]
async fn test_ingest_structured_error() {
    let shell = Shell::new(ScriptedBackend::new().on_ingest(|| {
        Ok(IngestResponse {
            status: "error".to_string(),
            num_chunks: None,
            error: Some("Unsupported encoding".to_string()),
        })
    }));
    shell.select_file(pdf());
    shell.upload_and_ingest().await;

    let state = shell.snapshot();
    assert_eq!(state.status.kind, StatusKind::Error);
    assert_eq!(state.status.message, "Unsupported encoding");
    assert!(!state.docs_ingested);
    assert!(state.transcript.is_empty());
    assert!(!state.is_ingesting);
}

#[tokio::test]
async fn test_ingest_structured_error_fallback() {
    let shell = Shell::new(ScriptedBackend::new().on_ingest(|| Ok(IngestResponse::default())));
    shell.select_file(pdf());
    shell.upload_and_ingest().await;

    let state = shell.snapshot();
    assert_eq!(state.status.message, "Failed to process handbook.pdf.");
    assert_eq!(state.status.kind, StatusKind::Error);
}

#[tokio::test]
async fn test_ingest_transport_error() {
    let shell = Shell::new(ScriptedBackend::new().on_ingest(|| Err(bad_gateway())));
    shell.select_file(pdf());
    shell.upload_and_ingest().await;

    let state = shell.snapshot();
    assert_eq!(state.status.kind, StatusKind::Error);
    assert_eq!(
        state.status.message,
        "Error: Bad Gateway - Is the backend server running?"
    );
    assert!(!state.is_ingesting);
    // The selection survives a failed upload so it can be retried.
    assert!(state.selected_file.is_some());
}

#[tokio::test]
async fn test_ingest_in_flight_blocks_second_upload() {
    let gate = Arc::new(Gate::default());
    let shell = Shell::new(ScriptedBackend::new().gated(gate.clone()));
    shell.select_file(pdf());

    tokio::join!(shell.upload_and_ingest(), async {
        gate.entered.notified().await;
        let state = shell.snapshot();
        assert!(state.is_ingesting);
        assert_eq!(state.status.message, "Processing handbook.pdf...");

        // Ignored while the first upload is outstanding.
        shell.upload_and_ingest().await;
        gate.release.notify_one();
    });

    assert_eq!(shell.backend().uploads().len(), 1);
    assert!(!shell.snapshot().is_ingesting);
}

// ─── Clear knowledge base ───────────────────────────────────────────

#[tokio::test]
async fn test_clear_resets_local_state() {
    let shell = Shell::new(ScriptedBackend::new());
    shell.select_file(pdf());
    shell.upload_and_ingest().await;
    let mut input = "question".to_string();
    shell.send_message(&mut input).await;
    shell.select_file(pdf());

    assert!(shell.clear_knowledge_base(&Assume(true)).await);

    let state = shell.snapshot();
    assert_eq!(shell.backend().clears(), 1);
    assert_eq!(state.transcript.len(), 0);
    assert!(state.selected_file.is_none());
    assert!(!state.docs_ingested);
    assert_eq!(state.status.kind, StatusKind::Info);
    assert_eq!(state.status.message, CLEARED);
}

#[tokio::test]
async fn test_clear_requires_confirmation() {
    let shell = Shell::new(ScriptedBackend::new());
    shell.select_file(pdf());
    shell.upload_and_ingest().await;

    assert!(!shell.clear_knowledge_base(&Assume(false)).await);
    assert_eq!(shell.backend().clears(), 0);
    assert!(shell.snapshot().docs_ingested);
}

#[tokio::test]
async fn test_clear_transport_error_leaves_state() {
    let shell = Shell::new(ScriptedBackend::new().on_clear(|| Err(bad_gateway())));
    shell.select_file(pdf());
    shell.upload_and_ingest().await;
    let before = shell.snapshot();

    assert!(!shell.clear_knowledge_base(&Assume(true)).await);

    let after = shell.snapshot();
    assert_eq!(after.status.kind, StatusKind::Error);
    assert_eq!(
        after.status.message,
        "Error clearing knowledge base: Bad Gateway"
    );
    assert_eq!(after.transcript, before.transcript);
    assert_eq!(after.selected_file, before.selected_file);
    assert!(after.docs_ingested);
}

// ─── Chat ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_blank_question_is_ignored() {
    let shell = Shell::new(ScriptedBackend::new());
    for blank in ["", "   ", "\n\t "] {
        let mut input = blank.to_string();
        shell.send_message(&mut input).await;
    }
    assert!(shell.snapshot().transcript.is_empty());
    assert!(shell.backend().questions().is_empty());
}

#[tokio::test]
async fn test_refund_policy_question_end_to_end() {
    let gate = Arc::new(Gate::default());
    let backend = ScriptedBackend::new().gated(gate.clone()).on_chat(|| {
        Ok(ChatResponse {
            answer: Some("Refunds are issued within 30 days.".to_string()),
            citations: vec![Citation {
                source: "policy.pdf".to_string(),
                preview: "Refunds are issued...".to_string(),
            }],
            error: None,
        })
    });
    let shell = Shell::new(backend);
    let before = shell.snapshot().transcript.len();
    let mut input = "  What is the refund policy?  ".to_string();

    tokio::join!(shell.send_message(&mut input), async {
        gate.entered.notified().await;
        let state = shell.snapshot();
        assert!(state.is_bot_typing);
        assert_eq!(state.transcript.len(), before + 1);
        let last = state.transcript.last().unwrap();
        assert_eq!(last.role, Role::User);
        assert_eq!(last.content, "What is the refund policy?");
        gate.release.notify_one();
    });

    assert!(input.is_empty());
    assert_eq!(shell.backend().questions(), vec!["What is the refund policy?"]);

    let state = shell.snapshot();
    assert!(!state.is_bot_typing);
    assert_eq!(state.transcript.len(), before + 2);
    let bot = state.transcript.last().unwrap();
    assert_eq!(bot.role, Role::Bot);
    assert_eq!(bot.content, "Refunds are issued within 30 days.");
    assert_eq!(bot.citations().len(), 1);
    assert_eq!(bot.citations()[0].source, "policy.pdf");
}

#[tokio::test]
async fn test_send_while_typing_is_ignored() {
    let gate = Arc::new(Gate::default());
    let shell = Shell::new(ScriptedBackend::new().gated(gate.clone()));
    let mut first = "first".to_string();

    tokio::join!(shell.send_message(&mut first), async {
        gate.entered.notified().await;
        let mut second = "second".to_string();
        shell.send_message(&mut second).await;
        assert_eq!(second, "second");
        gate.release.notify_one();
    });

    assert_eq!(shell.backend().questions(), vec!["first"]);
    let roles: Vec<Role> = shell
        .snapshot()
        .transcript
        .messages()
        .iter()
        .map(|m| m.role)
        .collect();
    assert_eq!(roles, vec![Role::User, Role::Bot]);
}

#[tokio::test]
async fn test_chat_structured_error() {
    let shell = Shell::new(ScriptedBackend::new().on_chat(|| {
        Ok(ChatResponse {
            answer: None,
            citations: vec![],
            error: Some("No documents ingested yet.".to_string()),
        })
    }));
    let mut input = "anything?".to_string();
    shell.send_message(&mut input).await;

    let state = shell.snapshot();
    assert_eq!(state.transcript.len(), 2);
    assert_eq!(
        state.transcript.last(),
        Some(&ChatMessage::error("No documents ingested yet."))
    );
    assert!(!state.is_bot_typing);
}

#[tokio::test]
async fn test_chat_structured_error_fallback() {
    let shell = Shell::new(ScriptedBackend::new().on_chat(|| Ok(ChatResponse::default())));
    let mut input = "anything?".to_string();
    shell.send_message(&mut input).await;

    assert_eq!(
        shell.snapshot().transcript.last(),
        Some(&ChatMessage::error(CHAT_FALLBACK_ERROR))
    );
}

#[tokio::test]
async fn test_chat_transport_error() {
    let shell = Shell::new(ScriptedBackend::new().on_chat(|| {
        Err(TransportError::Unreachable("connection refused".to_string()))
    }));
    let mut input = "hello?".to_string();
    shell.send_message(&mut input).await;

    let state = shell.snapshot();
    assert!(!state.is_bot_typing);
    assert_eq!(state.transcript.len(), 2);
    assert_eq!(
        state.transcript.last(),
        Some(&ChatMessage::error(
            "Error: Unknown Error. Could not connect to the chat backend."
        ))
    );

    // The flag is free again, so the next question goes out.
    let mut input = "again".to_string();
    shell.send_message(&mut input).await;
    assert_eq!(shell.backend().questions().len(), 2);
}

#[tokio::test]
async fn test_subscriber_is_notified_of_each_message() {
    let shell = Shell::new(ScriptedBackend::new());
    let mut rx = shell.subscribe();
    let mut input = "ping".to_string();
    shell.send_message(&mut input).await;

    assert!(rx.has_changed().unwrap());
    let state = rx.borrow_and_update().clone();
    assert_eq!(state.transcript.len(), 2);
    assert!(!rx.has_changed().unwrap());
}
