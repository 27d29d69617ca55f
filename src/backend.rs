//! The seam between the shell and the document QA backend.
//!
//! The shell only talks to the backend through the [`Backend`] trait. The
//! production implementation is [`HttpBackend`](crate::http::HttpBackend);
//! tests plug in in-memory implementations.
//!
//! A [`Backend`] call returns `Ok` whenever the transport delivered a
//! decodable response, even if that response reports an application-level
//! failure. Everything else is a [`TransportError`].

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{ChatRequest, ChatResponse, ClearResponse, IngestResponse};
use crate::upload::Upload;

/// Status text used when no HTTP response was received at all.
pub const UNKNOWN_STATUS_TEXT: &str = "Unknown Error";

/// Failure at the HTTP/network layer.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The backend answered with a non-success status.
    #[error("HTTP {code} {status_text}")]
    Status { code: u16, status_text: String },

    /// No response: connection refused, DNS failure, reset.
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    /// A success status whose body was not the expected JSON.
    #[error("invalid response body ({status_text}): {detail}")]
    Decode { status_text: String, detail: String },

    /// The request could not be built.
    #[error("invalid request: {0}")]
    Request(String),

    /// The selected file could not be read from disk.
    #[error("could not read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl TransportError {
    /// Short status text shown to the user.
    pub fn status_text(&self) -> String {
        match self {
            TransportError::Status { status_text, .. } => status_text.clone(),
            TransportError::Unreachable(_) | TransportError::Request(_) => {
                UNKNOWN_STATUS_TEXT.to_string()
            }
            TransportError::Decode { status_text, .. } => status_text.clone(),
            TransportError::Read { source, .. } => source.to_string(),
        }
    }
}

/// Operations the backend exposes to the client.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Upload a file for ingestion via the route chosen by the shell.
    async fn ingest(&self, upload: &Upload) -> Result<IngestResponse, TransportError>;

    /// Irreversibly drop everything the backend has ingested.
    async fn clear_knowledge_base(&self) -> Result<ClearResponse, TransportError>;

    /// Ask a question against the ingested corpus.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, TransportError>;
}

#[async_trait]
impl<B: Backend + ?Sized> Backend for std::sync::Arc<B> {
    async fn ingest(&self, upload: &Upload) -> Result<IngestResponse, TransportError> {
        (**self).ingest(upload).await
    }

    async fn clear_knowledge_base(&self) -> Result<ClearResponse, TransportError> {
        (**self).clear_knowledge_base().await
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, TransportError> {
        (**self).chat(request).await
    }
}
