//! HTTP implementation of [`Backend`].
//!
//! Issues one request per call with no retry and no client-side timeout.
//!
//! # Endpoints
//!
//! | Method | Path | Body |
//! |--------|------|------|
//! | `POST` | `/ingest-file` | multipart, field `file` |
//! | `POST` | `/ingest-folder` | multipart, field `folder` |
//! | `POST` | `/clear-knowledge-base` | `{}` |
//! | `POST` | `/chat` | `{"question": "..."}` |
//!
//! Paths are appended to the configured base URL, so a backend mounted
//! under a prefix (`http://host/api`) works as well as one at the root.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::backend::{Backend, TransportError};
use crate::models::{ChatRequest, ChatResponse, ClearResponse, IngestResponse};
use crate::upload::Upload;

/// [`Backend`] that talks JSON and multipart over HTTP.
#[derive(Clone, Debug)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    /// Create a backend rooted at `base_url` (scheme must be http or https).
    pub fn new(base_url: &str) -> Result<Self> {
        let parsed = reqwest::Url::parse(base_url)
            .with_context(|| format!("Invalid backend URL: {}", base_url))?;
        match parsed.scheme() {
            "http" | "https" => {}
            other => bail!("Unsupported backend URL scheme '{}' (use http or https)", other),
        }

        let client = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn ingest(&self, upload: &Upload) -> Result<IngestResponse, TransportError> {
        let file = &upload.file;
        let bytes = tokio::fs::read(&file.path)
            .await
            .map_err(|source| TransportError::Read {
                path: file.path.display().to_string(),
                source,
            })?;

        let part = Part::bytes(bytes)
            .file_name(file.name.clone())
            .mime_str(&file.media_type)
            .map_err(|e| TransportError::Request(e.to_string()))?;
        let form = Form::new().part(upload.route.field(), part);

        let url = self.url(upload.route.path());
        debug!(%url, field = upload.route.field(), file = %file.name, "sending ingest request");
        let resp = self.client.post(&url).multipart(form).send().await;
        decode(resp).await
    }

    async fn clear_knowledge_base(&self) -> Result<ClearResponse, TransportError> {
        let url = self.url("/clear-knowledge-base");
        debug!(%url, "sending clear request");
        let resp = self
            .client
            .post(&url)
            .json(&serde_json::json!({}))
            .send()
            .await;
        decode(resp).await
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, TransportError> {
        let url = self.url("/chat");
        debug!(%url, "sending chat request");
        let resp = self.client.post(&url).json(request).send().await;
        decode(resp).await
    }
}

/// Map a raw send result onto a decoded envelope or a [`TransportError`].
///
/// - no response → `Unreachable`
/// - non-2xx → `Status` with the canonical reason phrase, or the bare code
/// - 2xx with an empty body → the envelope's default
/// - 2xx with a body that is not the envelope → `Decode`
async fn decode<T>(resp: reqwest::Result<reqwest::Response>) -> Result<T, TransportError>
where
    T: DeserializeOwned + Default,
{
    let response = resp.map_err(|e| TransportError::Unreachable(e.to_string()))?;
    let status = response.status();
    let status_text = status
        .canonical_reason()
        .unwrap_or(status.as_str())
        .to_string();

    if !status.is_success() {
        return Err(TransportError::Status {
            code: status.as_u16(),
            status_text,
        });
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| TransportError::Unreachable(e.to_string()))?;

    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }

    serde_json::from_slice(&body).map_err(|e| TransportError::Decode {
        status_text,
        detail: e.to_string(),
    })
}
