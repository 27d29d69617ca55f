//! Core data models shared by the shell and the HTTP layer.
//!
//! Two families of types live here:
//!
//! - **Transcript types** ([`ChatMessage`], [`Role`], [`Citation`]) that the
//!   shell appends to the conversation and the view renders.
//! - **Wire envelopes** ([`IngestResponse`], [`ChatResponse`],
//!   [`ClearResponse`], [`ChatRequest`]) decoded from or encoded to the
//!   backend's JSON.
//!
//! The backend's envelopes carry success and error fields side by side.
//! Before the shell acts on a response it is interpreted into a strict
//! outcome ([`IngestOutcome`], [`ChatOutcome`]) so that exactly one path is
//! taken per response.

use serde::{Deserialize, Deserializer, Serialize};

/// Who authored a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Bot,
    Loading,
    Error,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Bot => "bot",
            Role::Loading => "loading",
            Role::Error => "error",
        }
    }
}

/// A pointer to the document content an answer was drawn from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    /// Identifier or path of the originating document.
    pub source: String,
    /// Short excerpt of the supporting text.
    pub preview: String,
}

/// One entry of the chat transcript.
///
/// Messages are immutable once appended; the only way to remove one is to
/// clear the whole transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citations: Option<Vec<Citation>>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            citations: None,
        }
    }

    pub fn bot(content: impl Into<String>, citations: Option<Vec<Citation>>) -> Self {
        Self {
            role: Role::Bot,
            content: content.into(),
            citations,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            role: Role::Error,
            content: content.into(),
            citations: None,
        }
    }

    /// Citations attached to this message, empty when there are none.
    pub fn citations(&self) -> &[Citation] {
        self.citations.as_deref().unwrap_or(&[])
    }
}

/// Body of `POST /chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub question: String,
}

/// Response of `POST /ingest-file` and `POST /ingest-folder`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_chunks: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response of `POST /chat`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub citations: Vec<Citation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response of `POST /clear-knowledge-base`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
}

/// Backends send `null` for fields they have nothing to report in.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Status value the backend reports for a successful ingestion.
pub const INGESTED: &str = "ingested";

/// Interpreted result of an ingestion response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Ingested { num_chunks: u64 },
    Failed { error: Option<String> },
}

impl IngestResponse {
    pub fn outcome(self) -> IngestOutcome {
        if self.status == INGESTED {
            IngestOutcome::Ingested {
                num_chunks: self.num_chunks.unwrap_or(0),
            }
        } else {
            IngestOutcome::Failed {
                error: non_empty(self.error),
            }
        }
    }
}

/// Interpreted result of a chat response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatOutcome {
    Answered {
        answer: String,
        citations: Vec<Citation>,
    },
    Failed {
        error: Option<String>,
    },
}

impl ChatResponse {
    pub fn outcome(self) -> ChatOutcome {
        match non_empty(self.answer) {
            Some(answer) => ChatOutcome::Answered {
                answer,
                citations: self.citations,
            },
            None => ChatOutcome::Failed {
                error: non_empty(self.error),
            },
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}
