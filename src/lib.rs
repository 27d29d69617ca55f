//! # doc-chat
//!
//! A terminal chat client for a document question-answering backend.
//!
//! Users upload documents (PDF, Word, PowerPoint, Markdown, plain text, or
//! zip archives of such files). The client forwards them to the backend for
//! ingestion and then lets the user ask questions that the backend answers
//! from the ingested corpus, with citations. Parsing, chunking, embedding,
//! retrieval and answer generation all happen in the backend.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────┐   ┌──────────────┐   ┌─────────┐
//! │ Session  │──▶│    Shell    │──▶│   Backend    │──▶│  HTTP   │
//! │ (input)  │   │ state+flows │   │    trait     │   │ reqwest │
//! └──────────┘   └──────┬──────┘   └──────────────┘   └─────────┘
//!                       │ watch
//!                       ▼
//!                 ┌──────────┐
//!                 │   View   │
//!                 │ (stdout) │
//!                 └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docchat --backend http://127.0.0.1:8000          # interactive session
//! docchat upload ./handbook.pdf                    # ingest one file
//! docchat ask "What is the refund policy?"
//! docchat clear --yes
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Transcript types and wire envelopes |
//! | [`upload`] | Media-type allow-list and ingest routing |
//! | [`backend`] | Backend trait and transport errors |
//! | [`http`] | HTTP backend |
//! | [`shell`] | Application state and the ingest/clear/chat flows |
//! | [`typing`] | Typing indicator |
//! | [`view`] | Incremental terminal rendering |
//! | [`session`] | Interactive input loop |

pub mod backend;
pub mod config;
pub mod http;
pub mod models;
pub mod session;
pub mod shell;
pub mod typing;
pub mod upload;
pub mod view;
