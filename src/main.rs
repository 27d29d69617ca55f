//! # doc-chat CLI (`docchat`)
//!
//! Terminal client for a document question-answering backend.
//!
//! ## Usage
//!
//! ```bash
//! docchat [--config ./config/docchat.toml] [--backend <url>] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docchat chat` | Interactive session (the default) |
//! | `docchat upload <path>` | Ingest one document or zip archive |
//! | `docchat ask "<question>"` | Ask one question and print the answer |
//! | `docchat clear` | Clear the backend knowledge base |
//! | `docchat completions <shell>` | Print shell completions |

use anyhow::{bail, Result};
use clap::{CommandFactory, Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use doc_chat::config::{self, Config};
use doc_chat::http::HttpBackend;
use doc_chat::models::Role;
use doc_chat::session::{run_session, Terminal};
use doc_chat::shell::{Assume, Confirm, Shell, StatusKind};
use doc_chat::upload::SelectedFile;
use doc_chat::view::{Renderer, View, ViewOptions};

/// doc-chat: upload documents to a question-answering backend and chat
/// about them.
#[derive(Parser)]
#[command(
    name = "docchat",
    about = "Chat with your documents through a document QA backend",
    version
)]
struct Cli {
    /// Path to a configuration file (TOML). Built-in defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL; overrides `[backend].url`.
    #[arg(long, global = true)]
    backend: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session.
    ///
    /// Type questions directly; use /help for upload and maintenance commands.
    Chat,

    /// Upload one document or zip archive for ingestion.
    ///
    /// Accepted: .pdf, .md, .txt, .doc, .docx, .ppt, .pptx, .zip.
    Upload {
        /// File to upload.
        path: PathBuf,
    },

    /// Ask a single question and print the answer with its citations.
    Ask {
        /// The question.
        question: String,
    },

    /// Clear the backend knowledge base. This cannot be undone.
    Clear {
        /// Do not ask for confirmation.
        #[arg(long)]
        yes: bool,
    },

    /// Print shell completions to stdout.
    Completions {
        /// Target shell.
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Some(Commands::Completions { shell }) = &cli.command {
        clap_complete::generate(*shell, &mut Cli::command(), "docchat", &mut std::io::stdout());
        return Ok(());
    }

    let mut cfg = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => Config::minimal(),
    };
    if let Some(url) = cli.backend {
        cfg.backend.url = url;
        config::validate(&cfg)?;
    }

    let shell = Shell::new(HttpBackend::new(&cfg.backend.url)?);
    let color = cfg.ui.color.enabled();
    let view = View::new(ViewOptions {
        color,
        show_citations: cfg.ui.show_citations,
        animate: atty::is(atty::Stream::Stdout),
    });

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => {
            let mut renderer = Renderer::new(view, shell.subscribe(), std::io::stdout());
            println!(
                "Connected to {}. Type /help for commands.",
                shell.backend().base_url()
            );
            run_session(&shell, &Terminal::stdin(), &mut renderer).await?;
        }
        Commands::Upload { path } => {
            let mut renderer = one_shot(view, &shell);
            if shell.select_file(SelectedFile::from_path(&path)) {
                renderer.run(shell.upload_and_ingest()).await;
            } else {
                renderer.refresh();
            }
            let status = shell.snapshot().status;
            if status.kind == StatusKind::Error {
                bail!("upload failed: {}", status.message);
            }
        }
        Commands::Ask { question } => {
            if question.trim().is_empty() {
                bail!("question must not be empty");
            }
            let mut renderer = one_shot(view, &shell);
            let mut input = question;
            renderer.run(shell.send_message(&mut input)).await;
            if let Some(last) = shell.snapshot().transcript.last() {
                if last.role == Role::Error {
                    bail!("chat failed: {}", last.content);
                }
            }
        }
        Commands::Clear { yes } => {
            let terminal = Terminal::stdin();
            let assume = Assume(true);
            let confirm: &dyn Confirm = if yes { &assume } else { &terminal };
            let mut renderer = one_shot(view, &shell);
            let cleared = renderer.run(shell.clear_knowledge_base(confirm)).await;
            if !cleared {
                let status = shell.snapshot().status;
                if status.kind == StatusKind::Error {
                    bail!("{}", status.message);
                }
                println!("Aborted.");
            }
        }
        Commands::Completions { .. } => unreachable!(),
    }

    std::io::stdout().flush()?;
    Ok(())
}

/// Renderer for single commands: starts from the current state so only
/// what the command changes is printed.
fn one_shot(mut view: View, shell: &Shell<HttpBackend>) -> Renderer<std::io::Stdout> {
    view.sync_to(&shell.snapshot());
    Renderer::new(view, shell.subscribe(), std::io::stdout())
}
