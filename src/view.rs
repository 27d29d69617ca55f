//! Terminal rendering of the shell state.
//!
//! The [`View`] keeps track of what it has already written and, on each
//! state change, writes only the difference: the status banner when it
//! changed and the transcript entries that are new since the last render.
//! New entries always land at the bottom of the output, which keeps the
//! latest message in sight the way a chat window scrolls to its end.
//!
//! [`Renderer`] drives a view from the shell's state channel while an
//! operation is in flight. It renders after each published change (never
//! inside the shell's update) and animates the typing indicator while the
//! bot is answering. Write failures are logged and swallowed.

use std::future::Future;
use std::io::{self, Write};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::warn;

use crate::models::{ChatMessage, Role};
use crate::shell::{IngestionStatus, ShellState, StatusKind};
use crate::typing::TypingIndicator;

const RESET: &str = "\x1b[0m";
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const SLATE: &str = "\x1b[90m";
const CYAN: &str = "\x1b[36m";
const CLEAR_LINE: &str = "\r\x1b[2K";

/// How often the typing indicator is redrawn.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(150);

/// Colour used for a status banner of the given kind.
pub fn status_color(kind: StatusKind) -> &'static str {
    match kind {
        StatusKind::Success => GREEN,
        StatusKind::Error => RED,
        StatusKind::Info => SLATE,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ViewOptions {
    pub color: bool,
    pub show_citations: bool,
    /// Draw the animated typing indicator (needs a terminal).
    pub animate: bool,
}

/// Incremental writer of shell state.
pub struct View {
    opts: ViewOptions,
    rendered: usize,
    generation: u64,
    last_status: Option<IngestionStatus>,
    typing_since: Option<Instant>,
    indicator_drawn: bool,
}

impl View {
    pub fn new(opts: ViewOptions) -> Self {
        Self {
            opts,
            rendered: 0,
            generation: 0,
            last_status: None,
            typing_since: None,
            indicator_drawn: false,
        }
    }

    /// Start from `state` without writing it, so only later changes show.
    pub fn sync_to(&mut self, state: &ShellState) {
        self.rendered = state.transcript.len();
        self.generation = state.transcript.generation();
        self.last_status = Some(state.status.clone());
    }

    pub fn is_typing(&self) -> bool {
        self.typing_since.is_some()
    }

    /// Write everything that changed since the previous render.
    pub fn render(&mut self, state: &ShellState, out: &mut dyn Write) -> io::Result<()> {
        self.erase_indicator(out)?;

        if state.transcript.generation() != self.generation {
            self.generation = state.transcript.generation();
            self.rendered = 0;
            writeln!(out, "{}", self.paint(SLATE, "──── transcript cleared ────"))?;
        }

        if self.last_status.as_ref() != Some(&state.status) {
            self.write_status(&state.status, out)?;
            self.last_status = Some(state.status.clone());
        }

        for msg in &state.transcript.messages()[self.rendered..] {
            self.write_message(msg, out)?;
        }
        self.rendered = state.transcript.len();

        match (state.is_bot_typing, self.typing_since) {
            (true, None) => self.typing_since = Some(Instant::now()),
            (false, Some(_)) => self.typing_since = None,
            _ => {}
        }
        if self.typing_since.is_some() {
            self.draw_indicator(out)?;
        }

        out.flush()
    }

    /// Redraw the typing indicator in place.
    pub fn tick(&mut self, out: &mut dyn Write) -> io::Result<()> {
        if self.typing_since.is_none() {
            return Ok(());
        }
        self.erase_indicator(out)?;
        self.draw_indicator(out)?;
        out.flush()
    }

    pub fn write_status(&self, status: &IngestionStatus, out: &mut dyn Write) -> io::Result<()> {
        writeln!(
            out,
            "{}",
            self.paint(status_color(status.kind), &status.message)
        )
    }

    pub fn write_message(&self, msg: &ChatMessage, out: &mut dyn Write) -> io::Result<()> {
        match msg.role {
            Role::User => writeln!(out, "{} {}", self.paint(CYAN, "you ›"), msg.content)?,
            Role::Bot => writeln!(out, "{} {}", self.paint(GREEN, "bot ›"), msg.content)?,
            Role::Loading => writeln!(out, "{}", self.paint(SLATE, &msg.content))?,
            Role::Error => {
                let line = format!("error › {}", msg.content);
                writeln!(out, "{}", self.paint(RED, &line))?
            }
        }
        if self.opts.show_citations {
            for (i, c) in msg.citations().iter().enumerate() {
                let line = format!("    [{}] {}: {}", i + 1, c.source, c.preview);
                writeln!(out, "{}", self.paint(SLATE, &line))?;
            }
        }
        Ok(())
    }

    fn draw_indicator(&mut self, out: &mut dyn Write) -> io::Result<()> {
        let (Some(since), true) = (self.typing_since, self.opts.animate) else {
            return Ok(());
        };
        let frame = TypingIndicator::frame(since.elapsed());
        write!(out, "{}", self.paint(SLATE, &frame))?;
        self.indicator_drawn = true;
        Ok(())
    }

    fn erase_indicator(&mut self, out: &mut dyn Write) -> io::Result<()> {
        if self.indicator_drawn {
            write!(out, "{}", CLEAR_LINE)?;
            self.indicator_drawn = false;
        }
        Ok(())
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.opts.color {
            format!("{}{}{}", color, text, RESET)
        } else {
            text.to_string()
        }
    }
}

/// Renders a [`View`] from the shell's state channel.
pub struct Renderer<W> {
    view: View,
    rx: watch::Receiver<ShellState>,
    out: W,
}

impl<W: Write> Renderer<W> {
    pub fn new(view: View, rx: watch::Receiver<ShellState>, out: W) -> Self {
        Self { view, rx, out }
    }

    /// Render whatever changed since the last render.
    pub fn refresh(&mut self) {
        let state = self.rx.borrow_and_update().clone();
        if let Err(e) = self.view.render(&state, &mut self.out) {
            warn!(error = %e, "could not scroll transcript to bottom");
        }
    }

    /// Output sink, for lines that are not part of the shell state.
    pub fn out(&mut self) -> &mut W {
        &mut self.out
    }

    /// Await `op`, rendering every state change it publishes.
    ///
    /// A change is rendered only after the update that caused it has been
    /// published and the task has yielded once, so the view always reads a
    /// settled snapshot.
    pub async fn run<F: Future>(&mut self, op: F) -> F::Output {
        enum Step<T> {
            Done(T),
            Changed(bool),
            Tick,
        }

        tokio::pin!(op);
        let mut ticker = tokio::time::interval(FRAME_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut closed = false;

        loop {
            let typing = self.view.is_typing();
            let step = tokio::select! {
                output = &mut op => Step::Done(output),
                changed = self.rx.changed(), if !closed => Step::Changed(changed.is_ok()),
                _ = ticker.tick(), if typing => Step::Tick,
            };

            match step {
                Step::Done(output) => {
                    self.refresh();
                    return output;
                }
                Step::Changed(open) => {
                    closed = !open;
                    tokio::task::yield_now().await;
                    self.refresh();
                }
                Step::Tick => {
                    if let Err(e) = self.view.tick(&mut self.out) {
                        warn!(error = %e, "could not draw typing indicator");
                    }
                }
            }
        }
    }
}
