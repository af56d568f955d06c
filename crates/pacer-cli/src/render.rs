//! Terminal rendering of conversation events.

use std::io::Write;

use tokio::sync::mpsc;

use pacer_agent::ConversationEvent;
use pacer_core::{ConversationState, MessageRole};

/// Text of `current` not yet printed, when `current` extends `printed`.
fn unprinted<'a>(printed: &str, current: &'a str) -> Option<&'a str> {
    current
        .strip_prefix(printed)
        .filter(|rest| !rest.is_empty())
}

/// Prints assistant text as it grows, plus tool and reasoning status lines.
#[derive(Debug, Default)]
pub struct Renderer {
    index: Option<usize>,
    printed: String,
    thinking: bool,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&mut self, event: &ConversationEvent, out: &mut impl Write) -> std::io::Result<()> {
        match event {
            ConversationEvent::MessageCreated { index, message }
            | ConversationEvent::MessageUpdated { index, message }
                if message.role == MessageRole::Assistant =>
            {
                if self.index != Some(*index) {
                    if self.index.is_some() {
                        writeln!(out)?;
                    }
                    self.index = Some(*index);
                    self.printed.clear();
                }
                if let Some(rest) = unprinted(&self.printed, &message.content) {
                    write!(out, "{}", rest)?;
                    self.printed.push_str(rest);
                }
            }
            ConversationEvent::Reasoning { is_streaming, .. } => {
                if *is_streaming && !self.thinking {
                    write!(out, "\x1b[90m[thinking...]\x1b[0m ")?;
                }
                self.thinking = *is_streaming;
            }
            ConversationEvent::ToolStarted { description, .. } => {
                writeln!(out, "\n\x1b[36m> {}\x1b[0m", description)?;
            }
            ConversationEvent::ToolCompleted { result } if !result.success => {
                writeln!(
                    out,
                    "\x1b[33m  {} failed: {}\x1b[0m",
                    result.tool_name,
                    result.error_text.as_deref().unwrap_or("unknown error")
                )?;
            }
            ConversationEvent::State {
                state: ConversationState::Idle,
            } => {
                writeln!(out)?;
                self.index = None;
                self.printed.clear();
            }
            _ => {}
        }
        out.flush()
    }

    /// Print events until the channel closes.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<ConversationEvent>) {
        let mut stdout = std::io::stdout();
        while let Some(event) = events.recv().await {
            if let Err(e) = self.handle(&event, &mut stdout) {
                tracing::debug!("Render failed: {}", e);
            }
        }
    }
}
