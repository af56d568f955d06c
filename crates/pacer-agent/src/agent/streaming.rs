//! Streaming coordinator.
//!
//! Drives one streaming model call. Content and reasoning tokens are
//! accumulated, the visible assistant message is created on the first
//! non-empty output and then updated in batches, and a sliding window over
//! the raw content is scanned for tool calls.
//!
//! Everything happens in the task that awaits [`StreamingCoordinator::run`]:
//! the stream, the flush ticker and the interrupt signal are multiplexed with
//! `tokio::select!`, so the delegate only ever sees a single writer.

use std::time::Duration;

use futures::StreamExt;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use pacer_core::{
    ChatRequest, ChatResponse, ConversationDelegate, ConversationState, Error, LlmBackend,
    Message, Result, StreamEvent, ToolRegistry,
};

use super::response_state::ResponseState;
use super::tool_parser::{could_become_tool_call, first_tool_call, ToolCall};
use crate::config::OrchestratorConfig;

/// Sliding window scanned for a complete tool call.
///
/// Latches on the first match: once a call is seen, later tokens are ignored
/// and the buffer never reports another one.
#[derive(Debug, Clone)]
pub struct DetectionBuffer {
    window: String,
    window_chars: usize,
    capacity: usize,
    detected: Option<ToolCall>,
}

impl DetectionBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            window: String::new(),
            window_chars: 0,
            capacity,
            detected: None,
        }
    }

    /// Add a token. Returns the call only on the transition into buffering.
    pub fn push(&mut self, token: &str) -> Option<ToolCall> {
        if self.detected.is_some() {
            return None;
        }

        self.window.push_str(token);
        self.window_chars += token.chars().count();
        if self.window_chars > self.capacity {
            let excess = self.window_chars - self.capacity;
            let cut = self
                .window
                .char_indices()
                .nth(excess)
                .map(|(i, _)| i)
                .unwrap_or(self.window.len());
            self.window.drain(..cut);
            self.window_chars = self.window.chars().count();
        }

        let call = first_tool_call(&self.window)?;
        self.detected = Some(call.clone());
        Some(call)
    }

    /// Whether a tool call has been seen.
    pub fn is_latched(&self) -> bool {
        self.detected.is_some()
    }

    pub fn detected(&self) -> Option<&ToolCall> {
        self.detected.as_ref()
    }

    /// Current window contents, a suffix of everything pushed.
    pub fn window(&self) -> &str {
        &self.window
    }
}

/// Holds back the latest pending message update until the next tick.
#[derive(Debug, Default)]
struct UpdateBatcher {
    pending: Option<Message>,
}

impl UpdateBatcher {
    /// Replace whatever is pending.
    fn schedule(&mut self, message: Message) {
        self.pending = Some(message);
    }

    fn flush(&mut self, delegate: &dyn ConversationDelegate, index: usize) -> Result<()> {
        if let Some(message) = self.pending.take() {
            tracing::debug!(index, len = message.content.len(), "Flushing message update");
            delegate.update_message(index, message)?;
        }
        Ok(())
    }
}

/// How far into `raw` the visible text may extend.
///
/// Text from the first `[` that could still grow into a tool call is held
/// back, unless the held text outgrew the detection window.
fn release_point(raw: &str, visible_len: usize, capacity: usize) -> usize {
    let held = &raw[visible_len..];
    if held.chars().count() > capacity {
        return raw.len();
    }
    held.match_indices('[')
        .map(|(i, _)| i)
        .find(|&i| could_become_tool_call(&held[i..]))
        .map(|i| visible_len + i)
        .unwrap_or(raw.len())
}

fn preview_tail(chunk: &str, max_chars: usize) -> &str {
    let count = chunk.chars().count();
    if count <= max_chars {
        return chunk;
    }
    let start = chunk
        .char_indices()
        .nth(count - max_chars)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &chunk[start..]
}

/// Result of a streaming call that reached the end, or was interrupted.
#[derive(Debug, Clone)]
pub struct StreamingOutcome {
    pub state: ResponseState,
    /// First tool call seen while streaming.
    pub detected_tool: Option<ToolCall>,
    pub cancelled: bool,
}

/// A streaming call that failed, with the message it may have created.
#[derive(Debug, thiserror::Error)]
#[error("Streaming failed: {source}")]
pub struct StreamingFailure {
    pub source: Error,
    pub message_index: Option<usize>,
}

/// Per-call mutable state.
struct StreamSession<'a> {
    delegate: &'a dyn ConversationDelegate,
    registry: &'a ToolRegistry,
    config: &'a OrchestratorConfig,
    raw: String,
    visible_len: usize,
    reasoning: String,
    detection: DetectionBuffer,
    batcher: UpdateBatcher,
    message: Option<(usize, Message)>,
    last_synced: (usize, usize),
    aggregate: Option<ChatResponse>,
    announced: bool,
    reasoning_active: bool,
}

impl<'a> StreamSession<'a> {
    fn new(
        delegate: &'a dyn ConversationDelegate,
        registry: &'a ToolRegistry,
        config: &'a OrchestratorConfig,
    ) -> Self {
        Self {
            delegate,
            registry,
            config,
            raw: String::new(),
            visible_len: 0,
            reasoning: String::new(),
            detection: DetectionBuffer::new(config.detection_buffer_chars),
            batcher: UpdateBatcher::default(),
            message: None,
            last_synced: (0, 0),
            aggregate: None,
            announced: false,
            reasoning_active: false,
        }
    }

    fn visible(&self) -> &str {
        &self.raw[..self.visible_len]
    }

    fn reasoning_opt(&self) -> Option<String> {
        if self.reasoning.trim().is_empty() {
            None
        } else {
            Some(self.reasoning.clone())
        }
    }

    fn message_index(&self) -> Option<usize> {
        self.message.as_ref().map(|(index, _)| *index)
    }

    fn fail(&self, source: Error) -> StreamingFailure {
        StreamingFailure {
            source,
            message_index: self.message_index(),
        }
    }

    fn announce(&mut self) {
        if !self.announced {
            self.announced = true;
            self.delegate
                .notify_conversation_state(ConversationState::Streaming);
        }
    }

    fn handle(&mut self, event: StreamEvent) -> Result<()> {
        match event {
            StreamEvent::Content(token) => self.on_content(&token),
            StreamEvent::Reasoning(token) => self.on_reasoning(&token),
            StreamEvent::Completed(response) => {
                self.aggregate = Some(response);
                Ok(())
            }
        }
    }

    fn on_content(&mut self, token: &str) -> Result<()> {
        if token.is_empty() {
            return Ok(());
        }
        self.announce();
        if self.reasoning_active {
            self.reasoning_active = false;
            self.delegate.notify_reasoning_state(false, None);
        }

        self.raw.push_str(token);
        if self.detection.is_latched() {
            return Ok(());
        }

        match self.detection.push(token) {
            Some(call) => {
                let window_start = self.raw.len() - self.detection.window().len();
                // Released text stays shown even if the match began inside it
                self.visible_len = self.visible_len.max(window_start + call.span.start);
                tracing::info!(tool = %call.name, "Tool call detected in stream");
                self.delegate
                    .notify_tool_detected(&call.name, &self.registry.describe(&call.name));
            }
            None => {
                self.visible_len =
                    release_point(&self.raw, self.visible_len, self.config.detection_buffer_chars);
            }
        }
        self.sync()
    }

    fn on_reasoning(&mut self, token: &str) -> Result<()> {
        if token.is_empty() {
            return Ok(());
        }
        self.announce();
        self.reasoning.push_str(token);
        self.reasoning_active = true;
        self.delegate.notify_reasoning_state(
            true,
            Some(preview_tail(token, self.config.reasoning_preview_chars)),
        );
        self.sync()
    }

    /// Create the message on first output, otherwise schedule an update.
    fn sync(&mut self) -> Result<()> {
        let current = (self.visible_len, self.reasoning.len());
        if current == self.last_synced {
            return Ok(());
        }
        let reasoning = self.reasoning_opt();
        if self.visible().is_empty() && reasoning.is_none() {
            return Ok(());
        }

        match &self.message {
            None => {
                let message = Message::assistant_streaming(self.visible(), reasoning);
                let index = self.delegate.create_message(message.clone())?;
                tracing::debug!(index, "Created streaming message");
                self.message = Some((index, message));
            }
            Some((_, base)) => {
                let mut message = base.clone();
                message.content = self.visible().to_string();
                message.reasoning = reasoning;
                self.batcher.schedule(message);
            }
        }
        self.last_synced = current;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        match self.message_index() {
            Some(index) => self.batcher.flush(self.delegate, index),
            None => Ok(()),
        }
    }

    fn finish(mut self, cancelled: bool) -> Result<StreamingOutcome> {
        if !self.detection.is_latched() {
            self.visible_len = self.raw.len();
        }
        self.sync()?;
        self.flush()?;
        if self.reasoning_active {
            self.delegate.notify_reasoning_state(false, None);
        }

        let aggregate = self.aggregate.take().unwrap_or_default();
        let mut state = ResponseState::new();
        if aggregate.content.is_empty() {
            state.set_content(std::mem::take(&mut self.raw));
        } else {
            state.set_content(aggregate.content);
        }
        state.set_reasoning(aggregate.reasoning.or_else(|| self.reasoning_opt()));
        if let Some(index) = self.message_index() {
            state.set_message_index(index);
        }
        state.mark_complete();

        Ok(StreamingOutcome {
            state,
            detected_tool: self.detection.detected().cloned(),
            cancelled,
        })
    }
}

/// Resolves once the interrupt flag is raised; never resolves without one.
async fn wait_for_interrupt(signal: &mut Option<watch::Receiver<bool>>) {
    let Some(rx) = signal.as_mut() else {
        return std::future::pending().await;
    };
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // Sender dropped without raising the flag
            return std::future::pending().await;
        }
    }
}

/// Runs a single streaming call against the delegate.
pub struct StreamingCoordinator<'a> {
    backend: &'a dyn LlmBackend,
    delegate: &'a dyn ConversationDelegate,
    registry: &'a ToolRegistry,
    config: &'a OrchestratorConfig,
    interrupt: Option<watch::Receiver<bool>>,
}

impl<'a> StreamingCoordinator<'a> {
    pub fn new(
        backend: &'a dyn LlmBackend,
        delegate: &'a dyn ConversationDelegate,
        registry: &'a ToolRegistry,
        config: &'a OrchestratorConfig,
    ) -> Self {
        Self {
            backend,
            delegate,
            registry,
            config,
            interrupt: None,
        }
    }

    pub fn with_interrupt_signal(mut self, rx: Option<watch::Receiver<bool>>) -> Self {
        self.interrupt = rx;
        self
    }

    /// Stream one response.
    ///
    /// Failures are returned as-is; retrying or falling back is the
    /// caller's job.
    pub async fn run(
        &self,
        request: ChatRequest,
    ) -> std::result::Result<StreamingOutcome, StreamingFailure> {
        let mut session = StreamSession::new(self.delegate, self.registry, self.config);
        let mut stream = self
            .backend
            .stream(request)
            .await
            .map_err(|e| session.fail(e.into()))?;

        let period = self.config.flush_interval().max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut interrupt = self.interrupt.clone();

        let cancelled = loop {
            tokio::select! {
                biased;

                _ = wait_for_interrupt(&mut interrupt) => {
                    tracing::info!("Stream interrupted by user");
                    break true;
                }
                _ = ticker.tick() => {
                    session.flush().map_err(|e| session.fail(e))?;
                }
                event = stream.next() => match event {
                    Some(Ok(event)) => {
                        session.handle(event).map_err(|e| session.fail(e))?;
                    }
                    Some(Err(e)) => {
                        tracing::warn!("Stream error: {}", e);
                        return Err(session.fail(e.into()));
                    }
                    None => break false,
                },
            }
        };

        let index = session.message_index();
        session.finish(cancelled).map_err(|source| StreamingFailure {
            source,
            message_index: index,
        })
    }
}
