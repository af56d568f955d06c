//! Turn loop for a single user message.
//!
//! The first turn streams; if streaming fails it is retried once without
//! streaming. Every later turn is a plain completion fed with the previous
//! turn's tool results. The loop stops when a turn produces no tool calls or
//! when `max_turns` is reached, and always leaves a non-empty, completed
//! assistant message behind unless an error escapes.

use std::sync::Arc;

use tokio::sync::watch;

use pacer_core::{
    ChatRequest, ConversationDelegate, ConversationState, Error, LlmBackend, Message,
    MessageRole, Result, ToolCallResult, ToolRegistry,
};

use super::response_state::ResponseState;
use super::streaming::StreamingCoordinator;
use super::tool_execution::{ToolExecution, ToolExecutionCoordinator};
use super::tool_parser::strip_tool_calls;
use crate::config::OrchestratorConfig;

/// Credentials, model and system prompt for a response.
#[derive(Clone)]
pub struct RequestContext {
    pub api_key: String,
    pub model: String,
    pub system_prompt: String,
}

impl RequestContext {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            system_prompt: system_prompt.into(),
        }
    }

    fn request(&self, history: &[Message]) -> ChatRequest {
        ChatRequest::from_history(&self.api_key, &self.model, &self.system_prompt, history)
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

/// What a call to [`ResponseOrchestrator::respond`] produced.
#[derive(Debug, Clone)]
pub struct OrchestrationResult {
    pub final_state: ResponseState,
    /// Model turns used.
    pub turns: usize,
    pub had_tools: bool,
    pub cancelled: bool,
}

/// Where the final text goes.
#[derive(Debug, Clone, Copy)]
enum MessageTarget {
    Existing(usize),
    New,
    /// Already on screen as a completed message.
    AlreadyShown,
}

#[derive(Debug)]
struct Finish {
    content: String,
    reasoning: Option<String>,
    target: MessageTarget,
    cancelled: bool,
}

impl Finish {
    fn new(content: String, reasoning: Option<String>, index: Option<usize>) -> Self {
        Self {
            content,
            reasoning,
            target: index.map_or(MessageTarget::New, MessageTarget::Existing),
            cancelled: false,
        }
    }

    fn cancelled(mut self) -> Self {
        self.cancelled = true;
        self
    }
}

/// Last non-blank assistant reply since the latest user message.
fn last_assistant_reply(history: &[Message]) -> Option<String> {
    history
        .iter()
        .rev()
        .take_while(|m| m.role != MessageRole::User)
        .find(|m| m.role == MessageRole::Assistant && !m.is_blank())
        .map(|m| m.content.trim().to_string())
}

/// Drives the model until it stops asking for tools.
pub struct ResponseOrchestrator {
    backend: Arc<dyn LlmBackend>,
    registry: Arc<ToolRegistry>,
    delegate: Arc<dyn ConversationDelegate>,
    config: OrchestratorConfig,
    interrupt: Option<watch::Receiver<bool>>,
}

impl ResponseOrchestrator {
    pub fn new(
        backend: Arc<dyn LlmBackend>,
        registry: Arc<ToolRegistry>,
        delegate: Arc<dyn ConversationDelegate>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            backend,
            registry,
            delegate,
            config,
            interrupt: None,
        }
    }

    /// Set the interrupt signal checked between turns and during streaming.
    pub fn with_interrupt_signal(mut self, rx: watch::Receiver<bool>) -> Self {
        self.interrupt = Some(rx);
        self
    }

    /// Create an interruptible orchestrator.
    /// Returns the sender that raises the interrupt.
    pub fn with_interrupt(self) -> (Self, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        (self.with_interrupt_signal(rx), tx)
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    fn is_interrupted(&self) -> bool {
        self.interrupt
            .as_ref()
            .map(|rx| *rx.borrow())
            .unwrap_or(false)
    }

    /// Produce the assistant reply to the latest user message in the history.
    pub async fn respond(&self, ctx: &RequestContext) -> Result<OrchestrationResult> {
        let delegate = &*self.delegate;
        delegate.notify_conversation_state(ConversationState::PreparingResponse);
        tracing::info!(model = %ctx.model, max_turns = self.config.max_turns, "Preparing response");

        let mut turn = 0;
        let mut had_tools = false;
        let mut tool_history: Vec<ToolCallResult> = Vec::new();
        let mut best_content = String::new();

        let finish = loop {
            if self.is_interrupted() {
                tracing::info!(turn, "Interrupted between turns");
                // Earlier turns completed their messages already
                let finish = if best_content.is_empty() {
                    Finish::new(String::new(), None, None)
                } else {
                    Finish {
                        content: best_content.clone(),
                        reasoning: None,
                        target: MessageTarget::AlreadyShown,
                        cancelled: false,
                    }
                };
                break finish.cancelled();
            }

            turn += 1;
            tracing::info!(turn, "Starting turn");

            // Message left open by a failed stream, reused by the fallback
            let mut in_flight: Option<usize> = None;
            let (mut response, cancelled) = match self.run_turn(turn, ctx, &mut in_flight).await {
                Ok(turn_result) => turn_result,
                Err(e) => {
                    self.abandon(in_flight);
                    return Err(e);
                }
            };

            if cancelled {
                let cleaned = strip_tool_calls(response.content());
                let content = if cleaned.is_empty() { best_content.clone() } else { cleaned };
                let reasoning = response.reasoning().map(str::to_string);
                break Finish::new(content, reasoning, response.message_index()).cancelled();
            }

            if !response.has_content() {
                tracing::warn!(turn, "Model returned no content, synthesizing a reply");
                response.set_content(self.synthesize(&tool_history));
            }

            let execution = match ToolExecutionCoordinator::new(&self.registry, delegate)
                .process(&response)
                .await
            {
                Ok(execution) => execution,
                Err(e) => {
                    self.abandon(response.message_index().or(in_flight));
                    return Err(e);
                }
            };
            let reasoning = response.reasoning().map(str::to_string);

            match execution {
                ToolExecution::NoTools { cleaned_response } => {
                    break Finish::new(cleaned_response, reasoning, response.message_index());
                }
                ToolExecution::Executed {
                    results,
                    cleaned_response,
                    system_message,
                } => {
                    had_tools = true;
                    tool_history.extend(results);
                    // The turn's message is complete; the next turn starts a new one
                    if let Err(e) = delegate.create_message(system_message) {
                        self.abandon(response.message_index());
                        return Err(e);
                    }
                    if !cleaned_response.is_empty() {
                        best_content = cleaned_response.clone();
                    }

                    if turn >= self.config.max_turns {
                        tracing::warn!(turn, "Turn limit reached, finalizing");
                        if cleaned_response.is_empty() {
                            break Finish::new(self.synthesize(&tool_history), None, None);
                        }
                        break Finish::new(cleaned_response, reasoning, response.message_index());
                    }
                }
            }
        };

        let cancelled = finish.cancelled;
        let final_state = self.finalize(finish)?;

        if !self.config.idle_delay().is_zero() {
            tokio::time::sleep(self.config.idle_delay()).await;
        }
        delegate.notify_conversation_state(ConversationState::Idle);

        tracing::info!(turn, had_tools, cancelled, "Response finished");
        Ok(OrchestrationResult {
            final_state,
            turns: turn,
            had_tools,
            cancelled,
        })
    }

    /// One model call. Returns the response and whether it was interrupted.
    async fn run_turn(
        &self,
        turn: usize,
        ctx: &RequestContext,
        in_flight: &mut Option<usize>,
    ) -> Result<(ResponseState, bool)> {
        let delegate = &*self.delegate;
        let request = ctx.request(&delegate.history());

        if turn == 1 {
            let coordinator = StreamingCoordinator::new(
                &*self.backend,
                delegate,
                &self.registry,
                &self.config,
            )
            .with_interrupt_signal(self.interrupt.clone());

            match coordinator.run(request.clone()).await {
                Ok(outcome) => return Ok((outcome.state, outcome.cancelled)),
                Err(failure) => {
                    tracing::warn!("Streaming failed, falling back to a plain completion: {}", failure.source);
                    delegate.notify_reasoning_state(false, None);
                    if failure.message_index.is_some() {
                        *in_flight = failure.message_index;
                    }
                }
            }
        }

        let response = self.backend.complete(request).await?;
        let mut state = ResponseState::completed(response.content, response.reasoning);
        self.attach_message(&mut state, *in_flight)?;
        Ok((state, false))
    }

    /// Bind a non-streamed response to a visible message.
    fn attach_message(&self, state: &mut ResponseState, in_flight: Option<usize>) -> Result<()> {
        let index = match in_flight {
            Some(index) => index,
            None => {
                let visible = strip_tool_calls(state.content());
                if visible.is_empty() && state.reasoning().is_none() {
                    return Ok(());
                }
                let message =
                    Message::assistant_streaming(visible, state.reasoning().map(str::to_string));
                self.delegate.create_message(message)?
            }
        };
        state.set_message_index(index);
        Ok(())
    }

    /// Reply text built from tool results or earlier output.
    ///
    /// May be empty; finalization substitutes the fallback text.
    fn synthesize(&self, tool_history: &[ToolCallResult]) -> String {
        let succeeded: Vec<String> = tool_history
            .iter()
            .filter(|r| r.success && !r.result_text.trim().is_empty())
            .map(|r| format!("- {}", r.result_text.trim()))
            .collect();
        if !succeeded.is_empty() {
            return format!("Here's what I did:\n{}", succeeded.join("\n"));
        }

        let failed: Vec<String> = tool_history
            .iter()
            .filter(|r| !r.success)
            .map(|r| {
                format!(
                    "- {}: {}",
                    r.tool_name,
                    r.error_text.as_deref().unwrap_or("unknown error")
                )
            })
            .collect();
        if !failed.is_empty() {
            return format!("I couldn't complete that:\n{}", failed.join("\n"));
        }

        last_assistant_reply(&self.delegate.history()).unwrap_or_default()
    }

    fn finalize(&self, finish: Finish) -> Result<ResponseState> {
        let delegate = &*self.delegate;
        delegate.notify_conversation_state(ConversationState::Finalizing);

        let mut content = finish.content.trim().to_string();
        if content.is_empty() {
            tracing::warn!("Nothing to show, using fallback text");
            content = self.config.fallback_text.clone();
        }

        let mut state = ResponseState::new();
        state.set_content(content.clone());
        state.set_reasoning(finish.reasoning);

        match finish.target {
            MessageTarget::Existing(index) => {
                let mut message = delegate
                    .message(index)
                    .ok_or(Error::MessageNotFound(index))?;
                message.content = content;
                if let Some(reasoning) = state.reasoning() {
                    message.reasoning = Some(reasoning.to_string());
                }
                message.complete();
                delegate.update_message(index, message)?;
                state.set_message_index(index);
            }
            MessageTarget::New => {
                let mut message = Message::assistant(content);
                message.reasoning = state.reasoning().map(str::to_string);
                let index = delegate.create_message(message)?;
                state.set_message_index(index);
            }
            MessageTarget::AlreadyShown => {}
        }

        state.mark_complete();
        Ok(state)
    }

    /// Close an in-flight message before an error escapes.
    fn abandon(&self, index: Option<usize>) {
        let delegate = &*self.delegate;
        if let Some(index) = index {
            if let Some(mut message) = delegate.message(index) {
                if message.is_streaming() {
                    if message.is_blank() {
                        message.content = self.config.fallback_text.clone();
                    }
                    message.complete();
                    if let Err(e) = delegate.update_message(index, message) {
                        tracing::error!("Failed to close message {}: {}", index, e);
                    }
                }
            }
        }
        delegate.notify_conversation_state(ConversationState::Idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_assistant_reply_stops_at_user() {
        let history = vec![
            Message::assistant("Old answer"),
            Message::user("Plan my week"),
            Message::assistant("Sure, let's plan."),
            Message::system("Tool results:\n[get_schedule] succeeded:\nEmpty"),
            Message::assistant("   "),
        ];
        assert_eq!(
            last_assistant_reply(&history).as_deref(),
            Some("Sure, let's plan.")
        );
        assert_eq!(last_assistant_reply(&history[..2]), None);
    }

    #[test]
    fn test_request_context_debug_redacts_key() {
        let ctx = RequestContext::new("sk-secret", "deepseek/deepseek-r1", "Be a coach");
        let debug = format!("{:?}", ctx);
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("deepseek"));
    }
}
