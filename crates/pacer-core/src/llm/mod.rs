//! Abstract LLM backend.
//!
//! The transport itself lives outside the orchestration core. Backends
//! expose a blocking-style completion call and a streaming call that yields
//! content and reasoning tokens, arbitrarily interleaved, followed by an
//! optional final aggregate.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::message::{Message, MessageRole};

/// LLM transport error.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// Network error
    #[error("Network error: {0}")]
    Network(String),

    /// Credentials rejected
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Non-success HTTP status
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    /// Generation error
    #[error("Generation error: {0}")]
    Generation(String),

    /// Malformed payload
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Timeout
    #[error("Operation timed out after {0}s")]
    Timeout(u64),

    /// The stream ended before any event arrived
    #[error("Stream ended without data")]
    EmptyStream,
}

/// One `{role, content}` entry of the request history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: MessageRole,
    pub content: String,
}

impl From<&Message> for HistoryEntry {
    fn from(msg: &Message) -> Self {
        Self {
            role: msg.role,
            content: msg.content.clone(),
        }
    }
}

/// Request shared by the streaming and non-streaming calls.
#[derive(Clone)]
pub struct ChatRequest {
    pub api_key: String,
    pub model: String,
    pub system_prompt: String,
    pub history: Vec<HistoryEntry>,
}

impl ChatRequest {
    /// Build a request from the conversation history.
    ///
    /// In-flight messages and assistant messages without text (a turn that
    /// only reasoned and called a tool) are skipped; the model only ever sees
    /// frozen turns.
    pub fn from_history(
        api_key: impl Into<String>,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
        history: &[Message],
    ) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            system_prompt: system_prompt.into(),
            history: history
                .iter()
                .filter(|m| !m.is_streaming())
                .filter(|m| !(m.role == MessageRole::Assistant && m.is_blank()))
                .map(HistoryEntry::from)
                .collect(),
        }
    }
}

impl std::fmt::Debug for ChatRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatRequest")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("system_prompt_len", &self.system_prompt.len())
            .field("history", &self.history.len())
            .finish()
    }
}

/// Complete model response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl ChatResponse {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            reasoning: None,
        }
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }
}

/// Incremental event delivered by a streaming call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A user-facing content token
    Content(String),
    /// A reasoning ("thinking") token
    Reasoning(String),
    /// Final aggregate; equivalent to the non-streaming response
    Completed(ChatResponse),
}

/// Boxed stream of backend events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send>>;

/// LLM backend used by the orchestrator.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Backend identifier, for logs.
    fn name(&self) -> &str;

    /// Non-streaming completion.
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, LlmError>;

    /// Streaming completion.
    ///
    /// Opening the stream may fail (auth, network); individual items may
    /// also carry errors, which end the stream.
    async fn stream(&self, request: ChatRequest) -> Result<EventStream, LlmError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_history_skips_in_flight_messages() {
        let history = vec![
            Message::user("row 5k"),
            Message::assistant_streaming("Sure", None),
        ];
        let request = ChatRequest::from_history("key", "model", "prompt", &history);
        assert_eq!(request.history.len(), 1);
        assert_eq!(request.history[0].role, MessageRole::User);
    }

    #[test]
    fn test_from_history_skips_reasoning_only_replies() {
        let mut thinking = Message::assistant_streaming("", Some("need schedule".to_string()));
        thinking.complete();
        let history = vec![
            Message::user("what's my week?"),
            thinking,
            Message::system("Tool results:\n[get_schedule] succeeded:\nNo workouts planned."),
        ];
        let request = ChatRequest::from_history("key", "model", "prompt", &history);
        let roles: Vec<_> = request.history.iter().map(|e| e.role).collect();
        assert_eq!(roles, vec![MessageRole::User, MessageRole::System]);
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let request = ChatRequest::from_history("sk-secret", "model", "prompt", &[]);
        let debug = format!("{:?}", request);
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("<redacted>"));
    }
}
