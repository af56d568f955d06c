//! Conversation message types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Message role in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User message
    User,
    /// Assistant (model) message
    Assistant,
    /// System message, also used for tool results fed back to the model
    System,
}

impl MessageRole {
    /// Wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a message.
///
/// An assistant message is `Streaming` while tokens are still arriving and
/// is frozen as `Completed` once the turn finalizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLifecycle {
    Streaming,
    Completed,
}

/// A single conversation message.
///
/// `id` never changes across in-place mutations, so a UI can diff by identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub lifecycle: MessageLifecycle,
}

impl Message {
    fn new(role: MessageRole, content: impl Into<String>, lifecycle: MessageLifecycle) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            reasoning: None,
            timestamp: Utc::now(),
            lifecycle,
        }
    }

    /// Create a completed user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content, MessageLifecycle::Completed)
    }

    /// Create a completed system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content, MessageLifecycle::Completed)
    }

    /// Create a completed assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content, MessageLifecycle::Completed)
    }

    /// Create an in-flight assistant message.
    pub fn assistant_streaming(content: impl Into<String>, reasoning: Option<String>) -> Self {
        let mut msg = Self::new(MessageRole::Assistant, content, MessageLifecycle::Streaming);
        msg.reasoning = reasoning;
        msg
    }

    /// Attach reasoning text.
    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    /// Whether the message is still receiving tokens.
    pub fn is_streaming(&self) -> bool {
        self.lifecycle == MessageLifecycle::Streaming
    }

    /// Freeze the message.
    pub fn complete(&mut self) {
        self.lifecycle = MessageLifecycle::Completed;
    }

    /// Whether the visible content is blank.
    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }
}
