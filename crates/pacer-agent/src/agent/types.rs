//! Conversation events forwarded to UI subscribers.

use serde::{Deserialize, Serialize};

use pacer_core::{ConversationState, Message, ToolCallResult};

/// Event emitted by [`ConversationStore`](super::store::ConversationStore).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ConversationEvent {
    /// A message was appended
    MessageCreated {
        index: usize,
        message: Message,
    },
    /// A message was replaced
    MessageUpdated {
        index: usize,
        message: Message,
    },
    /// A complete tool call was seen in the stream
    ToolDetected {
        tool: String,
        description: String,
    },
    /// A tool is running
    ToolStarted {
        tool: String,
        description: String,
    },
    /// A tool finished
    ToolCompleted {
        result: ToolCallResult,
    },
    /// Reasoning started, continued or stopped
    Reasoning {
        is_streaming: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        chunk: Option<String>,
    },
    /// Conversation state changed
    State {
        state: ConversationState,
    },
    /// History was cleared
    Cleared,
}

impl ConversationEvent {
    pub fn message_created(index: usize, message: Message) -> Self {
        Self::MessageCreated { index, message }
    }

    pub fn message_updated(index: usize, message: Message) -> Self {
        Self::MessageUpdated { index, message }
    }

    pub fn tool_detected(tool: impl Into<String>, description: impl Into<String>) -> Self {
        Self::ToolDetected {
            tool: tool.into(),
            description: description.into(),
        }
    }

    pub fn tool_started(tool: impl Into<String>, description: impl Into<String>) -> Self {
        Self::ToolStarted {
            tool: tool.into(),
            description: description.into(),
        }
    }

    pub fn state(state: ConversationState) -> Self {
        Self::State { state }
    }

    /// Whether this event ends a response.
    pub fn is_idle(&self) -> bool {
        matches!(
            self,
            Self::State {
                state: ConversationState::Idle
            }
        )
    }

    /// Convert to a JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
