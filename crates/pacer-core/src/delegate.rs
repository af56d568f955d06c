//! UI/state sink consumed by the orchestration core.
//!
//! The delegate owns the conversation history. Every mutation of it goes
//! through these methods, and the core only ever calls them from the task
//! driving the current turn, so an implementation needs exactly one writer
//! lock around its message list.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::Message;
use crate::tool::ToolCallResult;

/// Coarse conversation state, for spinners and status lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    Idle,
    PreparingResponse,
    Streaming,
    ProcessingTool,
    Finalizing,
}

impl ConversationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::PreparingResponse => "preparing_response",
            Self::Streaming => "streaming",
            Self::ProcessingTool => "processing_tool",
            Self::Finalizing => "finalizing",
        }
    }
}

/// Delegate implemented by the host application.
pub trait ConversationDelegate: Send + Sync {
    /// Snapshot of the ordered history.
    fn history(&self) -> Vec<Message>;

    /// Message at `index`, if any.
    fn message(&self, index: usize) -> Option<Message>;

    /// Append a message and return its index.
    fn create_message(&self, message: Message) -> Result<usize>;

    /// Replace the message at `index`.
    ///
    /// Fails with `Error::MessageNotFound` when the index is out of range.
    fn update_message(&self, index: usize, message: Message) -> Result<()>;

    /// A complete tool call was spotted in the stream.
    fn notify_tool_detected(&self, _name: &str, _description: &str) {}

    /// A tool is about to run.
    fn notify_tool_started(&self, _name: &str, _description: &str) {}

    /// A tool finished.
    fn notify_tool_completed(&self, _result: &ToolCallResult) {}

    /// Reasoning stream state, with the latest chunk for previews.
    fn notify_reasoning_state(&self, _is_streaming: bool, _latest_chunk: Option<&str>) {}

    /// Conversation state transitions.
    fn notify_conversation_state(&self, _state: ConversationState) {}
}
