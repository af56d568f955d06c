//! Core traits and types for Pacer.
//!
//! This crate defines the conversation data model and the seams the
//! orchestration core talks through: the LLM backend, tool executors and
//! the UI delegate.

pub mod config;
pub mod delegate;
pub mod error;
pub mod llm;
pub mod message;
pub mod tool;

pub use delegate::{ConversationDelegate, ConversationState};
pub use error::{Error, Result};
pub use llm::{ChatRequest, ChatResponse, EventStream, LlmBackend, LlmError, StreamEvent};
pub use message::{Message, MessageLifecycle, MessageRole};
pub use tool::{
    DynToolExecutor, ToolCallResult, ToolExecutor, ToolInvocation, ToolOutput, ToolRegistry,
};

/// Re-exports commonly used types.
pub mod prelude {
    pub use crate::config::{endpoints, env_vars, models};
    pub use crate::delegate::{ConversationDelegate, ConversationState};
    pub use crate::error::{Error, Result};
    pub use crate::llm::{ChatRequest, ChatResponse, LlmBackend, LlmError, StreamEvent};
    pub use crate::message::{Message, MessageLifecycle, MessageRole};
    pub use crate::tool::{ToolCallResult, ToolExecutor, ToolInvocation, ToolOutput, ToolRegistry};
}
