//! Conversation orchestration.
//!
//! - [`tool_parser`] / [`params`]: `[TOOL_CALL: ...]` detection and parsing
//! - [`streaming`]: one streaming model call, batched into the delegate
//! - [`tool_execution`]: running detected tools and reporting results
//! - [`orchestrator`]: the bounded turn loop tying it together

pub mod orchestrator;
pub mod params;
pub mod response_state;
pub mod store;
pub mod streaming;
pub mod tool_execution;
pub mod tool_parser;
pub mod types;

pub use orchestrator::{OrchestrationResult, RequestContext, ResponseOrchestrator};
pub use response_state::ResponseState;
pub use store::ConversationStore;
pub use streaming::{DetectionBuffer, StreamingCoordinator, StreamingFailure, StreamingOutcome};
pub use tool_execution::{format_tool_results, ToolExecution, ToolExecutionCoordinator};
pub use tool_parser::{contains_tool_call, detect, strip_tool_calls, ToolCall};
pub use types::ConversationEvent;
