//! Pacer conversation orchestration.
//!
//! Turns a user message into a finished assistant reply: streams the model
//! output, spots `[TOOL_CALL: ...]` requests, runs the tools and feeds their
//! results back until the model answers without tools.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pacer_agent::{ConversationStore, OrchestratorConfig, RequestContext, ResponseOrchestrator};
//! use pacer_core::LlmBackend;
//!
//! # async fn demo(backend: Arc<dyn LlmBackend>) -> pacer_core::Result<()> {
//! let store = Arc::new(ConversationStore::new());
//! store.push_user("Plan an easy run for tomorrow");
//!
//! let orchestrator = ResponseOrchestrator::new(
//!     backend,
//!     Arc::new(pacer_agent::tools::default_registry()),
//!     store.clone(),
//!     OrchestratorConfig::default(),
//! );
//! let result = orchestrator
//!     .respond(&RequestContext::new("key", "deepseek/deepseek-r1", "You are a running coach."))
//!     .await?;
//! println!("{}", result.final_state.content());
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod config;
pub mod tools;

pub use agent::{
    contains_tool_call, detect, strip_tool_calls, ConversationEvent, ConversationStore,
    DetectionBuffer, OrchestrationResult, RequestContext, ResponseOrchestrator, ResponseState,
    StreamingCoordinator, ToolCall, ToolExecution, ToolExecutionCoordinator,
};
pub use config::{OrchestratorConfig, DEFAULT_FALLBACK_TEXT};
pub use tools::TrainingScheduleTools;

/// Re-export of the core crate.
pub use pacer_core;
