//! Tool execution step of a turn.
//!
//! Extracts every tool call from a finished response, runs them in order,
//! rewrites the visible message without the tool syntax and formats the
//! results as a system message for the next turn.

use pacer_core::{
    ConversationDelegate, ConversationState, Error, Message, Result, ToolCallResult,
    ToolRegistry,
};

use super::response_state::ResponseState;
use super::tool_parser::{detect, strip_tool_calls};

/// Results longer than this are cut before they go back to the model.
pub const MAX_RESULT_CHARS: usize = 8000;

/// Outcome of the tool step.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolExecution {
    /// The response held no tool calls.
    NoTools { cleaned_response: String },
    /// At least one tool ran.
    Executed {
        results: Vec<ToolCallResult>,
        cleaned_response: String,
        system_message: Message,
    },
}

impl ToolExecution {
    pub fn has_tools(&self) -> bool {
        matches!(self, Self::Executed { .. })
    }

    /// Response text with every tool call removed.
    pub fn cleaned_response(&self) -> &str {
        match self {
            Self::NoTools { cleaned_response } | Self::Executed { cleaned_response, .. } => {
                cleaned_response
            }
        }
    }

    pub fn results(&self) -> &[ToolCallResult] {
        match self {
            Self::NoTools { .. } => &[],
            Self::Executed { results, .. } => results,
        }
    }

    pub fn system_message(&self) -> Option<&Message> {
        match self {
            Self::NoTools { .. } => None,
            Self::Executed { system_message, .. } => Some(system_message),
        }
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}\n[truncated]", &text[..cut]),
        None => text.to_string(),
    }
}

/// Format tool results as the system message shown to the model.
pub fn format_tool_results(results: &[ToolCallResult]) -> String {
    let blocks: Vec<String> = results
        .iter()
        .map(|r| {
            if r.success {
                format!(
                    "[{}] succeeded:\n{}",
                    r.tool_name,
                    truncate_chars(&r.result_text, MAX_RESULT_CHARS)
                )
            } else {
                format!(
                    "[{}] failed: {}",
                    r.tool_name,
                    r.error_text.as_deref().unwrap_or("unknown error")
                )
            }
        })
        .collect();
    format!("Tool results:\n{}", blocks.join("\n\n"))
}

/// Runs the tool calls of one response.
pub struct ToolExecutionCoordinator<'a> {
    registry: &'a ToolRegistry,
    delegate: &'a dyn ConversationDelegate,
}

impl<'a> ToolExecutionCoordinator<'a> {
    pub fn new(registry: &'a ToolRegistry, delegate: &'a dyn ConversationDelegate) -> Self {
        Self { registry, delegate }
    }

    /// Execute every tool call in `state`, in order of appearance.
    ///
    /// The visible message, if any, is rewritten with the cleaned text. When
    /// tools ran it is also completed, even if only reasoning is left, so the
    /// next turn starts a new message after the tool results.
    pub async fn process(&self, state: &ResponseState) -> Result<ToolExecution> {
        let calls = detect(state.content());
        let cleaned_response = strip_tool_calls(state.content());

        if calls.is_empty() {
            if !cleaned_response.is_empty() {
                self.rewrite_message(state, &cleaned_response, false)?;
            }
            return Ok(ToolExecution::NoTools { cleaned_response });
        }

        self.delegate
            .notify_conversation_state(ConversationState::ProcessingTool);

        let mut results = Vec::with_capacity(calls.len());
        for call in &calls {
            let description = self.registry.describe(&call.name);
            tracing::info!(tool = %call.name, "Executing tool");
            self.delegate.notify_tool_started(&call.name, &description);
            let result = self.registry.execute(&call.invocation()).await;
            self.delegate.notify_tool_completed(&result);
            results.push(result);
        }

        self.rewrite_message(state, &cleaned_response, true)?;

        let system_message = Message::system(format_tool_results(&results));
        Ok(ToolExecution::Executed {
            results,
            cleaned_response,
            system_message,
        })
    }

    fn rewrite_message(&self, state: &ResponseState, cleaned: &str, complete: bool) -> Result<()> {
        let Some(index) = state.message_index() else {
            return Ok(());
        };
        let mut message = self
            .delegate
            .message(index)
            .ok_or(Error::MessageNotFound(index))?;
        message.content = cleaned.to_string();
        if let Some(reasoning) = state.reasoning() {
            message.reasoning = Some(reasoning.to_string());
        }
        if complete {
            message.complete();
        }
        self.delegate.update_message(index, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_success_and_failure() {
        let results = vec![
            ToolCallResult {
                tool_name: "get_schedule".to_string(),
                result_text: "No workouts planned.".to_string(),
                success: true,
                error_text: None,
            },
            ToolCallResult::failure("delete_workout", "No workout on 2024-05-01"),
        ];
        assert_eq!(
            format_tool_results(&results),
            "Tool results:\n[get_schedule] succeeded:\nNo workouts planned.\n\n[delete_workout] failed: No workout on 2024-05-01"
        );
    }

    #[test]
    fn test_long_results_are_truncated() {
        let long = "x".repeat(MAX_RESULT_CHARS + 10);
        let formatted = format_tool_results(&[ToolCallResult {
            tool_name: "get_schedule".to_string(),
            result_text: long,
            success: true,
            error_text: None,
        }]);
        assert!(formatted.ends_with("[truncated]"));
        assert!(formatted.len() < MAX_RESULT_CHARS + 100);
    }

    #[test]
    fn test_accessors() {
        let none = ToolExecution::NoTools {
            cleaned_response: "Rest day.".to_string(),
        };
        assert!(!none.has_tools());
        assert_eq!(none.cleaned_response(), "Rest day.");
        assert!(none.results().is_empty());
        assert!(none.system_message().is_none());
    }
}
