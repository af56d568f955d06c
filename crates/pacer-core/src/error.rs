//! Unified error type for Pacer.

use crate::llm::LlmError;

/// Result type used across the Pacer crates.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the conversation core.
///
/// Tool failures are normally reported as failed `ToolCallResult`s rather
/// than through this type; `Error::Tool` is reserved for executors that
/// cannot produce a result at all.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// LLM backend failure
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Tool execution failure
    #[error("Tool error: {0}")]
    Tool(String),

    /// The delegate rejected a mutation
    #[error("Delegate error: {0}")]
    Delegate(String),

    /// No message exists at the given history index
    #[error("No message at index {0}")]
    MessageNotFound(usize),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Validation error: {0}")]
    Validation(String),

    /// The operation was interrupted
    #[error("Operation cancelled")]
    Cancelled,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a tool error.
    pub fn tool(msg: impl Into<String>) -> Self {
        Self::Tool(msg.into())
    }

    /// Create a delegate error.
    pub fn delegate(msg: impl Into<String>) -> Self {
        Self::Delegate(msg.into())
    }

    /// Whether this error came from the LLM transport.
    pub fn is_llm(&self) -> bool {
        matches!(self, Self::Llm(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::MessageNotFound(3);
        assert!(err.to_string().contains('3'));
    }

    #[test]
    fn test_error_convenience_constructors() {
        let err = Error::config("max_turns must be at least 1");
        assert!(err.to_string().contains("max_turns"));

        let err = Error::validation("invalid input");
        assert!(err.to_string().contains("invalid input"));
    }

    #[test]
    fn test_llm_error_conversion() {
        let err: Error = LlmError::Network("connection reset".to_string()).into();
        assert!(err.is_llm());
        assert!(err.to_string().contains("connection reset"));
    }
}
