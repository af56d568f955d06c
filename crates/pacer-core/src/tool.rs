//! Tool executor contract and registry.
//!
//! Executors are grouped by domain: one executor may serve several tool
//! names. They never raise for bad input; a failed `ToolOutput` goes back
//! to the model as context so it can correct itself.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Input handed to a tool executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub name: String,
    pub parameters: HashMap<String, String>,
}

impl ToolInvocation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: HashMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Look up a parameter, treating blank values as missing.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.parameters
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Look up a required parameter.
    pub fn require(&self, key: &str) -> Result<&str, String> {
        self.param(key)
            .ok_or_else(|| format!("Missing required parameter '{}' for {}", key, self.name))
    }
}

/// What an executor returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub result_text: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_text: Option<String>,
}

impl ToolOutput {
    /// Successful output.
    pub fn success(result_text: impl Into<String>) -> Self {
        Self {
            result_text: result_text.into(),
            success: true,
            error_text: None,
        }
    }

    /// Failed output.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            result_text: String::new(),
            success: false,
            error_text: Some(error.into()),
        }
    }
}

/// Result of one executed tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub tool_name: String,
    pub result_text: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_text: Option<String>,
}

impl ToolCallResult {
    pub fn from_output(tool_name: impl Into<String>, output: ToolOutput) -> Self {
        Self {
            tool_name: tool_name.into(),
            result_text: output.result_text,
            success: output.success,
            error_text: output.error_text,
        }
    }

    pub fn failure(tool_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self::from_output(tool_name, ToolOutput::failure(error))
    }
}

/// A domain executor serving one or more tool names.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Names of the tools this executor handles.
    fn tool_names(&self) -> Vec<String>;

    /// Human-readable description of a running tool, e.g. "Planning your workout".
    fn describe(&self, name: &str) -> Option<String> {
        let _ = name;
        None
    }

    /// Execute a tool.
    ///
    /// Must return a failed output for names it does not recognise.
    async fn execute(&self, invocation: &ToolInvocation) -> ToolOutput;
}

/// Shared executor handle.
pub type DynToolExecutor = Arc<dyn ToolExecutor>;

/// Routes invocations to executors by tool name.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    executors: Vec<DynToolExecutor>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an executor under every name it reports.
    ///
    /// Later registrations shadow earlier ones for the same name.
    pub fn register(&mut self, executor: DynToolExecutor) {
        let index = self.executors.len();
        for name in executor.tool_names() {
            if self.by_name.insert(name.clone(), index).is_some() {
                tracing::warn!("Tool '{}' registered twice, keeping the latest executor", name);
            }
        }
        self.executors.push(executor);
    }

    /// Builder-style registration.
    pub fn with_executor(mut self, executor: DynToolExecutor) -> Self {
        self.register(executor);
        self
    }

    /// Whether a tool name is known.
    pub fn has(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// All registered tool names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.by_name.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Description shown while a tool runs.
    pub fn describe(&self, name: &str) -> String {
        self.by_name
            .get(name)
            .and_then(|&i| self.executors[i].describe(name))
            .unwrap_or_else(|| format!("Running {}", name))
    }

    /// Execute a tool; unknown names produce a failed result.
    pub async fn execute(&self, invocation: &ToolInvocation) -> ToolCallResult {
        let Some(&index) = self.by_name.get(&invocation.name) else {
            tracing::warn!("Unknown tool requested: {}", invocation.name);
            return ToolCallResult::failure(
                &invocation.name,
                format!("Unknown tool: {}", invocation.name),
            );
        };

        let output = self.executors[index].execute(invocation).await;
        if output.success {
            tracing::info!("Tool '{}' succeeded", invocation.name);
        } else {
            tracing::warn!(
                "Tool '{}' failed: {}",
                invocation.name,
                output.error_text.as_deref().unwrap_or("unknown error")
            );
        }
        ToolCallResult::from_output(&invocation.name, output)
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.list())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTools;

    #[async_trait]
    impl ToolExecutor for EchoTools {
        fn tool_names(&self) -> Vec<String> {
            vec!["echo".to_string()]
        }

        fn describe(&self, _name: &str) -> Option<String> {
            Some("Echoing".to_string())
        }

        async fn execute(&self, invocation: &ToolInvocation) -> ToolOutput {
            match invocation.require("text") {
                Ok(text) => ToolOutput::success(text),
                Err(e) => ToolOutput::failure(e),
            }
        }
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::new().with_executor(Arc::new(EchoTools))
    }

    #[tokio::test]
    async fn test_execute_known_tool() {
        let result = registry()
            .execute(&ToolInvocation::new("echo").with_param("text", "hello"))
            .await;
        assert!(result.success);
        assert_eq!(result.result_text, "hello");
        assert_eq!(result.tool_name, "echo");
    }

    #[tokio::test]
    async fn test_unknown_tool_is_failure_result() {
        let result = registry().execute(&ToolInvocation::new("teleport")).await;
        assert!(!result.success);
        assert_eq!(result.error_text.as_deref(), Some("Unknown tool: teleport"));
    }

    #[tokio::test]
    async fn test_missing_parameter_is_failure_result() {
        let result = registry()
            .execute(&ToolInvocation::new("echo").with_param("text", "  "))
            .await;
        assert!(!result.success);
        assert!(result.error_text.unwrap().contains("'text'"));
    }

    #[test]
    fn test_describe_falls_back_to_name() {
        let registry = registry();
        assert_eq!(registry.describe("echo"), "Echoing");
        assert_eq!(registry.describe("teleport"), "Running teleport");
        assert_eq!(registry.list(), vec!["echo".to_string()]);
    }
}
