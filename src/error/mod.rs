//! Error types for tinyagents.

use thiserror::Error;

/// Primary error type for all framework operations.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Component already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Invalid arguments for tool '{tool}': {message}")]
    InvalidArguments { tool: String, message: String },

    #[error("Provider error: {provider} — {message}")]
    Provider { provider: String, message: String },

    #[error("Provider timeout after {0}ms")]
    ProviderTimeout(u64),

    #[error("Incomplete tool call at index {index}: arguments never became valid JSON")]
    IncompleteToolCall { index: u32, buffer: String },

    #[error("Tool call to '{tool}' blocked: {reason}")]
    ToolCallBlocked { tool: String, reason: String },

    #[error("Tool execution error: {tool_name} — {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Iteration budget of {0} exhausted without a final answer")]
    IterationBudgetExhausted(u32),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("Stream error: {0}")]
    Stream(String),
}

impl AgentError {
    /// Create a provider error.
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a tool execution error.
    pub fn tool_execution(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }

    /// Whether this error originated from a middleware blocking a tool call.
    ///
    /// Blocked calls are handled inside the iteration rather than aborting
    /// the run; everything else propagates to the `run` caller.
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::ToolCallBlocked { .. })
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, AgentError>;
