//! Convenience re-exports for common use.

pub use crate::agent::{Agent, RunEvent, RunOptions, FINAL_ANSWER_TOOL};
pub use crate::builder::{
    build_agent, build_agent_from_yaml, build_agent_named, AgentConfig, BuildOverrides,
    ComponentCatalog,
};
pub use crate::config::TinyConfig;
pub use crate::error::{AgentError, Result};
pub use crate::llm::{LanguageModel, LlmResult, ModelRef, ScriptedModel, ToolDefinition};
pub use crate::memory::{BufferMemory, CombinedMemory, Memory, WindowMemory};
pub use crate::middleware::{HookContext, HookResult, LlmToolSelector, Middleware, ToolCallLimiter};
pub use crate::prompt::{PromptSet, PromptTemplate};
pub use crate::tools::{Tool, ToolCatalog, ToolParameters};
pub use crate::types::{LlmChunk, LlmInput, Message, ToolOutput};
