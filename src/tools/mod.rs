//! Tool system for function calling.

pub mod cache;
pub mod catalog;
pub mod schema;
pub mod tool;
pub mod validation;

pub use cache::{CacheInfo, ToolCache};
pub use catalog::ToolCatalog;
pub use schema::{ParameterBuilder, ToolParameters};
pub use tool::{Tool, ToolInvocation, ToolShape, REASONING_FIELD};

use crate::error::Result;

/// Register a tool in the global catalog.
pub fn register_tool(tool: Tool) -> Result<()> {
    ToolCatalog::global().register(tool)
}

/// Register a reasoning variant of the tool in the global catalog.
pub fn register_reasoning_tool(tool: Tool) -> Result<()> {
    ToolCatalog::global().register(tool.with_reasoning())
}

/// Register a JIT-instruction variant of the tool in the global catalog.
pub fn register_jit_tool(tool: Tool, instruction: impl Into<String>) -> Result<()> {
    ToolCatalog::global().register(tool.with_instruction(instruction)?)
}
