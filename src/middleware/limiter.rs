//! Tool-call limiter middleware.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AgentError;
use crate::types::CompletedToolCall;

use super::{HookContext, HookError, HookResult, Middleware, RunId};

/// Configuration for [`ToolCallLimiter`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallLimiterConfig {
    /// Invocations allowed per run before the limiter intervenes.
    pub max_tool_calls: usize,
    /// Restrict counting to one tool; `None` counts every invocation.
    #[serde(default)]
    pub tool_name: Option<String>,
    /// Hard mode blocks the call; soft mode injects a system message
    /// asking the model to stop calling tools.
    #[serde(default = "default_hard_block")]
    pub hard_block: bool,
}

fn default_hard_block() -> bool {
    true
}

/// Counts tool invocations per run and intervenes at the threshold.
///
/// Per-run state is released when the run answers or errors.
pub struct ToolCallLimiter {
    config: ToolCallLimiterConfig,
    counts: Mutex<HashMap<RunId, usize>>,
}

impl ToolCallLimiter {
    pub fn new(config: ToolCallLimiterConfig) -> Self {
        Self {
            config,
            counts: Mutex::new(HashMap::new()),
        }
    }

    /// Hard limiter counting every tool.
    pub fn hard(max_tool_calls: usize) -> Self {
        Self::new(ToolCallLimiterConfig {
            max_tool_calls,
            tool_name: None,
            hard_block: true,
        })
    }

    /// Soft limiter counting every tool.
    pub fn soft(max_tool_calls: usize) -> Self {
        Self::new(ToolCallLimiterConfig {
            max_tool_calls,
            tool_name: None,
            hard_block: false,
        })
    }

    /// Restrict counting to a single tool.
    pub fn for_tool(mut self, tool_name: impl Into<String>) -> Self {
        self.config.tool_name = Some(tool_name.into());
        self
    }

    fn applies_to(&self, call: &CompletedToolCall) -> bool {
        self.config
            .tool_name
            .as_ref()
            .map_or(true, |name| *name == call.tool_name)
    }

    fn release(&self, run_id: RunId) {
        self.counts.lock().unwrap().remove(&run_id);
    }
}

#[async_trait]
impl Middleware for ToolCallLimiter {
    async fn before_tool_call(&self, ctx: &HookContext, call: &CompletedToolCall) -> HookResult {
        if !self.applies_to(call) {
            return Ok(());
        }

        let mut counts = self.counts.lock().unwrap();
        let count = counts.entry(ctx.run_id()).or_insert(0);
        if *count >= self.config.max_tool_calls {
            if self.config.hard_block {
                return Err(HookError::Blocked {
                    reason: format!(
                        "tool call limit of {} reached for this run",
                        self.config.max_tool_calls
                    ),
                });
            }
            ctx.inject_system_message(
                "You have used your tool budget for this request. Stop calling tools and \
                 provide a final answer.",
            );
            return Ok(());
        }
        *count += 1;
        Ok(())
    }

    async fn on_answer(&self, ctx: &HookContext, _answer: &str) -> HookResult {
        self.release(ctx.run_id());
        Ok(())
    }

    async fn on_error(&self, ctx: &HookContext, _error: &AgentError) -> HookResult {
        self.release(ctx.run_id());
        Ok(())
    }
}
