//! Tool pre-filter middleware.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::tools::Tool;

use super::Middleware;

/// Configuration for [`LlmToolSelector`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmToolSelectorConfig {
    /// Upper bound on the tools offered to the model per call.
    pub max_tools: usize,
    /// Names always kept regardless of the bound.
    #[serde(default)]
    pub always_include: Vec<String>,
}

/// Reduces the candidate tool list before each model call to at most
/// `max_tools`, always preserving the `always_include` names.
pub struct LlmToolSelector {
    config: LlmToolSelectorConfig,
}

impl LlmToolSelector {
    pub fn new(config: LlmToolSelectorConfig) -> Self {
        Self { config }
    }

    pub fn with_limit(max_tools: usize) -> Self {
        Self::new(LlmToolSelectorConfig {
            max_tools,
            always_include: Vec::new(),
        })
    }

    pub fn always_include(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.config
            .always_include
            .extend(names.into_iter().map(Into::into));
        self
    }
}

impl Middleware for LlmToolSelector {
    fn filter_tools(&self, tools: Vec<Arc<Tool>>) -> Vec<Arc<Tool>> {
        let pinned: Vec<_> = tools
            .iter()
            .filter(|tool| self.config.always_include.iter().any(|n| n == tool.name()))
            .cloned()
            .collect();

        let mut max_tools = self.config.max_tools;
        if pinned.len() > max_tools {
            tracing::warn!(
                max_tools,
                always_include = pinned.len(),
                "always_include exceeds max_tools; widening the bound"
            );
            max_tools = pinned.len();
        }

        let mut selected = pinned;
        for tool in tools {
            if selected.len() >= max_tools {
                break;
            }
            if !selected.iter().any(|t| t.name() == tool.name()) {
                selected.push(tool);
            }
        }
        selected
    }
}
