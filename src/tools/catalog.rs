//! Registry of named tools.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use crate::error::{AgentError, Result};

use super::tool::Tool;

/// A registry mapping tool names to shared tool instances.
///
/// Use [`ToolCatalog::global`] for decorator-style registration at process
/// startup, or construct explicit catalogs for isolated contexts; every
/// lookup path accepts an explicit catalog. Registration is serialized by
/// an internal lock.
#[derive(Default)]
pub struct ToolCatalog {
    tools: RwLock<HashMap<String, Arc<Tool>>>,
}

impl ToolCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared process-wide catalog.
    pub fn global() -> Arc<ToolCatalog> {
        static GLOBAL: OnceLock<Arc<ToolCatalog>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(ToolCatalog::new())).clone()
    }

    /// Register a tool under its own name.
    ///
    /// Duplicate names fail with [`AgentError::AlreadyRegistered`]; use
    /// [`ToolCatalog::register_with`] to overwrite.
    pub fn register(&self, tool: Tool) -> Result<()> {
        let name = tool.name().to_string();
        self.register_with(&name, Arc::new(tool), false)
    }

    /// Register a shared tool under an explicit name.
    pub fn register_with(&self, name: &str, tool: Arc<Tool>, overwrite: bool) -> Result<()> {
        let mut tools = self.tools.write().unwrap();
        if !overwrite && tools.contains_key(name) {
            return Err(AgentError::AlreadyRegistered(format!("tool '{name}'")));
        }
        tracing::debug!(tool = name, "registering tool");
        tools.insert(name.to_string(), tool);
        Ok(())
    }

    /// Remove a tool by name; returns whether it was present.
    pub fn unregister(&self, name: &str) -> bool {
        self.tools.write().unwrap().remove(name).is_some()
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<Tool>> {
        self.tools.read().unwrap().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.read().unwrap().contains_key(name)
    }

    /// List registered tools, sorted by name. Hidden tools are included
    /// only on explicit request.
    pub fn list(&self, include_hidden: bool) -> Vec<Arc<Tool>> {
        let tools = self.tools.read().unwrap();
        let mut listed: Vec<_> = tools
            .values()
            .filter(|tool| include_hidden || !tool.is_hidden())
            .cloned()
            .collect();
        listed.sort_by(|a, b| a.name().cmp(b.name()));
        listed
    }

    /// Names of visible tools, sorted.
    pub fn names(&self) -> Vec<String> {
        self.list(false)
            .into_iter()
            .map(|tool| tool.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ToolCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tools = self.tools.read().unwrap();
        let mut names: Vec<_> = tools.keys().collect();
        names.sort();
        f.debug_struct("ToolCatalog").field("tools", &names).finish()
    }
}
