//! Configuration-driven construction of agents and their components.
//!
//! Every subsystem is described by an object with a `type` discriminator,
//! resolved against a per-subsystem [`Registry`] held by a
//! [`ComponentCatalog`]. Catalogs are explicitly owned and passed to every
//! build call; [`ComponentCatalog::default`] wires up the built-in
//! component kinds and the global tool catalog.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::agent::Agent;
use crate::config::TinyConfig;
use crate::error::{AgentError, Result};
use crate::llm::{LanguageModel, ModelRef};
use crate::memory::{BufferMemory, CombinedMemory, Memory, WindowMemory};
use crate::middleware::limiter::{ToolCallLimiter, ToolCallLimiterConfig};
use crate::middleware::selector::{LlmToolSelector, LlmToolSelectorConfig};
use crate::middleware::Middleware;
use crate::prompt::PromptSet;
use crate::tools::{Tool, ToolCatalog};

fn default_agent_kind() -> String {
    "multi_step".to_string()
}

fn default_max_iterations() -> u32 {
    10
}

fn default_plan_interval() -> u32 {
    1
}

/// Agent-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(rename = "type", default = "default_agent_kind")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Model short-form `provider:model`, e.g. `openai:gpt-4o`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm: Option<String>,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryConfig>,
    #[serde(default)]
    pub middleware: Vec<MiddlewareConfig>,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_plan_interval")]
    pub plan_interval: u32,
    /// Custom action prompt; the default plan/fallback prompts remain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_template: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            kind: default_agent_kind(),
            name: None,
            llm: None,
            tools: Vec::new(),
            memory: None,
            middleware: Vec::new(),
            max_iterations: default_max_iterations(),
            plan_interval: default_plan_interval(),
            prompt_template: None,
        }
    }
}

/// Memory configuration, recursive for the combined kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub memories: Vec<MemoryConfig>,
}

/// Middleware configuration; kind-specific options are flattened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiddlewareConfig {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub options: serde_json::Map<String, serde_json::Value>,
}

/// A per-subsystem name → factory registry.
pub struct Registry<T: ?Sized> {
    entries: RwLock<HashMap<String, Arc<T>>>,
}

impl<T: ?Sized> Default for Registry<T> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<T: ?Sized> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory. Duplicate names fail unless `overwrite`.
    pub fn register(&self, name: &str, value: Arc<T>, overwrite: bool) -> Result<()> {
        let mut entries = self.entries.write().unwrap();
        if !overwrite && entries.contains_key(name) {
            return Err(AgentError::AlreadyRegistered(format!("component '{name}'")));
        }
        entries.insert(name.to_string(), value);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<T>> {
        self.entries.read().unwrap().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().unwrap().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.entries.read().unwrap().keys().cloned().collect();
        names.sort();
        names
    }
}

/// Builds a model adapter from a model id and process config.
pub trait LlmFactory: Send + Sync {
    fn build(&self, model: &str, config: &TinyConfig) -> Result<Arc<dyn LanguageModel>>;
}

/// Builds a memory from its configuration.
pub trait MemoryFactory: Send + Sync {
    fn build(&self, config: &MemoryConfig, catalog: &ComponentCatalog) -> Result<Box<dyn Memory>>;
}

/// Builds a middleware from its flattened options.
pub trait MiddlewareFactory: Send + Sync {
    fn build(
        &self,
        options: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Arc<dyn Middleware>>;
}

/// Builds an agent from its configuration.
pub trait AgentFactory: Send + Sync {
    fn build(
        &self,
        config: &AgentConfig,
        catalog: &ComponentCatalog,
        overrides: BuildOverrides,
    ) -> Result<Agent>;
}

/// Explicit components that take precedence over the configuration.
#[derive(Default)]
pub struct BuildOverrides {
    pub llm: Option<Arc<dyn LanguageModel>>,
    pub tools: Option<Vec<Arc<Tool>>>,
    pub memory: Option<Box<dyn Memory>>,
}

impl BuildOverrides {
    pub fn with_llm(mut self, llm: Arc<dyn LanguageModel>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_tools(mut self, tools: Vec<Arc<Tool>>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_memory(mut self, memory: Box<dyn Memory>) -> Self {
        self.memory = Some(memory);
        self
    }
}

/// The per-subsystem registries the builder resolves against.
pub struct ComponentCatalog {
    tools: Arc<ToolCatalog>,
    pub llms: Registry<dyn LlmFactory>,
    pub memories: Registry<dyn MemoryFactory>,
    pub middlewares: Registry<dyn MiddlewareFactory>,
    pub agents: Registry<dyn AgentFactory>,
    config: TinyConfig,
}

impl Default for ComponentCatalog {
    fn default() -> Self {
        Self::new(ToolCatalog::global(), TinyConfig::global().clone())
    }
}

impl ComponentCatalog {
    /// Create a catalog over the given tool catalog and process config,
    /// with the built-in component kinds registered.
    pub fn new(tools: Arc<ToolCatalog>, config: TinyConfig) -> Self {
        let catalog = Self {
            tools,
            llms: Registry::new(),
            memories: Registry::new(),
            middlewares: Registry::new(),
            agents: Registry::new(),
            config,
        };
        catalog.register_builtins();
        catalog
    }

    pub fn tools(&self) -> &ToolCatalog {
        &self.tools
    }

    pub fn config(&self) -> &TinyConfig {
        &self.config
    }

    fn register_builtins(&self) {
        let builtin = |registry: &Registry<dyn MemoryFactory>,
                       name: &str,
                       f: fn(&MemoryConfig, &ComponentCatalog) -> Result<Box<dyn Memory>>| {
            registry
                .register(name, Arc::new(FnMemoryFactory(f)), true)
                .expect("overwrite registration cannot fail");
        };
        builtin(&self.memories, "buffer", |config, _| {
            Ok(match &config.key {
                Some(key) => Box::new(BufferMemory::with_key(key.clone())),
                None => Box::new(BufferMemory::new()),
            })
        });
        builtin(&self.memories, "window", |config, _| {
            let k = config.k.ok_or_else(|| {
                AgentError::Configuration("window memory requires 'k'".to_string())
            })?;
            Ok(match &config.key {
                Some(key) => Box::new(WindowMemory::with_key(key.clone(), k)),
                None => Box::new(WindowMemory::new(k)),
            })
        });
        builtin(&self.memories, "combined", |config, catalog| {
            let children = config
                .memories
                .iter()
                .map(|child| build_memory(child, catalog))
                .collect::<Result<Vec<_>>>()?;
            Ok(Box::new(CombinedMemory::new(children)?))
        });

        self.middlewares
            .register(
                "tool_call_limiter",
                Arc::new(FnMiddlewareFactory(|options| {
                    let config: ToolCallLimiterConfig =
                        serde_json::from_value(serde_json::Value::Object(options.clone()))?;
                    Ok(Arc::new(ToolCallLimiter::new(config)))
                })),
                true,
            )
            .expect("overwrite registration cannot fail");
        self.middlewares
            .register(
                "llm_tool_selector",
                Arc::new(FnMiddlewareFactory(|options| {
                    let config: LlmToolSelectorConfig =
                        serde_json::from_value(serde_json::Value::Object(options.clone()))?;
                    Ok(Arc::new(LlmToolSelector::new(config)))
                })),
                true,
            )
            .expect("overwrite registration cannot fail");

        self.agents
            .register("multi_step", Arc::new(MultiStepAgentFactory), true)
            .expect("overwrite registration cannot fail");
    }
}

struct FnMemoryFactory(fn(&MemoryConfig, &ComponentCatalog) -> Result<Box<dyn Memory>>);

impl MemoryFactory for FnMemoryFactory {
    fn build(&self, config: &MemoryConfig, catalog: &ComponentCatalog) -> Result<Box<dyn Memory>> {
        (self.0)(config, catalog)
    }
}

struct FnMiddlewareFactory(
    fn(&serde_json::Map<String, serde_json::Value>) -> Result<Arc<dyn Middleware>>,
);

impl MiddlewareFactory for FnMiddlewareFactory {
    fn build(
        &self,
        options: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Arc<dyn Middleware>> {
        (self.0)(options)
    }
}

struct MultiStepAgentFactory;

impl AgentFactory for MultiStepAgentFactory {
    fn build(
        &self,
        config: &AgentConfig,
        catalog: &ComponentCatalog,
        overrides: BuildOverrides,
    ) -> Result<Agent> {
        let llm = match overrides.llm {
            Some(llm) => llm,
            None => {
                let reference: ModelRef = config
                    .llm
                    .as_deref()
                    .ok_or_else(|| {
                        AgentError::Configuration(
                            "agent config requires 'llm' or an explicit model override".to_string(),
                        )
                    })?
                    .parse()?;
                let factory = catalog.llms.get(&reference.provider).ok_or_else(|| {
                    AgentError::Configuration(format!(
                        "unknown llm provider '{}'",
                        reference.provider
                    ))
                })?;
                factory.build(&reference.model, catalog.config())?
            }
        };

        let tools = match overrides.tools {
            Some(tools) => tools,
            None => config
                .tools
                .iter()
                .map(|name| {
                    catalog.tools().get(name).ok_or_else(|| {
                        AgentError::Configuration(format!("unknown tool '{name}'"))
                    })
                })
                .collect::<Result<Vec<_>>>()?,
        };

        let memory = match overrides.memory {
            Some(memory) => memory,
            None => match &config.memory {
                Some(memory_config) => build_memory(memory_config, catalog)?,
                None => Box::new(BufferMemory::new()),
            },
        };

        let mut agent = Agent::new(llm)
            .with_tools(tools)
            .with_memory(memory)
            .with_max_iterations(config.max_iterations)
            .with_plan_interval(config.plan_interval);
        if let Some(name) = &config.name {
            agent = agent.with_name(name.clone());
        }
        if let Some(template) = &config.prompt_template {
            agent = agent.with_prompts(PromptSet::default().with_action_template(template.clone()));
        }
        for middleware_config in &config.middleware {
            let factory = catalog
                .middlewares
                .get(&middleware_config.kind)
                .ok_or_else(|| {
                    AgentError::Configuration(format!(
                        "unknown middleware type '{}'",
                        middleware_config.kind
                    ))
                })?;
            agent = agent.with_middleware(factory.build(&middleware_config.options)?);
        }

        Ok(agent.with_source_config(config.clone()))
    }
}

/// Build a memory from its configuration via the catalog's registry.
pub fn build_memory(config: &MemoryConfig, catalog: &ComponentCatalog) -> Result<Box<dyn Memory>> {
    let factory = catalog.memories.get(&config.kind).ok_or_else(|| {
        AgentError::Configuration(format!("unknown memory type '{}'", config.kind))
    })?;
    factory.build(config, catalog)
}

/// Build an agent from a configuration object.
pub fn build_agent(
    config: &AgentConfig,
    catalog: &ComponentCatalog,
    overrides: BuildOverrides,
) -> Result<Agent> {
    let factory = catalog
        .agents
        .get(&config.kind)
        .ok_or_else(|| AgentError::Configuration(format!("unknown agent type '{}'", config.kind)))?;
    factory.build(config, catalog, overrides)
}

/// Build an agent of a registered kind with an otherwise default
/// configuration; components come from the overrides.
pub fn build_agent_named(
    kind: &str,
    catalog: &ComponentCatalog,
    overrides: BuildOverrides,
) -> Result<Agent> {
    let config = AgentConfig {
        kind: kind.to_string(),
        ..Default::default()
    };
    build_agent(&config, catalog, overrides)
}

/// Build an agent from a YAML configuration document.
pub fn build_agent_from_yaml(
    yaml: &str,
    catalog: &ComponentCatalog,
    overrides: BuildOverrides,
) -> Result<Agent> {
    let config: AgentConfig = serde_yaml::from_str(yaml)
        .map_err(|e| AgentError::Configuration(format!("invalid agent config: {e}")))?;
    build_agent(&config, catalog, overrides)
}
