//! Building agents from configuration.

mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use tinyagents::builder::{
    build_agent, build_agent_from_yaml, AgentConfig, BuildOverrides, ComponentCatalog, LlmFactory,
    MemoryConfig,
};
use tinyagents::config::TinyConfig;
use tinyagents::error::{AgentError, Result};
use tinyagents::llm::{LanguageModel, ScriptedModel};
use tinyagents::tools::ToolCatalog;
use tinyagents::types::LlmChunk;

use common::greet_tool;

struct ScriptedFactory;

impl LlmFactory for ScriptedFactory {
    fn build(&self, model: &str, _config: &TinyConfig) -> Result<Arc<dyn LanguageModel>> {
        Ok(Arc::new(ScriptedModel::new(format!("scripted:{model}"))))
    }
}

fn catalog_with_greet() -> ComponentCatalog {
    let tools = Arc::new(ToolCatalog::new());
    let (greet, _) = greet_tool();
    tools.register_with("greet", greet, false).unwrap();
    let catalog = ComponentCatalog::new(tools, TinyConfig::new());
    catalog
        .llms
        .register("scripted", Arc::new(ScriptedFactory), false)
        .unwrap();
    catalog
}

const AGENT_YAML: &str = "\
type: multi_step
name: librarian
llm: scripted:base
tools:
  - greet
memory:
  type: window
  k: 6
middleware:
  - type: tool_call_limiter
    max_tool_calls: 3
  - type: llm_tool_selector
    max_tools: 4
max_iterations: 4
plan_interval: 2
";

#[test]
fn builds_an_agent_from_yaml() {
    let catalog = catalog_with_greet();

    let agent = build_agent_from_yaml(AGENT_YAML, &catalog, BuildOverrides::default()).unwrap();

    assert_eq!(agent.name(), "librarian");
    assert_eq!(agent.max_iterations(), 4);
    assert_eq!(agent.plan_interval(), 2);
    assert_eq!(agent.tools().len(), 1);
    assert_eq!(
        agent.summary(),
        "Agent(name=librarian, llm=scripted:base, tools=[greet], memory=[chat_history], \
         max_iterations=4, plan_interval=2)"
    );
}

#[test]
fn rebuilding_from_own_config_preserves_the_summary() {
    let catalog = catalog_with_greet();

    let original =
        build_agent_from_yaml(AGENT_YAML, &catalog, BuildOverrides::default()).unwrap();
    let config = original.to_config().unwrap().clone();
    let rebuilt = build_agent(&config, &catalog, BuildOverrides::default()).unwrap();

    assert_eq!(original.summary(), rebuilt.summary());
}

#[test]
fn unknown_component_types_are_config_errors() {
    let catalog = catalog_with_greet();

    for yaml in [
        "type: quantum\nllm: scripted:base\n",
        "type: multi_step\nllm: scripted:base\nmemory:\n  type: holographic\n",
        "type: multi_step\nllm: scripted:base\nmiddleware:\n  - type: unknown\n",
        "type: multi_step\nllm: scripted:base\ntools:\n  - not_registered\n",
    ] {
        let err = build_agent_from_yaml(yaml, &catalog, BuildOverrides::default()).unwrap_err();
        assert!(matches!(err, AgentError::Configuration(_)), "yaml: {yaml}");
    }
}

#[test]
fn unknown_provider_short_form_is_rejected() {
    let catalog = catalog_with_greet();
    let config = AgentConfig {
        llm: Some("openai:gpt-4o".to_string()),
        ..Default::default()
    };

    let err = build_agent(&config, &catalog, BuildOverrides::default()).unwrap_err();
    assert!(err.to_string().contains("unknown llm provider 'openai'"));
}

#[test]
fn malformed_model_reference_is_rejected() {
    let catalog = catalog_with_greet();
    let config = AgentConfig {
        llm: Some("gpt-4o".to_string()),
        ..Default::default()
    };

    let err = build_agent(&config, &catalog, BuildOverrides::default()).unwrap_err();
    assert!(matches!(err, AgentError::Configuration(_)));
}

#[test]
fn window_memory_requires_k() {
    let catalog = catalog_with_greet();
    let config = AgentConfig {
        llm: Some("scripted:base".to_string()),
        memory: Some(MemoryConfig {
            kind: "window".to_string(),
            key: None,
            k: None,
            memories: Vec::new(),
        }),
        ..Default::default()
    };

    let err = build_agent(&config, &catalog, BuildOverrides::default()).unwrap_err();
    assert!(err.to_string().contains("requires 'k'"));
}

#[test]
fn combined_memory_duplicate_keys_fail_at_build_time() {
    let catalog = catalog_with_greet();
    let child = MemoryConfig {
        kind: "buffer".to_string(),
        key: None,
        k: None,
        memories: Vec::new(),
    };
    let config = AgentConfig {
        llm: Some("scripted:base".to_string()),
        memory: Some(MemoryConfig {
            kind: "combined".to_string(),
            key: None,
            k: None,
            memories: vec![child.clone(), child],
        }),
        ..Default::default()
    };

    let err = build_agent(&config, &catalog, BuildOverrides::default()).unwrap_err();
    assert!(err.to_string().contains("duplicate variable"));
}

#[test]
fn builds_a_named_agent_kind_with_overrides() {
    let catalog = catalog_with_greet();
    let model = Arc::new(ScriptedModel::new("scripted:named"));

    let agent = tinyagents::builder::build_agent_named(
        "multi_step",
        &catalog,
        BuildOverrides::default().with_llm(model),
    )
    .unwrap();
    assert_eq!(agent.max_iterations(), 10);

    let err = tinyagents::builder::build_agent_named(
        "nonexistent",
        &catalog,
        BuildOverrides::default(),
    )
    .unwrap_err();
    assert!(matches!(err, AgentError::Configuration(_)));
}

#[test]
fn overrides_take_precedence_over_config() {
    let catalog = catalog_with_greet();
    let model = Arc::new(ScriptedModel::new("scripted:override"));
    let config = AgentConfig::default(); // no llm configured at all

    let agent = build_agent(
        &config,
        &catalog,
        BuildOverrides::default().with_llm(model),
    )
    .unwrap();

    assert!(agent.summary().contains("llm=scripted:override"));
}

#[tokio::test]
async fn configured_selector_limits_the_tools_offered_to_the_model() {
    let tools = Arc::new(ToolCatalog::new());
    for name in ["alpha", "beta", "gamma"] {
        tools
            .register(tinyagents::tools::Tool::sync(
                name,
                "probe tool",
                tinyagents::tools::ToolParameters::empty(),
                |_| Ok(tinyagents::types::ToolOutput::from("ok")),
            ))
            .unwrap();
    }
    let catalog = ComponentCatalog::new(tools, TinyConfig::new());
    catalog
        .llms
        .register("scripted", Arc::new(ScriptedFactory), false)
        .unwrap();

    let model = Arc::new(ScriptedModel::new("scripted:probe"));
    model.push_stream_turn(vec![LlmChunk::text("done"), LlmChunk::End]);

    let yaml = "\
type: multi_step
tools: [alpha, beta, gamma]
plan_interval: 0
middleware:
  - type: llm_tool_selector
    max_tools: 2
    always_include: [gamma]
";
    let mut agent = build_agent_from_yaml(
        yaml,
        &catalog,
        BuildOverrides::default().with_llm(model.clone()),
    )
    .unwrap();

    agent.run("anything").await.unwrap();

    let seen = model.seen_tools();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0], vec!["gamma".to_string(), "alpha".to_string()]);
}
