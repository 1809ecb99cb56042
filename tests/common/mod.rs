//! Shared fixtures for the integration tests.
#![allow(dead_code)] // not every test binary uses every fixture

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tinyagents::error::AgentError;
use tinyagents::middleware::{HookContext, HookResult, Middleware};
use tinyagents::tools::{Tool, ToolParameters};
use tinyagents::types::{CompletedToolCall, LlmChunk, ToolOutput};

/// A greet tool; the invocation counter doubles as a call spy.
pub fn greet_tool() -> (Arc<Tool>, Arc<Mutex<usize>>) {
    let calls = Arc::new(Mutex::new(0usize));
    let spy = calls.clone();
    let tool = Tool::sync(
        "greet",
        "Greet someone by name",
        ToolParameters::object()
            .string("name", "who to greet", true)
            .build(),
        move |args| {
            *spy.lock().unwrap() += 1;
            let name = args["name"].as_str().unwrap_or("world");
            Ok(ToolOutput::from(format!("Hello, {name}!")))
        },
    );
    (Arc::new(tool), calls)
}

/// Fragments spelling a complete `greet({"name": ...})` call.
pub fn greet_call_chunks(call_id: &str, name: &str) -> Vec<LlmChunk> {
    vec![
        LlmChunk::fragment(0, Some(call_id), Some("greet"), None),
        LlmChunk::fragment(0, None, None, Some(&format!("{{\"name\":\"{name}\"}}"))),
        LlmChunk::End,
    ]
}

/// Fragments spelling a `provide_final_answer` call.
pub fn final_answer_chunks(call_id: &str, response: &str) -> Vec<LlmChunk> {
    vec![
        LlmChunk::fragment(0, Some(call_id), Some("provide_final_answer"), None),
        LlmChunk::fragment(0, None, None, Some(&format!("{{\"response\":\"{response}\"}}"))),
        LlmChunk::End,
    ]
}

/// Records every hook invocation as a labeled line.
#[derive(Default)]
pub struct RecordingMiddleware {
    pub label: String,
    pub events: Arc<Mutex<Vec<String>>>,
}

impl RecordingMiddleware {
    pub fn new(label: &str, events: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            label: label.to_string(),
            events,
        }
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl Middleware for RecordingMiddleware {
    async fn before_llm_call(&self, _ctx: &HookContext) -> HookResult {
        self.record(format!("{}:before_llm_call", self.label));
        Ok(())
    }

    async fn after_llm_call(&self, _ctx: &HookContext) -> HookResult {
        self.record(format!("{}:after_llm_call", self.label));
        Ok(())
    }

    async fn before_tool_call(&self, _ctx: &HookContext, call: &CompletedToolCall) -> HookResult {
        self.record(format!("{}:before_tool_call:{}", self.label, call.tool_name));
        Ok(())
    }

    async fn after_tool_call(
        &self,
        _ctx: &HookContext,
        call: &CompletedToolCall,
        result: &ToolOutput,
    ) -> HookResult {
        self.record(format!(
            "{}:after_tool_call:{}:{}",
            self.label,
            call.tool_name,
            result.as_text()
        ));
        Ok(())
    }

    async fn on_plan(&self, _ctx: &HookContext, step: &str) -> HookResult {
        self.record(format!("{}:on_plan:{step}", self.label));
        Ok(())
    }

    async fn on_reasoning(&self, _ctx: &HookContext, reasoning: &str) -> HookResult {
        self.record(format!("{}:on_reasoning:{reasoning}", self.label));
        Ok(())
    }

    async fn on_tool_reasoning(
        &self,
        _ctx: &HookContext,
        tool: &str,
        reasoning: &str,
    ) -> HookResult {
        self.record(format!("{}:on_tool_reasoning:{tool}:{reasoning}", self.label));
        Ok(())
    }

    async fn on_answer(&self, _ctx: &HookContext, answer: &str) -> HookResult {
        self.record(format!("{}:on_answer:{answer}", self.label));
        Ok(())
    }

    async fn on_answer_chunk(&self, _ctx: &HookContext, index: u64, chunk: &str) -> HookResult {
        self.record(format!("{}:on_answer_chunk:{index}:{chunk}", self.label));
        Ok(())
    }

    async fn on_error(&self, _ctx: &HookContext, error: &AgentError) -> HookResult {
        self.record(format!("{}:on_error:{error}", self.label));
        Ok(())
    }
}
