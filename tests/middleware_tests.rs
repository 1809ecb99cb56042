//! Dispatcher ordering and failure semantics.

mod common;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use tinyagents::error::AgentError;
use tinyagents::middleware::{
    HookContext, HookError, HookResult, Middleware, MiddlewareStack, RunId,
};
use tinyagents::types::CompletedToolCall;

use common::RecordingMiddleware;

fn greet_call() -> CompletedToolCall {
    CompletedToolCall {
        call_id: Some("t1".to_string()),
        tool_name: "greet".to_string(),
        arguments: serde_json::Map::new(),
    }
}

#[tokio::test]
async fn hooks_fire_in_registration_order() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let stack = MiddlewareStack::new()
        .with(Arc::new(RecordingMiddleware::new("first", events.clone())))
        .with(Arc::new(RecordingMiddleware::new("second", events.clone())));

    let ctx = HookContext::new(RunId::new_v4());
    stack.on_answer(&ctx, "done").await;
    stack.on_answer_chunk(&ctx, 0, "d").await;

    assert_eq!(
        events.lock().unwrap().clone(),
        vec![
            "first:on_answer:done",
            "second:on_answer:done",
            "first:on_answer_chunk:0:d",
            "second:on_answer_chunk:0:d",
        ]
    );
}

struct FailingMiddleware;

#[async_trait]
impl Middleware for FailingMiddleware {
    async fn before_tool_call(&self, _ctx: &HookContext, _call: &CompletedToolCall) -> HookResult {
        Err(HookError::Failed("hook exploded".to_string()))
    }

    async fn on_answer(&self, _ctx: &HookContext, _answer: &str) -> HookResult {
        Err(HookError::Failed("hook exploded".to_string()))
    }
}

#[tokio::test]
async fn failed_hooks_are_swallowed_and_later_observers_still_run() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let stack = MiddlewareStack::new()
        .with(Arc::new(FailingMiddleware))
        .with(Arc::new(RecordingMiddleware::new("after", events.clone())));

    let ctx = HookContext::new(RunId::new_v4());
    stack.on_answer(&ctx, "done").await;
    // A plain failure from before_tool_call does not block the call.
    assert!(stack.before_tool_call(&ctx, &greet_call()).await.is_ok());

    assert!(events
        .lock()
        .unwrap()
        .contains(&"after:on_answer:done".to_string()));
}

struct BlockingMiddleware;

#[async_trait]
impl Middleware for BlockingMiddleware {
    async fn before_tool_call(&self, _ctx: &HookContext, _call: &CompletedToolCall) -> HookResult {
        Err(HookError::Blocked {
            reason: "not allowed".to_string(),
        })
    }
}

#[tokio::test]
async fn blocked_short_circuits_later_observers() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let stack = MiddlewareStack::new()
        .with(Arc::new(BlockingMiddleware))
        .with(Arc::new(RecordingMiddleware::new("after", events.clone())));

    let ctx = HookContext::new(RunId::new_v4());
    let err = stack.before_tool_call(&ctx, &greet_call()).await.unwrap_err();

    match err {
        AgentError::ToolCallBlocked { tool, reason } => {
            assert_eq!(tool, "greet");
            assert_eq!(reason, "not allowed");
        }
        other => panic!("expected blocked error, got {other}"),
    }
    assert!(events.lock().unwrap().is_empty());
}
