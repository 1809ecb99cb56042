//! Lifecycle hooks interleaved with the agent iteration.

pub mod limiter;
pub mod selector;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{AgentError, Result};
use crate::tools::Tool;
use crate::types::{CompletedToolCall, Message, ToolOutput};

pub use limiter::ToolCallLimiter;
pub use selector::LlmToolSelector;

/// Identifier of one end-to-end `run` invocation.
pub type RunId = Uuid;

/// Failure modes of a middleware hook.
#[derive(Debug)]
pub enum HookError {
    /// Abort the pending tool invocation. Honored only when returned from
    /// `before_tool_call`; the agent records a synthetic result describing
    /// the block and continues the iteration.
    Blocked { reason: String },
    /// Any other handler failure; logged and swallowed by the dispatcher.
    Failed(String),
}

/// Outcome of a single hook.
pub type HookResult = std::result::Result<(), HookError>;

/// Per-run context handed to every hook.
///
/// Hooks may inject system messages; the agent drains them into memory at
/// the next opportunity, which is how soft limiters steer the model.
#[derive(Debug, Clone)]
pub struct HookContext {
    run_id: RunId,
    injected: Arc<Mutex<Vec<Message>>>,
}

impl HookContext {
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            injected: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Queue a system message for the agent to record in memory.
    pub fn inject_system_message(&self, text: impl Into<String>) {
        self.injected
            .lock()
            .unwrap()
            .push(Message::system(text.into()));
    }

    pub(crate) fn drain_injected(&self) -> Vec<Message> {
        std::mem::take(&mut *self.injected.lock().unwrap())
    }
}

/// Observer of agent lifecycle events.
///
/// Every hook has a no-op default; implement only the ones you care
/// about. Handlers may be asynchronous and are awaited to completion
/// before the next observer runs.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn before_llm_call(&self, _ctx: &HookContext) -> HookResult {
        Ok(())
    }

    async fn after_llm_call(&self, _ctx: &HookContext) -> HookResult {
        Ok(())
    }

    async fn before_tool_call(&self, _ctx: &HookContext, _call: &CompletedToolCall) -> HookResult {
        Ok(())
    }

    async fn after_tool_call(
        &self,
        _ctx: &HookContext,
        _call: &CompletedToolCall,
        _result: &ToolOutput,
    ) -> HookResult {
        Ok(())
    }

    async fn on_plan(&self, _ctx: &HookContext, _step: &str) -> HookResult {
        Ok(())
    }

    async fn on_reasoning(&self, _ctx: &HookContext, _reasoning: &str) -> HookResult {
        Ok(())
    }

    async fn on_tool_reasoning(
        &self,
        _ctx: &HookContext,
        _tool: &str,
        _reasoning: &str,
    ) -> HookResult {
        Ok(())
    }

    async fn on_answer(&self, _ctx: &HookContext, _answer: &str) -> HookResult {
        Ok(())
    }

    async fn on_answer_chunk(&self, _ctx: &HookContext, _index: u64, _chunk: &str) -> HookResult {
        Ok(())
    }

    async fn on_error(&self, _ctx: &HookContext, _error: &AgentError) -> HookResult {
        Ok(())
    }

    /// Reduce the candidate tool list offered to the model on the next
    /// call. Runs before `before_llm_call`.
    fn filter_tools(&self, tools: Vec<Arc<Tool>>) -> Vec<Arc<Tool>> {
        tools
    }
}

macro_rules! dispatch_swallowing {
    ($self:expr, $event:literal, $method:ident ( $($arg:expr),* )) => {
        for observer in &$self.observers {
            if let Err(err) = observer.$method($($arg),*).await {
                log_swallowed($event, err);
            }
        }
    };
}

/// Ordered fan-out of lifecycle events to registered observers.
///
/// Hooks for a single event fire serially in registration order; a
/// handler failure is logged and swallowed, except `Blocked` raised from
/// `before_tool_call`, which aborts the tool invocation.
#[derive(Clone, Default)]
pub struct MiddlewareStack {
    observers: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, observer: Arc<dyn Middleware>) {
        self.observers.push(observer);
    }

    pub fn with(mut self, observer: Arc<dyn Middleware>) -> Self {
        self.push(observer);
        self
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub async fn before_llm_call(&self, ctx: &HookContext) {
        dispatch_swallowing!(self, "before_llm_call", before_llm_call(ctx));
    }

    pub async fn after_llm_call(&self, ctx: &HookContext) {
        dispatch_swallowing!(self, "after_llm_call", after_llm_call(ctx));
    }

    /// Returns [`AgentError::ToolCallBlocked`] when any observer blocks
    /// the call; later observers are not consulted.
    pub async fn before_tool_call(&self, ctx: &HookContext, call: &CompletedToolCall) -> Result<()> {
        for observer in &self.observers {
            match observer.before_tool_call(ctx, call).await {
                Ok(()) => {}
                Err(HookError::Blocked { reason }) => {
                    return Err(AgentError::ToolCallBlocked {
                        tool: call.tool_name.clone(),
                        reason,
                    });
                }
                Err(err) => log_swallowed("before_tool_call", err),
            }
        }
        Ok(())
    }

    pub async fn after_tool_call(
        &self,
        ctx: &HookContext,
        call: &CompletedToolCall,
        result: &ToolOutput,
    ) {
        dispatch_swallowing!(self, "after_tool_call", after_tool_call(ctx, call, result));
    }

    pub async fn on_plan(&self, ctx: &HookContext, step: &str) {
        dispatch_swallowing!(self, "on_plan", on_plan(ctx, step));
    }

    pub async fn on_reasoning(&self, ctx: &HookContext, reasoning: &str) {
        dispatch_swallowing!(self, "on_reasoning", on_reasoning(ctx, reasoning));
    }

    pub async fn on_tool_reasoning(&self, ctx: &HookContext, tool: &str, reasoning: &str) {
        dispatch_swallowing!(self, "on_tool_reasoning", on_tool_reasoning(ctx, tool, reasoning));
    }

    pub async fn on_answer(&self, ctx: &HookContext, answer: &str) {
        dispatch_swallowing!(self, "on_answer", on_answer(ctx, answer));
    }

    pub async fn on_answer_chunk(&self, ctx: &HookContext, index: u64, chunk: &str) {
        dispatch_swallowing!(self, "on_answer_chunk", on_answer_chunk(ctx, index, chunk));
    }

    pub async fn on_error(&self, ctx: &HookContext, error: &AgentError) {
        dispatch_swallowing!(self, "on_error", on_error(ctx, error));
    }

    pub fn filter_tools(&self, tools: Vec<Arc<Tool>>) -> Vec<Arc<Tool>> {
        self.observers
            .iter()
            .fold(tools, |tools, observer| observer.filter_tools(tools))
    }
}

impl std::fmt::Debug for MiddlewareStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareStack")
            .field("observers", &self.observers.len())
            .finish()
    }
}

fn log_swallowed(event: &str, err: HookError) {
    match err {
        HookError::Blocked { reason } => {
            tracing::warn!(event, %reason, "blocking outside before_tool_call has no effect");
        }
        HookError::Failed(message) => {
            tracing::warn!(event, %message, "middleware hook failed; continuing");
        }
    }
}
