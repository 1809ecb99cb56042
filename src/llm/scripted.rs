//! Scripted in-memory model for tests and local composition.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{AgentError, Result};
use crate::types::{LlmChunk, LlmInput, Message};

use super::{ChunkStream, LanguageModel, LlmResult, ToolDefinition};

/// A model that plays back pre-scripted turns.
///
/// Each streaming call pops the next scripted chunk sequence; each
/// structured call pops the next scripted value (or returns the configured
/// default). An exhausted stream script yields just the end marker, which
/// is how tests exercise the empty-completion and fallback paths.
#[derive(Default)]
pub struct ScriptedModel {
    model_id: String,
    stream_turns: Mutex<VecDeque<Vec<LlmChunk>>>,
    structured_values: Mutex<VecDeque<serde_json::Value>>,
    default_structured: Mutex<Option<serde_json::Value>>,
    text_replies: Mutex<VecDeque<String>>,
    stream_calls: AtomicUsize,
    structured_calls: AtomicUsize,
    seen_tools: Mutex<Vec<Vec<String>>>,
}

impl ScriptedModel {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            ..Default::default()
        }
    }

    /// Queue a streaming turn. An explicit `End` chunk is optional; the
    /// stream terminates either way.
    pub fn push_stream_turn(&self, chunks: Vec<LlmChunk>) {
        self.stream_turns.lock().unwrap().push_back(chunks);
    }

    /// Queue a structured-generation value.
    pub fn push_structured(&self, value: serde_json::Value) {
        self.structured_values.lock().unwrap().push_back(value);
    }

    /// Value returned by structured generation when the queue is empty.
    pub fn set_default_structured(&self, value: serde_json::Value) {
        *self.default_structured.lock().unwrap() = Some(value);
    }

    /// Queue a plain text reply for the non-streaming calls.
    pub fn push_text(&self, text: impl Into<String>) {
        self.text_replies.lock().unwrap().push_back(text.into());
    }

    /// Number of streaming calls made so far.
    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }

    /// Number of structured-generation calls made so far.
    pub fn structured_calls(&self) -> usize {
        self.structured_calls.load(Ordering::SeqCst)
    }

    /// Tool names offered on each streaming-with-tools call, in call order.
    pub fn seen_tools(&self) -> Vec<Vec<String>> {
        self.seen_tools.lock().unwrap().clone()
    }

    fn next_stream(&self) -> ChunkStream {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        let chunks = self
            .stream_turns
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default();
        Box::pin(tokio_stream::iter(chunks.into_iter().map(Ok)))
    }

    fn next_text(&self) -> Result<LlmResult> {
        match self.text_replies.lock().unwrap().pop_front() {
            Some(text) => Ok(LlmResult::new(vec![Message::chat(text)])),
            None => Err(AgentError::provider(
                "scripted",
                "no scripted text reply remaining",
            )),
        }
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn generate_text(&self, _input: &LlmInput) -> Result<LlmResult> {
        self.next_text()
    }

    async fn generate_structured(
        &self,
        _input: &LlmInput,
        _schema: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        self.structured_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(value) = self.structured_values.lock().unwrap().pop_front() {
            return Ok(value);
        }
        self.default_structured
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| {
                AgentError::provider("scripted", "no scripted structured value remaining")
            })
    }

    async fn generate_with_tools(
        &self,
        _input: &LlmInput,
        tools: &[ToolDefinition],
    ) -> Result<LlmResult> {
        self.seen_tools
            .lock()
            .unwrap()
            .push(tools.iter().map(|t| t.name.clone()).collect());
        self.next_text()
    }

    async fn stream_text(&self, _input: &LlmInput) -> Result<ChunkStream> {
        Ok(self.next_stream())
    }

    async fn stream_with_tools(
        &self,
        _input: &LlmInput,
        tools: &[ToolDefinition],
    ) -> Result<ChunkStream> {
        self.seen_tools
            .lock()
            .unwrap()
            .push(tools.iter().map(|t| t.name.clone()).collect());
        Ok(self.next_stream())
    }
}
