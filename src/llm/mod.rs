//! Abstract model interface consumed by the agent core.

pub mod scripted;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};
use crate::types::{LlmChunk, LlmInput, Message};

pub use scripted::ScriptedModel;

/// An asynchronous sequence of streaming chunks.
pub type ChunkStream = BoxStream<'static, Result<LlmChunk>>;

/// Tool definition handed to the model for function calling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Non-streaming generation result: a sequence of chat and tool-call
/// messages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LlmResult {
    pub messages: Vec<Message>,
}

impl LlmResult {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// Concatenated text of all chat messages in the result.
    pub fn text(&self) -> String {
        self.messages
            .iter()
            .filter_map(Message::content)
            .collect::<Vec<_>>()
            .join("")
    }
}

impl IntoIterator for LlmResult {
    type Item = Message;
    type IntoIter = std::vec::IntoIter<Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.into_iter()
    }
}

/// Contract any model adapter must satisfy.
///
/// Adapters translate provider-specific wire formats; the core only sees
/// [`Message`] values and [`LlmChunk`] streams.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// The model identifier this instance serves.
    fn model_id(&self) -> &str;

    /// Generate a plain text completion.
    async fn generate_text(&self, input: &LlmInput) -> Result<LlmResult>;

    /// Generate a value conforming to the given JSON schema.
    async fn generate_structured(
        &self,
        input: &LlmInput,
        schema: &serde_json::Value,
    ) -> Result<serde_json::Value>;

    /// Generate with tools available (non-streaming).
    async fn generate_with_tools(
        &self,
        input: &LlmInput,
        tools: &[ToolDefinition],
    ) -> Result<LlmResult>;

    /// Stream a text completion.
    async fn stream_text(&self, input: &LlmInput) -> Result<ChunkStream>;

    /// Stream a completion with tools available; tool calls arrive as
    /// fragments to be reassembled by the stream accumulator.
    async fn stream_with_tools(
        &self,
        input: &LlmInput,
        tools: &[ToolDefinition],
    ) -> Result<ChunkStream>;
}

/// Short-form model reference: `provider:model` (e.g. `openai:gpt-4o`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModelRef {
    pub provider: String,
    pub model: String,
}

impl FromStr for ModelRef {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once(':') {
            Some((provider, model)) if !provider.is_empty() && !model.is_empty() => Ok(Self {
                provider: provider.to_string(),
                model: model.to_string(),
            }),
            _ => Err(AgentError::Configuration(format!(
                "invalid model reference '{s}', expected 'provider:model'"
            ))),
        }
    }
}

impl TryFrom<String> for ModelRef {
    type Error = AgentError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ModelRef> for String {
    fn from(value: ModelRef) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.model)
    }
}
