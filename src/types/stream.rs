//! Streaming chunk types emitted by model adapters.

use serde::{Deserialize, Serialize};

use super::message::Message;

/// One unit of a streaming model response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LlmChunk {
    /// A (partial) text message.
    Message { message: Message },
    /// A fragment of a tool call still being assembled.
    ToolCallFragment { fragment: ToolCallFragment },
    /// A fully assembled tool call with parsed arguments.
    CompletedToolCall { call: CompletedToolCall },
    /// End-of-stream marker.
    End,
}

impl LlmChunk {
    /// A text chunk carrying a partial assistant reply.
    pub fn text(text: impl Into<String>) -> Self {
        LlmChunk::Message {
            message: Message::chat(text),
        }
    }

    /// A tool-call fragment at `index`; any field may be absent.
    pub fn fragment(
        index: u32,
        call_id: Option<&str>,
        tool_name: Option<&str>,
        arguments: Option<&str>,
    ) -> Self {
        LlmChunk::ToolCallFragment {
            fragment: ToolCallFragment {
                index,
                call_id: call_id.map(str::to_string),
                tool_name: tool_name.map(str::to_string),
                arguments: arguments.map(str::to_string),
            },
        }
    }
}

/// A partial tool call addressed by a provider-assigned index.
///
/// Fragments with the same index belong to the same call; `arguments`
/// deltas concatenate into a string that parses as JSON once complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallFragment {
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

/// A reassembled tool call ready for dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    pub tool_name: String,
    pub arguments: serde_json::Map<String, serde_json::Value>,
}
