//! Core data model: messages, LLM input, and streaming chunks.

pub mod message;
pub mod stream;

pub use message::{LlmInput, Message, Metadata, ToolOutput, FINAL_ANSWER_KEY};
pub use stream::{CompletedToolCall, LlmChunk, ToolCallFragment};
