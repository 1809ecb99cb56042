//! Reassembles fragmented tool-call chunks into complete invocations.

use std::collections::HashMap;

use futures::StreamExt;

use crate::error::AgentError;
use crate::llm::ChunkStream;
use crate::types::{CompletedToolCall, LlmChunk, ToolCallFragment};

/// Per-index assembly state for one in-flight tool call.
#[derive(Debug, Default)]
struct FragmentSlot {
    call_id: Option<String>,
    tool_name: Option<String>,
    arguments: String,
    completed: bool,
}

impl FragmentSlot {
    fn absorb(&mut self, fragment: &ToolCallFragment) {
        if self.call_id.is_none() {
            self.call_id = fragment.call_id.clone();
        }
        if self.tool_name.is_none() {
            self.tool_name = fragment.tool_name.clone();
        }
        if let Some(delta) = &fragment.arguments {
            self.arguments.push_str(delta);
        }
    }

    /// A completed call once the accumulated arguments parse as a JSON
    /// object. A prefix of an object never parses, so this cannot fire
    /// early.
    fn try_complete(&mut self) -> Option<CompletedToolCall> {
        if self.completed {
            return None;
        }
        let tool_name = self.tool_name.clone()?;
        let arguments: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&self.arguments).ok()?;
        self.completed = true;
        Some(CompletedToolCall {
            call_id: self.call_id.clone(),
            tool_name,
            arguments,
        })
    }
}

/// Transform a raw model stream so that every completed tool call is
/// emitted as a single [`LlmChunk::CompletedToolCall`] event.
///
/// Text chunks are forwarded verbatim in their original order; tool-call
/// fragments are consumed. The end marker is emitted exactly once, after
/// any [`AgentError::IncompleteToolCall`] errors for slots whose
/// arguments never became valid JSON. The transducer holds no state
/// beyond the per-index fragment buffers and honors the ambient
/// backpressure of the async iteration.
pub fn accumulate(stream: ChunkStream) -> ChunkStream {
    let transformed = async_stream::stream! {
        let mut slots: HashMap<u32, FragmentSlot> = HashMap::new();
        let mut inner = std::pin::pin!(stream);

        while let Some(item) = inner.next().await {
            match item {
                Ok(LlmChunk::ToolCallFragment { fragment }) => {
                    let slot = slots.entry(fragment.index).or_default();
                    if slot.completed {
                        // A completed emit is final for this index.
                        continue;
                    }
                    slot.absorb(&fragment);
                    if let Some(call) = slot.try_complete() {
                        yield Ok(LlmChunk::CompletedToolCall { call });
                    }
                }
                Ok(LlmChunk::End) => break,
                Ok(chunk) => yield Ok(chunk),
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }

        let mut dangling: Vec<_> = slots
            .into_iter()
            .filter(|(_, slot)| !slot.completed)
            .collect();
        dangling.sort_by_key(|(index, _)| *index);
        for (index, slot) in dangling {
            yield Err(AgentError::IncompleteToolCall {
                index,
                buffer: slot.arguments,
            });
        }

        yield Ok(LlmChunk::End);
    };
    Box::pin(transformed)
}
