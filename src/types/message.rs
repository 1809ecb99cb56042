//! Message types for agent/model communication.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Metadata key marking a chat message as the run's final answer.
pub const FINAL_ANSWER_KEY: &str = "is_final_answer";

/// Immutable metadata attached to every message.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// A message in a conversation.
///
/// Messages are value objects; equality is structural.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Message {
    /// User utterance.
    Human {
        content: String,
        #[serde(default)]
        metadata: Metadata,
    },
    /// Assistant natural-language reply.
    Chat {
        content: String,
        #[serde(default)]
        metadata: Metadata,
    },
    /// Out-of-band instruction.
    System {
        content: String,
        #[serde(default)]
        metadata: Metadata,
    },
    /// A planned step produced by the planner.
    Plan {
        content: String,
        #[serde(default)]
        metadata: Metadata,
    },
    /// A reasoning trace accompanying a plan.
    Reasoning {
        content: String,
        #[serde(default)]
        metadata: Metadata,
    },
    /// A concrete tool invocation. `result` is filled after execution.
    ToolCall {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        call_id: Option<String>,
        tool_name: String,
        arguments: serde_json::Map<String, serde_json::Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Box<ToolOutput>>,
        #[serde(default)]
        metadata: Metadata,
    },
    /// A standalone result bound to a call id, for providers that separate
    /// call and response.
    ToolResult {
        call_id: String,
        result: Box<ToolOutput>,
        #[serde(default)]
        metadata: Metadata,
    },
    /// Result produced by a member of a composite (squad) agent.
    SquadMemberResult {
        member: String,
        task: String,
        result: String,
        #[serde(default)]
        metadata: Metadata,
    },
}

/// The value produced by a tool: either plain JSON or a full message
/// (the final-answer tool returns a chat message).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolOutput {
    Message(Box<Message>),
    Value(serde_json::Value),
}

impl ToolOutput {
    /// Render this output as plain text.
    ///
    /// Strings lose their JSON quoting; other values render as compact JSON.
    pub fn as_text(&self) -> String {
        match self {
            ToolOutput::Message(message) => message.content().unwrap_or_default().to_string(),
            ToolOutput::Value(serde_json::Value::String(s)) => s.clone(),
            ToolOutput::Value(value) => value.to_string(),
        }
    }

    /// The chat message carried by this output, if any.
    pub fn as_message(&self) -> Option<&Message> {
        match self {
            ToolOutput::Message(message) => Some(message),
            ToolOutput::Value(_) => None,
        }
    }
}

impl From<serde_json::Value> for ToolOutput {
    fn from(value: serde_json::Value) -> Self {
        ToolOutput::Value(value)
    }
}

impl From<&str> for ToolOutput {
    fn from(value: &str) -> Self {
        ToolOutput::Value(serde_json::Value::String(value.to_string()))
    }
}

impl From<String> for ToolOutput {
    fn from(value: String) -> Self {
        ToolOutput::Value(serde_json::Value::String(value))
    }
}

impl From<Message> for ToolOutput {
    fn from(message: Message) -> Self {
        ToolOutput::Message(Box::new(message))
    }
}

impl Message {
    /// Create a user message.
    pub fn human(text: impl Into<String>) -> Self {
        Message::Human {
            content: text.into(),
            metadata: Metadata::new(),
        }
    }

    /// Create an assistant message.
    pub fn chat(text: impl Into<String>) -> Self {
        Message::Chat {
            content: text.into(),
            metadata: Metadata::new(),
        }
    }

    /// Create a system message.
    pub fn system(text: impl Into<String>) -> Self {
        Message::System {
            content: text.into(),
            metadata: Metadata::new(),
        }
    }

    /// Create a planned-step message.
    pub fn plan(text: impl Into<String>) -> Self {
        Message::Plan {
            content: text.into(),
            metadata: Metadata::new(),
        }
    }

    /// Create a reasoning-trace message.
    pub fn reasoning(text: impl Into<String>) -> Self {
        Message::Reasoning {
            content: text.into(),
            metadata: Metadata::new(),
        }
    }

    /// Create a tool-call message with no result yet.
    pub fn tool_call(
        call_id: Option<String>,
        tool_name: impl Into<String>,
        arguments: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Message::ToolCall {
            call_id,
            tool_name: tool_name.into(),
            arguments,
            result: None,
            metadata: Metadata::new(),
        }
    }

    /// Create a standalone tool-result message.
    pub fn tool_result(call_id: impl Into<String>, result: ToolOutput) -> Self {
        Message::ToolResult {
            call_id: call_id.into(),
            result: Box::new(result),
            metadata: Metadata::new(),
        }
    }

    /// Create a squad-member result message.
    pub fn squad_member_result(
        member: impl Into<String>,
        task: impl Into<String>,
        result: impl Into<String>,
    ) -> Self {
        Message::SquadMemberResult {
            member: member.into(),
            task: task.into(),
            result: result.into(),
            metadata: Metadata::new(),
        }
    }

    /// Create a chat message flagged as the final answer.
    pub fn final_answer(text: impl Into<String>) -> Self {
        Message::chat(text).with_metadata(FINAL_ANSWER_KEY, serde_json::Value::Bool(true))
    }

    /// Attach a metadata entry, returning the updated message.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata_mut().insert(key.into(), value);
        self
    }

    /// The text content, for kinds that carry one.
    pub fn content(&self) -> Option<&str> {
        match self {
            Message::Human { content, .. }
            | Message::Chat { content, .. }
            | Message::System { content, .. }
            | Message::Plan { content, .. }
            | Message::Reasoning { content, .. } => Some(content),
            _ => None,
        }
    }

    /// The message metadata.
    pub fn metadata(&self) -> &Metadata {
        match self {
            Message::Human { metadata, .. }
            | Message::Chat { metadata, .. }
            | Message::System { metadata, .. }
            | Message::Plan { metadata, .. }
            | Message::Reasoning { metadata, .. }
            | Message::ToolCall { metadata, .. }
            | Message::ToolResult { metadata, .. }
            | Message::SquadMemberResult { metadata, .. } => metadata,
        }
    }

    fn metadata_mut(&mut self) -> &mut Metadata {
        match self {
            Message::Human { metadata, .. }
            | Message::Chat { metadata, .. }
            | Message::System { metadata, .. }
            | Message::Plan { metadata, .. }
            | Message::Reasoning { metadata, .. }
            | Message::ToolCall { metadata, .. }
            | Message::ToolResult { metadata, .. }
            | Message::SquadMemberResult { metadata, .. } => metadata,
        }
    }

    /// Append text to the content of content-bearing kinds; no-op for the
    /// structured kinds.
    pub(crate) fn append_content(&mut self, extra: &str) {
        match self {
            Message::Human { content, .. }
            | Message::Chat { content, .. }
            | Message::System { content, .. }
            | Message::Plan { content, .. }
            | Message::Reasoning { content, .. } => content.push_str(extra),
            _ => {}
        }
    }

    /// Whether this is a chat message flagged as the final answer.
    pub fn is_final_answer(&self) -> bool {
        matches!(self, Message::Chat { .. })
            && self.metadata().get(FINAL_ANSWER_KEY) == Some(&serde_json::Value::Bool(true))
    }

    /// Canonical one-line transcript form, consumed by prompt templates.
    pub fn transcript_line(&self) -> String {
        match self {
            Message::Human { content, .. } => format!("Human: {content}"),
            Message::Chat { content, .. } => format!("AI: {content}"),
            Message::System { content, .. } => format!("System: {content}"),
            Message::Plan { content, .. } => format!("Plan: {content}"),
            Message::Reasoning { content, .. } => format!("Reasoning: {content}"),
            Message::ToolCall {
                tool_name,
                arguments,
                result,
                ..
            } => {
                let args = serde_json::Value::Object(arguments.clone()).to_string();
                match result {
                    Some(result) => {
                        format!("Tool - {tool_name}({args}): {}", result.as_text())
                    }
                    None => format!("Tool - {tool_name}({args})"),
                }
            }
            Message::ToolResult {
                call_id, result, ..
            } => format!("Tool result [{call_id}]: {}", result.as_text()),
            Message::SquadMemberResult {
                member,
                task,
                result,
                ..
            } => format!("Member {member} on {task} → {result}"),
        }
    }
}

/// An ordered sequence of messages sent to a model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmInput {
    messages: Vec<Message>,
}

impl LlmInput {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    pub fn add_at_beginning(&mut self, message: Message) {
        self.messages.insert(0, message);
    }

    /// Insert just before the last message, or at the end when empty.
    pub fn add_before_last(&mut self, message: Message) {
        let at = self.messages.len().saturating_sub(1);
        self.messages.insert(at, message);
    }

    pub fn add_at_end(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl From<Vec<Message>> for LlmInput {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

impl IntoIterator for LlmInput {
    type Item = Message;
    type IntoIter = std::vec::IntoIter<Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn final_answer_metadata_is_detected() {
        let answer = Message::final_answer("4");

        assert!(answer.is_final_answer());
        assert_eq!(answer.content(), Some("4"));
    }

    #[test]
    fn plain_chat_is_not_final_answer() {
        assert!(!Message::chat("hello").is_final_answer());
    }

    #[test]
    fn final_answer_flag_on_non_chat_is_ignored() {
        let human = Message::human("hi").with_metadata(FINAL_ANSWER_KEY, json!(true));

        assert!(!human.is_final_answer());
    }

    #[test]
    fn equality_is_structural() {
        assert_eq!(Message::human("hi"), Message::human("hi"));
        assert_ne!(
            Message::human("hi"),
            Message::human("hi").with_metadata("k", json!(1))
        );
    }

    #[test]
    fn transcript_line_for_tool_call_includes_result() {
        let mut args = serde_json::Map::new();
        args.insert("name".to_string(), json!("Alice"));
        let call = Message::ToolCall {
            call_id: Some("t1".to_string()),
            tool_name: "greet".to_string(),
            arguments: args,
            result: Some(Box::new(ToolOutput::from("Hello, Alice!"))),
            metadata: Metadata::new(),
        };

        assert_eq!(
            call.transcript_line(),
            "Tool - greet({\"name\":\"Alice\"}): Hello, Alice!"
        );
    }

    #[test]
    fn transcript_line_for_squad_member() {
        let msg = Message::squad_member_result("scout", "find docs", "done");

        assert_eq!(msg.transcript_line(), "Member scout on find docs → done");
    }

    #[test]
    fn llm_input_ordering_helpers() {
        let mut input = LlmInput::new(vec![Message::human("task")]);
        input.add_at_beginning(Message::system("sys"));
        input.add_before_last(Message::chat("middle"));
        input.add_at_end(Message::chat("end"));

        let kinds: Vec<_> = input
            .messages()
            .iter()
            .map(|m| m.transcript_line())
            .collect();
        assert_eq!(
            kinds,
            vec!["System: sys", "AI: middle", "Human: task", "AI: end"]
        );
    }

    #[test]
    fn tool_output_as_text_unquotes_strings() {
        assert_eq!(ToolOutput::from("hi").as_text(), "hi");
        assert_eq!(ToolOutput::Value(json!({"a": 1})).as_text(), "{\"a\":1}");
    }
}
