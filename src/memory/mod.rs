//! Chat history and the memory views over it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::error::{AgentError, Result};
use crate::types::Message;

/// Default variable name memories expose their transcript under.
pub const DEFAULT_MEMORY_KEY: &str = "chat_history";

/// Ordered, append-only record of a conversation.
#[derive(Debug, Clone, Default)]
pub struct ChatHistory {
    entries: Vec<HistoryEntry>,
}

#[derive(Debug, Clone)]
struct HistoryEntry {
    saved_at: DateTime<Utc>,
    message: Message,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: Message) {
        self.entries.push(HistoryEntry {
            saved_at: Utc::now(),
            message,
        });
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn messages(&self) -> Vec<Message> {
        self.entries.iter().map(|e| e.message.clone()).collect()
    }

    /// When the most recent message was saved.
    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        self.entries.last().map(|e| e.saved_at)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Canonical transcript: one line per message, role-prefixed.
    pub fn render(&self) -> String {
        render_transcript(self.entries.iter().map(|e| &e.message))
    }

    fn render_last(&self, k: usize) -> String {
        let skip = self.entries.len().saturating_sub(k);
        render_transcript(self.entries.iter().skip(skip).map(|e| &e.message))
    }
}

fn render_transcript<'a>(messages: impl Iterator<Item = &'a Message>) -> String {
    messages
        .map(Message::transcript_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// A view over a chat history, exposed to prompt templates as named
/// string variables.
pub trait Memory: Send + Sync {
    /// Append a message to the underlying history.
    fn save_context(&mut self, message: Message);

    /// Reset the underlying history.
    fn clear(&mut self);

    /// Named string projections over the history.
    fn load_variables(&self) -> BTreeMap<String, String>;

    /// Snapshot of the recorded messages.
    fn copy_chat_messages(&self) -> Vec<Message>;

    /// The variable names this memory exposes.
    fn variable_keys(&self) -> Vec<String> {
        self.load_variables().into_keys().collect()
    }
}

/// Exposes the full history as one transcript string.
#[derive(Debug, Default)]
pub struct BufferMemory {
    key: String,
    history: ChatHistory,
}

impl BufferMemory {
    pub fn new() -> Self {
        Self::with_key(DEFAULT_MEMORY_KEY)
    }

    pub fn with_key(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            history: ChatHistory::new(),
        }
    }
}

impl Memory for BufferMemory {
    fn save_context(&mut self, message: Message) {
        self.history.append(message);
    }

    fn clear(&mut self) {
        self.history.clear();
    }

    fn load_variables(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(self.key.clone(), self.history.render())])
    }

    fn copy_chat_messages(&self) -> Vec<Message> {
        self.history.messages()
    }
}

/// Exposes only the last `k` messages.
#[derive(Debug)]
pub struct WindowMemory {
    key: String,
    k: usize,
    history: ChatHistory,
}

impl WindowMemory {
    pub fn new(k: usize) -> Self {
        Self::with_key(DEFAULT_MEMORY_KEY, k)
    }

    pub fn with_key(key: impl Into<String>, k: usize) -> Self {
        Self {
            key: key.into(),
            k,
            history: ChatHistory::new(),
        }
    }
}

impl Memory for WindowMemory {
    fn save_context(&mut self, message: Message) {
        self.history.append(message);
    }

    fn clear(&mut self) {
        self.history.clear();
    }

    fn load_variables(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(self.key.clone(), self.history.render_last(self.k))])
    }

    fn copy_chat_messages(&self) -> Vec<Message> {
        self.history.messages()
    }
}

/// Composes several memories; variables merge across them.
///
/// Duplicate variable keys across children are a configuration error,
/// surfaced at build time.
pub struct CombinedMemory {
    children: Vec<Box<dyn Memory>>,
}

impl std::fmt::Debug for CombinedMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CombinedMemory")
            .field("children", &self.children.len())
            .finish()
    }
}

impl CombinedMemory {
    pub fn new(children: Vec<Box<dyn Memory>>) -> Result<Self> {
        let mut seen = BTreeMap::new();
        for (i, child) in children.iter().enumerate() {
            for key in child.variable_keys() {
                if let Some(other) = seen.insert(key.clone(), i) {
                    return Err(AgentError::Configuration(format!(
                        "combined memory exposes duplicate variable '{key}' (memories {other} and {i})"
                    )));
                }
            }
        }
        Ok(Self { children })
    }
}

impl Memory for CombinedMemory {
    fn save_context(&mut self, message: Message) {
        for child in &mut self.children {
            child.save_context(message.clone());
        }
    }

    fn clear(&mut self) {
        for child in &mut self.children {
            child.clear();
        }
    }

    fn load_variables(&self) -> BTreeMap<String, String> {
        let mut merged = BTreeMap::new();
        for child in &self.children {
            merged.extend(child.load_variables());
        }
        merged
    }

    fn copy_chat_messages(&self) -> Vec<Message> {
        self.children
            .first()
            .map(|child| child.copy_chat_messages())
            .unwrap_or_default()
    }
}
