//! Run-scoped state and options.

use bon::Builder;

use crate::types::{CompletedToolCall, Message};

pub use crate::middleware::RunId;

/// Canned sentence committed when the fallback path yields nothing.
pub const FALLBACK_ANSWER: &str = "I am unable to provide a final answer at this time.";

/// Options for one `run` invocation.
#[derive(Debug, Clone, Builder)]
pub struct RunOptions {
    /// Run identifier; generated when absent.
    pub run_id: Option<RunId>,
    /// Clear memory before recording the new task.
    #[builder(default = true)]
    pub reset: bool,
    /// Messages seeded into memory before the task.
    pub history: Option<Vec<Message>>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            run_id: None,
            reset: true,
            history: None,
        }
    }
}

/// Transient state for one run.
///
/// `iteration` never exceeds `max_iterations + 1`; once
/// `returned_final_answer` is set the loop exits before the next
/// iteration.
#[derive(Debug)]
pub struct AgentRun {
    pub run_id: RunId,
    pub iteration: u32,
    pub planned_steps: Vec<String>,
    pub tool_calls_so_far: Vec<CompletedToolCall>,
    pub returned_final_answer: bool,
    pub yielded_text: String,
    chunk_index: u64,
}

impl AgentRun {
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            iteration: 1,
            planned_steps: Vec::new(),
            tool_calls_so_far: Vec::new(),
            returned_final_answer: false,
            yielded_text: String::new(),
            chunk_index: 0,
        }
    }

    /// The next answer-chunk index; strictly increasing within a run.
    pub fn next_chunk_index(&mut self) -> u64 {
        let index = self.chunk_index;
        self.chunk_index += 1;
        index
    }
}

/// Events yielded while a run progresses.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    /// An incremental piece of the answer text.
    AnswerChunk { index: u64, text: String },
    /// The committed final answer; emitted exactly once per successful run.
    FinalAnswer { text: String },
}
