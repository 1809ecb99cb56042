//! The multi-step agent core.

pub mod agent;
pub mod run;

pub use agent::{Agent, FINAL_ANSWER_TOOL};
pub use run::{AgentRun, RunEvent, RunId, RunOptions, FALLBACK_ANSWER};
