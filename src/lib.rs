//! tinyagents — multi-step LLM agents in Rust.
//!
//! An agent repeatedly consults a language model, executes the tools it
//! asks for, and iterates until it produces a final answer. The crate
//! provides the agent loop, a tool system over four handler shapes, chat
//! memory views, a stream accumulator for fragmented tool calls, a
//! middleware hook system, and a YAML-driven builder.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use tinyagents::prelude::*;
//!
//! # async fn example(model: Arc<dyn LanguageModel>) -> tinyagents::error::Result<()> {
//! let greet = Tool::sync(
//!     "greet",
//!     "Greet someone by name",
//!     ToolParameters::object().string("name", "who to greet", true).build(),
//!     |args| {
//!         let name = args["name"].as_str().unwrap_or("world");
//!         Ok(ToolOutput::from(format!("Hello, {name}!")))
//!     },
//! );
//!
//! let mut agent = Agent::new(model).with_tool(Arc::new(greet));
//! let answer = agent.run("Say hello to Alice").await?;
//! println!("{answer}");
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod builder;
pub mod config;
pub mod error;
pub mod llm;
pub mod memory;
pub mod middleware;
pub mod prelude;
pub mod prompt;
pub mod stream;
pub mod tools;
pub mod types;
pub mod util;
