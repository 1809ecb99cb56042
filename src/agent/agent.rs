//! The multi-step agent: plan, act, observe, repeat.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Deserialize;

use crate::builder::AgentConfig;
use crate::error::{AgentError, Result};
use crate::llm::{LanguageModel, ToolDefinition};
use crate::memory::{BufferMemory, Memory};
use crate::middleware::{HookContext, Middleware, MiddlewareStack};
use crate::prompt::PromptSet;
use crate::stream::accumulate;
use crate::tools::{Tool, ToolParameters};
use crate::types::{LlmChunk, LlmInput, Message, Metadata, ToolOutput};

use super::run::{AgentRun, RunEvent, RunId, RunOptions, FALLBACK_ANSWER};

/// Name of the synthetic tool that terminates a run.
pub const FINAL_ANSWER_TOOL: &str = "provide_final_answer";

fn final_answer_tool() -> Tool {
    Tool::sync(
        FINAL_ANSWER_TOOL,
        "Provide the final answer to the user's task and finish the run.",
        ToolParameters::object()
            .string("response", "The final answer text", true)
            .build(),
        |args| {
            let response = args
                .get("response")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            Ok(ToolOutput::from(Message::final_answer(response)))
        },
    )
}

#[derive(Debug, Deserialize)]
struct PlanOutcome {
    planned_steps: Vec<String>,
    reasoning: String,
}

fn plan_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "planned_steps": {
                "type": "array",
                "items": { "type": "string" },
            },
            "reasoning": { "type": "string" },
        },
        "required": ["planned_steps", "reasoning"],
    })
}

/// A driver that repeatedly consults an LLM and executes tools until it
/// produces a final answer.
///
/// The agent exclusively owns its memory, tool list, and middleware for
/// the duration of a run; runs on one instance are serialized by the
/// `&mut self` receivers.
pub struct Agent {
    name: String,
    llm: Arc<dyn LanguageModel>,
    tools: Vec<Arc<Tool>>,
    memory: Box<dyn Memory>,
    middleware: MiddlewareStack,
    prompts: PromptSet,
    max_iterations: u32,
    plan_interval: u32,
    final_answer: Arc<Tool>,
    source_config: Option<AgentConfig>,
}

impl Agent {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self {
            name: "agent".to_string(),
            llm,
            tools: Vec::new(),
            memory: Box::new(BufferMemory::new()),
            middleware: MiddlewareStack::new(),
            prompts: PromptSet::default(),
            max_iterations: 10,
            plan_interval: 1,
            final_answer: Arc::new(final_answer_tool()),
            source_config: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_tool(mut self, tool: Arc<Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_tools(mut self, tools: impl IntoIterator<Item = Arc<Tool>>) -> Self {
        self.tools.extend(tools);
        self
    }

    pub fn with_memory(mut self, memory: Box<dyn Memory>) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    pub fn with_prompts(mut self, prompts: PromptSet) -> Self {
        self.prompts = prompts;
        self
    }

    /// Iteration budget; exceeding it triggers the fallback path.
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// How often the planner re-runs; `0` disables planning.
    pub fn with_plan_interval(mut self, plan_interval: u32) -> Self {
        self.plan_interval = plan_interval;
        self
    }

    pub(crate) fn with_source_config(mut self, config: AgentConfig) -> Self {
        self.source_config = Some(config);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn memory(&self) -> &dyn Memory {
        self.memory.as_ref()
    }

    pub fn tools(&self) -> &[Arc<Tool>] {
        &self.tools
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub fn plan_interval(&self) -> u32 {
        self.plan_interval
    }

    /// The configuration this agent was built from, when builder-made.
    pub fn to_config(&self) -> Option<&AgentConfig> {
        self.source_config.as_ref()
    }

    /// Clear the conversation memory.
    pub fn reset(&mut self) {
        self.memory.clear();
    }

    /// One-line description, stable across rebuilds from the same
    /// configuration.
    pub fn summary(&self) -> String {
        let mut tool_names: Vec<_> = self.tools.iter().map(|t| t.name().to_string()).collect();
        tool_names.sort();
        let mut memory_keys = self.memory.variable_keys();
        memory_keys.sort();
        format!(
            "Agent(name={}, llm={}, tools=[{}], memory=[{}], max_iterations={}, plan_interval={})",
            self.name,
            self.llm.model_id(),
            tool_names.join(", "),
            memory_keys.join(", "),
            self.max_iterations,
            self.plan_interval,
        )
    }

    /// Run to completion and return the final answer.
    pub async fn run(&mut self, task: impl Into<String>) -> Result<String> {
        self.run_with(task, RunOptions::default()).await
    }

    /// Run with explicit options.
    pub async fn run_with(
        &mut self,
        task: impl Into<String>,
        options: RunOptions,
    ) -> Result<String> {
        let mut events = self.run_events(task.into(), options);
        let mut answer = None;
        while let Some(event) = events.next().await {
            if let RunEvent::FinalAnswer { text } = event? {
                answer = Some(text);
            }
        }
        answer.ok_or_else(|| AgentError::Stream("run ended without an answer".to_string()))
    }

    /// Stream the answer as text chunks.
    ///
    /// Answers produced by the final-answer tool arrive as one chunk;
    /// streamed text arrives as it is generated.
    pub fn run_stream(
        &mut self,
        task: impl Into<String>,
        options: RunOptions,
    ) -> BoxStream<'_, Result<String>> {
        let task = task.into();
        Box::pin(async_stream::stream! {
            let mut streamed_text = false;
            let mut events = self.run_events(task, options);
            while let Some(event) = events.next().await {
                match event {
                    Ok(RunEvent::AnswerChunk { text, .. }) => {
                        streamed_text = true;
                        yield Ok(text);
                    }
                    Ok(RunEvent::FinalAnswer { text }) => {
                        if !streamed_text {
                            yield Ok(text);
                        }
                    }
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        })
    }

    /// Low-level event stream for one run.
    pub fn run_events(
        &mut self,
        task: String,
        options: RunOptions,
    ) -> BoxStream<'_, Result<RunEvent>> {
        Box::pin(async_stream::stream! {
            let run_id = options.run_id.unwrap_or_else(RunId::new_v4);
            if options.reset {
                self.memory.clear();
            }
            if let Some(history) = options.history {
                for message in history {
                    self.memory.save_context(message);
                }
            }
            self.memory.save_context(Message::human(task.clone()));

            let ctx = HookContext::new(run_id);
            let mut run = AgentRun::new(run_id);
            let mut failure: Option<AgentError> = None;
            let mut final_answer: Option<String> = None;
            tracing::debug!(run_id = %run_id, "agent run start");

            'run: while run.iteration <= self.max_iterations {
                if self.plan_interval > 0 && (run.iteration - 1) % self.plan_interval == 0 {
                    if let Err(e) = self.plan_phase(&ctx, &mut run, &task).await {
                        failure = Some(e);
                        break 'run;
                    }
                }

                // ACT: stream the model with tools through the accumulator.
                let offered = self.middleware.filter_tools(self.active_tools());
                let definitions: Vec<ToolDefinition> =
                    offered.iter().map(|t| t.definition()).collect();
                let input = match self.compose_action_input(&task, &offered) {
                    Ok(input) => input,
                    Err(e) => {
                        failure = Some(e);
                        break 'run;
                    }
                };

                self.middleware.before_llm_call(&ctx).await;
                let provider_stream = match self.llm.stream_with_tools(&input, &definitions).await {
                    Ok(stream) => stream,
                    Err(e) => {
                        failure = Some(e);
                        break 'run;
                    }
                };
                let mut stream = accumulate(provider_stream);

                let mut iteration_tool_calls = 0usize;
                'stream: while let Some(chunk) = stream.next().await {
                    let chunk = match chunk {
                        Ok(chunk) => chunk,
                        Err(e) => {
                            failure = Some(e);
                            break 'run;
                        }
                    };
                    match chunk {
                        LlmChunk::Message { message } => {
                            let Some(text) = message.content() else { continue 'stream };
                            if text.is_empty() {
                                continue 'stream;
                            }
                            run.yielded_text.push_str(text);
                            let index = run.next_chunk_index();
                            self.middleware.on_answer_chunk(&ctx, index, text).await;
                            yield Ok(RunEvent::AnswerChunk {
                                index,
                                text: text.to_string(),
                            });
                        }
                        LlmChunk::CompletedToolCall { call } => {
                            iteration_tool_calls += 1;
                            let Some(tool) = self
                                .active_tools()
                                .into_iter()
                                .find(|t| t.name() == call.tool_name)
                            else {
                                tracing::warn!(
                                    run_id = %run_id,
                                    tool = %call.tool_name,
                                    "model called unknown tool; skipping"
                                );
                                continue 'stream;
                            };

                            match self.middleware.before_tool_call(&ctx, &call).await {
                                Ok(()) => {}
                                Err(AgentError::ToolCallBlocked { tool, reason }) => {
                                    tracing::warn!(run_id = %run_id, tool = %tool, %reason, "tool call blocked");
                                    self.memory.save_context(Message::ToolCall {
                                        call_id: call.call_id.clone(),
                                        tool_name: call.tool_name.clone(),
                                        arguments: call.arguments.clone(),
                                        result: Some(Box::new(ToolOutput::Value(serde_json::json!({
                                            "error": format!("tool call blocked: {reason}")
                                        })))),
                                        metadata: Metadata::new(),
                                    });
                                    run.tool_calls_so_far.push(call);
                                    continue 'stream;
                                }
                                Err(e) => {
                                    failure = Some(e);
                                    break 'run;
                                }
                            }

                            if let Some(reasoning) = tool.reasoning_of(&call.arguments) {
                                self.middleware
                                    .on_tool_reasoning(&ctx, tool.name(), &reasoning)
                                    .await;
                            }

                            let args = serde_json::Value::Object(call.arguments.clone());
                            let result = match tool.run(args).await {
                                Ok(output) => output,
                                Err(e) => {
                                    failure = Some(e);
                                    break 'run;
                                }
                            };

                            self.memory.save_context(Message::ToolCall {
                                call_id: call.call_id.clone(),
                                tool_name: call.tool_name.clone(),
                                arguments: call.arguments.clone(),
                                result: Some(Box::new(result.clone())),
                                metadata: Metadata::new(),
                            });
                            run.tool_calls_so_far.push(call.clone());
                            self.middleware.after_tool_call(&ctx, &call, &result).await;
                            for message in ctx.drain_injected() {
                                self.memory.save_context(message);
                            }

                            if let Some(message) = result.as_message() {
                                if message.is_final_answer() {
                                    run.returned_final_answer = true;
                                    final_answer =
                                        Some(message.content().unwrap_or_default().to_string());
                                    break 'stream;
                                }
                            }
                        }
                        // Fragments are consumed by the accumulator.
                        LlmChunk::ToolCallFragment { .. } => {}
                        LlmChunk::End => break 'stream,
                    }
                }
                self.middleware.after_llm_call(&ctx).await;
                for message in ctx.drain_injected() {
                    self.memory.save_context(message);
                }

                tracing::debug!(
                    run_id = %run_id,
                    iteration = run.iteration,
                    tool_calls = iteration_tool_calls,
                    text_len = run.yielded_text.len(),
                    "iteration complete"
                );

                if run.returned_final_answer {
                    break 'run;
                }

                if iteration_tool_calls == 0 {
                    // A plain text completion (possibly empty) is the answer.
                    final_answer = Some(std::mem::take(&mut run.yielded_text));
                    break 'run;
                }

                // Text that co-occurred with tool calls is not an answer.
                run.yielded_text.clear();
                run.iteration += 1;
            }

            if failure.is_none() && final_answer.is_none() {
                tracing::debug!(
                    run_id = %run_id,
                    max_iterations = self.max_iterations,
                    "iteration budget exhausted; entering fallback"
                );
                match self.compose_fallback_input(&task) {
                    Ok(input) => {
                        self.middleware.before_llm_call(&ctx).await;
                        match self.llm.stream_text(&input).await {
                            Ok(mut stream) => {
                                let mut answer = String::new();
                                while let Some(chunk) = stream.next().await {
                                    match chunk {
                                        Ok(LlmChunk::Message { message }) => {
                                            let Some(text) = message.content() else { continue };
                                            if text.is_empty() {
                                                continue;
                                            }
                                            answer.push_str(text);
                                            let index = run.next_chunk_index();
                                            self.middleware.on_answer_chunk(&ctx, index, text).await;
                                            yield Ok(RunEvent::AnswerChunk {
                                                index,
                                                text: text.to_string(),
                                            });
                                        }
                                        Ok(LlmChunk::End) => break,
                                        Ok(_) => {}
                                        Err(e) => {
                                            failure = Some(e);
                                            break;
                                        }
                                    }
                                }
                                self.middleware.after_llm_call(&ctx).await;
                                if failure.is_none() {
                                    if answer.is_empty() {
                                        answer = FALLBACK_ANSWER.to_string();
                                    }
                                    final_answer = Some(answer);
                                }
                            }
                            Err(e) => failure = Some(e),
                        }
                    }
                    Err(e) => failure = Some(e),
                }
            }

            match (failure, final_answer) {
                (Some(e), _) => {
                    tracing::warn!(run_id = %run_id, error = %e, "agent run failed");
                    self.middleware.on_error(&ctx, &e).await;
                    yield Err(e);
                }
                (None, Some(answer)) => {
                    if !run.returned_final_answer {
                        self.memory.save_context(Message::chat(answer.clone()));
                    }
                    self.middleware.on_answer(&ctx, &answer).await;
                    tracing::debug!(run_id = %run_id, "agent run completed");
                    yield Ok(RunEvent::FinalAnswer { text: answer });
                }
                (None, None) => {
                    let e = AgentError::Stream("run produced neither answer nor error".to_string());
                    self.middleware.on_error(&ctx, &e).await;
                    yield Err(e);
                }
            }
        })
    }

    fn active_tools(&self) -> Vec<Arc<Tool>> {
        let mut tools = self.tools.clone();
        if !tools.iter().any(|t| t.name() == FINAL_ANSWER_TOOL) {
            tools.push(self.final_answer.clone());
        }
        tools
    }

    fn base_variables(&self, task: &str) -> BTreeMap<String, String> {
        let mut variables = self.memory.load_variables();
        variables.insert("agent_name".to_string(), self.name.clone());
        variables.insert("task".to_string(), task.to_string());
        variables
    }

    fn compose_action_input(&self, task: &str, tools: &[Arc<Tool>]) -> Result<LlmInput> {
        let mut variables = self.base_variables(task);
        variables.insert("tools".to_string(), render_tool_list(tools));
        let prompt = self.prompts.action.render(&variables)?;
        let mut input = LlmInput::new(vec![Message::system(prompt)]);
        input.add_at_end(Message::human(task.to_string()));
        Ok(input)
    }

    fn compose_fallback_input(&self, task: &str) -> Result<LlmInput> {
        let prompt = self.prompts.fallback.render(&self.base_variables(task))?;
        Ok(LlmInput::new(vec![Message::system(prompt)]))
    }

    async fn plan_phase(
        &mut self,
        ctx: &HookContext,
        run: &mut AgentRun,
        task: &str,
    ) -> Result<()> {
        let template = if run.planned_steps.is_empty() {
            &self.prompts.init_plan
        } else {
            &self.prompts.update_plan
        };
        let mut variables = self.base_variables(task);
        variables.insert("tools".to_string(), render_tool_list(&self.active_tools()));
        variables.insert("steps".to_string(), run.planned_steps.join("\n"));
        variables.insert(
            "remaining_steps".to_string(),
            (self.max_iterations + 1 - run.iteration).to_string(),
        );
        let prompt = template.render(&variables)?;
        let input = LlmInput::new(vec![Message::system(prompt)]);

        self.middleware.before_llm_call(ctx).await;
        let value = self.llm.generate_structured(&input, &plan_schema()).await?;
        self.middleware.after_llm_call(ctx).await;
        let plan: PlanOutcome = serde_json::from_value(value)?;

        self.middleware.on_reasoning(ctx, &plan.reasoning).await;
        self.memory.save_context(Message::reasoning(plan.reasoning));
        for step in plan.planned_steps {
            self.middleware.on_plan(ctx, &step).await;
            self.memory.save_context(Message::plan(step.clone()));
            run.planned_steps.push(step);
        }
        Ok(())
    }
}

impl std::fmt::Display for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.summary())
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Agent").field(&self.summary()).finish()
    }
}

fn render_tool_list(tools: &[Arc<Tool>]) -> String {
    tools
        .iter()
        .map(|tool| format!("{}: {}", tool.name(), tool.description()))
        .collect::<Vec<_>>()
        .join("\n")
}
