//! The uniform tool wrapper over four handler shapes.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::StreamExt;
use strum::{Display, EnumString};

use crate::error::{AgentError, Result};
use crate::llm::ToolDefinition;
use crate::types::ToolOutput;

use super::cache::{canonical_key, CacheInfo, ToolCache};
use super::schema::ToolParameters;
use super::validation;

/// Argument name injected by the reasoning variant.
pub const REASONING_FIELD: &str = "reasoning";

/// The shape of the wrapped handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ToolShape {
    Sync,
    Async,
    Generator,
    AsyncGenerator,
}

type SyncHandler = dyn Fn(serde_json::Value) -> Result<ToolOutput> + Send + Sync;
type AsyncHandler =
    dyn Fn(serde_json::Value) -> BoxFuture<'static, Result<ToolOutput>> + Send + Sync;
type GeneratorHandler =
    dyn Fn(serde_json::Value) -> Result<Box<dyn Iterator<Item = ToolOutput> + Send>> + Send + Sync;
type AsyncGeneratorHandler =
    dyn Fn(serde_json::Value) -> Result<BoxStream<'static, Result<ToolOutput>>> + Send + Sync;

enum Handler {
    Sync(Arc<SyncHandler>),
    Async(Arc<AsyncHandler>),
    Generator(Arc<GeneratorHandler>),
    AsyncGenerator(Arc<AsyncGeneratorHandler>),
}

/// The result of [`Tool::invoke`], still in its native shape.
pub enum ToolInvocation {
    /// A value available immediately.
    Ready(ToolOutput),
    /// An awaitable value.
    Pending(BoxFuture<'static, Result<ToolOutput>>),
    /// A lazy finite sequence of values.
    Values(Box<dyn Iterator<Item = ToolOutput> + Send>),
    /// A lazy finite asynchronous sequence of values.
    Stream(BoxStream<'static, Result<ToolOutput>>),
}

impl ToolInvocation {
    /// Materialize into a single concrete value: awaits pending results
    /// and collects sequences into a JSON array.
    pub async fn materialize(self) -> Result<ToolOutput> {
        match self {
            ToolInvocation::Ready(output) => Ok(output),
            ToolInvocation::Pending(future) => future.await,
            ToolInvocation::Values(iter) => {
                let mut items = Vec::new();
                for output in iter {
                    items.push(output_to_value(output)?);
                }
                Ok(ToolOutput::Value(serde_json::Value::Array(items)))
            }
            ToolInvocation::Stream(mut stream) => {
                let mut items = Vec::new();
                while let Some(output) = stream.next().await {
                    items.push(output_to_value(output?)?);
                }
                Ok(ToolOutput::Value(serde_json::Value::Array(items)))
            }
        }
    }
}

fn output_to_value(output: ToolOutput) -> Result<serde_json::Value> {
    match output {
        ToolOutput::Value(value) => Ok(value),
        ToolOutput::Message(message) => Ok(serde_json::to_value(*message)?),
    }
}

/// A named invocable with a declared input schema, usable by the LLM via
/// function calling.
///
/// Tools accept exactly one structured argument, validated against
/// `input_schema` before dispatch. Invocation must be reentrant-safe: the
/// same tool instance may be shared by concurrent runs.
pub struct Tool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
    output_schema: Option<serde_json::Value>,
    hidden: bool,
    requires_reasoning: bool,
    instruction: Option<String>,
    handler: Handler,
    cache: Option<Arc<ToolCache>>,
}

impl Tool {
    fn with_handler(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ToolParameters,
        handler: Handler,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: parameters.schema,
            output_schema: None,
            hidden: false,
            requires_reasoning: false,
            instruction: None,
            handler,
            cache: None,
        }
    }

    /// Wrap a synchronous function.
    pub fn sync<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ToolParameters,
        f: F,
    ) -> Self
    where
        F: Fn(serde_json::Value) -> Result<ToolOutput> + Send + Sync + 'static,
    {
        Self::with_handler(name, description, parameters, Handler::Sync(Arc::new(f)))
    }

    /// Wrap an asynchronous function.
    pub fn async_fn<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ToolParameters,
        f: F,
    ) -> Self
    where
        F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolOutput>> + Send + 'static,
    {
        Self::with_handler(
            name,
            description,
            parameters,
            Handler::Async(Arc::new(move |args| Box::pin(f(args)))),
        )
    }

    /// Wrap a generator: the handler returns a lazy finite iterator.
    pub fn generator<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ToolParameters,
        f: F,
    ) -> Self
    where
        F: Fn(serde_json::Value) -> Result<Box<dyn Iterator<Item = ToolOutput> + Send>>
            + Send
            + Sync
            + 'static,
    {
        Self::with_handler(
            name,
            description,
            parameters,
            Handler::Generator(Arc::new(f)),
        )
    }

    /// Wrap an async generator: the handler returns a lazy finite stream.
    pub fn async_generator<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ToolParameters,
        f: F,
    ) -> Self
    where
        F: Fn(serde_json::Value) -> Result<BoxStream<'static, Result<ToolOutput>>>
            + Send
            + Sync
            + 'static,
    {
        Self::with_handler(
            name,
            description,
            parameters,
            Handler::AsyncGenerator(Arc::new(f)),
        )
    }

    /// Enable LRU caching with the given capacity.
    ///
    /// Generators and async generators are single-shot and never cached;
    /// the setting is ignored for those shapes.
    pub fn with_cache(mut self, cache_size: usize) -> Self {
        match self.shape() {
            ToolShape::Sync | ToolShape::Async => {
                self.cache = Some(Arc::new(ToolCache::new(cache_size)));
            }
            shape => {
                tracing::warn!(tool = %self.name, %shape, "caching ignored for single-shot tool shape");
            }
        }
        self
    }

    /// Require an extra `reasoning: string` field in the input schema.
    ///
    /// The field is stripped before the handler runs; the agent surfaces
    /// it through the `on_tool_reasoning` middleware event.
    pub fn with_reasoning(mut self) -> Self {
        if self.requires_reasoning {
            return self;
        }
        self.requires_reasoning = true;
        if let Some(obj) = self.input_schema.as_object_mut() {
            if let Some(props) = obj
                .entry("properties")
                .or_insert_with(|| serde_json::json!({}))
                .as_object_mut()
            {
                props.insert(
                    REASONING_FIELD.to_string(),
                    serde_json::json!({
                        "type": "string",
                        "description": "Why this tool call helps with the task",
                    }),
                );
            }
            if let serde_json::Value::Array(required) =
                obj.entry("required").or_insert_with(|| serde_json::json!([]))
            {
                required.push(serde_json::Value::String(REASONING_FIELD.to_string()));
            }
        }
        self
    }

    /// Append a fixed instruction to every output; for generators it is
    /// appended as a final element. Async shapes are rejected.
    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Result<Self> {
        match self.shape() {
            ToolShape::Sync | ToolShape::Generator => {
                self.instruction = Some(instruction.into());
                Ok(self)
            }
            shape => Err(AgentError::Configuration(format!(
                "instruction tools do not support the {shape} shape"
            ))),
        }
    }

    /// Declare the output schema (informational).
    pub fn with_output_schema(mut self, schema: serde_json::Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    /// Hidden tools are listed by the catalog only on explicit request.
    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn input_schema(&self) -> &serde_json::Value {
        &self.input_schema
    }

    pub fn output_schema(&self) -> Option<&serde_json::Value> {
        self.output_schema.as_ref()
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn shape(&self) -> ToolShape {
        match self.handler {
            Handler::Sync(_) => ToolShape::Sync,
            Handler::Async(_) => ToolShape::Async,
            Handler::Generator(_) => ToolShape::Generator,
            Handler::AsyncGenerator(_) => ToolShape::AsyncGenerator,
        }
    }

    pub fn is_async(&self) -> bool {
        self.shape() == ToolShape::Async
    }

    pub fn is_generator(&self) -> bool {
        self.shape() == ToolShape::Generator
    }

    pub fn is_async_generator(&self) -> bool {
        self.shape() == ToolShape::AsyncGenerator
    }

    pub fn requires_reasoning(&self) -> bool {
        self.requires_reasoning
    }

    pub fn required_fields(&self) -> Vec<String> {
        validation::required_fields(&self.input_schema)
    }

    /// Number of declared argument properties.
    pub fn arg_count(&self) -> usize {
        validation::property_count(&self.input_schema)
    }

    /// Cache counters, when caching is enabled.
    pub fn cache_info(&self) -> Option<CacheInfo> {
        self.cache.as_ref().map(|cache| cache.info())
    }

    /// Evict all cached entries.
    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }

    /// The definition handed to the model for function calling.
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.input_schema.clone(),
        }
    }

    /// Validate arguments against the input schema.
    pub fn validate(&self, args: &serde_json::Value) -> Result<()> {
        validation::validate_arguments(args, &self.input_schema).map_err(|message| {
            AgentError::InvalidArguments {
                tool: self.name.clone(),
                message,
            }
        })
    }

    /// The reasoning carried by the arguments, for reasoning variants.
    pub fn reasoning_of(&self, args: &serde_json::Map<String, serde_json::Value>) -> Option<String> {
        if !self.requires_reasoning {
            return None;
        }
        args.get(REASONING_FIELD)
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }

    /// Invoke the tool, returning the result in its native shape.
    ///
    /// Validates the input, strips the reasoning field, consults the
    /// cache, and dispatches to the wrapped handler. Downstream handler
    /// errors propagate unchanged.
    pub fn invoke(&self, input: serde_json::Value) -> Result<ToolInvocation> {
        self.validate(&input)?;

        let input = self.strip_reasoning(input);
        let key = self.cache.as_ref().map(|_| canonical_key(&input));

        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            if let Some(value) = cache.get(key) {
                return Ok(ToolInvocation::Ready(value));
            }
        }

        match &self.handler {
            Handler::Sync(f) => {
                let mut output = f(input)?;
                if let Some(instruction) = &self.instruction {
                    output = apply_instruction(output, instruction);
                }
                if let (Some(cache), Some(key)) = (&self.cache, key) {
                    cache.insert(key, output.clone());
                }
                Ok(ToolInvocation::Ready(output))
            }
            Handler::Async(f) => {
                let future = f(input);
                let cache = self.cache.clone();
                Ok(ToolInvocation::Pending(Box::pin(async move {
                    let output = future.await?;
                    if let (Some(cache), Some(key)) = (cache, key) {
                        cache.insert(key, output.clone());
                    }
                    Ok(output)
                })))
            }
            Handler::Generator(f) => {
                let iter = f(input)?;
                let iter: Box<dyn Iterator<Item = ToolOutput> + Send> =
                    match self.instruction.clone() {
                        Some(instruction) => Box::new(
                            iter.chain(std::iter::once(ToolOutput::from(instruction))),
                        ),
                        None => iter,
                    };
                Ok(ToolInvocation::Values(iter))
            }
            Handler::AsyncGenerator(f) => Ok(ToolInvocation::Stream(f(input)?)),
        }
    }

    /// Invoke and materialize into a single concrete value.
    pub async fn run(&self, input: serde_json::Value) -> Result<ToolOutput> {
        self.invoke(input)?.materialize().await
    }

    fn strip_reasoning(&self, mut input: serde_json::Value) -> serde_json::Value {
        if self.requires_reasoning {
            if let Some(obj) = input.as_object_mut() {
                obj.remove(REASONING_FIELD);
            }
        }
        input
    }
}

fn apply_instruction(output: ToolOutput, instruction: &str) -> ToolOutput {
    match output {
        ToolOutput::Value(serde_json::Value::String(text)) => {
            ToolOutput::Value(serde_json::Value::String(format!("{text}\n{instruction}")))
        }
        ToolOutput::Value(value) => {
            ToolOutput::Value(serde_json::json!([value, instruction]))
        }
        ToolOutput::Message(mut message) => {
            message.append_content(&format!("\n{instruction}"));
            ToolOutput::Message(message)
        }
    }
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("shape", &self.shape())
            .field("hidden", &self.hidden)
            .field("requires_reasoning", &self.requires_reasoning)
            .finish()
    }
}
