//! Declarative prompt fragments with required variables.

use std::collections::BTreeMap;

use tera::{Context, Tera};

use crate::error::{AgentError, Result};

/// Default prompt driving the act phase.
pub const DEFAULT_ACTION_TEMPLATE: &str = "\
You are {{ agent_name }}, an assistant that completes the user's task step by step.
Call the available tools when they help. When you have everything you need,
call the `provide_final_answer` tool with your answer, or reply directly.

Task: {{ task }}

Available tools:
{{ tools }}

Conversation so far:
{{ chat_history }}";

/// Default prompt for the first planning pass.
pub const DEFAULT_INIT_PLAN_TEMPLATE: &str = "\
Break the task below into a short ordered list of steps, using the available
tools where they help.

Task: {{ task }}

Available tools:
{{ tools }}";

/// Default prompt for planning passes after the first.
pub const DEFAULT_UPDATE_PLAN_TEMPLATE: &str = "\
Revise the remaining plan for the task below, given what has already
happened. You have {{ remaining_steps }} iterations left.

Task: {{ task }}

Plan so far:
{{ steps }}

Conversation so far:
{{ chat_history }}";

/// Default prompt for the fallback path when the iteration budget runs out.
pub const DEFAULT_FALLBACK_TEMPLATE: &str = "\
You could not finish within the allotted iterations. Based on the
conversation so far, give your best final answer to the task. Do not call
any tools.

Task: {{ task }}

Conversation so far:
{{ chat_history }}";

/// A named prompt fragment with declared required variables.
///
/// Rendering with a variable map missing a required name is a
/// configuration error; tera reports any further unresolved placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    name: String,
    template: String,
    required: Vec<String>,
}

impl PromptTemplate {
    pub fn new(
        name: impl Into<String>,
        template: impl Into<String>,
        required: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            template: template.into(),
            required: required.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn required_variables(&self) -> &[String] {
        &self.required
    }

    /// Render the template against the variable map.
    pub fn render(&self, variables: &BTreeMap<String, String>) -> Result<String> {
        for required in &self.required {
            if !variables.contains_key(required) {
                return Err(AgentError::Configuration(format!(
                    "prompt template '{}' missing required variable '{required}'",
                    self.name
                )));
            }
        }

        let mut tera = Tera::default();
        tera.add_raw_template(&self.name, &self.template)?;
        let context = Context::from_serialize(variables)?;
        Ok(tera.render(&self.name, &context)?)
    }
}

/// The prompt fragments the agent core renders over one run.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptSet {
    pub action: PromptTemplate,
    pub init_plan: PromptTemplate,
    pub update_plan: PromptTemplate,
    pub fallback: PromptTemplate,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            action: PromptTemplate::new("action", DEFAULT_ACTION_TEMPLATE, &["task", "tools"]),
            init_plan: PromptTemplate::new(
                "init_plan",
                DEFAULT_INIT_PLAN_TEMPLATE,
                &["task", "tools"],
            ),
            update_plan: PromptTemplate::new(
                "update_plan",
                DEFAULT_UPDATE_PLAN_TEMPLATE,
                &["task", "steps", "remaining_steps"],
            ),
            fallback: PromptTemplate::new("fallback", DEFAULT_FALLBACK_TEMPLATE, &["task"]),
        }
    }
}

impl PromptSet {
    /// Replace the action template, keeping its required variables.
    pub fn with_action_template(mut self, template: impl Into<String>) -> Self {
        self.action = PromptTemplate::new("action", template, &["task", "tools"]);
        self
    }
}
