use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, warn};

use braid_core::error::{BraidError, Result};
use braid_core::traits::{Agent, ChatClient};
use braid_core::types::{AgentInputs, AgentOutputs, ChatMessage, Role};
use braid_tools::ToolRegistry;

/// Agent backed by a deterministic function.
///
/// The workhorse for tests and for workflow nodes that transform data
/// without involving a model.
pub struct FnAgent {
    name: String,
    description: String,
    func: Arc<dyn Fn(AgentInputs) -> Result<AgentOutputs> + Send + Sync>,
}

impl FnAgent {
    pub fn new(
        name: impl Into<String>,
        func: impl Fn(AgentInputs) -> Result<AgentOutputs> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            func: Arc::new(func),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl Agent for FnAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn execute(&self, inputs: AgentInputs) -> BoxFuture<'_, Result<AgentOutputs>> {
        let func = self.func.clone();
        Box::pin(async move { func(inputs) })
    }
}

/// Conversational agent backed by a chat endpoint, with an optional
/// bounded tool-call loop.
///
/// Accepts either a `messages` input (JSON array of chat messages) or a
/// `prompt` input (plain string). When the model requests tool calls and
/// a tool registry is attached, the calls are executed and their results
/// fed back, up to `max_tool_rounds` times.
pub struct LlmChatAgent {
    name: String,
    description: String,
    system_instructions: Option<String>,
    client: Arc<dyn ChatClient>,
    tools: Option<Arc<ToolRegistry>>,
    max_tool_rounds: usize,
}

impl LlmChatAgent {
    pub fn new(name: impl Into<String>, client: Arc<dyn ChatClient>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            system_instructions: None,
            client,
            tools: None,
            max_tool_rounds: 4,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_system_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.system_instructions = Some(instructions.into());
        self
    }

    pub fn with_tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    fn initial_messages(&self, inputs: &AgentInputs) -> Result<Vec<ChatMessage>> {
        let mut messages: Vec<ChatMessage> = if let Some(value) = inputs.get("messages") {
            serde_json::from_value(value.clone()).map_err(|e| BraidError::AgentExecution {
                agent: self.name.clone(),
                message: format!("invalid 'messages' input: {}", e),
            })?
        } else if let Some(prompt) = inputs.get("prompt").and_then(|v| v.as_str()) {
            vec![ChatMessage::user(prompt)]
        } else {
            return Err(BraidError::AgentExecution {
                agent: self.name.clone(),
                message: "expected a 'messages' or 'prompt' input".into(),
            });
        };

        if let Some(instructions) = &self.system_instructions {
            if !matches!(messages.first(), Some(m) if m.role == Role::System) {
                messages.insert(0, ChatMessage::system(instructions.clone()));
            }
        }
        Ok(messages)
    }
}

impl Agent for LlmChatAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn execute(&self, inputs: AgentInputs) -> BoxFuture<'_, Result<AgentOutputs>> {
        Box::pin(async move {
            let mut messages = self.initial_messages(&inputs)?;
            let definitions = self
                .tools
                .as_ref()
                .map(|t| t.definitions())
                .unwrap_or_default();

            let mut round = 0;
            let reply = loop {
                let reply = self.client.chat(messages.clone(), &definitions).await?;

                let registry = match (&self.tools, reply.tool_calls.is_empty()) {
                    (Some(registry), false) if round < self.max_tool_rounds => registry,
                    _ => break reply,
                };

                round += 1;
                debug!(
                    agent = %self.name,
                    round,
                    calls = reply.tool_calls.len(),
                    "Resolving tool calls"
                );
                let calls = reply.tool_calls.clone();
                messages.push(reply);
                for call in &calls {
                    // Feed tool failures back to the model instead of
                    // aborting the conversation
                    let content = match registry.invoke(call).await {
                        Ok(value) => value.to_string(),
                        Err(e) => {
                            warn!(agent = %self.name, tool = %call.name, error = %e, "Tool call failed");
                            serde_json::json!({ "error": e.to_string() }).to_string()
                        }
                    };
                    messages.push(ChatMessage::tool_result(call.name.clone(), content));
                }
            };

            let content = reply.content.clone();
            messages.push(reply);

            let mut outputs = AgentOutputs::new();
            outputs.insert("content".into(), serde_json::json!(content));
            outputs.insert("messages".into(), serde_json::to_value(&messages)?);
            Ok(outputs)
        })
    }
}

/// Single-shot agent that renders a prompt template and returns the
/// model's reply under a `content` output.
///
/// `{key}` placeholders in the template are replaced with the
/// corresponding input values; string values are inserted verbatim,
/// everything else as JSON.
pub struct LlmPromptAgent {
    name: String,
    description: String,
    system_instructions: Option<String>,
    client: Arc<dyn ChatClient>,
    template: String,
}

impl LlmPromptAgent {
    pub fn new(
        name: impl Into<String>,
        client: Arc<dyn ChatClient>,
        template: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            system_instructions: None,
            client,
            template: template.into(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_system_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.system_instructions = Some(instructions.into());
        self
    }

    fn render(&self, inputs: &AgentInputs) -> String {
        let mut prompt = self.template.clone();
        for (key, value) in inputs {
            let placeholder = format!("{{{}}}", key);
            if !prompt.contains(&placeholder) {
                continue;
            }
            let rendered = match value.as_str() {
                Some(s) => s.to_string(),
                None => value.to_string(),
            };
            prompt = prompt.replace(&placeholder, &rendered);
        }
        prompt
    }
}

impl Agent for LlmPromptAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn execute(&self, inputs: AgentInputs) -> BoxFuture<'_, Result<AgentOutputs>> {
        Box::pin(async move {
            let mut messages = Vec::new();
            if let Some(instructions) = &self.system_instructions {
                messages.push(ChatMessage::system(instructions.clone()));
            }
            messages.push(ChatMessage::user(self.render(&inputs)));

            let reply = self.client.chat(messages, &[]).await?;

            let mut outputs = AgentOutputs::new();
            outputs.insert("content".into(), serde_json::json!(reply.content));
            Ok(outputs)
        })
    }
}
