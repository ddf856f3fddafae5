use futures::future::BoxFuture;

use crate::error::Result;
use crate::types::{AgentInputs, AgentOutputs, ChatMessage, ToolDefinition};

/// A unit of work exposing an `execute(inputs) -> outputs` contract,
/// typically backed by an LLM call or a deterministic function.
pub trait Agent: Send + Sync + 'static {
    /// Unique agent name. Dotted names form groups (e.g. "sales.Loader").
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str {
        ""
    }

    /// Execute the agent with the given named inputs.
    fn execute(&self, inputs: AgentInputs) -> BoxFuture<'_, Result<AgentOutputs>>;

    /// Metadata listing for coordination-style agent selection.
    fn metadata(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name(),
            "description": self.description(),
        })
    }
}

/// Tool — extensible callable exposed to LLM-backed agents.
pub trait Tool: Send + Sync + 'static {
    /// Tool name (used in LLM tool calls).
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// JSON Schema for tool arguments.
    fn parameters(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    fn execute(&self, args: serde_json::Value) -> BoxFuture<'_, Result<serde_json::Value>>;
}

/// Chat client — one request/response exchange with an LLM endpoint.
pub trait ChatClient: Send + Sync + 'static {
    /// Send the conversation and receive the assistant's reply.
    fn chat(
        &self,
        messages: Vec<ChatMessage>,
        tools: &[ToolDefinition],
    ) -> BoxFuture<'_, Result<ChatMessage>>;
}
