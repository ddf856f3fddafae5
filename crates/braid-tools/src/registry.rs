use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use braid_core::error::{BraidError, Result};
use braid_core::traits::Tool;
use braid_core::types::{ToolCallRequest, ToolDefinition};

/// Registry of available tools.
///
/// An explicit instance owned by whoever needs it (an agent, a test);
/// there is no process-global registry.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Fails if a tool with the same name already exists.
    pub fn register(&mut self, tool: impl Tool) -> Result<()> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(BraidError::ToolAlreadyRegistered(name));
        }
        self.tools.insert(name, Arc::new(tool));
        Ok(())
    }

    /// Unregister a tool by name. Returns whether it existed.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.tools.remove(name).is_some()
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Tool>> {
        self.tools
            .get(name)
            .cloned()
            .ok_or_else(|| BraidError::ToolNotFound(name.to_string()))
    }

    /// List all registered tool names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Tool definitions for sending to the LLM, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters(),
            })
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Invoke a tool-call request from the model.
    pub async fn invoke(&self, call: &ToolCallRequest) -> Result<serde_json::Value> {
        let tool = self.get(&call.name)?;
        debug!(tool = %call.name, "Invoking tool");
        tool.execute(call.arguments.clone()).await
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
