use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BraidError, Result};

/// Top-level workflow configuration, loaded from a TOML file.
///
/// Declares the LLM endpoint, the call policy, and the workflow's nodes.
/// Node prompts are templates; `{key}` placeholders are filled from the
/// node's resolved inputs at execution time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub workflow: WorkflowMeta,
    pub llm: LlmConfig,
    #[serde(default)]
    pub call: CallConfig,
    #[serde(default, rename = "node")]
    pub nodes: Vec<NodeConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowMeta {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// LLM endpoint configuration (Ollama-style chat API).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    pub model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub seed: Option<i64>,
    /// Strip `<think>...</think>` blocks from responses (reasoning models).
    #[serde(default)]
    pub strip_thinking: bool,
}

fn default_endpoint() -> String {
    "http://localhost:11434/api/chat".to_string()
}
fn default_timeout_secs() -> u64 {
    120
}

/// Retry/backoff policy for agent calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff_secs")]
    pub retry_backoff_secs: f64,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_backoff_secs: default_retry_backoff_secs(),
        }
    }
}

fn default_max_retries() -> u32 {
    1
}
fn default_retry_backoff_secs() -> f64 {
    0.5
}

/// One workflow node declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub name: String,
    /// Prompt template; `{key}` placeholders are filled from resolved inputs.
    pub prompt: String,
    #[serde(default)]
    pub system: Option<String>,
    /// Input bindings: formal input name -> `<node>.<output-key>` reference.
    #[serde(default)]
    pub inputs: HashMap<String, String>,
    /// Ordering-only dependencies with no data edge.
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl WorkflowConfig {
    /// Load a workflow configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(BraidError::ConfigNotFound(path.display().to_string()));
        }
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| BraidError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let toml_content = r#"
[workflow]
name = "summarize"

[llm]
model = "llama3.2"
"#;
        let config: WorkflowConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.workflow.name, "summarize");
        assert_eq!(config.llm.endpoint, "http://localhost:11434/api/chat");
        assert_eq!(config.llm.timeout_secs, 120);
        assert_eq!(config.call.max_retries, 1);
        assert_eq!(config.call.retry_backoff_secs, 0.5);
        assert!(config.nodes.is_empty());
    }

    #[test]
    fn test_parse_nodes_and_bindings() {
        let toml_content = r#"
[workflow]
name = "report"

[llm]
model = "llama3.2"

[call]
max_retries = 3
retry_backoff_secs = 0.1

[[node]]
name = "Research"
prompt = "Research the topic: {topic}"

[[node]]
name = "Write"
prompt = "Write an article from: {findings}"
depends_on = ["Research"]

[node.inputs]
findings = "Research.content"
"#;
        let config: WorkflowConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.nodes.len(), 2);
        assert_eq!(config.call.max_retries, 3);
        let write = &config.nodes[1];
        assert_eq!(write.name, "Write");
        assert_eq!(write.depends_on, vec!["Research"]);
        assert_eq!(write.inputs.get("findings").unwrap(), "Research.content");
    }

    #[test]
    fn test_load_missing_file() {
        let err = WorkflowConfig::load(Path::new("/nonexistent/braid.toml")).unwrap_err();
        assert!(matches!(err, BraidError::ConfigNotFound(_)));
    }
}
