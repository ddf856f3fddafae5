use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use braid_core::config::LlmConfig;
use braid_core::error::{BraidError, Result};
use braid_core::traits::ChatClient;
use braid_core::types::{ChatMessage, Role, ToolCallRequest, ToolDefinition};

/// Non-streaming chat client for an Ollama-style `/api/chat` endpoint.
///
/// Sends the full conversation and returns the assistant's reply in one
/// request/response exchange. Works with any endpoint accepting
/// `{model, messages, stream: false, tools}` and answering `{message}`.
pub struct ChatModule {
    endpoint: String,
    model: String,
    http: Client,
    timeout: Duration,
    temperature: Option<f32>,
    seed: Option<i64>,
    strip_thinking: bool,
}

impl ChatModule {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            http: Client::new(),
            timeout: Duration::from_secs(120),
            temperature: None,
            seed: None,
            strip_thinking: false,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        let mut module = Self::new(&config.endpoint, &config.model)
            .with_timeout(Duration::from_secs(config.timeout_secs));
        module.temperature = config.temperature;
        module.seed = config.seed;
        module.strip_thinking = config.strip_thinking;
        module
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the sampling seed.
    pub fn with_seed(mut self, seed: i64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Strip `<think>...</think>` blocks from responses (reasoning models
    /// interleave their chain of thought with the answer).
    pub fn with_strip_thinking(mut self, strip: bool) -> Self {
        self.strip_thinking = strip;
        self
    }

    fn build_request(&self, messages: &[ChatMessage], tools: &[ToolDefinition]) -> WireRequest {
        WireRequest {
            model: self.model.clone(),
            messages: messages.iter().map(WireMessage::from).collect(),
            stream: false,
            tools: tools.iter().map(WireTool::from).collect(),
            temperature: self.temperature,
            seed: self.seed,
        }
    }
}

impl ChatClient for ChatModule {
    fn chat(
        &self,
        messages: Vec<ChatMessage>,
        tools: &[ToolDefinition],
    ) -> BoxFuture<'_, Result<ChatMessage>> {
        let request = self.build_request(&messages, tools);

        Box::pin(async move {
            debug!(
                endpoint = %self.endpoint,
                model = %self.model,
                messages = request.messages.len(),
                "Sending chat request"
            );

            let response = self
                .http
                .post(&self.endpoint)
                .timeout(self.timeout)
                .json(&request)
                .send()
                .await
                .map_err(|e| BraidError::LlmRequest(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(BraidError::LlmRequest(format!(
                    "{}: {}",
                    status,
                    body.trim()
                )));
            }

            let parsed: WireResponse = response
                .json()
                .await
                .map_err(|e| BraidError::LlmParse(e.to_string()))?;

            let mut message = parsed.message.into_chat_message()?;
            if self.strip_thinking {
                message.content = strip_think_blocks(&message.content);
            }
            Ok(message)
        })
    }
}

/// Remove `<think>...</think>` blocks and trim the remainder.
pub fn strip_think_blocks(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut rest = content;
    while let Some(start) = rest.find("<think>") {
        out.push_str(&rest[..start]);
        match rest[start..].find("</think>") {
            Some(end) => rest = &rest[start + end + "</think>".len()..],
            // Unterminated block: drop everything after the opening tag
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out.trim().to_string()
}

// Wire types

#[derive(Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<i64>,
}

#[derive(Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Serialize, Deserialize)]
struct WireToolCall {
    function: WireFunction,
}

#[derive(Serialize, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

#[derive(Serialize)]
struct WireTool {
    r#type: String,
    function: WireToolDef,
}

#[derive(Serialize)]
struct WireToolDef {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Deserialize)]
struct WireResponse {
    message: WireMessage,
}

impl From<&ChatMessage> for WireMessage {
    fn from(msg: &ChatMessage) -> Self {
        let tool_calls = if msg.tool_calls.is_empty() {
            None
        } else {
            Some(
                msg.tool_calls
                    .iter()
                    .map(|c| WireToolCall {
                        function: WireFunction {
                            name: c.name.clone(),
                            arguments: c.arguments.clone(),
                        },
                    })
                    .collect(),
            )
        };
        Self {
            role: match msg.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::Tool => "tool",
            }
            .to_string(),
            content: msg.content.clone(),
            tool_calls,
        }
    }
}

impl WireMessage {
    fn into_chat_message(self) -> Result<ChatMessage> {
        let role = match self.role.as_str() {
            "system" => Role::System,
            "user" => Role::User,
            "assistant" => Role::Assistant,
            "tool" => Role::Tool,
            other => {
                return Err(BraidError::LlmParse(format!(
                    "unexpected message role '{}'",
                    other
                )))
            }
        };
        Ok(ChatMessage {
            role,
            content: self.content,
            tool_calls: self
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(|c| ToolCallRequest {
                    name: c.function.name,
                    arguments: c.function.arguments,
                })
                .collect(),
            tool_name: None,
        })
    }
}

impl From<&ToolDefinition> for WireTool {
    fn from(def: &ToolDefinition) -> Self {
        Self {
            r#type: "function".to_string(),
            function: WireToolDef {
                name: def.name.clone(),
                description: def.description.clone(),
                parameters: def.parameters.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let module = ChatModule::new("http://localhost:11434/api/chat", "llama3.2")
            .with_temperature(0.5)
            .with_seed(7);
        let request = module.build_request(&[ChatMessage::user("hi")], &[]);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], "llama3.2");
        assert_eq!(json["stream"], false);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "hi");
        assert_eq!(json["temperature"], 0.5);
        assert_eq!(json["seed"], 7);
        assert!(json.get("tools").is_none());
    }

    #[test]
    fn test_request_includes_tools() {
        let module = ChatModule::new("http://localhost:11434/api/chat", "llama3.2");
        let tools = vec![ToolDefinition {
            name: "add".into(),
            description: "Add two numbers".into(),
            parameters: serde_json::json!({"type": "object"}),
        }];
        let request = module.build_request(&[ChatMessage::user("2+2?")], &tools);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["tools"][0]["type"], "function");
        assert_eq!(json["tools"][0]["function"]["name"], "add");
    }

    #[test]
    fn test_response_parsing_with_tool_calls() {
        let raw = r#"{
            "model": "llama3.2",
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [
                    {"function": {"name": "add", "arguments": {"a": 2, "b": 3}}}
                ]
            }
        }"#;
        let parsed: WireResponse = serde_json::from_str(raw).unwrap();
        let message = parsed.message.into_chat_message().unwrap();
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.tool_calls.len(), 1);
        assert_eq!(message.tool_calls[0].name, "add");
        assert_eq!(message.tool_calls[0].arguments["b"], 3);
    }

    #[test]
    fn test_response_parsing_rejects_unknown_role() {
        let wire = WireMessage {
            role: "oracle".into(),
            content: "?".into(),
            tool_calls: None,
        };
        assert!(matches!(
            wire.into_chat_message(),
            Err(BraidError::LlmParse(_))
        ));
    }

    #[test]
    fn test_strip_think_blocks() {
        assert_eq!(
            strip_think_blocks("<think>hmm</think>The answer is 4."),
            "The answer is 4."
        );
        assert_eq!(
            strip_think_blocks("a<think>x</think>b<think>y</think>c"),
            "abc"
        );
        assert_eq!(strip_think_blocks("no tags here"), "no tags here");
        assert_eq!(strip_think_blocks("before<think>never closed"), "before");
    }
}
