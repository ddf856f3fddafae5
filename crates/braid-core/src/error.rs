use thiserror::Error;

#[derive(Debug, Error)]
pub enum BraidError {
    // Graph construction / validation errors
    #[error("node '{0}' already exists in the workflow")]
    DuplicateNode(String),

    #[error("dependency '{dependency}' for node '{node}' does not exist in the workflow")]
    MissingDependency { node: String, dependency: String },

    #[error("circular dependency detected: {0}")]
    CyclicDependency(String),

    #[error("node '{0}' is not part of the workflow")]
    UnknownNode(String),

    // Execution errors
    #[error("output of node '{0}' has not been produced yet")]
    OutputNotReady(String),

    #[error("input '{input}' of node '{node}' cannot be resolved from '{origin}'")]
    InputResolution {
        node: String,
        input: String,
        origin: String,
    },

    // Call wrapper errors
    #[error("invalid call configuration: {0}")]
    InvalidConfiguration(String),

    #[error("call to '{target}' exhausted after {attempts} attempts: {source}")]
    CallExhausted {
        target: String,
        attempts: u32,
        #[source]
        source: Box<BraidError>,
    },

    // Progress tracker errors
    #[error("invalid status transition for node '{node}': {from} -> {to}")]
    InvalidTransition {
        node: String,
        from: String,
        to: String,
    },

    // Registry errors
    #[error("agent '{0}' is not registered")]
    AgentNotRegistered(String),

    #[error("agent '{0}' is already registered")]
    AgentAlreadyRegistered(String),

    #[error("tool '{0}' is not registered")]
    ToolNotFound(String),

    #[error("tool '{0}' is already registered")]
    ToolAlreadyRegistered(String),

    // Agent / tool execution errors
    #[error("agent '{agent}' failed: {message}")]
    AgentExecution { agent: String, message: String },

    #[error("tool '{tool}' failed: {message}")]
    ToolExecution { tool: String, message: String },

    // LLM errors
    #[error("LLM request failed: {0}")]
    LlmRequest(String),

    #[error("LLM response parse error: {0}")]
    LlmParse(String),

    // Config errors
    #[error("config error: {0}")]
    Config(String),

    #[error("config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BraidError>;
