pub mod call;
pub mod llm_agent;
pub mod registry;

pub use call::{call, call_agent, CallPolicy};
pub use llm_agent::{FnAgent, LlmChatAgent, LlmPromptAgent};
pub use registry::AgentRegistry;
