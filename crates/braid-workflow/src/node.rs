use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use braid_core::error::{BraidError, Result};
use braid_core::traits::Agent;
use braid_core::types::{AgentInputs, AgentOutputs};

use crate::graph::WorkflowInputs;

/// Source of one agent input.
#[derive(Debug, Clone)]
pub enum Binding {
    /// A literal value passed through unchanged.
    Literal(serde_json::Value),
    /// A reference to another node's output key.
    Output { node: String, key: String },
}

impl Binding {
    pub fn literal(value: impl Into<serde_json::Value>) -> Self {
        Self::Literal(value.into())
    }

    pub fn output(node: impl Into<String>, key: impl Into<String>) -> Self {
        Self::Output {
            node: node.into(),
            key: key.into(),
        }
    }

    /// Parse a `<node>.<output-key>` reference.
    pub fn parse(source: &str) -> Result<Self> {
        match source.split_once('.') {
            Some((node, key)) if !node.is_empty() && !key.is_empty() => {
                Ok(Self::output(node, key))
            }
            _ => Err(BraidError::Config(format!(
                "binding '{}' must have the form '<node>.<output-key>'",
                source
            ))),
        }
    }

    /// The node this binding references, if any.
    pub fn referenced_node(&self) -> Option<&str> {
        match self {
            Self::Literal(_) => None,
            Self::Output { node, .. } => Some(node),
        }
    }
}

/// A named node in a workflow graph: one agent plus its input bindings.
///
/// Dependencies are derived from output bindings and from explicit
/// ordering dependencies. The node's output is written once per run and
/// immutable afterwards.
pub struct AgentNode {
    name: String,
    agent: Arc<dyn Agent>,
    bindings: BTreeMap<String, Binding>,
    explicit_deps: Vec<String>,
    fallback: Option<Arc<dyn Agent>>,
    output: Option<AgentOutputs>,
}

impl AgentNode {
    pub fn new(name: impl Into<String>, agent: Arc<dyn Agent>) -> Self {
        Self {
            name: name.into(),
            agent,
            bindings: BTreeMap::new(),
            explicit_deps: Vec::new(),
            fallback: None,
            output: None,
        }
    }

    /// Bind a formal input to a source.
    pub fn bind(mut self, input: impl Into<String>, binding: Binding) -> Self {
        self.bindings.insert(input.into(), binding);
        self
    }

    /// Bind a formal input to a literal value.
    pub fn bind_literal(self, input: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.bind(input, Binding::literal(value))
    }

    /// Bind a formal input to another node's output key.
    pub fn bind_output(
        self,
        input: impl Into<String>,
        node: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        self.bind(input, Binding::output(node, key))
    }

    /// Add an ordering-only dependency with no data edge.
    pub fn with_dependency(mut self, node: impl Into<String>) -> Self {
        self.explicit_deps.push(node.into());
        self
    }

    /// Agent to invoke when the primary agent's retries are exhausted.
    pub fn with_fallback(mut self, agent: Arc<dyn Agent>) -> Self {
        self.fallback = Some(agent);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn agent(&self) -> &Arc<dyn Agent> {
        &self.agent
    }

    pub fn fallback(&self) -> Option<&Arc<dyn Agent>> {
        self.fallback.as_ref()
    }

    pub fn bindings(&self) -> &BTreeMap<String, Binding> {
        &self.bindings
    }

    /// Node names this node depends on: every node referenced by an
    /// output binding, plus explicit dependencies. Pure derivation.
    pub fn resolved_dependencies(&self) -> BTreeSet<String> {
        let mut deps: BTreeSet<String> = self
            .bindings
            .values()
            .filter_map(|b| b.referenced_node().map(String::from))
            .collect();
        deps.extend(self.explicit_deps.iter().cloned());
        deps
    }

    /// Resolve this node's inputs from completed node outputs and the
    /// workflow-level inputs.
    ///
    /// Bound inputs win; workflow inputs fill the gaps, with targeted
    /// `<node>.<input>` entries taking precedence over bare names.
    pub(crate) fn resolve_inputs(
        &self,
        completed: &HashMap<String, AgentOutputs>,
        workflow_inputs: &WorkflowInputs,
    ) -> Result<AgentInputs> {
        let mut resolved = AgentInputs::new();

        for (input, binding) in &self.bindings {
            let value = match binding {
                Binding::Literal(value) => value.clone(),
                Binding::Output { node, key } => {
                    let outputs = completed
                        .get(node)
                        .ok_or_else(|| BraidError::OutputNotReady(node.clone()))?;
                    outputs
                        .get(key)
                        .cloned()
                        .ok_or_else(|| BraidError::InputResolution {
                            node: self.name.clone(),
                            input: input.clone(),
                            origin: format!("{}.{}", node, key),
                        })?
                }
            };
            resolved.insert(input.clone(), value);
        }

        let prefix = format!("{}.", self.name);
        for (key, value) in workflow_inputs {
            if let Some(input) = key.strip_prefix(&prefix) {
                if !resolved.contains_key(input) {
                    resolved.insert(input.to_string(), value.clone());
                }
            }
        }
        for (key, value) in workflow_inputs {
            if !key.contains('.') && !resolved.contains_key(key) {
                resolved.insert(key.clone(), value.clone());
            }
        }

        Ok(resolved)
    }

    /// Execute the bound agent with already-resolved inputs.
    ///
    /// No retry here — retry and fallback are the graph's responsibility
    /// through the call wrapper.
    pub async fn run(&self, inputs: AgentInputs) -> Result<AgentOutputs> {
        self.agent.execute(inputs).await
    }

    /// The node's output from the current run.
    pub fn output(&self) -> Result<&AgentOutputs> {
        self.output
            .as_ref()
            .ok_or_else(|| BraidError::OutputNotReady(self.name.clone()))
    }

    pub(crate) fn set_output(&mut self, outputs: AgentOutputs) {
        self.output = Some(outputs);
    }

    pub(crate) fn clear_output(&mut self) {
        self.output = None;
    }
}

impl std::fmt::Debug for AgentNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentNode")
            .field("name", &self.name)
            .field("agent", &self.agent.name())
            .field("dependencies", &self.resolved_dependencies())
            .finish()
    }
}
