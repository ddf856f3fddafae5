use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use braid_agent::call::{call, CallPolicy};
use braid_core::error::{BraidError, Result};
use braid_core::types::AgentOutputs;

use crate::node::AgentNode;
use crate::tracker::{ProgressSnapshot, ProgressTracker};

/// Workflow-level inputs for one execution.
///
/// Keys are either `<node>.<input>` (applies to that node only) or a bare
/// input name (applies to every node accepting it). They satisfy formals
/// that are not bound to another node's output.
pub type WorkflowInputs = HashMap<String, serde_json::Value>;

/// DFS visit state for cycle detection.
#[derive(Clone, Copy, PartialEq)]
enum Color {
    White,
    Grey,
    Black,
}

/// Terminal state of one node after a run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum NodeState {
    Succeeded { outputs: AgentOutputs },
    Failed { error: String },
    Skipped { blocked_on: String },
}

/// One node's entry in the execution report.
#[derive(Debug, Clone, Serialize)]
pub struct NodeOutcome {
    pub node: String,
    #[serde(flatten)]
    pub state: NodeState,
}

/// Complete per-node report of one workflow run.
///
/// Covers every node in the graph — an output, a failure detail, or a
/// skipped marker — in completion order.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub workflow: String,
    pub run_id: Uuid,
    pub outcomes: Vec<NodeOutcome>,
    pub progress: ProgressSnapshot,
    pub elapsed_ms: u64,
}

impl ExecutionReport {
    /// Look up a node's terminal state.
    pub fn state(&self, node: &str) -> Option<&NodeState> {
        self.outcomes
            .iter()
            .find(|o| o.node == node)
            .map(|o| &o.state)
    }

    /// A node's outputs, if it succeeded.
    pub fn outputs(&self, node: &str) -> Option<&AgentOutputs> {
        match self.state(node) {
            Some(NodeState::Succeeded { outputs }) => Some(outputs),
            _ => None,
        }
    }

    /// Whether every node succeeded.
    pub fn succeeded(&self) -> bool {
        self.outcomes
            .iter()
            .all(|o| matches!(o.state, NodeState::Succeeded { .. }))
    }

    /// Node names in completion order.
    pub fn completion_order(&self) -> Vec<&str> {
        self.outcomes.iter().map(|o| o.node.as_str()).collect()
    }
}

/// A named dependency graph of [`AgentNode`]s.
///
/// Nodes are kept in insertion order, which is the deterministic
/// tie-break for execution ordering. The graph must be acyclic and
/// referentially complete; [`validate`](Self::validate) checks both and
/// is invoked implicitly by [`execute`](Self::execute) when needed.
///
/// Execution is sequential: nodes run one at a time in topological
/// order. Running independent branches concurrently is a deliberate
/// extension point, not part of this executor.
pub struct WorkflowGraph {
    name: String,
    nodes: Vec<AgentNode>,
    index: HashMap<String, usize>,
    policy: CallPolicy,
    validated: bool,
}

impl WorkflowGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            index: HashMap::new(),
            policy: CallPolicy::default(),
            validated: false,
        }
    }

    /// Set the retry/fallback policy applied to every node call.
    pub fn with_policy(mut self, policy: CallPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &AgentNode> {
        self.nodes.iter()
    }

    /// Get a node by name.
    pub fn node(&self, name: &str) -> Result<&AgentNode> {
        self.index
            .get(name)
            .map(|&i| &self.nodes[i])
            .ok_or_else(|| BraidError::UnknownNode(name.to_string()))
    }

    /// Add a node. Node names are unique within a graph.
    pub fn add_node(&mut self, node: AgentNode) -> Result<()> {
        if self.index.contains_key(node.name()) {
            return Err(BraidError::DuplicateNode(node.name().to_string()));
        }
        self.index.insert(node.name().to_string(), self.nodes.len());
        self.nodes.push(node);
        self.validated = false;
        Ok(())
    }

    /// Check referential integrity and acyclicity of the dependency
    /// relation. Must pass before the graph can execute.
    pub fn validate(&mut self) -> Result<()> {
        for node in &self.nodes {
            for dep in node.resolved_dependencies() {
                if !self.index.contains_key(&dep) {
                    return Err(BraidError::MissingDependency {
                        node: node.name().to_string(),
                        dependency: dep,
                    });
                }
            }
        }

        self.check_acyclic()?;
        self.validated = true;
        debug!(workflow = %self.name, nodes = self.nodes.len(), "Workflow validated");
        Ok(())
    }

    /// Depth-first cycle check over the dependency relation.
    fn check_acyclic(&self) -> Result<()> {
        let mut color = vec![Color::White; self.nodes.len()];
        let mut path: Vec<usize> = Vec::new();

        for start in 0..self.nodes.len() {
            if color[start] == Color::White {
                self.visit(start, &mut color, &mut path)?;
            }
        }
        Ok(())
    }

    fn visit(&self, node: usize, color: &mut [Color], path: &mut Vec<usize>) -> Result<()> {
        color[node] = Color::Grey;
        path.push(node);

        for dep in self.dep_indices(node) {
            match color[dep] {
                Color::Grey => {
                    return Err(BraidError::CyclicDependency(self.cycle_path(path, dep)));
                }
                Color::White => self.visit(dep, color, path)?,
                Color::Black => {}
            }
        }

        path.pop();
        color[node] = Color::Black;
        Ok(())
    }

    fn dep_indices(&self, node: usize) -> Vec<usize> {
        self.nodes[node]
            .resolved_dependencies()
            .iter()
            .filter_map(|dep| self.index.get(dep).copied())
            .collect()
    }

    fn cycle_path(&self, path: &[usize], repeated: usize) -> String {
        let mut names: Vec<&str> = path
            .iter()
            .map(|&i| self.nodes[i].name())
            .skip_while(|&name| name != self.nodes[repeated].name())
            .collect();
        names.push(self.nodes[repeated].name());
        names.join(" -> ")
    }

    /// Topological execution order, ties broken by insertion order.
    ///
    /// Assumes a validated graph; quadratic scan is fine at workflow
    /// sizes.
    pub fn execution_order(&self) -> Vec<String> {
        let mut placed: BTreeSet<String> = BTreeSet::new();
        let mut order: Vec<String> = Vec::with_capacity(self.nodes.len());

        while order.len() < self.nodes.len() {
            let before = order.len();
            for node in &self.nodes {
                if placed.contains(node.name()) {
                    continue;
                }
                if node
                    .resolved_dependencies()
                    .iter()
                    .all(|dep| placed.contains(dep))
                {
                    placed.insert(node.name().to_string());
                    order.push(node.name().to_string());
                    break;
                }
            }
            // No eligible node: unvalidated cyclic graph, stop scanning
            if order.len() == before {
                break;
            }
        }
        order
    }

    /// Execute the workflow.
    ///
    /// Validates first if needed; validation errors abort the run before
    /// any node executes. Per-node failures never do: the failing node is
    /// marked failed, its transitive dependents are skipped, independent
    /// branches keep running, and the returned report covers every node.
    pub async fn execute(&mut self, inputs: &WorkflowInputs) -> Result<ExecutionReport> {
        if !self.validated {
            self.validate()?;
        }
        let order = self.execution_order();

        let run_id = Uuid::new_v4();
        let started = Instant::now();
        info!(workflow = %self.name, %run_id, nodes = order.len(), "Executing workflow");

        for node in &mut self.nodes {
            node.clear_output();
        }

        let mut tracker = ProgressTracker::new(order.iter().cloned());
        tracker.start();

        let mut completed: HashMap<String, AgentOutputs> = HashMap::new();
        // node name -> root failed ancestor, for skip propagation
        let mut dead: HashMap<String, String> = HashMap::new();
        let mut outcomes: Vec<NodeOutcome> = Vec::with_capacity(order.len());

        for name in &order {
            let idx = self.index[name];
            let node = &self.nodes[idx];

            let blocked_on = node
                .resolved_dependencies()
                .iter()
                .find_map(|dep| dead.get(dep).cloned());
            if let Some(blocked_on) = blocked_on {
                warn!(workflow = %self.name, node = %name, blocked_on = %blocked_on, "Skipping node");
                tracker.mark_skipped(name, &blocked_on)?;
                dead.insert(name.clone(), blocked_on.clone());
                outcomes.push(NodeOutcome {
                    node: name.clone(),
                    state: NodeState::Skipped { blocked_on },
                });
                continue;
            }

            tracker.mark_started(name)?;

            let result = match node.resolve_inputs(&completed, inputs) {
                Ok(resolved) => {
                    let agent = node.agent().clone();
                    let fallback = node.fallback().cloned();
                    call(
                        agent.as_ref(),
                        &resolved,
                        &self.policy,
                        fallback.as_deref(),
                    )
                    .await
                }
                Err(e) => Err(e),
            };

            match result {
                Ok(outputs) => {
                    debug!(workflow = %self.name, node = %name, "Node succeeded");
                    tracker.mark_succeeded(name)?;
                    completed.insert(name.clone(), outputs.clone());
                    self.nodes[idx].set_output(outputs.clone());
                    outcomes.push(NodeOutcome {
                        node: name.clone(),
                        state: NodeState::Succeeded { outputs },
                    });
                }
                Err(e) => {
                    error!(workflow = %self.name, node = %name, error = %e, "Node failed");
                    tracker.mark_failed(name, &e)?;
                    dead.insert(name.clone(), name.clone());
                    outcomes.push(NodeOutcome {
                        node: name.clone(),
                        state: NodeState::Failed {
                            error: e.to_string(),
                        },
                    });
                }
            }
        }

        let report = ExecutionReport {
            workflow: self.name.clone(),
            run_id,
            outcomes,
            progress: tracker.snapshot(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            workflow = %self.name,
            %run_id,
            succeeded = report.succeeded(),
            elapsed_ms = report.elapsed_ms,
            "Workflow run complete"
        );
        Ok(report)
    }
}
