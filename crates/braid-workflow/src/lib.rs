//! Dependency-graph workflow execution.
//!
//! A workflow is a named set of [`AgentNode`]s. Each node binds its agent's
//! inputs to literals or to other nodes' outputs; the bindings (plus any
//! explicit ordering dependencies) form a DAG. [`WorkflowGraph::execute`]
//! validates the graph, runs nodes in a deterministic topological order,
//! propagates outputs into dependents' inputs, and reports every node's
//! outcome. A [`ProgressTracker`] records status transitions as a side
//! channel for observers.

pub mod graph;
pub mod node;
pub mod tracker;
pub mod viz;

pub use graph::{ExecutionReport, NodeOutcome, NodeState, WorkflowGraph, WorkflowInputs};
pub use node::{AgentNode, Binding};
pub use tracker::{NodeProgress, NodeStatus, ProgressSnapshot, ProgressTracker};
pub use viz::to_dot;
