use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use braid_core::error::{BraidError, Result};

/// Lifecycle status of a workflow node.
///
/// `Pending -> Running -> {Succeeded, Failed}` and `Pending -> Skipped`
/// are the only legal transitions; terminal states cannot be left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl NodeStatus {
    fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Skipped)
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Status and timing of a single node.
#[derive(Debug, Clone, Serialize)]
pub struct NodeProgress {
    pub status: NodeStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Failed ancestor this node was skipped for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_on: Option<String>,
}

impl NodeProgress {
    fn pending() -> Self {
        Self {
            status: NodeStatus::Pending,
            started_at: None,
            ended_at: None,
            error: None,
            blocked_on: None,
        }
    }
}

/// Records per-node status transitions and timing for one execution run.
///
/// Mutated only by the executing [`WorkflowGraph`](crate::WorkflowGraph);
/// observers read cloned [`ProgressSnapshot`]s.
#[derive(Debug)]
pub struct ProgressTracker {
    nodes: BTreeMap<String, NodeProgress>,
    started_at: Option<DateTime<Utc>>,
}

impl ProgressTracker {
    pub fn new(node_names: impl IntoIterator<Item = String>) -> Self {
        Self {
            nodes: node_names
                .into_iter()
                .map(|name| (name, NodeProgress::pending()))
                .collect(),
            started_at: None,
        }
    }

    /// Mark the start of the workflow run.
    pub fn start(&mut self) {
        self.started_at = Some(Utc::now());
    }

    fn transition(&mut self, name: &str, from: NodeStatus, to: NodeStatus) -> Result<&mut NodeProgress> {
        let progress = self
            .nodes
            .get_mut(name)
            .ok_or_else(|| BraidError::UnknownNode(name.to_string()))?;
        if progress.status != from {
            return Err(BraidError::InvalidTransition {
                node: name.to_string(),
                from: progress.status.to_string(),
                to: to.to_string(),
            });
        }
        progress.status = to;
        Ok(progress)
    }

    pub fn mark_started(&mut self, name: &str) -> Result<()> {
        let progress = self.transition(name, NodeStatus::Pending, NodeStatus::Running)?;
        progress.started_at = Some(Utc::now());
        Ok(())
    }

    pub fn mark_succeeded(&mut self, name: &str) -> Result<()> {
        let progress = self.transition(name, NodeStatus::Running, NodeStatus::Succeeded)?;
        progress.ended_at = Some(Utc::now());
        Ok(())
    }

    pub fn mark_failed(&mut self, name: &str, error: &BraidError) -> Result<()> {
        let message = error.to_string();
        let progress = self.transition(name, NodeStatus::Running, NodeStatus::Failed)?;
        progress.ended_at = Some(Utc::now());
        progress.error = Some(message);
        Ok(())
    }

    pub fn mark_skipped(&mut self, name: &str, blocked_on: &str) -> Result<()> {
        let progress = self.transition(name, NodeStatus::Pending, NodeStatus::Skipped)?;
        progress.ended_at = Some(Utc::now());
        progress.blocked_on = Some(blocked_on.to_string());
        Ok(())
    }

    pub fn status(&self, name: &str) -> Option<NodeStatus> {
        self.nodes.get(name).map(|p| p.status)
    }

    /// Immutable view of the current run state.
    pub fn snapshot(&self) -> ProgressSnapshot {
        let total = self.nodes.len();
        let done = self
            .nodes
            .values()
            .filter(|p| p.status.is_terminal())
            .count();
        let progress_percentage = if total == 0 {
            0.0
        } else {
            done as f64 / total as f64 * 100.0
        };
        ProgressSnapshot {
            nodes: self.nodes.clone(),
            started_at: self.started_at,
            progress_percentage,
            elapsed_secs: self
                .started_at
                .map(|t| (Utc::now() - t).num_milliseconds() as f64 / 1000.0),
        }
    }
}

/// Point-in-time view of a run's progress.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressSnapshot {
    pub nodes: BTreeMap<String, NodeProgress>,
    pub started_at: Option<DateTime<Utc>>,
    pub progress_percentage: f64,
    pub elapsed_secs: Option<f64>,
}

impl ProgressSnapshot {
    pub fn status(&self, name: &str) -> Option<NodeStatus> {
        self.nodes.get(name).map(|p| p.status)
    }
}
