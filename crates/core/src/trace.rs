// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Trace tree: the externally observable progress of a run.
//!
//! The tree is built by folding [`AgentEvent`]s in emission order. Node ids
//! encode their path (`root-iter2-screenshot-desktop`), so a late event can
//! find its parent by stripping the final id segment.

use crate::event::{AgentEvent, AgentEventKind, ArtifactRef};
use crate::id::TraceNodeId;
use crate::score::Dimension;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of step a trace node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Run,
    Iteration,
    Codegen,
    Preview,
    Screenshot,
    Overflow,
    Score,
    Decision,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepKind::Run => "run",
            StepKind::Iteration => "iteration",
            StepKind::Codegen => "codegen",
            StepKind::Preview => "preview",
            StepKind::Screenshot => "screenshot",
            StepKind::Overflow => "overflow",
            StepKind::Score => "score",
            StepKind::Decision => "decision",
        };
        write!(f, "{s}")
    }
}

/// Lifecycle status of a trace node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Pending,
    Running,
    Success,
    Error,
}

/// One node of the trace tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceNode {
    pub id: TraceNodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<TraceNodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<StepKind>,
    pub title: String,
    pub status: NodeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_best: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_area: Option<Dimension>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<ArtifactRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TraceNode>,
}

impl TraceNode {
    fn new(id: TraceNodeId, parent_id: Option<TraceNodeId>) -> Self {
        Self {
            id,
            parent_id,
            step: None,
            title: String::new(),
            status: NodeStatus::Pending,
            started_at_ms: None,
            finished_at_ms: None,
            message: None,
            score: None,
            decision: None,
            is_best: false,
            focus_area: None,
            artifacts: Vec::new(),
            children: Vec::new(),
        }
    }

    fn find(&self, id: &TraceNodeId) -> Option<&TraceNode> {
        if &self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }

    fn find_mut(&mut self, id: &TraceNodeId) -> Option<&mut TraceNode> {
        if &self.id == id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(id))
    }

    fn clear_best(&mut self) {
        self.is_best = false;
        for c in &mut self.children {
            c.clear_best();
        }
    }
}

/// A run's trace tree, built by folding events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceTree {
    root: TraceNode,
}

impl TraceTree {
    pub fn new(title: impl Into<String>) -> Self {
        let mut root = TraceNode::new(TraceNodeId::root(), None);
        root.step = Some(StepKind::Run);
        root.title = title.into();
        root.status = NodeStatus::Running;
        Self { root }
    }

    pub fn root(&self) -> &TraceNode {
        &self.root
    }

    pub fn find(&self, id: &TraceNodeId) -> Option<&TraceNode> {
        self.root.find(id)
    }

    /// Fold one event into the tree.
    ///
    /// Unknown node ids are created for `nodeCreated`/`nodeStarted` under the
    /// parent implied by the id; other event kinds for unknown ids are
    /// dropped.
    pub fn apply(&mut self, event: &AgentEvent) {
        if self.root.find(&event.node_id).is_none() {
            if !matches!(
                event.kind,
                AgentEventKind::NodeCreated | AgentEventKind::NodeStarted
            ) {
                return;
            }
            self.insert(&event.node_id);
        }

        // isBest migrates: clearing before re-marking keeps it on one node.
        if event.payload.is_best == Some(true) {
            self.root.clear_best();
        }

        let ts_ms = event.ts.timestamp_millis().max(0) as u64;
        let Some(node) = self.root.find_mut(&event.node_id) else {
            return;
        };

        if let Some(step) = event.payload.step_key {
            node.step = Some(step);
        }

        match event.kind {
            AgentEventKind::NodeCreated => {
                if let Some(title) = &event.payload.title {
                    node.title = title.clone();
                }
                if let Some(status) = event.payload.status {
                    node.status = status;
                }
            }
            AgentEventKind::NodeStarted => {
                node.status = NodeStatus::Running;
                node.started_at_ms = Some(ts_ms);
                if let Some(title) = &event.payload.title {
                    node.title = title.clone();
                }
            }
            AgentEventKind::NodeProgress => {
                if let Some(message) = &event.payload.message {
                    node.message = Some(message.clone());
                }
                if let Some(focus) = event.payload.focus_area {
                    node.focus_area = Some(focus);
                }
            }
            AgentEventKind::NodeFinished => {
                node.status = event.payload.status.unwrap_or(NodeStatus::Success);
                node.finished_at_ms = Some(ts_ms);
                if let Some(message) = &event.payload.message {
                    node.message = Some(message.clone());
                }
                if let Some(score) = event.payload.score {
                    node.score = Some(score);
                }
                if let Some(decision) = &event.payload.decision {
                    node.decision = Some(decision.clone());
                }
                if let Some(best) = event.payload.is_best {
                    node.is_best = best;
                }
            }
            AgentEventKind::NodeFailed => {
                node.status = NodeStatus::Error;
                node.finished_at_ms = Some(ts_ms);
                if let Some(message) = &event.payload.message {
                    node.message = Some(message.clone());
                }
            }
            AgentEventKind::ArtifactAdded => {
                if let Some(artifact) = &event.payload.artifact {
                    node.artifacts.push(artifact.clone());
                }
            }
        }
    }

    /// Index of the iteration currently flagged best, if any.
    pub fn best_iteration_index(&self) -> Option<u32> {
        self.root
            .children
            .iter()
            .find(|c| c.is_best)
            .and_then(|c| iteration_index(&c.id))
    }

    fn insert(&mut self, id: &TraceNodeId) {
        let parent_id = id
            .parent()
            .filter(|p| self.root.find(p).is_some())
            .unwrap_or_else(TraceNodeId::root);
        let node = TraceNode::new(id.clone(), Some(parent_id.clone()));
        if let Some(parent) = self.root.find_mut(&parent_id) {
            parent.children.push(node);
        }
    }
}

/// Parse the iteration index out of an `iter<n>` id segment.
fn iteration_index(id: &TraceNodeId) -> Option<u32> {
    let segment = id.as_str().rsplit('-').next()?;
    segment.strip_prefix("iter")?.parse().ok()
}

#[cfg(test)]
#[path = "trace_tests.rs"]
mod tests;
