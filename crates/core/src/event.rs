// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Trace event envelope.
//!
//! Every observable transition in a run is an immutable `AgentEvent` record.
//! Events are appended to the run's buffer, fanned out to subscribers, and
//! folded into the trace tree; they are never modified after emission.

use crate::id::{PackId, ProjectId, TraceNodeId};
use crate::score::Dimension;
use crate::trace::{NodeStatus, StepKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of trace transition an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AgentEventKind {
    NodeCreated,
    NodeStarted,
    NodeProgress,
    NodeFinished,
    NodeFailed,
    ArtifactAdded,
}

/// A file produced by a step, referenced from its trace node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactRef {
    /// Display name, e.g. `desktop.png` or `src/app/page.tsx`.
    pub name: String,
    /// Path relative to the project's artifact root (or workspace for code).
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
}

/// Optional data carried by an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_key: Option<StepKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<NodeStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_best: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_area: Option<Dimension>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArtifactRef>,
}

impl EventPayload {
    pub fn is_empty(&self) -> bool {
        self == &EventPayload::default()
    }
}

/// Immutable record of one trace transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentEvent {
    pub event_id: String,
    pub project_id: ProjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pack_id: Option<PackId>,
    pub node_id: TraceNodeId,
    #[serde(rename = "type")]
    pub kind: AgentEventKind,
    pub ts: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "EventPayload::is_empty")]
    pub payload: EventPayload,
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
