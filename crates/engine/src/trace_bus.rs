// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Trace bus: fan-out of run progress to subscribers.
//!
//! Every run event is folded into the project's trace tree, appended to a
//! replay buffer, and broadcast to subscribers. A subscriber arriving
//! mid-run first receives the buffered frames, then live frames, in the
//! order they were produced; both happen under one lock so the boundary is
//! exact. Subscribers get unbounded channels so a slow consumer can never
//! stall the run task.

use chrono::Utc;
use parking_lot::Mutex;
use pf_core::{
    AgentEvent, AgentEventKind, ArtifactRef, Dimension, EventPayload, IdGen, NodeStatus, PackId,
    ProjectId, RunId, RunStatus, StepKind, TraceNodeId, TraceTree, UuidIdGen,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// One frame of a subscriber stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Frame {
    #[serde(rename_all = "camelCase")]
    RunStarted { run_id: RunId, project_id: ProjectId },
    #[serde(rename_all = "camelCase")]
    AgentEvent { event: AgentEvent },
    #[serde(rename_all = "camelCase")]
    RunFinished {
        run_id: RunId,
        project_id: ProjectId,
        status: RunStatus,
    },
    /// Error-kind frame; also used to answer subscriber pings.
    #[serde(rename_all = "camelCase")]
    Error { message: String },
}

struct ProjectChannel {
    tree: TraceTree,
    buffer: Vec<Frame>,
    subscribers: Vec<mpsc::UnboundedSender<Frame>>,
}

impl ProjectChannel {
    fn new(title: &str) -> Self {
        Self {
            tree: TraceTree::new(title),
            buffer: Vec::new(),
            subscribers: Vec::new(),
        }
    }

    fn broadcast(&mut self, frame: Frame) {
        self.buffer.push(frame.clone());
        self.subscribers
            .retain(|tx| tx.send(frame.clone()).is_ok());
    }
}

/// Fan-out point between one run task and many observers.
#[derive(Clone, Default)]
pub struct TraceBus {
    channels: Arc<Mutex<HashMap<ProjectId, ProjectChannel>>>,
}

impl TraceBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a new run for a project. The previous run's buffer and tree are
    /// superseded; live subscribers stay connected.
    pub fn begin_run(&self, project: &ProjectId, run_id: &RunId, title: &str) {
        let mut channels = self.channels.lock();
        let channel = channels
            .entry(project.clone())
            .or_insert_with(|| ProjectChannel::new(title));
        channel.tree = TraceTree::new(title);
        channel.buffer.clear();
        channel.broadcast(Frame::RunStarted {
            run_id: run_id.clone(),
            project_id: project.clone(),
        });
    }

    /// Emit an event: fold into the tree, buffer, and broadcast.
    pub fn emit(&self, event: AgentEvent) {
        let mut channels = self.channels.lock();
        let channel = channels
            .entry(event.project_id.clone())
            .or_insert_with(|| ProjectChannel::new("run"));
        channel.tree.apply(&event);
        channel.broadcast(Frame::AgentEvent { event });
    }

    /// Close out a run.
    pub fn finish_run(&self, project: &ProjectId, run_id: &RunId, status: RunStatus) {
        let mut channels = self.channels.lock();
        if let Some(channel) = channels.get_mut(project) {
            channel.broadcast(Frame::RunFinished {
                run_id: run_id.clone(),
                project_id: project.clone(),
                status,
            });
        }
    }

    /// Subscribe to a project's stream. Buffered frames are queued into the
    /// returned receiver before any live frame.
    pub fn subscribe(&self, project: &ProjectId) -> mpsc::UnboundedReceiver<Frame> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut channels = self.channels.lock();
        let channel = channels
            .entry(project.clone())
            .or_insert_with(|| ProjectChannel::new("run"));
        for frame in &channel.buffer {
            let _ = tx.send(frame.clone());
        }
        channel.subscribers.push(tx);
        rx
    }

    /// Deep copy of the project's current trace tree.
    pub fn tree(&self, project: &ProjectId) -> Option<TraceTree> {
        self.channels.lock().get(project).map(|c| c.tree.clone())
    }

    /// Index of the iteration currently flagged best.
    pub fn best_iteration(&self, project: &ProjectId) -> Option<u32> {
        self.channels
            .lock()
            .get(project)
            .and_then(|c| c.tree.best_iteration_index())
    }
}

/// Convenience constructor of well-formed events for one run.
#[derive(Clone)]
pub struct TraceEmitter<G: IdGen = UuidIdGen> {
    bus: TraceBus,
    project: ProjectId,
    pack: Option<PackId>,
    ids: G,
}

impl TraceEmitter<UuidIdGen> {
    pub fn new(bus: TraceBus, project: ProjectId, pack: Option<PackId>) -> Self {
        Self::with_ids(bus, project, pack, UuidIdGen)
    }
}

impl<G: IdGen> TraceEmitter<G> {
    pub fn with_ids(bus: TraceBus, project: ProjectId, pack: Option<PackId>, ids: G) -> Self {
        Self {
            bus,
            project,
            pack,
            ids,
        }
    }

    fn emit(&self, node: &TraceNodeId, kind: AgentEventKind, payload: EventPayload) {
        self.bus.emit(AgentEvent {
            event_id: self.ids.next(),
            project_id: self.project.clone(),
            pack_id: self.pack.clone(),
            node_id: node.clone(),
            kind,
            ts: Utc::now(),
            payload,
        });
    }

    /// Emit the created/started pair that opens every step node.
    pub fn start_step(&self, node: &TraceNodeId, step: StepKind, title: &str) {
        self.emit(
            node,
            AgentEventKind::NodeCreated,
            EventPayload {
                step_key: Some(step),
                title: Some(title.to_string()),
                ..Default::default()
            },
        );
        self.emit(
            node,
            AgentEventKind::NodeStarted,
            EventPayload {
                step_key: Some(step),
                ..Default::default()
            },
        );
    }

    pub fn progress(&self, node: &TraceNodeId, message: &str) {
        self.emit(
            node,
            AgentEventKind::NodeProgress,
            EventPayload {
                message: Some(message.to_string()),
                ..Default::default()
            },
        );
    }

    pub fn focus(&self, node: &TraceNodeId, message: &str, focus_area: Dimension) {
        self.emit(
            node,
            AgentEventKind::NodeProgress,
            EventPayload {
                message: Some(message.to_string()),
                focus_area: Some(focus_area),
                ..Default::default()
            },
        );
    }

    pub fn finish(&self, node: &TraceNodeId, message: Option<String>) {
        self.emit(
            node,
            AgentEventKind::NodeFinished,
            EventPayload {
                message,
                ..Default::default()
            },
        );
    }

    /// Finish with full decision details (used on iteration nodes).
    pub fn finish_with(&self, node: &TraceNodeId, payload: EventPayload) {
        self.emit(node, AgentEventKind::NodeFinished, payload);
    }

    pub fn fail(&self, node: &TraceNodeId, message: &str) {
        self.emit(
            node,
            AgentEventKind::NodeFailed,
            EventPayload {
                message: Some(message.to_string()),
                ..Default::default()
            },
        );
    }

    pub fn artifact(&self, node: &TraceNodeId, artifact: ArtifactRef) {
        self.emit(
            node,
            AgentEventKind::ArtifactAdded,
            EventPayload {
                artifact: Some(artifact),
                ..Default::default()
            },
        );
    }

    /// Status override used when a node finishes unsuccessfully but the run
    /// continues (best-effort steps).
    pub fn finish_with_status(
        &self,
        node: &TraceNodeId,
        status: NodeStatus,
        message: Option<String>,
    ) {
        self.emit(
            node,
            AgentEventKind::NodeFinished,
            EventPayload {
                status: Some(status),
                message,
                ..Default::default()
            },
        );
    }
}

#[cfg(test)]
#[path = "trace_bus_tests.rs"]
mod tests;
