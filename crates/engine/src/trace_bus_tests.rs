// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use pf_core::SequentialIdGen;

fn project() -> ProjectId {
    ProjectId::new("p1")
}

fn emitter(bus: &TraceBus) -> TraceEmitter<SequentialIdGen> {
    TraceEmitter::with_ids(
        bus.clone(),
        project(),
        Some(PackId::new("pack-1")),
        SequentialIdGen::new("evt"),
    )
}

fn drain(rx: &mut mpsc::UnboundedReceiver<Frame>) -> Vec<Frame> {
    let mut frames = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        frames.push(frame);
    }
    frames
}

#[test]
fn live_subscriber_sees_frames_in_emission_order() {
    let bus = TraceBus::new();
    let mut rx = bus.subscribe(&project());

    bus.begin_run(&project(), &RunId::new("r1"), "demo");
    let e = emitter(&bus);
    e.start_step(&TraceNodeId::new("root-iter0"), StepKind::Iteration, "Iteration 1");
    bus.finish_run(&project(), &RunId::new("r1"), RunStatus::Success);

    let frames = drain(&mut rx);
    assert!(matches!(frames[0], Frame::RunStarted { .. }));
    assert!(matches!(frames[1], Frame::AgentEvent { .. }));
    assert!(matches!(frames[2], Frame::AgentEvent { .. }));
    assert!(matches!(frames[3], Frame::RunFinished { .. }));
}

#[test]
fn late_subscriber_gets_buffered_history_first() {
    let bus = TraceBus::new();
    bus.begin_run(&project(), &RunId::new("r1"), "demo");
    let e = emitter(&bus);
    e.start_step(&TraceNodeId::new("root-iter0"), StepKind::Iteration, "Iteration 1");

    // Subscribe mid-run, then emit one live frame.
    let mut rx = bus.subscribe(&project());
    e.finish(&TraceNodeId::new("root-iter0"), None);

    let frames = drain(&mut rx);
    // Replayed: runStarted + created + started. Live: finished.
    assert_eq!(frames.len(), 4);
    assert!(matches!(frames[0], Frame::RunStarted { .. }));
    let last_event = match &frames[3] {
        Frame::AgentEvent { event } => event,
        other => panic!("expected agentEvent, got {other:?}"),
    };
    assert_eq!(last_event.kind, AgentEventKind::NodeFinished);
}

#[test]
fn new_run_supersedes_the_buffer() {
    let bus = TraceBus::new();
    bus.begin_run(&project(), &RunId::new("r1"), "first");
    let e = emitter(&bus);
    e.start_step(&TraceNodeId::new("root-iter0"), StepKind::Iteration, "Iteration 1");

    bus.begin_run(&project(), &RunId::new("r2"), "second");
    let mut rx = bus.subscribe(&project());
    let frames = drain(&mut rx);

    // Only the new run's start frame is replayed.
    assert_eq!(frames.len(), 1);
    match &frames[0] {
        Frame::RunStarted { run_id, .. } => assert_eq!(run_id.as_str(), "r2"),
        other => panic!("expected runStarted, got {other:?}"),
    }
}

#[test]
fn events_fold_into_the_tree() {
    let bus = TraceBus::new();
    bus.begin_run(&project(), &RunId::new("r1"), "demo");
    let e = emitter(&bus);
    let iter = TraceNodeId::new("root-iter0");
    e.start_step(&iter, StepKind::Iteration, "Iteration 1");
    e.start_step(&iter.child("codegen"), StepKind::Codegen, "Generate code");
    e.finish_with(
        &iter,
        EventPayload {
            score: Some(0.85),
            is_best: Some(true),
            ..Default::default()
        },
    );

    let tree = bus.tree(&project()).unwrap();
    let node = tree.find(&iter).unwrap();
    assert_eq!(node.score, Some(0.85));
    assert_eq!(node.children.len(), 1);
    assert_eq!(bus.best_iteration(&project()), Some(0));
}

#[test]
fn dead_subscribers_are_pruned() {
    let bus = TraceBus::new();
    bus.begin_run(&project(), &RunId::new("r1"), "demo");
    let rx = bus.subscribe(&project());
    drop(rx);

    // Emitting after the receiver is gone must not error or leak.
    let e = emitter(&bus);
    e.start_step(&TraceNodeId::new("root-iter0"), StepKind::Iteration, "Iteration 1");

    let mut rx2 = bus.subscribe(&project());
    assert!(!drain(&mut rx2).is_empty());
}

#[test]
fn frames_serialize_with_type_tags() {
    let frame = Frame::RunStarted {
        run_id: RunId::new("r1"),
        project_id: project(),
    };
    let json = serde_json::to_value(&frame).unwrap();
    assert_eq!(json["type"], "runStarted");
    assert_eq!(json["runId"], "r1");

    let pong = Frame::Error {
        message: "pong".to_string(),
    };
    let json = serde_json::to_value(&pong).unwrap();
    assert_eq!(json["type"], "error");
    assert_eq!(json["message"], "pong");
}
