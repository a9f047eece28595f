// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end run scenarios through the run supervisor.

use crate::prelude::*;
use pf_core::{AgentEventKind, RunStatus};
use pf_engine::Frame;
use pf_storage::SnapshotStore;

#[tokio::test]
async fn threshold_in_one_shot() {
    let world = SpecWorld::new(|m| {
        m.run_defaults.threshold = 0.80;
        m.run_defaults.max_iterations = 5;
    });
    world.codegen.push_file("src/app/page.tsx", "v0");
    world.scoring.push_uniform(0.85);

    let mut rx = world.bus.subscribe(&world.project);
    world
        .supervisor
        .start_run(&world.project, &world.pack)
        .unwrap();
    let frames = collect_until_finished(&mut rx).await;

    match frames.last() {
        Some(Frame::RunFinished { status, .. }) => assert_eq!(*status, RunStatus::Success),
        other => panic!("expected runFinished, got {other:?}"),
    }

    // Exactly one iteration ran, it was accepted, and it is flagged best.
    let tree = world.bus.tree(&world.project).unwrap();
    assert_eq!(world.bus.best_iteration(&world.project), Some(0));
    let root_message = tree.root().message.clone().unwrap_or_default();
    assert!(
        root_message.contains("threshold met"),
        "root message: {root_message}"
    );

    // Exactly one snapshot on disk.
    let snapshots = SnapshotStore::new(world.layout.clone());
    let metas = snapshots.list(&world.project).unwrap();
    assert_eq!(metas.len(), 1);
    assert_eq!(metas[0].iteration, 0);
}

#[tokio::test]
async fn steady_improvement_stops_at_threshold_with_best_last() {
    let world = SpecWorld::new(|m| {
        m.run_defaults.threshold = 0.85;
        m.run_defaults.max_iterations = 10;
    });
    world.codegen.push_file("src/app/page.tsx", "v0");
    for score in [0.60, 0.70, 0.80, 0.90] {
        world.scoring.push_uniform(score);
    }

    let mut rx = world.bus.subscribe(&world.project);
    world
        .supervisor
        .start_run(&world.project, &world.pack)
        .unwrap();
    let frames = collect_until_finished(&mut rx).await;

    // Four iterations, all accepted, best is the last.
    assert_eq!(world.scoring.calls().len(), 4);
    assert_eq!(world.bus.best_iteration(&world.project), Some(3));

    // isBest stayed on at most one node at every point in the stream.
    let mut tree = pf_core::TraceTree::new("replay");
    for frame in &frames {
        if let Frame::AgentEvent { event } = frame {
            tree.apply(event);
            let best_count = tree
                .root()
                .children
                .iter()
                .filter(|c| c.is_best)
                .count();
            assert!(best_count <= 1, "more than one best iteration");
        }
    }
}

#[tokio::test]
async fn regression_rolls_back_to_the_best_snapshot() {
    let world = SpecWorld::new(|m| {
        m.run_defaults.threshold = 0.99;
        m.run_defaults.max_iterations = 2;
    });
    world.codegen.push_file("src/app/page.tsx", "good");
    world.codegen.push_file("src/app/page.tsx", "worse");
    world.scoring.push_uniform(0.80);
    world.scoring.push_uniform(0.60);

    let mut rx = world.bus.subscribe(&world.project);
    world
        .supervisor
        .start_run(&world.project, &world.pack)
        .unwrap();
    let frames = collect_until_finished(&mut rx).await;

    // The workspace holds iteration 0's code again.
    assert_eq!(world.workspace_file("src/app/page.tsx"), "good");
    assert_eq!(world.bus.best_iteration(&world.project), Some(0));

    // Both iterations snapshotted, accepted or not.
    let snapshots = SnapshotStore::new(world.layout.clone());
    assert!(snapshots.has(&world.project, 0));
    assert!(snapshots.has(&world.project, 1));

    // The stream recorded a rejected decision.
    let rejected = frames.iter().any(|f| match f {
        Frame::AgentEvent { event } => {
            event.kind == AgentEventKind::NodeFinished
                && event
                    .payload
                    .decision
                    .as_deref()
                    .is_some_and(|d| d.contains("rejected (regression)"))
        }
        _ => false,
    });
    assert!(rejected, "no rejected decision in the stream");
}

#[tokio::test]
async fn rejection_streak_ends_with_workspace_at_best() {
    let world = SpecWorld::new(|m| {
        m.run_defaults.threshold = 0.99;
        m.run_defaults.max_iterations = 10;
    });
    world.codegen.push_file("src/app/page.tsx", "best");
    world.codegen.push_file("src/app/page.tsx", "bad-1");
    world.codegen.push_file("src/app/page.tsx", "bad-2");
    world.codegen.push_file("src/app/page.tsx", "bad-3");
    for score in [0.80, 0.60, 0.60, 0.60] {
        world.scoring.push_uniform(score);
    }

    let mut rx = world.bus.subscribe(&world.project);
    world
        .supervisor
        .start_run(&world.project, &world.pack)
        .unwrap();
    let frames = collect_until_finished(&mut rx).await;

    assert_eq!(world.scoring.calls().len(), 4);
    assert_eq!(world.workspace_file("src/app/page.tsx"), "best");
    assert_eq!(world.bus.best_iteration(&world.project), Some(0));

    let tree = world.bus.tree(&world.project).unwrap();
    let root_message = tree.root().message.clone().unwrap_or_default();
    assert!(
        root_message.contains("regression_limit"),
        "root message: {root_message}"
    );
    drop(frames);
}
