// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Historical previews served from extracted snapshots, with LRU eviction.

use crate::prelude::*;
use pf_core::RunStatus;
use pf_engine::Frame;
use pf_sandbox::PreviewStatus;
use pf_storage::SnapshotStore;
use std::time::Duration;

async fn wait_ready(world: &SpecWorld, iteration: u32) {
    for _ in 0..400 {
        let info = world.sandbox.historical_status(&world.project, iteration);
        if info.status == PreviewStatus::Ready {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("historical preview {iteration} never became ready");
}

#[tokio::test]
async fn historical_previews_evict_least_recently_used() {
    let world = SpecWorld::new(|m| {
        m.run_defaults.threshold = 0.99;
        m.run_defaults.max_iterations = 3;
    });
    for v in ["v0", "v1", "v2"] {
        world.codegen.push_file("src/app/page.tsx", v);
    }
    for score in [0.30, 0.40, 0.50] {
        world.scoring.push_uniform(score);
    }

    // Run three iterations to produce three snapshots.
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

    let snapshots = SnapshotStore::new(world.layout.clone());
    for iteration in 0..3 {
        assert!(snapshots.has(&world.project, iteration));
    }

    // Start previews for iterations 0 and 1 (capacity is 2).
    for iteration in 0..2 {
        let runtime = snapshots.extract(&world.project, iteration).unwrap();
        world
            .sandbox
            .start_historical(&world.project, iteration, &runtime)
            .unwrap();
        wait_ready(&world, iteration).await;
    }

    // Keep iteration 1 fresh, then start iteration 2: iteration 0 is evicted.
    world.sandbox.historical_status(&world.project, 1);
    let runtime = snapshots.extract(&world.project, 2).unwrap();
    world
        .sandbox
        .start_historical(&world.project, 2, &runtime)
        .unwrap();
    wait_ready(&world, 2).await;

    assert_eq!(
        world.sandbox.historical_status(&world.project, 0).status,
        PreviewStatus::Stopped
    );
    assert_eq!(
        world.sandbox.historical_status(&world.project, 1).status,
        PreviewStatus::Ready
    );
    assert_eq!(
        world.sandbox.historical_status(&world.project, 2).status,
        PreviewStatus::Ready
    );
    assert_eq!(world.sandbox.live_historical_count(), 2);
}

#[tokio::test]
async fn extracted_runtime_serves_the_iterations_code() {
    let world = SpecWorld::new(|m| {
        m.run_defaults.threshold = 0.99;
        m.run_defaults.max_iterations = 2;
    });
    world.codegen.push_file("src/app/page.tsx", "first");
    world.codegen.push_file("src/app/page.tsx", "second");
    world.scoring.push_uniform(0.50);
    world.scoring.push_uniform(0.60);

    let mut rx = world.bus.subscribe(&world.project);
    world
        .supervisor
        .start_run(&world.project, &world.pack)
        .unwrap();
    collect_until_finished(&mut rx).await;

    let snapshots = SnapshotStore::new(world.layout.clone());
    let rt0 = snapshots.extract(&world.project, 0).unwrap();
    let rt1 = snapshots.extract(&world.project, 1).unwrap();

    let read = |dir: &std::path::Path| {
        std::fs::read_to_string(dir.join("src/app/page.tsx")).unwrap()
    };
    assert_eq!(read(&rt0), "first");
    assert_eq!(read(&rt1), "second");

    // Cleanup removes only the requested runtime.
    snapshots.cleanup(&world.project, 0).unwrap();
    assert!(!rt0.exists());
    assert!(rt1.exists());
}
