// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subscriber ordering: runStarted first, buffered replay for late joiners,
//! runFinished last.

use crate::prelude::*;
use pf_core::RunStatus;
use pf_engine::Frame;

#[tokio::test]
async fn early_subscriber_sees_full_framing() {
    let world = SpecWorld::new(|m| m.run_defaults.threshold = 0.80);
    world.codegen.push_file("src/app/page.tsx", "v0");
    world.scoring.push_uniform(0.90);

    let mut rx = world.bus.subscribe(&world.project);
    world
        .supervisor
        .start_run(&world.project, &world.pack)
        .unwrap();
    let frames = collect_until_finished(&mut rx).await;

    assert!(matches!(frames.first(), Some(Frame::RunStarted { .. })));
    assert!(matches!(
        frames.last(),
        Some(Frame::RunFinished {
            status: RunStatus::Success,
            ..
        })
    ));
    // No frame outside the framing pair is a run marker.
    assert!(frames[1..frames.len() - 1]
        .iter()
        .all(|f| matches!(f, Frame::AgentEvent { .. })));
}

#[tokio::test]
async fn late_subscriber_replays_history_in_order() {
    let world = SpecWorld::new(|m| m.run_defaults.threshold = 0.80);
    world.codegen.push_file("src/app/page.tsx", "v0");
    world.scoring.push_uniform(0.90);

    // Early subscriber drives the run to completion.
    let mut early = world.bus.subscribe(&world.project);
    world
        .supervisor
        .start_run(&world.project, &world.pack)
        .unwrap();
    let live_frames = collect_until_finished(&mut early).await;

    // A subscriber arriving after the fact replays the identical sequence.
    let mut late = world.bus.subscribe(&world.project);
    let mut replayed = Vec::new();
    while let Ok(frame) = late.try_recv() {
        replayed.push(frame);
    }

    assert_eq!(replayed.len(), live_frames.len());
    let ids = |frames: &[Frame]| -> Vec<String> {
        frames
            .iter()
            .map(|f| match f {
                Frame::RunStarted { run_id, .. } => format!("start:{run_id}"),
                Frame::AgentEvent { event } => event.event_id.clone(),
                Frame::RunFinished { run_id, .. } => format!("finish:{run_id}"),
                Frame::Error { message } => format!("error:{message}"),
            })
            .collect()
    };
    similar_asserts::assert_eq!(ids(&replayed), ids(&live_frames));
}
