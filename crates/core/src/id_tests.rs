// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn short_truncates_long_ids() {
    let id = ProjectId::new("abcdef123456");
    assert_eq!(id.short(6), "abcdef");
}

#[test]
fn short_returns_whole_id_when_shorter() {
    let id = ProjectId::new("abc");
    assert_eq!(id.short(8), "abc");
}

#[test]
fn trace_node_id_child_appends_segment() {
    let root = TraceNodeId::root();
    let iter = root.child("iter0");
    assert_eq!(iter.as_str(), "root-iter0");
    assert_eq!(iter.child("codegen").as_str(), "root-iter0-codegen");
}

#[test]
fn trace_node_id_parent_strips_last_segment() {
    let id = TraceNodeId::new("root-iter2-screenshot-desktop");
    assert_eq!(
        id.parent(),
        Some(TraceNodeId::new("root-iter2-screenshot"))
    );
    assert_eq!(TraceNodeId::root().parent(), None);
}

#[test]
fn sequential_id_gen_increments() {
    let gen = SequentialIdGen::new("evt");
    assert_eq!(gen.next(), "evt-1");
    assert_eq!(gen.next(), "evt-2");
}

#[test]
fn uuid_id_gen_is_unique() {
    let gen = UuidIdGen;
    assert_ne!(gen.next(), gen.next());
}

#[test]
fn display_matches_inner_string() {
    let id = RunId::new("run-42");
    assert_eq!(id.to_string(), "run-42");
    assert_eq!(id, "run-42");
}
