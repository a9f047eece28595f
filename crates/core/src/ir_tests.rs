// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn ir_json() -> serde_json::Value {
    serde_json::json!({
        "schemaVersion": "1.0",
        "targets": [{
            "targetId": "home",
            "nodes": [
                {
                    "nodeId": "hero",
                    "name": "Hero",
                    "matchImportance": "critical",
                    "layoutTargets": {"bbox": {"x": 0.0, "y": 0.0, "w": 1440.0, "h": 480.0}},
                    "styleTargets": {"background": "rgb(18,18,24)", "color": "rgb(255,255,255)"},
                    "a11yTargets": {"role": "banner"}
                },
                {
                    "nodeId": "footer-note",
                    "name": "Footer note",
                    "matchImportance": "low"
                }
            ]
        }]
    })
}

#[test]
fn parses_ir_document() {
    let ir: DesignIr = serde_json::from_value(ir_json()).unwrap();
    let target = ir.target("home").unwrap();
    assert_eq!(target.nodes.len(), 2);

    let hero = &target.nodes[0];
    assert_eq!(hero.match_importance, MatchImportance::Critical);
    assert!(hero.has_bbox());
    assert_eq!(hero.style_target_count(), 2);
    assert!(hero.has_a11y_target());
}

#[test]
fn tolerance_defaults_apply() {
    let ir: DesignIr = serde_json::from_value(ir_json()).unwrap();
    let hero = &ir.targets[0].nodes[0];
    let tol = hero.layout_targets.as_ref().unwrap().tolerance_px;
    assert_eq!((tol.x, tol.y, tol.w, tol.h), (8.0, 8.0, 10.0, 10.0));
}

#[test]
fn sparse_node_has_no_targets() {
    let ir: DesignIr = serde_json::from_value(ir_json()).unwrap();
    let note = &ir.targets[0].nodes[1];
    assert!(!note.has_bbox());
    assert_eq!(note.style_target_count(), 0);
    assert!(!note.has_a11y_target());
}

#[test]
fn importance_weights() {
    assert_eq!(MatchImportance::Critical.weight(), 1.0);
    assert_eq!(MatchImportance::Normal.weight(), 0.6);
    assert_eq!(MatchImportance::Low.weight(), 0.3);
}

#[test]
fn unknown_target_is_none() {
    let ir: DesignIr = serde_json::from_value(ir_json()).unwrap();
    assert!(ir.target("missing").is_none());
}
