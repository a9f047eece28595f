// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test builders shared across crates (behind the `test-support` feature).

use crate::id::IrNodeId;
use crate::ir::{Bbox, DesignIr, IrNode, IrTarget, LayoutTargets, MatchImportance, StyleTargets};
use crate::pack::{
    BreakpointDef, EntryDef, PackManifest, RunDefaults, StateDef, TargetDef,
};

/// A minimal valid manifest with one target, one breakpoint, one state.
pub fn manifest(target_id: &str, route: &str) -> PackManifest {
    PackManifest {
        schema_version: "1.0".to_string(),
        project_name: "test-project".to_string(),
        targets: vec![TargetDef {
            target_id: target_id.to_string(),
            route: route.to_string(),
            entry: EntryDef {
                kind: "route".to_string(),
                file_hint: None,
            },
        }],
        breakpoints: vec![BreakpointDef {
            breakpoint_id: "desktop".to_string(),
            width: 1440,
            height: 900,
            device_scale_factor: 1.0,
        }],
        states: vec![StateDef {
            state_id: "default".to_string(),
        }],
        run_defaults: RunDefaults {
            target_id: target_id.to_string(),
            threshold: 0.92,
            max_iterations: 10,
        },
    }
}

/// Add a breakpoint to a manifest.
pub fn with_breakpoint(mut m: PackManifest, id: &str, width: u32, height: u32) -> PackManifest {
    m.breakpoints.push(BreakpointDef {
        breakpoint_id: id.to_string(),
        width,
        height,
        device_scale_factor: 1.0,
    });
    m
}

/// Builder for IR nodes.
pub struct IrNodeBuilder {
    node: IrNode,
}

impl IrNodeBuilder {
    pub fn new(node_id: &str, name: &str) -> Self {
        Self {
            node: IrNode {
                node_id: IrNodeId::new(node_id),
                name: name.to_string(),
                match_importance: MatchImportance::Normal,
                component_mapping: None,
                layout_targets: None,
                style_targets: None,
                a11y_targets: None,
            },
        }
    }

    pub fn importance(mut self, importance: MatchImportance) -> Self {
        self.node.match_importance = importance;
        self
    }

    pub fn bbox(mut self, x: f64, y: f64, w: f64, h: f64) -> Self {
        self.node.layout_targets = Some(LayoutTargets {
            bbox: Bbox { x, y, w, h },
            tolerance_px: Default::default(),
        });
        self
    }

    pub fn styles(mut self, properties: &[(&str, &str)]) -> Self {
        let mut targets = StyleTargets::default();
        for (k, v) in properties {
            targets
                .properties
                .insert(k.to_string(), serde_json::Value::String(v.to_string()));
        }
        self.node.style_targets = Some(targets);
        self
    }

    pub fn a11y_role(mut self, role: &str) -> Self {
        self.node.a11y_targets = Some(crate::ir::A11yTargets {
            role: Some(role.to_string()),
            ..Default::default()
        });
        self
    }

    pub fn build(self) -> IrNode {
        self.node
    }
}

/// An IR document with the given nodes under one target.
pub fn design_ir(target_id: &str, nodes: Vec<IrNode>) -> DesignIr {
    DesignIr {
        schema_version: "1.0".to_string(),
        targets: vec![IrTarget {
            target_id: target_id.to_string(),
            nodes,
        }],
    }
}
