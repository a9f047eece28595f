// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Design IR: the flat per-target node list the planner and lock manager
//! reason over. Each node carries layout, style, a11y, and component-mapping
//! targets extracted from the design tool.

use crate::id::IrNodeId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// IR schema version this build understands.
pub const IR_SCHEMA_VERSION: &str = "1.0";

/// Top-level design IR document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignIr {
    pub schema_version: String,
    pub targets: Vec<IrTarget>,
}

impl DesignIr {
    pub fn target(&self, target_id: &str) -> Option<&IrTarget> {
        self.targets.iter().find(|t| t.target_id == target_id)
    }
}

/// Node list for one page target.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IrTarget {
    pub target_id: String,
    pub nodes: Vec<IrNode>,
}

/// How strongly a node must match the design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchImportance {
    Critical,
    Normal,
    Low,
}

impl MatchImportance {
    /// Weight used when ranking patch targets.
    pub fn weight(&self) -> f64 {
        match self {
            MatchImportance::Critical => 1.0,
            MatchImportance::Normal => 0.6,
            MatchImportance::Low => 0.3,
        }
    }
}

/// One node of the design IR.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IrNode {
    pub node_id: IrNodeId,
    pub name: String,
    pub match_importance: MatchImportance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_mapping: Option<ComponentMapping>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout_targets: Option<LayoutTargets>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_targets: Option<StyleTargets>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub a11y_targets: Option<A11yTargets>,
}

impl IrNode {
    pub fn has_bbox(&self) -> bool {
        self.layout_targets.is_some()
    }

    pub fn style_target_count(&self) -> usize {
        self.style_targets
            .as_ref()
            .map(|s| s.properties.len())
            .unwrap_or(0)
    }

    pub fn has_a11y_target(&self) -> bool {
        self.a11y_targets
            .as_ref()
            .map(|a| a.role.is_some() || a.name.is_some() || a.labelled_by_node_id.is_some())
            .unwrap_or(false)
    }
}

/// Suggested component for a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentMapping {
    pub component: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub props: IndexMap<String, serde_json::Value>,
}

/// Layout expectations for a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutTargets {
    pub bbox: Bbox,
    #[serde(default)]
    pub tolerance_px: TolerancePx,
}

/// Bounding box in design coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bbox {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

/// Per-axis match tolerance in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TolerancePx {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Default for TolerancePx {
    fn default() -> Self {
        Self {
            x: 8.0,
            y: 8.0,
            w: 10.0,
            h: 10.0,
        }
    }
}

/// Style expectations for a node. Keys are CSS-ish property names; color
/// values are `rgb(r,g,b)` strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StyleTargets {
    pub properties: IndexMap<String, serde_json::Value>,
}

/// Accessibility expectations for a node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct A11yTargets {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labelled_by_node_id: Option<IrNodeId>,
}

#[cfg(test)]
#[path = "ir_tests.rs"]
mod tests;
