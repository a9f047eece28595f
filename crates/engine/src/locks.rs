// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node locks: design nodes the code-gen provider must stop touching.
//!
//! Once the aggregate layout and style scores are close enough to perfect,
//! critical nodes with concrete layout and style targets are considered
//! settled and enter the lock set. The set only grows within a run.

use pf_core::{IrNode, IrNodeId, MatchImportance, RunSettings, ScoreVector};
use std::collections::BTreeSet;

/// Monotonically growing set of locked node ids.
#[derive(Debug)]
pub struct LockManager {
    layout_threshold: f64,
    style_threshold: f64,
    locked: BTreeSet<IrNodeId>,
}

impl LockManager {
    pub fn new(layout_threshold: f64, style_threshold: f64) -> Self {
        Self {
            layout_threshold,
            style_threshold,
            locked: BTreeSet::new(),
        }
    }

    pub fn from_settings(settings: &RunSettings) -> Self {
        Self::new(settings.layout_lock_threshold, settings.style_lock_threshold)
    }

    /// Update locks from the latest aggregate scores. Returns how many nodes
    /// were newly locked.
    pub fn update(&mut self, aggregate: &ScoreVector, nodes: &[IrNode]) -> usize {
        let layout_err = 1.0 - aggregate.layout;
        let style_err = 1.0 - aggregate.style;
        if layout_err > self.layout_threshold || style_err > self.style_threshold {
            return 0;
        }

        let mut newly = 0;
        for node in nodes {
            if node.match_importance != MatchImportance::Critical {
                continue;
            }
            if !node.has_bbox() || node.style_target_count() == 0 {
                continue;
            }
            if self.locked.insert(node.node_id.clone()) {
                newly += 1;
            }
        }
        newly
    }

    pub fn locked(&self) -> &BTreeSet<IrNodeId> {
        &self.locked
    }

    pub fn is_locked(&self, node_id: &IrNodeId) -> bool {
        self.locked.contains(node_id)
    }
}

#[cfg(test)]
#[path = "locks_tests.rs"]
mod tests;
