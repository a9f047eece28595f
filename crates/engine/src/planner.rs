// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Patch planning: what the next iteration should focus on.
//!
//! The focus area is the dimension with the highest weighted error in the
//! previous iteration's scores. Unlocked nodes are ranked by
//! `importance × relevance`, where relevance is dimension-specific: a node
//! matters to layout work if it has a bounding box, to style work in
//! proportion to its style targets, and so on.

use pf_core::{
    Dimension, IrNode, IrNodeId, PatchBudgets, PatchPlan, PlanTarget, RunSettings, ScoreVector,
};
use std::collections::BTreeSet;

/// Produces a [`PatchPlan`] from the previous iteration's results.
#[derive(Debug, Clone)]
pub struct PatchPlanner {
    max_targets: usize,
    budgets: PatchBudgets,
    disallowed_changes: Vec<String>,
}

impl PatchPlanner {
    pub fn from_settings(settings: &RunSettings) -> Self {
        Self {
            max_targets: settings.max_plan_targets,
            budgets: settings.budgets.clone(),
            disallowed_changes: settings.disallowed_changes.clone(),
        }
    }

    pub fn plan(
        &self,
        previous: &ScoreVector,
        nodes: &[IrNode],
        locked: &BTreeSet<IrNodeId>,
    ) -> PatchPlan {
        let focus_area = focus_area(previous);

        let mut ranked: Vec<(f64, &IrNode)> = nodes
            .iter()
            .filter(|n| !locked.contains(&n.node_id))
            .map(|n| (severity(n, focus_area), n))
            .collect();
        ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let top_targets = ranked
            .into_iter()
            .take(self.max_targets)
            .map(|(severity, node)| PlanTarget {
                node_id: node.node_id.clone(),
                name: node.name.clone(),
                severity: pf_core::round2(severity),
            })
            .collect();

        PatchPlan {
            focus_area,
            top_targets,
            budgets: self.budgets.clone(),
            disallowed_changes: self.disallowed_changes.clone(),
            locked_node_ids: locked.clone(),
        }
    }
}

/// Dimension with the highest weighted error.
fn focus_area(scores: &ScoreVector) -> Dimension {
    let mut best = Dimension::Layout;
    let mut best_err = f64::NEG_INFINITY;
    for dim in Dimension::ALL {
        let err = dim.weight() * (1.0 - scores.get(dim));
        if err > best_err {
            best = dim;
            best_err = err;
        }
    }
    best
}

fn severity(node: &IrNode, focus: Dimension) -> f64 {
    node.match_importance.weight() * relevance(node, focus)
}

/// How relevant a node is to work on the focus dimension.
fn relevance(node: &IrNode, focus: Dimension) -> f64 {
    match focus {
        Dimension::Layout => {
            if node.has_bbox() {
                1.0
            } else {
                0.3
            }
        }
        Dimension::Style => (node.style_target_count() as f64 / 4.0).min(1.0),
        Dimension::A11y => {
            if node.has_a11y_target() {
                1.0
            } else {
                0.2
            }
        }
        Dimension::Perceptual => {
            if node.match_importance == pf_core::MatchImportance::Critical {
                1.0
            } else {
                0.5
            }
        }
    }
}

#[cfg(test)]
#[path = "planner_tests.rs"]
mod tests;
