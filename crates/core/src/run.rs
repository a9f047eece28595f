// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run-level types: settings, acceptance decisions, stop reasons, patch
//! plans, and the per-iteration record the orchestrator accumulates.

use crate::id::IrNodeId;
use crate::pack::{ManifestError, PackManifest};
use crate::score::{Dimension, ScoreVector};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

/// Overall status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Success,
    Error,
}

/// Why a candidate score was accepted or rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceptReason {
    Improved,
    Regression,
    NoImprovement,
}

impl fmt::Display for AcceptReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcceptReason::Improved => write!(f, "improved"),
            AcceptReason::Regression => write!(f, "regression"),
            AcceptReason::NoImprovement => write!(f, "no_improvement"),
        }
    }
}

/// Outcome of evaluating one candidate score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Acceptance {
    pub accepted: bool,
    pub reason: AcceptReason,
}

/// Why a run stopped iterating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    ThresholdMet,
    MaxIterations,
    RegressionLimit,
    Plateau,
    TimeBudget,
    Cancelled,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::ThresholdMet => write!(f, "threshold met"),
            StopReason::MaxIterations => write!(f, "max_iterations"),
            StopReason::RegressionLimit => write!(f, "regression_limit"),
            StopReason::Plateau => write!(f, "plateau"),
            StopReason::TimeBudget => write!(f, "time_budget"),
            StopReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Change-size limits handed to the code-gen provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchBudgets {
    pub max_files_changed: u32,
    pub max_lines_changed: u32,
    pub max_structure_changes: u32,
}

impl Default for PatchBudgets {
    fn default() -> Self {
        Self {
            max_files_changed: 2,
            max_lines_changed: 80,
            max_structure_changes: 1,
        }
    }
}

/// An IR node the next iteration should focus on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanTarget {
    pub node_id: IrNodeId,
    pub name: String,
    pub severity: f64,
}

/// What the next iteration should change, and what it must leave alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchPlan {
    pub focus_area: Dimension,
    pub top_targets: Vec<PlanTarget>,
    pub budgets: PatchBudgets,
    pub disallowed_changes: Vec<String>,
    pub locked_node_ids: BTreeSet<IrNodeId>,
}

/// Tunables for one run. Defaults match the product's standard behavior;
/// `from_manifest` overlays the pack's `runDefaults`.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub target_id: String,
    pub route: String,
    pub state_id: String,
    pub threshold: f64,
    pub max_iterations: u32,
    pub epsilon: f64,
    pub max_consecutive_rejections: u32,
    pub plateau_window: usize,
    pub plateau_threshold: f64,
    pub time_budget: Duration,
    /// How long to wait for the preview to report ready.
    pub preview_timeout: Duration,
    /// Cap on route warm-up polling before capture proceeds anyway.
    pub warmup_budget: Duration,
    /// Settle delay after warm-up for in-place recompilation.
    pub recompile_settle: Duration,
    pub layout_lock_threshold: f64,
    pub style_lock_threshold: f64,
    pub max_plan_targets: usize,
    pub budgets: PatchBudgets,
    pub disallowed_changes: Vec<String>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            target_id: String::new(),
            route: "/".to_string(),
            state_id: "default".to_string(),
            threshold: 0.92,
            max_iterations: 10,
            epsilon: 0.01,
            max_consecutive_rejections: 3,
            plateau_window: 3,
            plateau_threshold: 0.01,
            time_budget: Duration::from_secs(15 * 60),
            preview_timeout: Duration::from_secs(120),
            warmup_budget: Duration::from_secs(30),
            recompile_settle: Duration::from_millis(1500),
            layout_lock_threshold: 0.15,
            style_lock_threshold: 0.15,
            max_plan_targets: 3,
            budgets: PatchBudgets::default(),
            disallowed_changes: vec![
                "routing".to_string(),
                "dependencies".to_string(),
                "global-styles".to_string(),
            ],
        }
    }
}

impl RunSettings {
    /// Build settings for a run of the manifest's default target.
    pub fn from_manifest(manifest: &PackManifest) -> Result<Self, ManifestError> {
        manifest.validate()?;
        let defaults = &manifest.run_defaults;
        let target = manifest
            .target(&defaults.target_id)
            .ok_or_else(|| ManifestError::UnknownDefaultTarget(defaults.target_id.clone()))?;
        let state_id = manifest
            .default_state()
            .map(|s| s.state_id.clone())
            .unwrap_or_else(|| "default".to_string());

        Ok(Self {
            target_id: target.target_id.clone(),
            route: target.route.clone(),
            state_id,
            threshold: defaults.threshold,
            max_iterations: defaults.max_iterations,
            ..Self::default()
        })
    }
}

/// Record of one finished iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationRecord {
    pub index: u32,
    pub scores: ScoreVector,
    pub overall: f64,
    pub accepted: bool,
    pub reason: AcceptReason,
}

/// Final result of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
    pub iterations: Vec<IterationRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_iteration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_overall: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
