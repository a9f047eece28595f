// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Design-pack manifest model.
//!
//! The manifest is the pack's table of contents: which page targets exist,
//! which viewport breakpoints and render states to capture, and the run
//! defaults (threshold, iteration cap). Baseline screenshots are keyed by
//! `(targetId, breakpointId, stateId)`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Manifest schema version this build understands.
pub const MANIFEST_SCHEMA_VERSION: &str = "1.0";

/// Errors from manifest validation.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("unsupported schema version: {0}")]
    SchemaVersion(String),
    #[error("manifest declares no targets")]
    NoTargets,
    #[error("manifest declares no breakpoints")]
    NoBreakpoints,
    #[error("manifest declares no states")]
    NoStates,
    #[error("runDefaults.targetId '{0}' does not match any target")]
    UnknownDefaultTarget(String),
}

/// Top-level design-pack manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackManifest {
    pub schema_version: String,
    pub project_name: String,
    pub targets: Vec<TargetDef>,
    pub breakpoints: Vec<BreakpointDef>,
    pub states: Vec<StateDef>,
    pub run_defaults: RunDefaults,
}

/// One page target within the pack.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDef {
    pub target_id: String,
    /// Route the dev server serves this target at, e.g. `/dashboard`.
    pub route: String,
    pub entry: EntryDef,
}

/// Where the generated implementation of a target lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryDef {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_hint: Option<String>,
}

/// A viewport configuration to render and score at.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakpointDef {
    pub breakpoint_id: String,
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_scale_factor")]
    pub device_scale_factor: f64,
}

fn default_scale_factor() -> f64 {
    1.0
}

/// A render state (e.g. default, hover, expanded).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateDef {
    pub state_id: String,
}

/// Per-pack run defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunDefaults {
    pub target_id: String,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

fn default_threshold() -> f64 {
    0.92
}

fn default_max_iterations() -> u32 {
    10
}

impl PackManifest {
    /// Validate structural constraints that deserialization cannot express.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.schema_version != MANIFEST_SCHEMA_VERSION {
            return Err(ManifestError::SchemaVersion(self.schema_version.clone()));
        }
        if self.targets.is_empty() {
            return Err(ManifestError::NoTargets);
        }
        if self.breakpoints.is_empty() {
            return Err(ManifestError::NoBreakpoints);
        }
        if self.states.is_empty() {
            return Err(ManifestError::NoStates);
        }
        let default_target = &self.run_defaults.target_id;
        if !self.targets.iter().any(|t| &t.target_id == default_target) {
            return Err(ManifestError::UnknownDefaultTarget(default_target.clone()));
        }
        Ok(())
    }

    pub fn target(&self, target_id: &str) -> Option<&TargetDef> {
        self.targets.iter().find(|t| t.target_id == target_id)
    }

    /// The breakpoint used for overflow inspection (first listed).
    pub fn primary_breakpoint(&self) -> Option<&BreakpointDef> {
        self.breakpoints.first()
    }

    /// The render state a run scores against (first listed).
    pub fn default_state(&self) -> Option<&StateDef> {
        self.states.first()
    }
}

#[cfg(test)]
#[path = "pack_tests.rs"]
mod tests;
