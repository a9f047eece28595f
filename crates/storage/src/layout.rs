// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project filesystem layout.
//!
//! All on-disk paths hang off a single storage root:
//!
//! ```text
//! projects/<projectId>/
//!   project.json
//!   workspace/
//!   artifacts/
//!     design-packs/<packId>/{manifest.json, design-ir.json, baselines/...}
//!     snapshots/<runId>/<breakpointId>.png
//!     snapshots/<runId>/iter-<n>-overflow.json
//!   snapshots/iter-<n>.tar.gz + iter-<n>.json
//!   runtime/iter-<n>/workspace/
//! ```
//!
//! Paths for different projects, runs, and iterations are disjoint by
//! construction, so no cross-run locking is needed for file I/O.

use pf_core::{PackId, ProjectId, RunId};
use std::path::PathBuf;

/// Pure path arithmetic over the storage root. Does no I/O.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    pub fn project_dir(&self, project: &ProjectId) -> PathBuf {
        self.root.join("projects").join(project.as_str())
    }

    pub fn project_meta_path(&self, project: &ProjectId) -> PathBuf {
        self.project_dir(project).join("project.json")
    }

    /// The mutable workspace a run generates code into.
    pub fn workspace_dir(&self, project: &ProjectId) -> PathBuf {
        self.project_dir(project).join("workspace")
    }

    pub fn artifacts_dir(&self, project: &ProjectId) -> PathBuf {
        self.project_dir(project).join("artifacts")
    }

    pub fn pack_dir(&self, project: &ProjectId, pack: &PackId) -> PathBuf {
        self.artifacts_dir(project)
            .join("design-packs")
            .join(pack.as_str())
    }

    pub fn manifest_path(&self, project: &ProjectId, pack: &PackId) -> PathBuf {
        self.pack_dir(project, pack).join("manifest.json")
    }

    pub fn design_ir_path(&self, project: &ProjectId, pack: &PackId) -> PathBuf {
        self.pack_dir(project, pack).join("design-ir.json")
    }

    /// Baseline screenshot keyed by `(targetId, breakpointId, stateId)`.
    pub fn baseline_path(
        &self,
        project: &ProjectId,
        pack: &PackId,
        target_id: &str,
        breakpoint_id: &str,
        state_id: &str,
    ) -> PathBuf {
        self.pack_dir(project, pack)
            .join("baselines")
            .join(target_id)
            .join(breakpoint_id)
            .join(format!("{state_id}.png"))
    }

    /// Directory holding a run's captured screenshots and overflow reports.
    pub fn run_capture_dir(&self, project: &ProjectId, run: &RunId) -> PathBuf {
        self.artifacts_dir(project)
            .join("snapshots")
            .join(run.as_str())
    }

    pub fn screenshot_path(
        &self,
        project: &ProjectId,
        run: &RunId,
        breakpoint_id: &str,
    ) -> PathBuf {
        self.run_capture_dir(project, run)
            .join(format!("{breakpoint_id}.png"))
    }

    pub fn overflow_report_path(
        &self,
        project: &ProjectId,
        run: &RunId,
        iteration: u32,
    ) -> PathBuf {
        self.run_capture_dir(project, run)
            .join(format!("iter-{iteration}-overflow.json"))
    }

    /// Directory holding per-iteration workspace archives.
    pub fn snapshots_dir(&self, project: &ProjectId) -> PathBuf {
        self.project_dir(project).join("snapshots")
    }

    pub fn archive_path(&self, project: &ProjectId, iteration: u32) -> PathBuf {
        self.snapshots_dir(project)
            .join(format!("iter-{iteration}.tar.gz"))
    }

    pub fn snapshot_meta_path(&self, project: &ProjectId, iteration: u32) -> PathBuf {
        self.snapshots_dir(project)
            .join(format!("iter-{iteration}.json"))
    }

    pub fn runtime_dir(&self, project: &ProjectId, iteration: u32) -> PathBuf {
        self.project_dir(project)
            .join("runtime")
            .join(format!("iter-{iteration}"))
    }

    /// Extracted workspace used by a historical preview.
    pub fn runtime_workspace_dir(&self, project: &ProjectId, iteration: u32) -> PathBuf {
        self.runtime_dir(project, iteration).join("workspace")
    }
}

#[cfg(test)]
#[path = "layout_tests.rs"]
mod tests;
