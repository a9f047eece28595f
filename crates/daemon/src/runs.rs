// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run supervision: one active run per project.
//!
//! Starting a run stops and supersedes the project's predecessor; the new
//! run installs itself into the per-project slot immediately while the old
//! task unwinds at its next suspension point.

use parking_lot::Mutex;
use pf_adapters::{BrowserProbe, CodegenProvider, ScoringProvider};
use pf_core::{
    DesignIr, IdGen, ManifestError, PackId, PackManifest, ProjectId, RunId, RunSettings, UuidIdGen,
};
use pf_engine::{OrchestratorDeps, RunContext, RunHandle, RunOrchestrator, TraceBus};
use pf_sandbox::SandboxManager;
use pf_storage::{ProjectLayout, SnapshotStore};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Errors from starting a run
#[derive(Debug, Error)]
pub enum StartRunError {
    #[error("design pack not found: {0}")]
    PackNotFound(PackId),
    #[error("invalid manifest: {0}")]
    Manifest(#[from] ManifestError),
    #[error("invalid pack data: {0}")]
    PackData(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

struct ActiveRun {
    run_id: RunId,
    handle: RunHandle,
}

/// Per-project run slots plus everything needed to build an orchestrator.
pub struct RunSupervisor<C, S, B> {
    codegen: C,
    scoring: S,
    browser: B,
    sandbox: SandboxManager,
    layout: ProjectLayout,
    bus: TraceBus,
    ids: UuidIdGen,
    slots: Arc<Mutex<HashMap<ProjectId, ActiveRun>>>,
}

impl<C, S, B> RunSupervisor<C, S, B>
where
    C: CodegenProvider,
    S: ScoringProvider,
    B: BrowserProbe,
{
    pub fn new(
        codegen: C,
        scoring: S,
        browser: B,
        sandbox: SandboxManager,
        layout: ProjectLayout,
        bus: TraceBus,
    ) -> Self {
        Self {
            codegen,
            scoring,
            browser,
            sandbox,
            layout,
            bus,
            ids: UuidIdGen,
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn bus(&self) -> &TraceBus {
        &self.bus
    }

    /// Start a run for a project's pack, superseding any predecessor.
    pub fn start_run(
        &self,
        project: &ProjectId,
        pack: &PackId,
    ) -> Result<RunId, StartRunError> {
        let manifest = self.load_manifest(project, pack)?;
        let ir = self.load_ir(project, pack)?;
        let settings = RunSettings::from_manifest(&manifest)?;

        let run_id = RunId::new(self.ids.next());
        let ctx = RunContext {
            project: project.clone(),
            pack: pack.clone(),
            run_id: run_id.clone(),
            manifest,
            ir,
            settings,
        };
        let orchestrator = RunOrchestrator::new(
            OrchestratorDeps {
                codegen: self.codegen.clone(),
                scoring: self.scoring.clone(),
                browser: self.browser.clone(),
                sandbox: self.sandbox.clone(),
                snapshots: SnapshotStore::new(self.layout.clone()),
                layout: self.layout.clone(),
                bus: self.bus.clone(),
            },
            ctx,
        );
        let handle = orchestrator.handle();

        // Supersede the predecessor, then install the new run. The old task
        // sees its cancellation at the next suspension point.
        let previous = {
            let mut slots = self.slots.lock();
            slots.insert(
                project.clone(),
                ActiveRun {
                    run_id: run_id.clone(),
                    handle,
                },
            )
        };
        if let Some(previous) = previous {
            info!(
                %project,
                superseded = %previous.run_id,
                "stopping predecessor run"
            );
            previous.handle.stop();
        }

        tokio::spawn(orchestrator.run());
        info!(%project, %run_id, "run started");
        Ok(run_id)
    }

    /// Stop the project's active run. Returns whether one was running.
    pub fn stop_run(&self, project: &ProjectId) -> bool {
        let entry = self.slots.lock().remove(project);
        match entry {
            Some(active) => {
                info!(%project, run_id = %active.run_id, "stopping run");
                active.handle.stop();
                true
            }
            None => false,
        }
    }

    /// Active (not yet stopped) run id for a project.
    pub fn active_run(&self, project: &ProjectId) -> Option<RunId> {
        self.slots
            .lock()
            .get(project)
            .filter(|a| !a.handle.is_stopped())
            .map(|a| a.run_id.clone())
    }

    /// Stop every active run. Called on shutdown.
    pub fn stop_all(&self) {
        let slots = std::mem::take(&mut *self.slots.lock());
        for (project, active) in slots {
            info!(%project, run_id = %active.run_id, "stopping run for shutdown");
            active.handle.stop();
        }
    }

    fn load_manifest(
        &self,
        project: &ProjectId,
        pack: &PackId,
    ) -> Result<PackManifest, StartRunError> {
        let path = self.layout.manifest_path(project, pack);
        if !path.exists() {
            return Err(StartRunError::PackNotFound(pack.clone()));
        }
        let file = File::open(&path)?;
        let manifest: PackManifest = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| StartRunError::PackData(format!("manifest: {e}")))?;
        manifest.validate()?;
        Ok(manifest)
    }

    fn load_ir(&self, project: &ProjectId, pack: &PackId) -> Result<DesignIr, StartRunError> {
        let path = self.layout.design_ir_path(project, pack);
        if !path.exists() {
            return Err(StartRunError::PackNotFound(pack.clone()));
        }
        let file = File::open(&path)?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| StartRunError::PackData(format!("design IR: {e}")))
    }
}

#[cfg(test)]
#[path = "runs_tests.rs"]
mod tests;
