// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixture for spec tests: a storage root with a seeded project,
//! pack, and workspace; fake providers; a real sandbox running `sh` dev
//! servers.

use pf_adapters::{FakeBrowser, FakeCodegen, FakeScoring, FAKE_PNG};
use pf_core::test_support::manifest;
use pf_core::{PackId, PackManifest, ProjectId};
use pf_daemon::RunSupervisor;
use pf_engine::TraceBus;
use pf_sandbox::{SandboxConfig, SandboxManager};
use pf_storage::ProjectLayout;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

pub struct SpecWorld {
    pub root: TempDir,
    pub layout: ProjectLayout,
    pub project: ProjectId,
    pub pack: PackId,
    pub codegen: FakeCodegen,
    pub scoring: FakeScoring,
    pub browser: FakeBrowser,
    pub sandbox: SandboxManager,
    pub bus: TraceBus,
    pub supervisor: RunSupervisor<FakeCodegen, FakeScoring, FakeBrowser>,
}

impl SpecWorld {
    pub fn new(tweak_manifest: impl FnOnce(&mut PackManifest)) -> Self {
        let root = TempDir::new().unwrap();
        let layout = ProjectLayout::new(root.path());
        let project = ProjectId::new("proj-1");
        let pack = PackId::new("pack-1");

        let ws = layout.workspace_dir(&project);
        fs::create_dir_all(ws.join("node_modules")).unwrap();
        fs::write(ws.join("package.json"), "{\"name\":\"app\"}").unwrap();

        let mut m = manifest("home", "/home");
        tweak_manifest(&mut m);
        fs::create_dir_all(layout.pack_dir(&project, &pack)).unwrap();
        fs::write(
            layout.manifest_path(&project, &pack),
            serde_json::to_vec_pretty(&m).unwrap(),
        )
        .unwrap();
        fs::write(
            layout.design_ir_path(&project, &pack),
            serde_json::to_vec(&serde_json::json!({
                "schemaVersion": "1.0",
                "targets": [{
                    "targetId": "home",
                    "nodes": [{
                        "nodeId": "hero",
                        "name": "Hero",
                        "matchImportance": "critical",
                        "layoutTargets": {"bbox": {"x": 0.0, "y": 0.0, "w": 1440.0, "h": 480.0}},
                        "styleTargets": {"background": "rgb(12,12,16)"}
                    }]
                }]
            }))
            .unwrap(),
        )
        .unwrap();

        for bp in &m.breakpoints {
            let baseline =
                layout.baseline_path(&project, &pack, "home", &bp.breakpoint_id, "default");
            fs::create_dir_all(baseline.parent().unwrap()).unwrap();
            fs::write(baseline, FAKE_PNG).unwrap();
        }

        let sandbox = SandboxManager::new(SandboxConfig {
            dev_command: "echo 'Local: http://localhost'; sleep 60".to_string(),
            install_command: "true".to_string(),
            template_dir: None,
            readiness_timeout: Duration::from_secs(10),
            ..SandboxConfig::default()
        });

        let codegen = FakeCodegen::new();
        let scoring = FakeScoring::new();
        let browser = FakeBrowser::new();
        let bus = TraceBus::new();
        let supervisor = RunSupervisor::new(
            codegen.clone(),
            scoring.clone(),
            browser.clone(),
            sandbox.clone(),
            layout.clone(),
            bus.clone(),
        );

        Self {
            root,
            layout,
            project,
            pack,
            codegen,
            scoring,
            browser,
            sandbox,
            bus,
            supervisor,
        }
    }

    pub fn workspace_file(&self, rel: &str) -> String {
        fs::read_to_string(self.layout.workspace_dir(&self.project).join(rel)).unwrap()
    }
}

impl Drop for SpecWorld {
    fn drop(&mut self) {
        self.sandbox.stop_all();
    }
}

/// Wait for the project's run to finish, collecting every frame seen.
pub async fn collect_until_finished(
    rx: &mut tokio::sync::mpsc::UnboundedReceiver<pf_engine::Frame>,
) -> Vec<pf_engine::Frame> {
    let mut frames = Vec::new();
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(60), rx.recv())
            .await
            .expect("timed out waiting for runFinished")
            .expect("stream closed before runFinished");
        let done = matches!(frame, pf_engine::Frame::RunFinished { .. });
        frames.push(frame);
        if done {
            return frames;
        }
    }
}
