// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::process::PreviewStatus;
use std::time::Duration;
use tempfile::TempDir;

fn test_config(dev_command: &str) -> SandboxConfig {
    SandboxConfig {
        dev_command: dev_command.to_string(),
        install_command: "true".to_string(),
        template_dir: None,
        readiness_timeout: Duration::from_secs(10),
        historical_max: 2,
        current_ttl: Duration::from_secs(1800),
        historical_ttl: Duration::from_secs(600),
        reap_interval: Duration::from_secs(60),
    }
}

fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("package.json"), "{\"name\":\"app\"}").unwrap();
    std::fs::create_dir_all(dir.path().join("node_modules")).unwrap();
    dir
}

async fn wait_for<F>(mut probe: F, expected: PreviewStatus) -> PreviewInfo
where
    F: FnMut() -> PreviewInfo,
{
    for _ in 0..400 {
        let info = probe();
        if info.status == expected {
            return info;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("status never became {expected}");
}

#[tokio::test]
async fn current_preview_becomes_ready() {
    let manager = SandboxManager::new(test_config("echo '✓ Ready'; sleep 30"));
    let ws = workspace();
    let project = ProjectId::new("p1");

    let info = manager.start_current(&project, ws.path()).unwrap();
    assert_eq!(info.status, PreviewStatus::Installing);
    assert!(info.preview_url.is_none());

    let ready = wait_for(|| manager.current_status(&project), PreviewStatus::Ready).await;
    let url = ready.preview_url.unwrap();
    assert!(url.starts_with("http://127.0.0.1:"), "got {url}");

    manager.stop_all();
}

#[tokio::test]
async fn starting_a_live_preview_returns_the_same_url() {
    let manager = SandboxManager::new(test_config("echo 'Ready in 100ms'; sleep 30"));
    let ws = workspace();
    let project = ProjectId::new("p1");

    manager.start_current(&project, ws.path()).unwrap();
    let first = wait_for(|| manager.current_status(&project), PreviewStatus::Ready).await;

    let again = manager.start_current(&project, ws.path()).unwrap();
    assert_eq!(again.status, PreviewStatus::Ready);
    assert_eq!(again.preview_url, first.preview_url);

    manager.stop_all();
}

#[tokio::test]
async fn early_exit_marks_entry_error() {
    let manager = SandboxManager::new(test_config("exit 7"));
    let ws = workspace();
    let project = ProjectId::new("p1");

    manager.start_current(&project, ws.path()).unwrap();
    let info = wait_for(|| manager.current_status(&project), PreviewStatus::Error).await;
    assert!(
        info.error.as_deref().unwrap_or_default().contains("code 7"),
        "got {:?}",
        info.error
    );

    manager.stop_all();
}

#[tokio::test]
async fn error_entry_is_replaced_by_next_start() {
    let manager = SandboxManager::new(test_config("exit 1"));
    let ws = workspace();
    let project = ProjectId::new("p1");

    manager.start_current(&project, ws.path()).unwrap();
    wait_for(|| manager.current_status(&project), PreviewStatus::Error).await;

    // The replacement begins a fresh lifecycle.
    let info = manager.start_current(&project, ws.path()).unwrap();
    assert_eq!(info.status, PreviewStatus::Installing);

    manager.stop_all();
}

#[tokio::test]
async fn missing_manifest_without_template_errors() {
    let manager = SandboxManager::new(test_config("echo Local:; sleep 30"));
    let dir = TempDir::new().unwrap(); // no package.json
    let project = ProjectId::new("p1");

    manager.start_current(&project, dir.path()).unwrap();
    let info = wait_for(|| manager.current_status(&project), PreviewStatus::Error).await;
    assert_eq!(info.error.as_deref(), Some("no package manifest"));

    manager.stop_all();
}

#[tokio::test]
async fn install_failure_errors_the_entry() {
    let mut config = test_config("echo Local:; sleep 30");
    config.install_command = "echo 'npm ERR! boom' >&2; exit 1".to_string();
    let manager = SandboxManager::new(config);

    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("package.json"), "{}").unwrap();
    // No node_modules, so install runs and fails.
    let project = ProjectId::new("p1");

    manager.start_current(&project, dir.path()).unwrap();
    let info = wait_for(|| manager.current_status(&project), PreviewStatus::Error).await;
    assert!(
        info.error.as_deref().unwrap_or_default().contains("boom"),
        "got {:?}",
        info.error
    );

    manager.stop_all();
}

#[tokio::test]
async fn readiness_timeout_errors_the_entry() {
    let mut config = test_config("sleep 30");
    config.readiness_timeout = Duration::from_millis(300);
    let manager = SandboxManager::new(config);
    let ws = workspace();
    let project = ProjectId::new("p1");

    manager.start_current(&project, ws.path()).unwrap();
    let info = wait_for(|| manager.current_status(&project), PreviewStatus::Error).await;
    assert!(
        info.error.as_deref().unwrap_or_default().contains("not ready"),
        "got {:?}",
        info.error
    );

    manager.stop_all();
}

#[tokio::test]
async fn unknown_keys_report_stopped() {
    let manager = SandboxManager::new(test_config("true"));
    let project = ProjectId::new("ghost");
    assert_eq!(
        manager.current_status(&project).status,
        PreviewStatus::Stopped
    );
    assert_eq!(
        manager.historical_status(&project, 3).status,
        PreviewStatus::Stopped
    );
}

#[tokio::test]
async fn stop_removes_the_entry() {
    let manager = SandboxManager::new(test_config("echo Local:; sleep 30"));
    let ws = workspace();
    let project = ProjectId::new("p1");

    manager.start_current(&project, ws.path()).unwrap();
    wait_for(|| manager.current_status(&project), PreviewStatus::Ready).await;

    manager.stop_current(&project);
    assert_eq!(
        manager.current_status(&project).status,
        PreviewStatus::Stopped
    );

    manager.stop_all();
}

#[tokio::test]
async fn historical_pool_evicts_least_recently_used() {
    let manager = SandboxManager::new(test_config("echo Local:; sleep 30"));
    let ws = workspace();
    let project = ProjectId::new("p1");

    for iteration in 0..2 {
        manager
            .start_historical(&project, iteration, ws.path())
            .unwrap();
        wait_for(
            || manager.historical_status(&project, iteration),
            PreviewStatus::Ready,
        )
        .await;
    }
    assert_eq!(manager.live_historical_count(), 2);

    // Touch iteration 1 so iteration 0 is the LRU victim.
    manager.historical_status(&project, 1);
    manager.start_historical(&project, 2, ws.path()).unwrap();
    wait_for(
        || manager.historical_status(&project, 2),
        PreviewStatus::Ready,
    )
    .await;

    assert_eq!(
        manager.historical_status(&project, 0).status,
        PreviewStatus::Stopped
    );
    assert_eq!(
        manager.historical_status(&project, 1).status,
        PreviewStatus::Ready
    );
    assert_eq!(
        manager.historical_status(&project, 2).status,
        PreviewStatus::Ready
    );
    assert_eq!(manager.live_historical_count(), 2);

    manager.stop_all();
}

#[tokio::test]
async fn reaper_removes_idle_ready_previews() {
    let mut config = test_config("echo Local:; sleep 30");
    config.current_ttl = Duration::from_millis(100);
    config.reap_interval = Duration::from_millis(50);
    let manager = SandboxManager::new(config);
    let ws = workspace();
    let project = ProjectId::new("p1");

    manager.start_current(&project, ws.path()).unwrap();
    wait_for(|| manager.current_status(&project), PreviewStatus::Ready).await;
    manager.spawn_reaper();

    // Stop touching the entry and let it idle past its TTL.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(
        manager.current_status(&project).status,
        PreviewStatus::Stopped
    );

    manager.stop_all();
}

#[tokio::test]
async fn stop_all_clears_every_pool() {
    let manager = SandboxManager::new(test_config("echo Local:; sleep 30"));
    let ws = workspace();
    let project = ProjectId::new("p1");

    manager.start_current(&project, ws.path()).unwrap();
    manager.start_historical(&project, 0, ws.path()).unwrap();
    manager.stop_all();

    assert_eq!(
        manager.current_status(&project).status,
        PreviewStatus::Stopped
    );
    assert_eq!(
        manager.historical_status(&project, 0).status,
        PreviewStatus::Stopped
    );
    assert_eq!(manager.live_historical_count(), 0);
}
