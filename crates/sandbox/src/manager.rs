// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Preview pools and their lifecycle.
//!
//! Two keyed pools: one `current` preview per project (serving the live
//! workspace) and a bounded pool of `historical` previews (serving extracted
//! snapshots). The manager is the only mutator of the pools; every map
//! operation happens under one mutex, so pool invariants hold atomically.

use crate::env;
use crate::kill::terminate_group;
use crate::process::{PreviewEntry, PreviewInfo, PreviewKey, PreviewStatus};
use crate::startup::{run_startup, StartupParams};
use parking_lot::Mutex;
use pf_core::ProjectId;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Errors from sandbox operations
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("port allocation failed: {0}")]
    PortAllocation(#[from] std::io::Error),
}

/// Sandbox tunables.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Dev-server command; `{port}` is substituted before spawning.
    pub dev_command: String,
    /// Dependency install command, run when `node_modules` is absent.
    pub install_command: String,
    /// Template copied into workspaces missing a package manifest.
    pub template_dir: Option<PathBuf>,
    pub readiness_timeout: Duration,
    /// Cap on live historical previews across all projects.
    pub historical_max: usize,
    pub current_ttl: Duration,
    pub historical_ttl: Duration,
    pub reap_interval: Duration,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            dev_command: "npm run dev -- --port {port}".to_string(),
            install_command: "npm install".to_string(),
            template_dir: env::template_dir(),
            readiness_timeout: env::readiness_timeout()
                .unwrap_or(Duration::from_secs(120)),
            historical_max: env::historical_max().unwrap_or(2),
            current_ttl: Duration::from_secs(30 * 60),
            historical_ttl: Duration::from_secs(10 * 60),
            reap_interval: Duration::from_secs(60),
        }
    }
}

/// The two preview pools. All access goes through the manager's mutex.
#[derive(Default)]
pub(crate) struct Pools {
    pub current: HashMap<ProjectId, PreviewEntry>,
    pub historical: HashMap<(ProjectId, u32), PreviewEntry>,
    next_epoch: u64,
}

impl Pools {
    fn next_epoch(&mut self) -> u64 {
        self.next_epoch += 1;
        self.next_epoch
    }

    fn get(&self, key: &PreviewKey) -> Option<&PreviewEntry> {
        match key {
            PreviewKey::Current(p) => self.current.get(p),
            PreviewKey::Historical(p, i) => self.historical.get(&(p.clone(), *i)),
        }
    }

    fn get_mut(&mut self, key: &PreviewKey) -> Option<&mut PreviewEntry> {
        match key {
            PreviewKey::Current(p) => self.current.get_mut(p),
            PreviewKey::Historical(p, i) => self.historical.get_mut(&(p.clone(), *i)),
        }
    }

    fn insert(&mut self, key: PreviewKey, entry: PreviewEntry) {
        match key {
            PreviewKey::Current(p) => {
                self.current.insert(p, entry);
            }
            PreviewKey::Historical(p, i) => {
                self.historical.insert((p, i), entry);
            }
        }
    }

    fn remove(&mut self, key: &PreviewKey) -> Option<PreviewEntry> {
        match key {
            PreviewKey::Current(p) => self.current.remove(p),
            PreviewKey::Historical(p, i) => self.historical.remove(&(p.clone(), *i)),
        }
    }

    /// Mutate an entry only if it is still the generation the caller knows.
    pub fn update(&mut self, key: &PreviewKey, epoch: u64, f: impl FnOnce(&mut PreviewEntry)) {
        if let Some(entry) = self.get_mut(key) {
            if entry.epoch == epoch {
                f(entry);
            }
        }
    }
}

/// Owner of all preview subprocesses.
#[derive(Clone)]
pub struct SandboxManager {
    pools: Arc<Mutex<Pools>>,
    config: SandboxConfig,
    reaper_cancel: CancellationToken,
}

impl SandboxManager {
    pub fn new(config: SandboxConfig) -> Self {
        Self {
            pools: Arc::new(Mutex::new(Pools::default())),
            config,
            reaper_cancel: CancellationToken::new(),
        }
    }

    /// Start (or return) the current preview for a project.
    ///
    /// A live entry is returned untouched with its access time refreshed;
    /// terminal entries are replaced by a fresh startup.
    pub fn start_current(
        &self,
        project: &ProjectId,
        workspace_dir: &Path,
    ) -> Result<PreviewInfo, SandboxError> {
        self.start(PreviewKey::Current(project.clone()), workspace_dir)
    }

    /// Start (or return) a historical preview for an iteration.
    ///
    /// Evicts least-recently-accessed live historical previews until the
    /// pool is under its cap before inserting.
    pub fn start_historical(
        &self,
        project: &ProjectId,
        iteration: u32,
        runtime_dir: &Path,
    ) -> Result<PreviewInfo, SandboxError> {
        self.evict_historical_over_cap();
        self.start(
            PreviewKey::Historical(project.clone(), iteration),
            runtime_dir,
        )
    }

    fn start(&self, key: PreviewKey, workspace_dir: &Path) -> Result<PreviewInfo, SandboxError> {
        let (info, startup) = {
            let mut pools = self.pools.lock();
            if let Some(entry) = pools.get_mut(&key) {
                if !entry.status.is_terminal() {
                    entry.touch();
                    return Ok(entry.info());
                }
            }

            let port = alloc_port()?;
            let epoch = pools.next_epoch();
            let entry = PreviewEntry::new(port, epoch);
            let info = entry.info();
            pools.insert(key.clone(), entry);

            let params = StartupParams {
                key,
                epoch,
                port,
                workspace_dir: workspace_dir.to_path_buf(),
                config: self.config.clone(),
                pools: Arc::clone(&self.pools),
            };
            (info, params)
        };

        tokio::spawn(run_startup(startup));
        Ok(info)
    }

    /// Status of the current preview; refreshes its access time.
    pub fn current_status(&self, project: &ProjectId) -> PreviewInfo {
        self.status(&PreviewKey::Current(project.clone()))
    }

    /// Status of a historical preview; refreshes its access time.
    pub fn historical_status(&self, project: &ProjectId, iteration: u32) -> PreviewInfo {
        self.status(&PreviewKey::Historical(project.clone(), iteration))
    }

    fn status(&self, key: &PreviewKey) -> PreviewInfo {
        let mut pools = self.pools.lock();
        match pools.get_mut(key) {
            Some(entry) => {
                entry.touch();
                entry.info()
            }
            None => PreviewInfo::stopped(),
        }
    }

    /// Best-effort stop of the current preview.
    pub fn stop_current(&self, project: &ProjectId) {
        self.stop(&PreviewKey::Current(project.clone()));
    }

    /// Best-effort stop of a historical preview.
    pub fn stop_historical(&self, project: &ProjectId, iteration: u32) {
        self.stop(&PreviewKey::Historical(project.clone(), iteration));
    }

    fn stop(&self, key: &PreviewKey) {
        let entry = self.pools.lock().remove(key);
        if let Some(entry) = entry {
            info!(key = %key, "stopping preview");
            if let Some(pid) = entry.pid {
                terminate_group(pid);
            }
        }
    }

    /// Kill every tracked process and disable the reaper. Called on
    /// shutdown.
    pub fn stop_all(&self) {
        self.reaper_cancel.cancel();
        let mut guard = self.pools.lock();
        let pools = &mut *guard;
        let entries: Vec<PreviewEntry> = pools
            .current
            .drain()
            .map(|(_, e)| e)
            .chain(pools.historical.drain().map(|(_, e)| e))
            .collect();
        drop(guard);

        info!(count = entries.len(), "stopping all previews");
        for entry in entries {
            if let Some(pid) = entry.pid {
                terminate_group(pid);
            }
        }
    }

    /// Spawn the idle reaper. Ready previews idle past their TTL are
    /// killed and removed.
    pub fn spawn_reaper(&self) {
        let manager = self.clone();
        let cancel = self.reaper_cancel.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(manager.config.reap_interval);
            interval.tick().await; // first tick fires immediately, skip it
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => manager.reap_idle(),
                }
            }
        });
    }

    fn reap_idle(&self) {
        let mut victims: Vec<(PreviewKey, Option<u32>)> = Vec::new();
        {
            let mut pools = self.pools.lock();
            let current_ttl = self.config.current_ttl;
            let historical_ttl = self.config.historical_ttl;

            pools.current.retain(|project, entry| {
                let idle = entry.last_accessed.elapsed();
                if entry.status == PreviewStatus::Ready && idle > current_ttl {
                    victims.push((PreviewKey::Current(project.clone()), entry.pid));
                    false
                } else {
                    true
                }
            });
            pools.historical.retain(|(project, iteration), entry| {
                let idle = entry.last_accessed.elapsed();
                if entry.status == PreviewStatus::Ready && idle > historical_ttl {
                    victims.push((
                        PreviewKey::Historical(project.clone(), *iteration),
                        entry.pid,
                    ));
                    false
                } else {
                    true
                }
            });
        }

        for (key, pid) in victims {
            debug!(key = %key, "reaping idle preview");
            if let Some(pid) = pid {
                terminate_group(pid);
            }
        }
    }

    fn evict_historical_over_cap(&self) {
        loop {
            let victim = {
                let mut pools = self.pools.lock();
                let live = pools
                    .historical
                    .iter()
                    .filter(|(_, e)| !e.status.is_terminal())
                    .count();
                if live < self.config.historical_max {
                    return;
                }
                let oldest = pools
                    .historical
                    .iter()
                    .filter(|(_, e)| !e.status.is_terminal())
                    .min_by_key(|(_, e)| e.last_accessed)
                    .map(|(k, _)| k.clone());
                match oldest {
                    Some(key) => pools
                        .historical
                        .remove(&key)
                        .map(|entry| (key, entry.pid)),
                    None => return,
                }
            };

            if let Some(((project, iteration), pid)) = victim {
                info!(%project, iteration, "evicting least-recently-used historical preview");
                if let Some(pid) = pid {
                    terminate_group(pid);
                }
            }
        }
    }

    /// Count of live (non-terminal) historical previews.
    pub fn live_historical_count(&self) -> usize {
        self.pools
            .lock()
            .historical
            .values()
            .filter(|e| !e.status.is_terminal())
            .count()
    }
}

/// Allocate a free TCP port via OS ephemeral assignment.
fn alloc_port() -> std::io::Result<u16> {
    let listener = std::net::TcpListener::bind(("127.0.0.1", 0))?;
    Ok(listener.local_addr()?.port())
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
