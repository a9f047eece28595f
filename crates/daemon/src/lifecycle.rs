// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: configuration, startup, shutdown.

use crate::runs::RunSupervisor;
use pf_adapters::{CliBrowserProbe, CliCodegenProvider, CliScoringProvider};
use pf_engine::TraceBus;
use pf_sandbox::{SandboxConfig, SandboxManager};
use pf_storage::ProjectLayout;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::net::UnixListener;

use fs2::FileExt;
use tracing::info;

/// Run supervisor with the daemon's concrete provider types
pub type DaemonSupervisor =
    RunSupervisor<CliCodegenProvider, CliScoringProvider, CliBrowserProbe>;

/// Errors from daemon lifecycle operations
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not determine a state directory")]
    NoStateDir,
    #[error("failed to acquire daemon lock: {0}")]
    LockFailed(String),
    #[error("provider command not configured: {0}")]
    MissingProvider(&'static str),
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (e.g. ~/.local/state/pixelforge)
    pub state_dir: PathBuf,
    /// Path to Unix socket
    pub socket_path: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to daemon log file
    pub log_path: PathBuf,
    /// Storage root for projects, packs, and snapshots
    pub storage_dir: PathBuf,
    /// Code-gen provider command (`PF_CODEGEN_CMD`)
    pub codegen_command: String,
    /// Scoring provider command (`PF_SCORING_CMD`)
    pub scoring_command: String,
    /// Headless capture command (`PF_BROWSER_CMD`)
    pub browser_command: String,
}

impl Config {
    /// Load configuration for the user-level daemon.
    ///
    /// Uses fixed paths under `$PF_STATE_DIR` (default
    /// `~/.local/state/pixelforge`). One daemon serves all projects for a
    /// user.
    pub fn load() -> Result<Self, LifecycleError> {
        let state_dir = state_dir()?;
        let provider = |var: &'static str| {
            std::env::var(var).map_err(|_| LifecycleError::MissingProvider(var))
        };

        Ok(Self {
            socket_path: state_dir.join("daemon.sock"),
            lock_path: state_dir.join("daemon.pid"),
            log_path: state_dir.join("daemon.log"),
            storage_dir: state_dir.join("storage"),
            codegen_command: provider("PF_CODEGEN_CMD")?,
            scoring_command: provider("PF_SCORING_CMD")?,
            browser_command: provider("PF_BROWSER_CMD")?,
            state_dir,
        })
    }
}

fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("PF_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::state_dir()
        .or_else(dirs::home_dir)
        .map(|d| d.join("pixelforge"))
        .ok_or(LifecycleError::NoStateDir)
}

/// Daemon state during operation.
pub struct DaemonState {
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub supervisor: Arc<DaemonSupervisor>,
    pub sandbox: SandboxManager,
    pub layout: ProjectLayout,
    pub bus: TraceBus,
    pub start_time: Instant,
}

/// Result of daemon startup.
pub struct StartupResult {
    pub daemon: DaemonState,
    /// The Unix socket listener to hand to the Listener task
    pub listener: UnixListener,
}

/// Acquire the daemon lock, bind the socket, and assemble the runtime.
pub fn startup(config: &Config) -> Result<StartupResult, LifecycleError> {
    std::fs::create_dir_all(&config.state_dir)?;
    std::fs::create_dir_all(&config.storage_dir)?;

    // Exclusive pid-file lock: exactly one daemon per state dir.
    let lock_file = File::create(&config.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(|e| LifecycleError::LockFailed(e.to_string()))?;
    std::fs::write(&config.lock_path, format!("{}\n", std::process::id()))?;

    // A previous daemon may have left its socket behind.
    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let listener = UnixListener::bind(&config.socket_path)?;

    let layout = ProjectLayout::new(&config.storage_dir);
    let bus = TraceBus::new();
    let sandbox = SandboxManager::new(SandboxConfig::default());
    sandbox.spawn_reaper();

    let supervisor = Arc::new(RunSupervisor::new(
        CliCodegenProvider::new("sh", vec!["-c".into(), config.codegen_command.clone()]),
        CliScoringProvider::new("sh", vec!["-c".into(), config.scoring_command.clone()]),
        CliBrowserProbe::new(&config.browser_command),
        sandbox.clone(),
        layout.clone(),
        bus.clone(),
    ));

    info!(socket = %config.socket_path.display(), "daemon assembled");

    Ok(StartupResult {
        daemon: DaemonState {
            config: config.clone(),
            lock_file,
            supervisor,
            sandbox,
            layout,
            bus,
            start_time: Instant::now(),
        },
        listener,
    })
}

impl DaemonState {
    /// Graceful shutdown: stop runs, kill previews, remove the socket.
    pub fn shutdown(&self) {
        info!("shutting down");
        self.supervisor.stop_all();
        self.sandbox.stop_all();
        let _ = std::fs::remove_file(&self.config.socket_path);
        let _ = std::fs::remove_file(&self.config.lock_path);
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
