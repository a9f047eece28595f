// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Preview startup: install, spawn, readiness detection.
//!
//! Runs as a background task per preview. The entry in the pool is updated
//! through `(key, epoch)` so a replaced entry is never clobbered by the
//! startup task of its predecessor.

use crate::env::scrubbed_env;
use crate::kill::terminate_group;
use crate::manager::{Pools, SandboxConfig};
use crate::process::{PreviewKey, PreviewStatus};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Output lines that mean the dev server is serving requests.
const READY_SENTINELS: [&str; 3] = ["Ready in", "✓ Ready", "Local:"];

fn is_ready_line(line: &str) -> bool {
    READY_SENTINELS.iter().any(|s| line.contains(s))
}

pub(crate) struct StartupParams {
    pub key: PreviewKey,
    pub epoch: u64,
    pub port: u16,
    pub workspace_dir: PathBuf,
    pub config: SandboxConfig,
    pub pools: Arc<Mutex<Pools>>,
}

/// Install dependencies if needed, spawn the dev server, and watch its
/// output for a readiness sentinel.
pub(crate) async fn run_startup(params: StartupParams) {
    let StartupParams {
        key,
        epoch,
        port,
        workspace_dir,
        config,
        pools,
    } = params;

    let fail = |pools: &Arc<Mutex<Pools>>, message: String| {
        warn!(key = %key, message, "preview startup failed");
        pools.lock().update(&key, epoch, |e| {
            e.status = PreviewStatus::Error;
            e.error = Some(message.clone());
        });
    };

    if let Err(message) = ensure_manifest(&workspace_dir, config.template_dir.as_deref()) {
        fail(&pools, message);
        return;
    }

    if !workspace_dir.join("node_modules").exists() {
        info!(key = %key, "installing dependencies");
        match run_install(&config.install_command, &workspace_dir).await {
            Ok(()) => {}
            Err(message) => {
                fail(&pools, message);
                return;
            }
        }
    }

    pools.lock().update(&key, epoch, |e| {
        e.status = PreviewStatus::Starting;
    });

    let command = config.dev_command.replace("{port}", &port.to_string());
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(&command)
        .current_dir(&workspace_dir)
        .env_clear()
        .envs(scrubbed_env())
        .env("PORT", port.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            fail(&pools, format!("dev server spawn failed: {e}"));
            return;
        }
    };
    let pid = child.id();
    pools.lock().update(&key, epoch, |e| {
        e.pid = pid;
    });

    let (line_tx, mut line_rx) = mpsc::channel::<String>(64);
    if let Some(stdout) = child.stdout.take() {
        forward_lines(stdout, line_tx.clone());
    }
    if let Some(stderr) = child.stderr.take() {
        forward_lines(stderr, line_tx);
    }

    let deadline = tokio::time::Instant::now() + config.readiness_timeout;
    loop {
        tokio::select! {
            maybe_line = line_rx.recv() => {
                match maybe_line {
                    Some(line) if is_ready_line(&line) => {
                        info!(key = %key, port, "preview ready");
                        pools.lock().update(&key, epoch, |e| {
                            e.status = PreviewStatus::Ready;
                            e.error = None;
                        });
                        break;
                    }
                    Some(line) => {
                        debug!(key = %key, line, "dev server output");
                    }
                    None => {
                        let status = child.wait().await.ok();
                        fail(&pools, exit_message(status.and_then(|s| s.code())));
                        return;
                    }
                }
            }
            status = child.wait() => {
                fail(&pools, exit_message(status.ok().and_then(|s| s.code())));
                return;
            }
            _ = tokio::time::sleep_until(deadline) => {
                if let Some(pid) = pid {
                    terminate_group(pid);
                }
                fail(&pools, format!(
                    "dev server not ready after {}s",
                    config.readiness_timeout.as_secs()
                ));
                return;
            }
        }
    }

    // Ready. Keep waiting on the child so a crash flips the entry out of
    // `ready`; the forward tasks keep draining output either way.
    let pools = Arc::clone(&pools);
    tokio::spawn(async move {
        let status = child.wait().await.ok();
        let code = status.and_then(|s| s.code());
        pools.lock().update(&key, epoch, |e| {
            if e.status == PreviewStatus::Ready {
                match code {
                    Some(0) => e.status = PreviewStatus::Stopped,
                    _ => {
                        e.status = PreviewStatus::Error;
                        e.error = Some(exit_message(code));
                    }
                }
            }
        });
    });
}

fn exit_message(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("dev server exited with code {code}"),
        None => "dev server terminated by signal".to_string(),
    }
}

/// Copy a template into the workspace when no build manifest is present.
fn ensure_manifest(workspace: &Path, template: Option<&Path>) -> Result<(), String> {
    if workspace.join("package.json").exists() {
        return Ok(());
    }
    let Some(template) = template else {
        return Err("no package manifest".to_string());
    };
    info!(
        workspace = %workspace.display(),
        template = %template.display(),
        "workspace has no package manifest, seeding from template"
    );
    copy_template(template, workspace).map_err(|e| format!("template copy failed: {e}"))
}

fn copy_template(from: &Path, to: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(to)?;
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let name = entry.file_name();
        if name == "node_modules" {
            continue;
        }
        let dest = to.join(&name);
        if entry.file_type()?.is_dir() {
            copy_template(&entry.path(), &dest)?;
        } else if !dest.exists() {
            std::fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}

async fn run_install(install_command: &str, workspace: &Path) -> Result<(), String> {
    let output = Command::new("sh")
        .arg("-c")
        .arg(install_command)
        .current_dir(workspace)
        .env_clear()
        .envs(scrubbed_env())
        .output()
        .await
        .map_err(|e| format!("install spawn failed: {e}"))?;

    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let tail: String = stderr
        .lines()
        .rev()
        .take(10)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect::<Vec<_>>()
        .join("\n");
    Err(format!("install failed ({}): {}", output.status, tail))
}

/// Forward a stream's lines into the channel; keep draining after the
/// receiver is gone so the child never blocks on a full pipe.
fn forward_lines<R>(reader: R, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let _ = tx.try_send(line);
        }
    });
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;
