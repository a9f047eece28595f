// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Preview process records and status snapshots.

use pf_core::ProjectId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Lifecycle status of a preview dev-server process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewStatus {
    Installing,
    Starting,
    Ready,
    Stopped,
    Error,
}

impl PreviewStatus {
    /// Terminal entries are replaced by the next `start` call.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PreviewStatus::Stopped | PreviewStatus::Error)
    }
}

impl fmt::Display for PreviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreviewStatus::Installing => write!(f, "installing"),
            PreviewStatus::Starting => write!(f, "starting"),
            PreviewStatus::Ready => write!(f, "ready"),
            PreviewStatus::Stopped => write!(f, "stopped"),
            PreviewStatus::Error => write!(f, "error"),
        }
    }
}

/// Point-in-time view of a preview, safe to hand to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    pub status: PreviewStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PreviewInfo {
    /// Snapshot for a key with no tracked process.
    pub fn stopped() -> Self {
        Self {
            preview_url: None,
            status: PreviewStatus::Stopped,
            error: None,
        }
    }
}

/// Which pool an entry lives in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum PreviewKey {
    Current(ProjectId),
    Historical(ProjectId, u32),
}

impl fmt::Display for PreviewKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreviewKey::Current(p) => write!(f, "{p}/current"),
            PreviewKey::Historical(p, i) => write!(f, "{p}/iter-{i}"),
        }
    }
}

/// One tracked dev-server subprocess.
#[derive(Debug)]
pub(crate) struct PreviewEntry {
    pub port: u16,
    pub status: PreviewStatus,
    pub error: Option<String>,
    /// Child pid; also the process group id (spawned with `process_group(0)`).
    pub pid: Option<u32>,
    /// Distinguishes a restarted entry from the startup task of its
    /// predecessor.
    pub epoch: u64,
    pub started_at: Instant,
    pub last_accessed: Instant,
}

impl PreviewEntry {
    pub fn new(port: u16, epoch: u64) -> Self {
        let now = Instant::now();
        Self {
            port,
            status: PreviewStatus::Installing,
            error: None,
            pid: None,
            epoch,
            started_at: now,
            last_accessed: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_accessed = Instant::now();
    }

    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn info(&self) -> PreviewInfo {
        PreviewInfo {
            preview_url: (self.status == PreviewStatus::Ready).then(|| self.url()),
            status: self.status,
            error: self.error.clone(),
        }
    }
}
