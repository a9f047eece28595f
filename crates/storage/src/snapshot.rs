// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-iteration workspace snapshots.
//!
//! A snapshot is a gzipped tar of the workspace with dependency and build
//! directories excluded, plus a JSON sidecar carrying the iteration index and
//! timestamp. Snapshots back two features: rolling the workspace back after a
//! rejected iteration, and serving historical previews from an extracted
//! copy under `runtime/iter-<n>/`.

use crate::layout::ProjectLayout;
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use pf_core::ProjectId;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Directory holding installed dependencies. Never archived, never replaced
/// by a restore: reinstalling after every rollback would dominate run time.
pub const DEPS_DIR: &str = "node_modules";

/// Directories excluded from archives (dependencies and build caches).
pub const EXCLUDED_DIRS: [&str; 4] = [DEPS_DIR, ".next", "dist", ".turbo"];

/// Errors from snapshot operations
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no snapshot archive for iteration {iteration}")]
    MissingArchive { iteration: u32 },
}

/// Sidecar metadata written next to each archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMeta {
    pub iteration: u32,
    pub created_at: DateTime<Utc>,
    pub archive_path: PathBuf,
}

/// Filesystem-backed snapshot store.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    layout: ProjectLayout,
}

impl SnapshotStore {
    pub fn new(layout: ProjectLayout) -> Self {
        Self { layout }
    }

    /// Archive the workspace for an iteration.
    ///
    /// Idempotent: when an archive for the iteration already exists its
    /// metadata is returned untouched.
    pub fn create(
        &self,
        project: &ProjectId,
        iteration: u32,
        workspace_dir: &Path,
    ) -> Result<SnapshotMeta, SnapshotError> {
        let archive_path = self.layout.archive_path(project, iteration);
        let meta_path = self.layout.snapshot_meta_path(project, iteration);

        if archive_path.exists() {
            if let Ok(meta) = read_meta(&meta_path) {
                return Ok(meta);
            }
        }

        if let Some(parent) = archive_path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write to .tmp, then rename, so a crash never leaves a truncated
        // archive behind a valid-looking name.
        let tmp_path = archive_path.with_extension("tmp");
        {
            let file = File::create(&tmp_path)?;
            let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
            let mut builder = tar::Builder::new(encoder);
            append_dir_filtered(&mut builder, workspace_dir, Path::new(""))?;
            let encoder = builder.into_inner()?;
            let writer = encoder.finish()?;
            writer.into_inner().map_err(|e| e.into_error())?.sync_all()?;
        }
        fs::rename(&tmp_path, &archive_path)?;

        let meta = SnapshotMeta {
            iteration,
            created_at: Utc::now(),
            archive_path: archive_path.clone(),
        };
        write_meta_atomic(&meta_path, &meta)?;
        Ok(meta)
    }

    /// Extract an iteration's archive into its runtime directory.
    ///
    /// Idempotent: an already-extracted runtime workspace is returned as-is.
    pub fn extract(
        &self,
        project: &ProjectId,
        iteration: u32,
    ) -> Result<PathBuf, SnapshotError> {
        let runtime_ws = self.layout.runtime_workspace_dir(project, iteration);
        if runtime_ws.exists() {
            return Ok(runtime_ws);
        }

        let archive_path = self.layout.archive_path(project, iteration);
        if !archive_path.exists() {
            return Err(SnapshotError::MissingArchive { iteration });
        }

        fs::create_dir_all(&runtime_ws)?;
        let file = File::open(&archive_path)?;
        let decoder = GzDecoder::new(BufReader::new(file));
        let mut archive = tar::Archive::new(decoder);
        archive.unpack(&runtime_ws)?;
        Ok(runtime_ws)
    }

    /// Metadata for every snapshot, sorted by iteration ascending.
    ///
    /// Corrupt sidecar files are skipped with a warning; a single bad file
    /// must not hide the rest of the history.
    pub fn list(&self, project: &ProjectId) -> Result<Vec<SnapshotMeta>, SnapshotError> {
        let dir = self.layout.snapshots_dir(project);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut metas = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension() != Some(OsStr::new("json")) {
                continue;
            }
            match read_meta(&path) {
                Ok(meta) => metas.push(meta),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping corrupt snapshot metadata");
                }
            }
        }
        metas.sort_by_key(|m| m.iteration);
        Ok(metas)
    }

    /// Whether an archive exists for the iteration.
    pub fn has(&self, project: &ProjectId, iteration: u32) -> bool {
        self.layout.archive_path(project, iteration).exists()
    }

    /// Roll the workspace back to an iteration's snapshot.
    ///
    /// Extracts (idempotently), then replaces every workspace entry except
    /// the dependency directory with the extracted contents.
    pub fn restore(
        &self,
        project: &ProjectId,
        iteration: u32,
        workspace_dir: &Path,
    ) -> Result<(), SnapshotError> {
        let extracted = self.extract(project, iteration)?;

        fs::create_dir_all(workspace_dir)?;

        // Clear current workspace contents, keeping dependencies in place.
        for entry in fs::read_dir(workspace_dir)? {
            let entry = entry?;
            if entry.file_name() == DEPS_DIR {
                continue;
            }
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                fs::remove_dir_all(&path)?;
            } else {
                fs::remove_file(&path)?;
            }
        }

        // Copy snapshot contents over. Archives never contain the dependency
        // directory, but guard anyway so restore can never clobber it.
        for entry in fs::read_dir(&extracted)? {
            let entry = entry?;
            if entry.file_name() == DEPS_DIR {
                continue;
            }
            copy_recursive(&entry.path(), &workspace_dir.join(entry.file_name()))?;
        }

        Ok(())
    }

    /// Remove an iteration's extracted runtime directory.
    pub fn cleanup(&self, project: &ProjectId, iteration: u32) -> Result<(), SnapshotError> {
        let runtime_dir = self.layout.runtime_dir(project, iteration);
        if runtime_dir.exists() {
            fs::remove_dir_all(&runtime_dir)?;
        }
        Ok(())
    }
}

fn read_meta(path: &Path) -> Result<SnapshotMeta, SnapshotError> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Save metadata atomically (write to .tmp, then rename).
fn write_meta_atomic(path: &Path, meta: &SnapshotMeta) -> Result<(), SnapshotError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("json.tmp");
    {
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, meta)?;
        writer.flush()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Append a directory tree to the archive, skipping excluded directories at
/// any depth. Symlinks are not archived.
fn append_dir_filtered<W: Write>(
    builder: &mut tar::Builder<W>,
    workspace: &Path,
    rel: &Path,
) -> std::io::Result<()> {
    let dir = workspace.join(rel);
    let mut entries: Vec<_> = fs::read_dir(&dir)?.collect::<Result<_, _>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let name = entry.file_name();
        let rel_path = rel.join(&name);
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            if EXCLUDED_DIRS.iter().any(|ex| name == OsStr::new(ex)) {
                continue;
            }
            builder.append_dir(&rel_path, entry.path())?;
            append_dir_filtered(builder, workspace, &rel_path)?;
        } else if file_type.is_file() {
            builder.append_path_with_name(entry.path(), &rel_path)?;
        }
    }
    Ok(())
}

fn copy_recursive(from: &Path, to: &Path) -> std::io::Result<()> {
    if from.is_dir() {
        fs::create_dir_all(to)?;
        for entry in fs::read_dir(from)? {
            let entry = entry?;
            copy_recursive(&entry.path(), &to.join(entry.file_name()))?;
        }
    } else {
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(from, to)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
