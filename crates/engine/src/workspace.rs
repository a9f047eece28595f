// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace file writes.

use pf_adapters::GeneratedFile;
use std::fs;
use std::io::Write;
use std::path::Path;

/// A file written to the workspace, with its size for artifact events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFile {
    pub path: String,
    pub bytes: u64,
}

/// Write generated files relative to the workspace, atomically per file
/// (write to `.tmp`, then rename). Paths were vetted by the response parser.
pub fn write_generated_files(
    workspace: &Path,
    files: &[GeneratedFile],
) -> std::io::Result<Vec<WrittenFile>> {
    let mut written = Vec::with_capacity(files.len());
    for file in files {
        let dest = workspace.join(&file.path);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp = dest.with_extension(match dest.extension() {
            Some(ext) => format!("{}.tmp", ext.to_string_lossy()),
            None => "tmp".to_string(),
        });
        {
            let mut f = fs::File::create(&tmp)?;
            f.write_all(file.contents.as_bytes())?;
            f.flush()?;
        }
        fs::rename(&tmp, &dest)?;

        written.push(WrittenFile {
            path: file.path.clone(),
            bytes: file.contents.len() as u64,
        });
    }
    Ok(written)
}

/// Current workspace sources under `src/`, for prompt context. Returns
/// `(relative path, contents)` pairs sorted by path; unreadable or binary
/// files are skipped.
pub fn read_workspace_sources(workspace: &Path) -> Vec<(String, String)> {
    let mut sources = Vec::new();
    collect_sources(workspace, Path::new("src"), &mut sources);
    sources.sort_by(|a, b| a.0.cmp(&b.0));
    sources
}

fn collect_sources(workspace: &Path, rel: &Path, out: &mut Vec<(String, String)>) {
    let dir = workspace.join(rel);
    let Ok(entries) = fs::read_dir(&dir) else {
        return;
    };
    for entry in entries.flatten() {
        let rel_path = rel.join(entry.file_name());
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            collect_sources(workspace, &rel_path, out);
        } else if file_type.is_file() {
            if let Ok(contents) = fs::read_to_string(entry.path()) {
                out.push((rel_path.to_string_lossy().into_owned(), contents));
            }
        }
    }
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
