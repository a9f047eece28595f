// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Code-generation provider.
//!
//! The provider is handed opaque prompt text and returns a single text blob
//! expected to contain one `<files>` block wrapping `<file path="...">`
//! children. Parsing, code-fence stripping, and path safety live here so the
//! orchestrator only ever sees vetted `GeneratedFile`s.

use crate::subprocess::{stderr_tail, CODEGEN_TIMEOUT};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Errors from code-generation calls
#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("codegen provider spawn failed: {0}")]
    SpawnFailed(String),
    #[error("codegen provider failed: {0}")]
    Failed(String),
    #[error("codegen call cancelled")]
    Cancelled,
}

/// One file parsed out of a provider response, path already normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    /// Workspace-relative path, always under `src/`.
    pub path: String,
    pub contents: String,
}

/// Provider of generated page code.
#[async_trait]
pub trait CodegenProvider: Clone + Send + Sync + 'static {
    /// Invoke the provider with prompt text, returning its raw response.
    ///
    /// Implementations must honor `cancel`: when it trips, abandon the call
    /// and return [`CodegenError::Cancelled`].
    async fn generate(
        &self,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String, CodegenError>;
}

/// Parse a provider response into vetted files.
///
/// Paths containing `..` or starting with `/` are dropped with a warning;
/// everything else is normalized under `src/`. An empty result is the
/// caller's problem (it fails the iteration).
pub fn parse_generated_files(response: &str) -> Vec<GeneratedFile> {
    let Some(block) = extract_between(response, "<files>", "</files>") else {
        return Vec::new();
    };

    let mut files = Vec::new();
    let mut rest = block;
    while let Some(start) = rest.find("<file ") {
        let after = &rest[start..];
        let Some(tag_end) = after.find('>') else { break };
        let tag = &after[..tag_end];
        let body_start = tag_end + 1;
        let Some(close) = after[body_start..].find("</file>") else {
            break;
        };
        let body = &after[body_start..body_start + close];
        rest = &after[body_start + close + "</file>".len()..];

        let Some(raw_path) = extract_attr(tag, "path") else {
            warn!("file tag without path attribute, skipping");
            continue;
        };
        match normalize_path(raw_path) {
            Some(path) => files.push(GeneratedFile {
                path,
                contents: strip_code_fences(body),
            }),
            None => warn!(path = raw_path, "rejecting unsafe generated path"),
        }
    }
    files
}

fn extract_between<'a>(text: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let start = text.find(open)? + open.len();
    let end = text[start..].find(close)? + start;
    Some(&text[start..end])
}

fn extract_attr<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    let marker = format!("{name}=\"");
    let start = tag.find(&marker)? + marker.len();
    let end = tag[start..].find('"')? + start;
    Some(&tag[start..end])
}

/// Validate and normalize a workspace-relative path under `src/`.
fn normalize_path(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with('/') {
        return None;
    }
    if trimmed.split(['/', '\\']).any(|seg| seg == "..") {
        return None;
    }
    if trimmed == "src" || trimmed.starts_with("src/") {
        Some(trimmed.to_string())
    } else {
        Some(format!("src/{trimmed}"))
    }
}

/// Strip a wrapping markdown code fence, if present.
fn strip_code_fences(body: &str) -> String {
    let trimmed = body.trim_matches(|c| c == '\n' || c == '\r');
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let without_open = match trimmed.find('\n') {
        Some(idx) => &trimmed[idx + 1..],
        None => return String::new(),
    };
    let without_close = without_open
        .trim_end()
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim_end_matches(|c| c == '\n' || c == '\r');
    without_close.to_string()
}

/// Code-gen provider that shells out to a configured command.
///
/// The prompt is written on stdin; the response is read from stdout. The
/// child is killed when the cancellation token trips or the timeout elapses.
#[derive(Clone)]
pub struct CliCodegenProvider {
    command: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CliCodegenProvider {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            timeout: CODEGEN_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(&self, prompt: &str) -> Result<String, CodegenError> {
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CodegenError::SpawnFailed(e.to_string()))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .map_err(|e| CodegenError::Failed(format!("writing prompt: {e}")))?;
            // Drop closes the pipe so the provider sees EOF.
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| CodegenError::Failed(e.to_string()))?;

        if !output.status.success() {
            return Err(CodegenError::Failed(format!(
                "provider exited with {}: {}",
                output.status,
                stderr_tail(&output, 2000)
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl CodegenProvider for CliCodegenProvider {
    async fn generate(
        &self,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String, CodegenError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(CodegenError::Cancelled),
            result = tokio::time::timeout(self.timeout, self.run(prompt)) => {
                match result {
                    Ok(inner) => inner,
                    Err(_elapsed) => Err(CodegenError::Failed(format!(
                        "provider timed out after {}s",
                        self.timeout.as_secs()
                    ))),
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "codegen_tests.rs"]
mod tests;
