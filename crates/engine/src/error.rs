// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the run engine

use pf_sandbox::SandboxError;
use thiserror::Error;

/// Errors that fail an iteration (and with it, the run)
#[derive(Debug, Error)]
pub enum RunError {
    #[error("run cancelled")]
    Cancelled,
    #[error("design IR has no target '{0}'")]
    UnknownTarget(String),
    #[error("code generation failed: {0}")]
    Codegen(String),
    #[error("code generation produced no usable files")]
    EmptyCodegen,
    #[error("preview failed: {0}")]
    Preview(String),
    #[error("preview not ready after {0}s")]
    PreviewTimeout(u64),
    #[error("every breakpoint capture failed")]
    AllCapturesFailed,
    #[error("no baseline for target {target} breakpoint {breakpoint} state {state}")]
    MissingBaseline {
        target: String,
        breakpoint: String,
        state: String,
    },
    #[error("scoring failed: {0}")]
    Scoring(String),
    #[error("sandbox error: {0}")]
    Sandbox(#[from] SandboxError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
