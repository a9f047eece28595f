// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess execution helpers

use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

/// Default timeout for code-generation provider calls.
pub const CODEGEN_TIMEOUT: Duration = Duration::from_secs(300);

/// Default timeout for vision-scoring provider calls.
pub const SCORING_TIMEOUT: Duration = Duration::from_secs(120);

/// Default timeout for a single browser capture or inspection.
pub const BROWSER_TIMEOUT: Duration = Duration::from_secs(60);

/// Run a subprocess command with a timeout.
///
/// Wraps `Command::output()` with `tokio::time::timeout`, converting
/// timeout expiration into a descriptive error message. The child process
/// is killed automatically if the timeout elapses (via the tokio `Child`
/// drop implementation).
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    description: &str,
) -> Result<Output, String> {
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(io_err)) => Err(format!("{} failed: {}", description, io_err)),
        Err(_elapsed) => Err(format!(
            "{} timed out after {}s",
            description,
            timeout.as_secs()
        )),
    }
}

/// Trailing portion of combined stderr output, for error messages.
pub fn stderr_tail(output: &Output, max_len: usize) -> String {
    let text = String::from_utf8_lossy(&output.stderr);
    let trimmed = text.trim_end();
    if trimmed.len() <= max_len {
        trimmed.to_string()
    } else {
        let start = trimmed.len() - max_len;
        // Avoid splitting a UTF-8 sequence.
        let start = (start..trimmed.len())
            .find(|i| trimmed.is_char_boundary(*i))
            .unwrap_or(trimmed.len());
        trimmed[start..].to_string()
    }
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
