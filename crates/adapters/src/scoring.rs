// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Vision scoring provider.
//!
//! Given a captured screenshot and its baseline, the provider returns
//! per-dimension scores in [0, 1]. The response must be a JSON object with
//! exactly `layout`, `style`, `a11y`, and `perceptual`; anything else falls
//! back to a uniform 0.5 so a flaky scorer degrades a run instead of
//! crashing it.

use crate::subprocess::{run_with_timeout, SCORING_TIMEOUT};
use async_trait::async_trait;
use pf_core::ScoreVector;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Score used when a provider response cannot be understood.
pub const FALLBACK_SCORE: f64 = 0.5;

/// Errors from scoring calls
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("scoring provider failed: {0}")]
    Failed(String),
    #[error("scoring call cancelled")]
    Cancelled,
}

/// Provider of visual comparison scores.
#[async_trait]
pub trait ScoringProvider: Clone + Send + Sync + 'static {
    /// Score a candidate screenshot against its baseline.
    async fn score(
        &self,
        candidate: &Path,
        baseline: &Path,
        ir_summary: &str,
        cancel: &CancellationToken,
    ) -> Result<ScoreVector, ScoringError>;
}

/// Parse a provider response, falling back to uniform 0.5 when malformed.
///
/// Accepts surrounding prose: the first `{` to the last `}` is treated as
/// the JSON payload. The object must contain exactly the four dimensions,
/// each a number in [0, 1].
pub fn parse_score_response(text: &str) -> ScoreVector {
    match try_parse(text) {
        Some(scores) => scores,
        None => {
            warn!("malformed scoring response, using fallback scores");
            ScoreVector::uniform(FALLBACK_SCORE)
        }
    }
}

fn try_parse(text: &str) -> Option<ScoreVector> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    let value: serde_json::Value = serde_json::from_str(&text[start..=end]).ok()?;
    let obj = value.as_object()?;
    if obj.len() != 4 {
        return None;
    }
    let dim = |key: &str| -> Option<f64> {
        let v = obj.get(key)?.as_f64()?;
        (0.0..=1.0).contains(&v).then_some(v)
    };
    Some(ScoreVector::new(
        dim("layout")?,
        dim("style")?,
        dim("a11y")?,
        dim("perceptual")?,
    ))
}

/// Scoring provider that shells out to a configured command.
///
/// Invoked as `<command> <args...> <candidate> <baseline>` with the IR
/// summary on stdin; scores are read from stdout.
#[derive(Clone)]
pub struct CliScoringProvider {
    command: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CliScoringProvider {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            timeout: SCORING_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl ScoringProvider for CliScoringProvider {
    async fn score(
        &self,
        candidate: &Path,
        baseline: &Path,
        _ir_summary: &str,
        cancel: &CancellationToken,
    ) -> Result<ScoreVector, ScoringError> {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args).arg(candidate).arg(baseline);

        let run = run_with_timeout(cmd, self.timeout, "scoring provider");
        let output = tokio::select! {
            _ = cancel.cancelled() => return Err(ScoringError::Cancelled),
            result = run => result.map_err(ScoringError::Failed)?,
        };

        if !output.status.success() {
            return Err(ScoringError::Failed(format!(
                "provider exited with {}",
                output.status
            )));
        }
        let text = String::from_utf8_lossy(&output.stdout);
        Ok(parse_score_response(&text))
    }
}

#[cfg(test)]
#[path = "scoring_tests.rs"]
mod tests;
