// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake providers for deterministic testing

use crate::browser::{BrowserError, BrowserProbe};
use crate::codegen::{CodegenError, CodegenProvider};
use crate::scoring::{ScoringError, ScoringProvider};
use async_trait::async_trait;
use parking_lot::Mutex;
use pf_core::{BreakpointDef, ElementMetrics, ScoreVector};
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Minimal PNG header, enough for tests that only look at file presence.
pub const FAKE_PNG: &[u8] = &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

/// Fake code-gen provider with scripted responses.
///
/// Responses are consumed in order; the last one repeats once the script is
/// exhausted. All prompts are recorded for assertions.
#[derive(Clone, Default)]
pub struct FakeCodegen {
    inner: Arc<Mutex<FakeCodegenState>>,
}

#[derive(Default)]
struct FakeCodegenState {
    responses: VecDeque<String>,
    last: Option<String>,
    prompts: Vec<String>,
    fail_next: Option<String>,
    hang: bool,
}

impl FakeCodegen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a raw response.
    pub fn push_response(&self, response: impl Into<String>) {
        self.inner.lock().responses.push_back(response.into());
    }

    /// Queue a response containing a single generated file.
    pub fn push_file(&self, path: &str, contents: &str) {
        self.push_response(format!(
            "<files>\n<file path=\"{path}\">\n{contents}\n</file>\n</files>"
        ));
    }

    /// Fail the next call with the given message.
    pub fn fail_next(&self, message: impl Into<String>) {
        self.inner.lock().fail_next = Some(message.into());
    }

    /// Make calls block until cancelled (for stop-semantics tests).
    pub fn hang(&self) {
        self.inner.lock().hang = true;
    }

    pub fn prompts(&self) -> Vec<String> {
        self.inner.lock().prompts.clone()
    }

    pub fn call_count(&self) -> usize {
        self.inner.lock().prompts.len()
    }
}

#[async_trait]
impl CodegenProvider for FakeCodegen {
    async fn generate(
        &self,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String, CodegenError> {
        let hang = {
            let mut inner = self.inner.lock();
            inner.prompts.push(prompt.to_string());
            if let Some(message) = inner.fail_next.take() {
                return Err(CodegenError::Failed(message));
            }
            inner.hang
        };

        if hang {
            cancel.cancelled().await;
            return Err(CodegenError::Cancelled);
        }
        if cancel.is_cancelled() {
            return Err(CodegenError::Cancelled);
        }

        let mut inner = self.inner.lock();
        let response = match inner.responses.pop_front() {
            Some(r) => {
                inner.last = Some(r.clone());
                r
            }
            None => inner.last.clone().unwrap_or_default(),
        };
        Ok(response)
    }
}

/// Recorded scoring call.
#[derive(Debug, Clone)]
pub struct ScoreCall {
    pub candidate: PathBuf,
    pub baseline: PathBuf,
}

/// Fake scoring provider with a scripted score sequence.
#[derive(Clone, Default)]
pub struct FakeScoring {
    inner: Arc<Mutex<FakeScoringState>>,
}

#[derive(Default)]
struct FakeScoringState {
    scores: VecDeque<ScoreVector>,
    last: Option<ScoreVector>,
    calls: Vec<ScoreCall>,
}

impl FakeScoring {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one score vector per upcoming call.
    pub fn push_score(&self, score: ScoreVector) {
        self.inner.lock().scores.push_back(score);
    }

    /// Queue a uniform score (all four dimensions equal).
    pub fn push_uniform(&self, v: f64) {
        self.push_score(ScoreVector::uniform(v));
    }

    pub fn calls(&self) -> Vec<ScoreCall> {
        self.inner.lock().calls.clone()
    }
}

#[async_trait]
impl ScoringProvider for FakeScoring {
    async fn score(
        &self,
        candidate: &Path,
        baseline: &Path,
        _ir_summary: &str,
        cancel: &CancellationToken,
    ) -> Result<ScoreVector, ScoringError> {
        if cancel.is_cancelled() {
            return Err(ScoringError::Cancelled);
        }
        let mut inner = self.inner.lock();
        inner.calls.push(ScoreCall {
            candidate: candidate.to_path_buf(),
            baseline: baseline.to_path_buf(),
        });
        let score = match inner.scores.pop_front() {
            Some(s) => {
                inner.last = Some(s);
                s
            }
            None => inner.last.unwrap_or(ScoreVector::uniform(0.5)),
        };
        Ok(score)
    }
}

/// Recorded browser call.
#[derive(Debug, Clone)]
pub enum BrowserCall {
    Capture { url: String, breakpoint_id: String },
    Inspect { url: String, root_selector: String },
}

/// Fake browser probe returning canned captures and metrics.
#[derive(Clone, Default)]
pub struct FakeBrowser {
    inner: Arc<Mutex<FakeBrowserState>>,
}

#[derive(Default)]
struct FakeBrowserState {
    calls: Vec<BrowserCall>,
    failing_breakpoints: HashSet<String>,
    metrics: Vec<ElementMetrics>,
    fail_inspect: bool,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make captures at a breakpoint fail.
    pub fn fail_breakpoint(&self, breakpoint_id: &str) {
        self.inner
            .lock()
            .failing_breakpoints
            .insert(breakpoint_id.to_string());
    }

    /// Set the metrics returned by `inspect`.
    pub fn set_metrics(&self, metrics: Vec<ElementMetrics>) {
        self.inner.lock().metrics = metrics;
    }

    /// Make inspection fail.
    pub fn fail_inspect(&self) {
        self.inner.lock().fail_inspect = true;
    }

    pub fn calls(&self) -> Vec<BrowserCall> {
        self.inner.lock().calls.clone()
    }
}

#[async_trait]
impl BrowserProbe for FakeBrowser {
    async fn capture(
        &self,
        url: &str,
        breakpoint: &BreakpointDef,
    ) -> Result<Vec<u8>, BrowserError> {
        let mut inner = self.inner.lock();
        inner.calls.push(BrowserCall::Capture {
            url: url.to_string(),
            breakpoint_id: breakpoint.breakpoint_id.clone(),
        });
        if inner.failing_breakpoints.contains(&breakpoint.breakpoint_id) {
            return Err(BrowserError::CaptureFailed(format!(
                "scripted failure at {}",
                breakpoint.breakpoint_id
            )));
        }
        Ok(FAKE_PNG.to_vec())
    }

    async fn inspect(
        &self,
        url: &str,
        root_selector: &str,
        _breakpoint: &BreakpointDef,
    ) -> Result<Vec<ElementMetrics>, BrowserError> {
        let mut inner = self.inner.lock();
        inner.calls.push(BrowserCall::Inspect {
            url: url.to_string(),
            root_selector: root_selector.to_string(),
        });
        if inner.fail_inspect {
            return Err(BrowserError::InspectionFailed(
                "scripted inspection failure".to_string(),
            ));
        }
        Ok(inner.metrics.clone())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
