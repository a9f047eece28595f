// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Headless browser probe.
//!
//! Screenshots and in-page element measurement go through a single trait so
//! the orchestrator never talks to a browser directly. The production
//! implementation drives a configured capture command (one short-lived
//! process per call, fresh browser context each time).

use crate::subprocess::{run_with_timeout, stderr_tail, BROWSER_TIMEOUT};
use async_trait::async_trait;
use pf_core::{BreakpointDef, ElementMetrics};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Settle delay after navigation before screenshotting, for layout stability.
pub const CAPTURE_SETTLE: Duration = Duration::from_millis(500);

/// Errors from browser probe operations
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("inspection failed: {0}")]
    InspectionFailed(String),
}

/// Screenshots and element metrics from a live page.
#[async_trait]
pub trait BrowserProbe: Clone + Send + Sync + 'static {
    /// Render `url` in a fresh context sized to the breakpoint and return a
    /// PNG screenshot. Implementations wait for network idleness plus
    /// [`CAPTURE_SETTLE`] before capturing.
    async fn capture(
        &self,
        url: &str,
        breakpoint: &BreakpointDef,
    ) -> Result<Vec<u8>, BrowserError>;

    /// Measure every element under `root_selector` at the given breakpoint.
    async fn inspect(
        &self,
        url: &str,
        root_selector: &str,
        breakpoint: &BreakpointDef,
    ) -> Result<Vec<ElementMetrics>, BrowserError>;
}

/// Probe that shells out to a configured headless-capture command.
///
/// Contract: `<command> capture --url U --width W --height H --scale S
/// --settle-ms M` writes PNG bytes to stdout; `<command> inspect --url U
/// --root SEL --width W --height H` writes a JSON array of element metrics.
#[derive(Clone)]
pub struct CliBrowserProbe {
    command: String,
    timeout: Duration,
}

impl CliBrowserProbe {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            timeout: BROWSER_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl BrowserProbe for CliBrowserProbe {
    async fn capture(
        &self,
        url: &str,
        breakpoint: &BreakpointDef,
    ) -> Result<Vec<u8>, BrowserError> {
        let mut cmd = Command::new(&self.command);
        cmd.arg("capture")
            .args(["--url", url])
            .args(["--width", &breakpoint.width.to_string()])
            .args(["--height", &breakpoint.height.to_string()])
            .args(["--scale", &breakpoint.device_scale_factor.to_string()])
            .args(["--settle-ms", &CAPTURE_SETTLE.as_millis().to_string()]);

        let output = run_with_timeout(cmd, self.timeout, "browser capture")
            .await
            .map_err(BrowserError::CaptureFailed)?;
        if !output.status.success() {
            return Err(BrowserError::CaptureFailed(stderr_tail(&output, 2000)));
        }
        if output.stdout.is_empty() {
            return Err(BrowserError::CaptureFailed(
                "capture produced no image data".to_string(),
            ));
        }
        Ok(output.stdout)
    }

    async fn inspect(
        &self,
        url: &str,
        root_selector: &str,
        breakpoint: &BreakpointDef,
    ) -> Result<Vec<ElementMetrics>, BrowserError> {
        let mut cmd = Command::new(&self.command);
        cmd.arg("inspect")
            .args(["--url", url])
            .args(["--root", root_selector])
            .args(["--width", &breakpoint.width.to_string()])
            .args(["--height", &breakpoint.height.to_string()]);

        let output = run_with_timeout(cmd, self.timeout, "browser inspection")
            .await
            .map_err(BrowserError::InspectionFailed)?;
        if !output.status.success() {
            return Err(BrowserError::InspectionFailed(stderr_tail(&output, 2000)));
        }
        serde_json::from_slice(&output.stdout)
            .map_err(|e| BrowserError::InspectionFailed(format!("bad metrics JSON: {e}")))
    }
}

#[cfg(test)]
#[path = "browser_tests.rs"]
mod tests;
