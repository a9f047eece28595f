// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Adapters for external providers
//!
//! The orchestrator talks to three external collaborators, each behind a
//! trait: the code-gen provider (prompt text in, `<files>` blob out), the
//! vision scoring provider (two screenshots in, per-dimension scores out),
//! and the browser probe (screenshots and in-page element metrics). CLI
//! implementations spawn configured commands; fakes live behind the
//! `test-support` feature.

pub mod browser;
pub mod codegen;
pub mod scoring;
pub mod subprocess;

pub use browser::{BrowserError, BrowserProbe, CliBrowserProbe, CAPTURE_SETTLE};
pub use codegen::{
    parse_generated_files, CliCodegenProvider, CodegenError, CodegenProvider, GeneratedFile,
};
pub use scoring::{
    parse_score_response, CliScoringProvider, ScoringError, ScoringProvider, FALLBACK_SCORE,
};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{BrowserCall, FakeBrowser, FakeCodegen, FakeScoring, ScoreCall, FAKE_PNG};
