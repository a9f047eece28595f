// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Child-process environment hygiene.
//!
//! Dev servers are spawned with a scrubbed environment: loader-injection
//! variables inherited from the parent are removed, and PATH is reset to
//! known binary directories plus the user's local tools directory. The
//! parent may run under a loader whose modules resolve to paths that do not
//! exist for the child.

use std::path::PathBuf;

/// Variables that inject loaders or module resolution into the runtime.
const LOADER_VARS: [&str; 4] = [
    "NODE_OPTIONS",
    "NODE_PATH",
    "NODE_REPL_EXTERNAL_MODULE",
    "NPM_CONFIG_NODE_OPTIONS",
];

/// Base PATH for spawned dev servers.
const BASE_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// The PATH value children are spawned with.
pub fn reset_path() -> String {
    match dirs::home_dir() {
        Some(home) => format!("{}:{}", BASE_PATH, home.join(".local/bin").display()),
        None => BASE_PATH.to_string(),
    }
}

/// The parent environment minus loader hints, with PATH reset.
pub fn scrubbed_env() -> Vec<(String, String)> {
    let mut env: Vec<(String, String)> = std::env::vars()
        .filter(|(key, _)| key != "PATH" && !LOADER_VARS.contains(&key.as_str()))
        .collect();
    env.push(("PATH".to_string(), reset_path()));
    env
}

fn parse_duration_ms(var: &str) -> Option<std::time::Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(std::time::Duration::from_millis)
}

/// Readiness timeout override (default: 120000ms).
pub fn readiness_timeout() -> Option<std::time::Duration> {
    parse_duration_ms("PF_READY_TIMEOUT_MS")
}

/// Historical preview pool size override (default: 2).
pub fn historical_max() -> Option<usize> {
    std::env::var("PF_HISTORICAL_MAX")
        .ok()
        .and_then(|s| s.parse().ok())
}

/// Template directory used to self-heal workspaces missing a manifest.
pub fn template_dir() -> Option<PathBuf> {
    std::env::var("PF_TEMPLATE_DIR").ok().map(PathBuf::from)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
