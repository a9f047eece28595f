// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn runs_command_to_completion() {
    let mut cmd = Command::new("sh");
    cmd.args(["-c", "echo hello"]);
    let output = run_with_timeout(cmd, Duration::from_secs(5), "echo")
        .await
        .unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
}

#[tokio::test]
async fn times_out_slow_command() {
    let mut cmd = Command::new("sh");
    cmd.args(["-c", "sleep 5"]);
    let err = run_with_timeout(cmd, Duration::from_millis(50), "sleeper")
        .await
        .unwrap_err();
    assert!(err.contains("timed out"), "unexpected error: {err}");
}

#[tokio::test]
async fn reports_spawn_failure() {
    let cmd = Command::new("definitely-not-a-real-binary-pf");
    let err = run_with_timeout(cmd, Duration::from_secs(1), "missing binary")
        .await
        .unwrap_err();
    assert!(err.contains("failed"), "unexpected error: {err}");
}

#[tokio::test]
async fn stderr_tail_keeps_trailing_output() {
    let mut cmd = Command::new("sh");
    cmd.args(["-c", "printf 'line1\\nline2\\nboom' >&2; exit 1"]);
    let output = run_with_timeout(cmd, Duration::from_secs(5), "failing")
        .await
        .unwrap();
    assert_eq!(stderr_tail(&output, 4), "boom");
    assert_eq!(stderr_tail(&output, 1000), "line1\nline2\nboom");
}
