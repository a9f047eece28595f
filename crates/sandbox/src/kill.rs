// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-group termination.
//!
//! Dev servers fork workers, so killing only the direct child leaks them.
//! Every spawn puts the child in its own process group; termination signals
//! the whole group, graceful first, forced after a grace period.

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::time::Duration;
use tracing::debug;

/// Grace period between SIGTERM and SIGKILL.
pub const FORCE_KILL_DELAY: Duration = Duration::from_secs(5);

/// Whether any process in the group is still alive.
pub(crate) fn group_alive(pid: u32) -> bool {
    signal::killpg(Pid::from_raw(pid as i32), None).is_ok()
}

/// SIGTERM the group now; SIGKILL it after [`FORCE_KILL_DELAY`] if needed.
///
/// Errors are swallowed: the group may already be gone, which is the
/// outcome we wanted anyway.
pub(crate) fn terminate_group(pid: u32) {
    let pgid = Pid::from_raw(pid as i32);
    if let Err(e) = signal::killpg(pgid, Signal::SIGTERM) {
        debug!(pid, error = %e, "SIGTERM to process group failed");
        return;
    }

    tokio::spawn(async move {
        tokio::time::sleep(FORCE_KILL_DELAY).await;
        if group_alive(pid) {
            debug!(pid, "process group survived SIGTERM, sending SIGKILL");
            let _ = signal::killpg(pgid, Signal::SIGKILL);
        }
    });
}
