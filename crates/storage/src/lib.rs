// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pf-storage: filesystem layout and workspace snapshots

mod layout;
mod snapshot;

pub use layout::ProjectLayout;
pub use snapshot::{
    SnapshotError, SnapshotMeta, SnapshotStore, DEPS_DIR, EXCLUDED_DIRS,
};
