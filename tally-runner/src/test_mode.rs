// Copyright (c) The tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The process-wide test-mode flag.
//!
//! Suites that can't be handed a [`SuiteContext`](crate::suite::SuiteContext) may instead check
//! [`is_active`] or [`active_suite`]. The flag is set for exactly one suite at a time: it is
//! raised before the suite's setup runs and cleared after its teardown, on every exit path.
//!
//! The one exception is an in-process suite that times out and then doesn't finish within the
//! reconciler's grace period. Its thread can't be stopped, so the flag is released without it and
//! the suite's [`SuiteContext::is_test_mode`](crate::suite::SuiteContext::is_test_mode) turns
//! false. Whatever the abandoned thread runs afterwards runs outside test mode.
//!
//! Two reconcilers in the same process serialize on the flag rather than racing on it.

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};
use tally_metadata::SuiteId;
use tracing::debug;

static TEST_MODE_LOCK: Mutex<()> = Mutex::new(());
static ACTIVE_SUITE: RwLock<Option<SuiteId>> = RwLock::new(None);

/// Returns true if a suite is currently being executed.
pub fn is_active() -> bool {
    ACTIVE_SUITE
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .is_some()
}

/// Returns the identifier of the suite currently being executed, if any.
pub fn active_suite() -> Option<SuiteId> {
    ACTIVE_SUITE
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Holds the test-mode flag for one suite. The flag is cleared on drop.
#[derive(Debug)]
pub(crate) struct TestModeGuard {
    // Held for the lifetime of the guard. Dropped after the flag is cleared.
    _lock: MutexGuard<'static, ()>,
}

impl TestModeGuard {
    /// Raises the flag for `suite_id`, blocking until no other suite holds it.
    pub(crate) fn acquire(suite_id: &SuiteId) -> Self {
        // The flag is cleared on unwind, so a poisoned lock is still consistent.
        let lock = TEST_MODE_LOCK
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        set_active(Some(suite_id.clone()));
        debug!("test mode enabled for suite {suite_id}");
        Self { _lock: lock }
    }
}

impl Drop for TestModeGuard {
    fn drop(&mut self) {
        set_active(None);
        debug!("test mode disabled");
    }
}

fn set_active(suite_id: Option<SuiteId>) {
    *ACTIVE_SUITE
        .write()
        .unwrap_or_else(PoisonError::into_inner) = suite_id;
}
