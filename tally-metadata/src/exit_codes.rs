// Copyright (c) The tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for tally failures.
///
/// The library itself never exits the process. Wrappers that do should use these codes so that
/// CI systems can tell the different failure modes apart.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum TallyExitCode {}

impl TallyExitCode {
    /// Every suite ran without failures and every declared count matched.
    pub const OK: i32 = 0;

    /// One or more suites failed, or one or more declared counts did not match.
    pub const RECONCILE_FAILED: i32 = 100;

    /// Discovering suites produced an error. No suites were run.
    pub const DISCOVERY_FAILED: i32 = 104;

    /// A user issue happened while setting up a tally invocation, for example an invalid config
    /// file.
    pub const SETUP_ERROR: i32 = 96;

    /// Writing the report to its destination produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;
}
