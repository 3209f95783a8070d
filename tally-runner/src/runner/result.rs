// Copyright (c) The tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::suite::SuiteRun;
use std::{fmt, time::Duration};
use tally_metadata::{AbortKind, AbortSummary, FailureDetail, SuiteId};

/// The outcome of executing a single suite.
///
/// `passed + failed == observed_total` always holds: the number of failed test cases is the
/// number of failure details.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExecutionResult {
    passed: usize,
    failures: Vec<FailureDetail>,
    abort: Option<ExecutionAbort>,
    time_taken: Duration,
}

impl ExecutionResult {
    /// Creates a result for a suite that ran to completion.
    pub fn completed(run: SuiteRun, time_taken: Duration) -> Self {
        let (passed, failures) = run.into_parts();
        Self {
            passed,
            failures,
            abort: None,
            time_taken,
        }
    }

    /// Creates a synthetic result for a suite that couldn't run to completion.
    ///
    /// The result has a single failed test case, named after the suite, whose message describes
    /// the abort.
    pub fn aborted(suite_id: &SuiteId, abort: ExecutionAbort, time_taken: Duration) -> Self {
        Self {
            passed: 0,
            failures: vec![FailureDetail::new(suite_id.as_str(), abort.to_string())],
            abort: Some(abort),
            time_taken,
        }
    }

    /// Returns the number of test cases observed.
    pub fn observed_total(&self) -> usize {
        self.passed.saturating_add(self.failures.len())
    }

    /// Returns the number of passing test cases.
    pub fn passed(&self) -> usize {
        self.passed
    }

    /// Returns the number of failing test cases.
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Returns details for each failing test case, in the order the suite reported them.
    pub fn failure_details(&self) -> &[FailureDetail] {
        &self.failures
    }

    /// Returns the reason this suite couldn't run to completion, if this is a synthetic result.
    pub fn abort(&self) -> Option<&ExecutionAbort> {
        self.abort.as_ref()
    }

    /// Returns true if this is a synthetic result.
    pub fn is_aborted(&self) -> bool {
        self.abort.is_some()
    }

    /// Returns the wall-clock time taken to execute the suite, including setup and teardown.
    pub fn time_taken(&self) -> Duration {
        self.time_taken
    }
}

/// Why a suite couldn't run to completion.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExecutionAbort {
    kind: AbortKind,
    message: String,
}

impl ExecutionAbort {
    /// Creates a new abort of the given kind.
    pub fn new(kind: AbortKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn timeout(timeout: Duration) -> Self {
        Self::new(
            AbortKind::Timeout,
            format!(
                "suite did not finish within {}",
                humantime::format_duration(timeout)
            ),
        )
    }

    /// Returns the kind of abort.
    pub fn kind(&self) -> AbortKind {
        self.kind
    }

    /// Returns a description of the error. This may span multiple lines.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns a short description of the kind of abort.
    pub fn kind_description(&self) -> &'static str {
        match self.kind {
            AbortKind::Load => "load error",
            AbortKind::Setup => "setup failed",
            AbortKind::Run => "run error",
            AbortKind::Panic => "panicked",
            AbortKind::Timeout => "timed out",
        }
    }

    pub(crate) fn to_summary(&self) -> AbortSummary {
        AbortSummary {
            kind: self.kind,
            message: self.message.clone(),
        }
    }
}

impl fmt::Display for ExecutionAbort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind_description(), self.message)
    }
}
