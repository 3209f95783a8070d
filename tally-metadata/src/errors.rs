// Copyright (c) The tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::SuiteCategory;
use std::{error, fmt};

/// An error that occurs while parsing a [`SuiteRunSummary`](crate::SuiteRunSummary) printed by a
/// command suite.
#[derive(Debug)]
pub enum RunSummaryError {
    /// The summary wasn't valid JSON, or didn't have the expected shape.
    Json(serde_json::Error),

    /// The counts in the summary don't add up: `passed + failed != total`.
    InconsistentCounts {
        /// The total number of tests reported.
        total: usize,

        /// The number of passing tests reported.
        passed: usize,

        /// The number of failing tests reported.
        failed: usize,
    },

    /// The number of failure details doesn't match the number of failed tests.
    FailureDetailsMismatch {
        /// The number of failing tests reported.
        failed: usize,

        /// The number of failure details provided.
        details: usize,
    },
}

impl fmt::Display for RunSummaryError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Json(_) => {
                write!(f, "parsing suite run summary JSON failed")
            }
            Self::InconsistentCounts {
                total,
                passed,
                failed,
            } => {
                write!(
                    f,
                    "suite run summary counts are inconsistent: \
                     {passed} passed + {failed} failed != {total} total"
                )
            }
            Self::FailureDetailsMismatch { failed, details } => {
                write!(
                    f,
                    "suite run summary reports {failed} failed tests \
                     but provides {details} failure details"
                )
            }
        }
    }
}

impl error::Error for RunSummaryError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            Self::InconsistentCounts { .. } | Self::FailureDetailsMismatch { .. } => None,
        }
    }
}

/// An error that occurs while parsing a [`SuiteCategory`] from a string.
#[derive(Clone, Debug)]
pub struct SuiteCategoryParseError {
    input: String,
}

impl SuiteCategoryParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }

    /// Returns the input that failed to parse.
    pub fn input(&self) -> &str {
        &self.input
    }
}

impl fmt::Display for SuiteCategoryParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "unrecognized suite category: {}\n(known values: {})",
            self.input,
            SuiteCategory::variants().join(", "),
        )
    }
}

impl error::Error for SuiteCategoryParseError {}
