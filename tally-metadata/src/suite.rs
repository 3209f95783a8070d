// Copyright (c) The tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{RunSummaryError, SuiteCategoryParseError};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::{borrow::Borrow, fmt, str::FromStr};

/// A unique identifier for a test suite.
///
/// Suite identifiers are slash-separated paths such as `picker/unit`. They are ordered
/// lexicographically, which is the order in which tally runs and reports suites.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SuiteId(SmolStr);

impl SuiteId {
    /// Creates a new `SuiteId` from a string.
    pub fn new(id: &str) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the number of characters in the identifier, for alignment purposes.
    pub fn len(&self) -> usize {
        self.0.chars().count()
    }

    /// Returns true if the identifier is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for SuiteId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SuiteId {
    fn from(s: String) -> Self {
        Self(s.into())
    }
}

impl Borrow<str> for SuiteId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SuiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The category a test suite belongs to.
///
/// Categories are ordered in declaration order, which is the order used for per-category
/// breakdowns.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SuiteCategory {
    /// Unit tests.
    Unit,

    /// Tests for a single user-visible feature.
    Feature,

    /// Tests exercising several components together.
    Integration,

    /// Tests for user-invoked commands.
    Command,

    /// Performance tests.
    Performance,
}

impl SuiteCategory {
    /// All known categories, in order.
    pub const ALL: [Self; 5] = [
        Self::Unit,
        Self::Feature,
        Self::Integration,
        Self::Command,
        Self::Performance,
    ];

    /// Returns the string representation of this category.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unit => "unit",
            Self::Feature => "feature",
            Self::Integration => "integration",
            Self::Command => "command",
            Self::Performance => "performance",
        }
    }

    /// Returns the string representations of all known categories.
    pub fn variants() -> [&'static str; 5] {
        Self::ALL.map(Self::as_str)
    }
}

impl fmt::Display for SuiteCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SuiteCategory {
    type Err = SuiteCategoryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| SuiteCategoryParseError::new(s))
    }
}

/// Details about a single failed test case.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct FailureDetail {
    /// The name of the test case.
    pub name: String,

    /// The failure message.
    pub message: String,
}

impl FailureDetail {
    /// Creates a new `FailureDetail`.
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// The results of a single suite run, as printed by a command suite.
///
/// A command suite reports its results by printing this structure as a single line of JSON to
/// standard output. Other output lines are allowed; the last line that parses as a summary wins.
///
/// ```json
/// {"total":3,"passed":2,"failed":1,"failures":[{"name":"sorts","message":"expected 1, got 2"}]}
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SuiteRunSummary {
    /// The number of test cases executed.
    pub total: usize,

    /// The number of test cases that passed.
    pub passed: usize,

    /// The number of test cases that failed.
    pub failed: usize,

    /// One entry per failed test case.
    #[serde(default)]
    pub failures: Vec<FailureDetail>,
}

impl SuiteRunSummary {
    /// Parses and validates a summary from a JSON string.
    pub fn parse_json(json: impl AsRef<str>) -> Result<Self, RunSummaryError> {
        let summary: Self = serde_json::from_str(json.as_ref()).map_err(RunSummaryError::Json)?;
        summary.validate()?;
        Ok(summary)
    }

    /// Checks that the counts in this summary are consistent with each other.
    pub fn validate(&self) -> Result<(), RunSummaryError> {
        if self.passed.checked_add(self.failed) != Some(self.total) {
            return Err(RunSummaryError::InconsistentCounts {
                total: self.total,
                passed: self.passed,
                failed: self.failed,
            });
        }
        if self.failures.len() != self.failed {
            return Err(RunSummaryError::FailureDetailsMismatch {
                failed: self.failed,
                details: self.failures.len(),
            });
        }
        Ok(())
    }
}
