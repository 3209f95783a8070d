// Copyright (c) The tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{FailureDetail, SuiteCategory, SuiteId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root element for a serializable reconciliation report.
///
/// Suites are stored in a map ordered by identifier, so serializing the same report twice
/// produces the same output.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ReportSummary {
    /// The overall result of the run.
    pub result: ReconcileResult,

    /// The sum of declared counts. Suites without a declaration contribute their observed count.
    pub total_declared: usize,

    /// The sum of observed counts across all suites.
    pub total_observed: usize,

    /// The number of passing test cases across all suites.
    pub passed: usize,

    /// The number of failing test cases across all suites, including synthetic failures for
    /// suites that could not be run.
    pub failed: usize,

    /// Per-suite summaries.
    pub suites: BTreeMap<SuiteId, SuiteSummary>,
}

impl ReportSummary {
    /// Parses a summary from a JSON string.
    pub fn parse_json(json: impl AsRef<str>) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json.as_ref())
    }

    /// Serializes this summary to a JSON string.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).expect("report summary is always serializable")
    }

    /// Returns the identifiers of suites whose declared count didn't match.
    pub fn mismatched_suites(&self) -> impl Iterator<Item = &SuiteId> + '_ {
        self.suites
            .iter()
            .filter(|(_, suite)| suite.count_status == CountStatusSummary::Mismatch)
            .map(|(id, _)| id)
    }
}

/// The overall result of a reconciliation run.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReconcileResult {
    /// No failures, no mismatches.
    Pass,

    /// At least one failure or mismatch.
    Fail,
}

/// Serializable information about a single suite.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SuiteSummary {
    /// The category of the suite.
    pub category: SuiteCategory,

    /// The declared count, if the suite declares one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declared_count: Option<usize>,

    /// The number of test cases observed.
    pub observed_total: usize,

    /// The number of passing test cases.
    pub passed: usize,

    /// The number of failing test cases.
    pub failed: usize,

    /// How the declared count compares to the observed count.
    pub count_status: CountStatusSummary,

    /// Set if the suite could not be run to completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abort: Option<AbortSummary>,

    /// One entry per failed test case.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<FailureDetail>,
}

/// How the declared count of a suite compares to its observed count.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CountStatusSummary {
    /// The declared count equals the observed count.
    Match,

    /// The declared count differs from the observed count.
    Mismatch,

    /// The suite doesn't declare a count.
    Undeclared,
}

/// Serializable information about why a suite could not be run to completion.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AbortSummary {
    /// The kind of abort.
    pub kind: AbortKind,

    /// A description of the error.
    pub message: String,
}

/// The kind of error that stopped a suite from running to completion.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AbortKind {
    /// The suite could not be loaded.
    Load,

    /// The suite's setup operation failed.
    Setup,

    /// The suite's run operation returned an error or produced unusable output.
    Run,

    /// The suite panicked.
    Panic,

    /// The suite exceeded its timeout.
    Timeout,
}
