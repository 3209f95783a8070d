// Copyright (c) The tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The results of a reconciliation run.
//!
//! A [`ReconciliationReport`] holds one [`SuiteOutcome`] per suite, ordered by identifier, and
//! derives totals, per-category breakdowns and mismatches from them.

use crate::{discovery::SuiteDescriptor, runner::ExecutionResult};
use std::{collections::BTreeMap, time::Duration};
use tally_metadata::{
    CountStatusSummary, ReconcileResult, ReportSummary, SuiteCategory, SuiteId, SuiteSummary,
    TallyExitCode,
};

/// How a suite's declared count compares to its observed count.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CountStatus {
    /// The suite declared a count, and it matches the observed count.
    Matched {
        /// The declared and observed count.
        count: usize,
    },

    /// The suite declared a count, and it doesn't match the observed count.
    Mismatched {
        /// The declared count.
        declared: usize,

        /// The observed count.
        observed: usize,
    },

    /// The suite doesn't declare a count.
    Undeclared {
        /// The observed count.
        observed: usize,
    },
}

impl CountStatus {
    /// Compares an optional declared count against an observed count.
    pub fn new(declared: Option<usize>, observed: usize) -> Self {
        match declared {
            Some(declared) if declared == observed => Self::Matched { count: declared },
            Some(declared) => Self::Mismatched { declared, observed },
            None => Self::Undeclared { observed },
        }
    }

    /// Returns true if this is a mismatch.
    pub fn is_mismatch(&self) -> bool {
        matches!(self, Self::Mismatched { .. })
    }

    /// For a mismatch, returns `observed - declared`.
    pub fn delta(&self) -> Option<i128> {
        match self {
            Self::Mismatched { declared, observed } => Some(*observed as i128 - *declared as i128),
            Self::Matched { .. } | Self::Undeclared { .. } => None,
        }
    }

    fn to_summary(self) -> CountStatusSummary {
        match self {
            Self::Matched { .. } => CountStatusSummary::Match,
            Self::Mismatched { .. } => CountStatusSummary::Mismatch,
            Self::Undeclared { .. } => CountStatusSummary::Undeclared,
        }
    }
}

/// A suite together with the result of executing it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SuiteOutcome {
    descriptor: SuiteDescriptor,
    result: ExecutionResult,
}

impl SuiteOutcome {
    /// Creates a new outcome.
    pub fn new(descriptor: SuiteDescriptor, result: ExecutionResult) -> Self {
        Self { descriptor, result }
    }

    /// Returns the suite's identifier.
    pub fn id(&self) -> &SuiteId {
        self.descriptor.id()
    }

    /// Returns the suite that was executed.
    pub fn descriptor(&self) -> &SuiteDescriptor {
        &self.descriptor
    }

    /// Returns the result of executing the suite.
    pub fn result(&self) -> &ExecutionResult {
        &self.result
    }

    /// Returns the declared count, or the observed count if the suite doesn't declare one.
    pub fn effective_declared_count(&self) -> usize {
        self.descriptor
            .declared_count()
            .unwrap_or_else(|| self.result.observed_total())
    }

    /// Compares the declared count against the observed count.
    ///
    /// A suite that declares a count but was aborted is always a mismatch, even if the declared
    /// count happens to equal the synthetic observed count of 1.
    pub fn count_status(&self) -> CountStatus {
        let observed = self.result.observed_total();
        match self.descriptor.declared_count() {
            Some(declared) if self.result.is_aborted() => {
                CountStatus::Mismatched { declared, observed }
            }
            declared => CountStatus::new(declared, observed),
        }
    }

    fn to_summary(&self) -> SuiteSummary {
        SuiteSummary {
            category: self.descriptor.category(),
            declared_count: self.descriptor.declared_count(),
            observed_total: self.result.observed_total(),
            passed: self.result.passed(),
            failed: self.result.failed(),
            count_status: self.count_status().to_summary(),
            abort: self.result.abort().map(|abort| abort.to_summary()),
            failures: self.result.failure_details().to_vec(),
        }
    }
}

/// Totals for a single suite category.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct CategoryTotals {
    /// The number of suites in the category.
    pub suites: usize,

    /// The sum of effective declared counts.
    pub declared: usize,

    /// The sum of observed counts.
    pub observed: usize,

    /// The number of passing test cases.
    pub passed: usize,

    /// The number of failing test cases.
    pub failed: usize,

    /// The number of suites whose declared count didn't match.
    pub mismatches: usize,

    /// The number of suites that don't declare a count.
    pub undeclared: usize,
}

impl CategoryTotals {
    fn add(&mut self, outcome: &SuiteOutcome) {
        self.suites += 1;
        self.declared = self
            .declared
            .saturating_add(outcome.effective_declared_count());
        self.observed = self
            .observed
            .saturating_add(outcome.result.observed_total());
        self.passed = self.passed.saturating_add(outcome.result.passed());
        self.failed = self.failed.saturating_add(outcome.result.failed());
        match outcome.count_status() {
            CountStatus::Mismatched { .. } => self.mismatches += 1,
            CountStatus::Undeclared { .. } => self.undeclared += 1,
            CountStatus::Matched { .. } => {}
        }
    }
}

/// The result of one reconciliation run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReconciliationReport {
    suites: BTreeMap<SuiteId, SuiteOutcome>,
    time_taken: Duration,
}

impl ReconciliationReport {
    /// Creates a new report from a set of outcomes.
    ///
    /// If more than one outcome has the same identifier, the last one wins.
    pub fn new(outcomes: impl IntoIterator<Item = SuiteOutcome>, time_taken: Duration) -> Self {
        let suites = outcomes
            .into_iter()
            .map(|outcome| (outcome.id().clone(), outcome))
            .collect();
        Self { suites, time_taken }
    }

    /// Returns the number of suites in the report.
    pub fn len(&self) -> usize {
        self.suites.len()
    }

    /// Returns true if the report has no suites.
    pub fn is_empty(&self) -> bool {
        self.suites.is_empty()
    }

    /// Returns the outcome for a suite.
    pub fn get(&self, id: &str) -> Option<&SuiteOutcome> {
        self.suites.get(id)
    }

    /// Iterates over every suite, in identifier order.
    pub fn suites(&self) -> impl Iterator<Item = &SuiteOutcome> + '_ {
        self.suites.values()
    }

    /// Iterates over suites whose declared count differs from their observed count, including
    /// aborted suites that declare a count.
    pub fn mismatches(&self) -> impl Iterator<Item = &SuiteOutcome> + '_ {
        self.suites()
            .filter(|outcome| outcome.count_status().is_mismatch())
    }

    /// Returns the number of mismatches.
    pub fn mismatch_count(&self) -> usize {
        self.mismatches().count()
    }

    /// Iterates over suites that don't declare a count.
    pub fn undeclared(&self) -> impl Iterator<Item = &SuiteOutcome> + '_ {
        self.suites()
            .filter(|outcome| outcome.descriptor.declared_count().is_none())
    }

    /// Iterates over suites that couldn't be loaded or run to completion.
    pub fn aborted(&self) -> impl Iterator<Item = &SuiteOutcome> + '_ {
        self.suites().filter(|outcome| outcome.result.is_aborted())
    }

    /// Returns the sum of declared counts. Suites that don't declare a count contribute their
    /// observed count.
    ///
    /// Like the other totals, this saturates at `usize::MAX`.
    pub fn total_declared(&self) -> usize {
        saturating_sum(self.suites().map(SuiteOutcome::effective_declared_count))
    }

    /// Returns the sum of observed counts.
    pub fn total_observed(&self) -> usize {
        saturating_sum(self.suites().map(|outcome| outcome.result.observed_total()))
    }

    /// Returns the number of passing test cases.
    pub fn total_passed(&self) -> usize {
        saturating_sum(self.suites().map(|outcome| outcome.result.passed()))
    }

    /// Returns the number of failing test cases, including synthetic failures.
    pub fn total_failed(&self) -> usize {
        saturating_sum(self.suites().map(|outcome| outcome.result.failed()))
    }

    /// Returns totals for every category with at least one suite, in category order.
    pub fn category_breakdown(&self) -> BTreeMap<SuiteCategory, CategoryTotals> {
        let mut breakdown: BTreeMap<SuiteCategory, CategoryTotals> = BTreeMap::new();
        for outcome in self.suites() {
            breakdown
                .entry(outcome.descriptor.category())
                .or_default()
                .add(outcome);
        }
        breakdown
    }

    /// Returns true if no test case failed and no suite has a mismatch.
    pub fn is_success(&self) -> bool {
        self.total_failed() == 0 && self.mismatch_count() == 0
    }

    /// Returns the exit code a caller should use for this report.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            TallyExitCode::OK
        } else {
            TallyExitCode::RECONCILE_FAILED
        }
    }

    /// Returns the wall-clock time taken by the run.
    pub fn time_taken(&self) -> Duration {
        self.time_taken
    }

    /// Converts this report into its machine-readable form.
    pub fn to_summary(&self) -> ReportSummary {
        ReportSummary {
            result: if self.is_success() {
                ReconcileResult::Pass
            } else {
                ReconcileResult::Fail
            },
            total_declared: self.total_declared(),
            total_observed: self.total_observed(),
            passed: self.total_passed(),
            failed: self.total_failed(),
            suites: self
                .suites
                .iter()
                .map(|(id, outcome)| (id.clone(), outcome.to_summary()))
                .collect(),
        }
    }
}

fn saturating_sum(counts: impl Iterator<Item = usize>) -> usize {
    counts.fold(0, usize::saturating_add)
}
