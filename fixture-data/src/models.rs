// Copyright (c) The tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Data models for fixture information.

use iddqd::{IdOrdItem, id_upcast};
use tally_metadata::{AbortKind, CountStatusSummary, SuiteCategory};

/// The expected outcome of reconciling a single fixture suite.
#[derive(Clone, Debug)]
pub struct SuiteFixture {
    pub id: &'static str,
    pub category: SuiteCategory,
    pub declared_count: Option<usize>,
    pub passed: usize,
    pub failed: usize,
    pub abort: Option<AbortKind>,
    pub properties: SuiteFixtureProperties,
}

impl SuiteFixture {
    pub fn new(id: &'static str, category: SuiteCategory, declared_count: Option<usize>) -> Self {
        Self {
            id,
            category,
            declared_count,
            passed: 0,
            failed: 0,
            abort: None,
            properties: SuiteFixtureProperties::default(),
        }
    }

    pub fn with_results(mut self, passed: usize, failed: usize) -> Self {
        self.passed = passed;
        self.failed = failed;
        self
    }

    /// Marks this suite as aborted. An aborted suite is observed as a single failed test case.
    pub fn with_abort(mut self, kind: AbortKind) -> Self {
        self.passed = 0;
        self.failed = 1;
        self.abort = Some(kind);
        self
    }

    /// Marks this suite as running an external command through `sh`.
    pub fn unix_only(mut self) -> Self {
        self.properties.unix_only = true;
        self
    }

    pub fn observed_total(&self) -> usize {
        self.passed + self.failed
    }

    pub fn expected_count_status(&self) -> CountStatusSummary {
        match self.declared_count {
            // Aborted suites never match a declared count.
            Some(_) if self.abort.is_some() => CountStatusSummary::Mismatch,
            Some(declared) if declared == self.observed_total() => CountStatusSummary::Match,
            Some(_) => CountStatusSummary::Mismatch,
            None => CountStatusSummary::Undeclared,
        }
    }

    /// Returns true if this suite is expected to be part of a run on the current platform.
    pub fn is_enabled(&self) -> bool {
        !self.properties.unix_only || cfg!(unix)
    }
}

impl IdOrdItem for SuiteFixture {
    type Key<'a> = &'a str;
    fn key(&self) -> Self::Key<'_> {
        self.id
    }
    id_upcast!();
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SuiteFixtureProperties {
    pub unix_only: bool,
}
