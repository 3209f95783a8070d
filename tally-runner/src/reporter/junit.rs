// Copyright (c) The tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Code to generate JUnit XML reports from reconciliation reports.
//!
//! Each tally suite becomes a JUnit test suite containing:
//!
//! * one failing test case per failed test case reported by the suite, or a single errored test
//!   case if the suite couldn't be loaded or run to completion
//! * a `declared-count` test case, which fails if the declared count doesn't match the observed
//!   count and is skipped if the suite doesn't declare a count
//!
//! Passing test cases aren't listed individually, so a JUnit suite's `tests` attribute is the
//! number of failures plus one. The number of test cases the suite actually ran is recorded in
//! the `observed-total` property, and the number that passed in the `passed` property.

use crate::{
    config::JunitConfig,
    errors::WriteJunitError,
    helpers::first_line,
    report::{CountStatus, ReconciliationReport, SuiteOutcome},
};
use atomicwrites::{AtomicFile, OverwriteBehavior};
use quick_junit::{NonSuccessKind, Report, TestCase, TestCaseStatus, TestSuite};
use tracing::debug;

/// The name of the test case that checks a suite's declared count.
pub const DECLARED_COUNT_TEST_NAME: &str = "declared-count";

impl ReconciliationReport {
    /// Converts this report into a JUnit report.
    pub fn to_junit(&self, report_name: &str) -> Report {
        let mut report = Report::new(report_name);
        report
            .set_time(self.time_taken())
            .add_test_suites(self.suites().map(suite_to_junit));
        report
    }

    /// Writes this report as JUnit XML to the path in `config`, replacing any existing file.
    ///
    /// The file is written atomically: readers see either the old contents or the new ones.
    pub fn write_junit(&self, config: &JunitConfig<'_>) -> Result<(), WriteJunitError> {
        let report = self.to_junit(config.report_name());
        let junit_path = config.path();

        if let Some(junit_dir) = junit_path.parent() {
            std::fs::create_dir_all(junit_dir).map_err(|error| WriteJunitError::Fs {
                file: junit_dir.to_owned(),
                error,
            })?;
        }

        AtomicFile::new(junit_path, OverwriteBehavior::AllowOverwrite)
            .write(|f| report.serialize(f))
            .map_err(|err| match err {
                atomicwrites::Error::Internal(error) => WriteJunitError::Fs {
                    file: junit_path.to_owned(),
                    error,
                },
                atomicwrites::Error::User(error) => WriteJunitError::Junit {
                    file: junit_path.to_owned(),
                    error,
                },
            })?;

        debug!("wrote JUnit report to {junit_path}");
        Ok(())
    }
}

fn suite_to_junit(outcome: &SuiteOutcome) -> TestSuite {
    let id = outcome.id().as_str();
    let result = outcome.result();

    let mut test_suite = TestSuite::new(id);
    test_suite
        .set_time(result.time_taken())
        .add_property(("category", outcome.descriptor().category().as_str()))
        .add_property((
            "observed-total".to_owned(),
            result.observed_total().to_string(),
        ))
        .add_property(("passed".to_owned(), result.passed().to_string()));
    if let Some(declared) = outcome.descriptor().declared_count() {
        test_suite.add_property(("declared-count".to_owned(), declared.to_string()));
    }

    if let Some(abort) = result.abort() {
        let mut status = TestCaseStatus::non_success(NonSuccessKind::Error);
        status
            .set_type(abort.kind_description())
            .set_message(first_line(abort.message()))
            .set_description(abort.message());
        let mut test_case = TestCase::new(id, status);
        test_case.set_classname(id).set_time(result.time_taken());
        test_suite.add_test_case(test_case);
    } else {
        for failure in result.failure_details() {
            let mut status = TestCaseStatus::non_success(NonSuccessKind::Failure);
            status
                .set_type("test failure")
                .set_message(first_line(&failure.message))
                .set_description(failure.message.as_str());
            let mut test_case = TestCase::new(failure.name.as_str(), status);
            test_case.set_classname(id);
            test_suite.add_test_case(test_case);
        }
    }

    let count_status = match outcome.count_status() {
        CountStatus::Matched { .. } => TestCaseStatus::success(),
        CountStatus::Mismatched { declared, observed } => {
            let mut status = TestCaseStatus::non_success(NonSuccessKind::Failure);
            status
                .set_type("count mismatch")
                .set_message(format!("declared {declared}, observed {observed}"));
            status
        }
        CountStatus::Undeclared { observed } => {
            let mut status = TestCaseStatus::skipped();
            status.set_message(format!("no declared count ({observed} observed)"));
            status
        }
    };
    let mut test_case = TestCase::new(DECLARED_COUNT_TEST_NAME, count_status);
    test_case.set_classname(id);
    test_suite.add_test_case(test_case);

    test_suite
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::test_helpers::{aborted, completed};
    use std::time::Duration;
    use tally_metadata::{AbortKind, SuiteCategory};

    fn sample_report() -> ReconciliationReport {
        ReconciliationReport::new(
            [
                completed("a", SuiteCategory::Unit, Some(8), 8, 0),
                completed("b", SuiteCategory::Feature, Some(32), 28, 2),
                completed("c", SuiteCategory::Unit, None, 5, 0),
                aborted(
                    "d",
                    SuiteCategory::Command,
                    Some(1),
                    AbortKind::Timeout,
                    "suite did not finish within 5m",
                ),
            ],
            Duration::from_secs(3),
        )
    }

    #[test]
    fn junit_contents() {
        let report = sample_report().to_junit("tally-run");
        assert_eq!(report.name.as_str(), "tally-run");
        assert_eq!(report.test_suites.len(), 4);

        let names: Vec<_> = report
            .test_suites
            .iter()
            .map(|suite| suite.name.as_str())
            .collect();
        assert_eq!(names, ["a", "b", "c", "d"]);

        let b = &report.test_suites[1];
        assert_eq!(b.failures, 3, "two failed tests plus the count mismatch");
        assert_eq!(b.test_cases.len(), 3);

        let properties: Vec<_> = b
            .properties
            .iter()
            .map(|property| (property.name.as_str(), property.value.as_str()))
            .collect();
        assert_eq!(
            properties,
            [
                ("category", "feature"),
                ("observed-total", "30"),
                ("passed", "28"),
                ("declared-count", "32"),
            ]
        );

        let c = &report.test_suites[2];
        assert_eq!(c.failures, 0);
        assert_eq!(c.disabled, 1, "undeclared count is skipped");

        let d = &report.test_suites[3];
        assert_eq!(d.errors, 1);
        assert_eq!(
            d.failures, 1,
            "a declared count is a mismatch for an aborted suite"
        );

        let xml = report.to_string().expect("report serializes");
        assert!(xml.contains(r#"type="timed out""#), "{xml}");
        assert!(xml.contains("declared 32, observed 30"), "{xml}");
    }

    #[test]
    fn write_junit_creates_directories() {
        let dir = camino_tempfile::tempdir().expect("tempdir created");
        let path = dir.path().join("target/tally/junit.xml");
        let config = JunitConfig::from_parts(path.clone(), "tally-run");

        let report = sample_report();
        report.write_junit(&config).expect("junit written");
        // Overwriting an existing report succeeds.
        report.write_junit(&config).expect("junit rewritten");

        let contents = std::fs::read_to_string(&path).expect("junit file readable");
        assert!(contents.starts_with("<?xml"), "{contents}");
        assert!(contents.contains(r#"<testsuites name="tally-run""#), "{contents}");
    }
}
