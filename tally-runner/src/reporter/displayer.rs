// Copyright (c) The tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    helpers::{first_line, plural},
    report::{CountStatus, ReconciliationReport, SuiteOutcome},
};
use owo_colors::{OwoColorize, Style};
use std::io;
use swrite::{SWrite, swrite, swriteln};

/// Renders a [`ReconciliationReport`] as text.
///
/// The output contains no timestamps or durations, so formatting the same report twice produces
/// identical output. Sections appear in this order:
///
/// 1. the overall result and totals
/// 2. totals per category
/// 3. every suite with its status
/// 4. count mismatches
/// 5. suites without a declared count
/// 6. suites that couldn't be loaded or run to completion
/// 7. failed test cases
///
/// Sections 4 to 7 are omitted when empty.
#[derive(Clone, Debug, Default)]
pub struct ReportFormatter {
    styles: Box<Styles>,
}

impl ReportFormatter {
    /// Creates a new formatter which doesn't use colors.
    pub fn new() -> Self {
        Self::default()
    }

    /// Colorizes output.
    pub fn colorize(&mut self) {
        self.styles.colorize();
    }

    /// Formats the report.
    pub fn format(&self, report: &ReconciliationReport) -> String {
        let mut out = String::new();
        self.write_totals(report, &mut out);
        self.write_categories(report, &mut out);
        self.write_suites(report, &mut out);
        self.write_mismatches(report, &mut out);
        self.write_undeclared(report, &mut out);
        self.write_aborted(report, &mut out);
        self.write_failed_tests(report, &mut out);
        out
    }

    /// Formats the report and writes it to `writer`.
    pub fn write_to(
        &self,
        report: &ReconciliationReport,
        mut writer: impl io::Write,
    ) -> io::Result<()> {
        writer.write_all(self.format(report).as_bytes())?;
        writer.flush()
    }

    fn write_totals(&self, report: &ReconciliationReport, out: &mut String) {
        let styles = &self.styles;
        let result = if report.is_success() {
            "PASS".style(styles.pass)
        } else {
            "FAIL".style(styles.fail)
        };
        swriteln!(out, "{}: {result}", "Result".style(styles.header));

        let suite_count = report.len();
        let mismatch_count = report.mismatch_count();
        swriteln!(
            out,
            "  {} {}, {} declared, {} observed ({} passed, {} failed), {} {}",
            suite_count.style(styles.count),
            plural::suites_str(suite_count),
            report.total_declared().style(styles.count),
            report.total_observed().style(styles.count),
            report.total_passed().style(styles.count),
            report.total_failed().style(styles.count),
            mismatch_count.style(styles.count),
            plural::mismatches_str(mismatch_count),
        );
    }

    fn write_categories(&self, report: &ReconciliationReport, out: &mut String) {
        let styles = &self.styles;
        swriteln!(out, "\n{}:", "Categories".style(styles.header));

        let breakdown = report.category_breakdown();
        if breakdown.is_empty() {
            swriteln!(out, "  (none)");
        }
        for (category, totals) in breakdown {
            swriteln!(
                out,
                "  {:>11}: {} {}, {} declared, {} observed, {} failed",
                category.as_str().style(styles.category),
                totals.suites.style(styles.count),
                plural::suites_str(totals.suites),
                totals.declared.style(styles.count),
                totals.observed.style(styles.count),
                totals.failed.style(styles.count),
            );
        }
    }

    fn write_suites(&self, report: &ReconciliationReport, out: &mut String) {
        let styles = &self.styles;
        swriteln!(out, "\n{}:", "Suites".style(styles.header));

        if report.is_empty() {
            swriteln!(out, "  (none)");
        }
        for outcome in report.suites() {
            let result = outcome.result();
            let status = outcome.count_status();
            let label = match status {
                CountStatus::Matched { .. } => "MATCH".style(styles.pass),
                CountStatus::Mismatched { .. } => "MISMATCH".style(styles.fail),
                CountStatus::Undeclared { .. } => "UNDECLARED".style(styles.skip),
            };

            swrite!(
                out,
                "  {label:>10} {} [{}]: {} observed",
                outcome.id().style(styles.suite_id),
                outcome.descriptor().category(),
                result.observed_total().style(styles.count),
            );
            if let CountStatus::Mismatched { declared, .. } = status {
                swrite!(out, ", {} declared", declared.style(styles.count));
            }
            if result.failed() > 0 {
                swrite!(out, ", {} failed", result.failed().style(styles.count));
            }
            if let Some(abort) = result.abort() {
                swrite!(out, ", {}", abort.kind_description().style(styles.fail));
            }
            out.push('\n');
        }
    }

    fn write_mismatches(&self, report: &ReconciliationReport, out: &mut String) {
        let styles = &self.styles;
        let mut mismatches = report.mismatches().peekable();
        if mismatches.peek().is_none() {
            return;
        }

        swriteln!(out, "\n{}:", "Mismatches".style(styles.header));
        for outcome in mismatches {
            let status = outcome.count_status();
            if let (CountStatus::Mismatched { declared, observed }, Some(delta)) =
                (status, status.delta())
            {
                swriteln!(
                    out,
                    "  {}: declared {}, observed {} ({})",
                    outcome.id().style(styles.suite_id),
                    declared.style(styles.count),
                    observed.style(styles.count),
                    format!("{delta:+}").style(styles.fail),
                );
            }
        }
    }

    fn write_undeclared(&self, report: &ReconciliationReport, out: &mut String) {
        let styles = &self.styles;
        let mut undeclared = report.undeclared().peekable();
        if undeclared.peek().is_none() {
            return;
        }

        swriteln!(out, "\n{}:", "Undeclared".style(styles.header));
        for outcome in undeclared {
            swriteln!(
                out,
                "  {}: {} observed",
                outcome.id().style(styles.suite_id),
                outcome.result().observed_total().style(styles.count),
            );
        }
    }

    fn write_aborted(&self, report: &ReconciliationReport, out: &mut String) {
        let styles = &self.styles;
        let mut aborted = report.aborted().peekable();
        if aborted.peek().is_none() {
            return;
        }

        swriteln!(out, "\n{}:", "Aborted".style(styles.header));
        for outcome in aborted {
            let Some(abort) = outcome.result().abort() else {
                continue;
            };
            swriteln!(
                out,
                "  {}: {}",
                outcome.id().style(styles.suite_id),
                abort.kind_description().style(styles.fail),
            );
            for line in abort.message().lines() {
                swriteln!(out, "    {line}");
            }
        }
    }

    fn write_failed_tests(&self, report: &ReconciliationReport, out: &mut String) {
        let styles = &self.styles;
        // Synthetic failures are already listed under "Aborted".
        let failed: Vec<&SuiteOutcome> = report
            .suites()
            .filter(|outcome| !outcome.result().is_aborted() && outcome.result().failed() > 0)
            .collect();
        if failed.is_empty() {
            return;
        }

        swriteln!(out, "\n{}:", "Failed tests".style(styles.header));
        for outcome in failed {
            for failure in outcome.result().failure_details() {
                swriteln!(
                    out,
                    "  {} {}: {}",
                    outcome.id().style(styles.suite_id),
                    failure.name.style(styles.test_name),
                    first_line(&failure.message),
                );
            }
        }
    }
}

impl ReconciliationReport {
    /// Formats this report as plain text, without colors.
    ///
    /// For colorized output, use [`ReportFormatter`].
    pub fn format(&self) -> String {
        ReportFormatter::new().format(self)
    }
}

#[derive(Clone, Debug, Default)]
struct Styles {
    header: Style,
    count: Style,
    pass: Style,
    fail: Style,
    skip: Style,
    suite_id: Style,
    category: Style,
    test_name: Style,
}

impl Styles {
    fn colorize(&mut self) {
        self.header = Style::new().bold().underline();
        self.count = Style::new().bold();
        self.pass = Style::new().green().bold();
        self.fail = Style::new().red().bold();
        self.skip = Style::new().yellow().bold();
        self.suite_id = Style::new().blue().bold();
        self.category = Style::new().magenta();
        self.test_name = Style::new().cyan();
    }
}
