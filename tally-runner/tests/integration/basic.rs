// Copyright (c) The tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use color_eyre::eyre::{Result, ensure, eyre};
use fixture_data::suite_tree::{EXPECTED_SUITES, enabled_suites};
use pretty_assertions::assert_eq;
use std::time::Duration;
use tally_metadata::{AbortKind, ReconcileResult, ReportSummary, TallyExitCode};
use tally_runner::{
    config::TallyConfig,
    discovery::{SuiteDescriptor, discover},
    report::CountStatus,
    reporter::ReportFormatter,
    runner::{ReconcileEvent, ReconcilerBuilder},
};

fn discover_enabled(config: &TallyConfig, profile_name: &str) -> Result<Vec<SuiteDescriptor>> {
    let profile = config.profile(profile_name)?;
    let suites = discover(&profile.roots(), profile.manifest_suffix())?;
    Ok(suites
        .into_iter()
        .filter(|suite| enabled_suites().any(|fixture| fixture.id == suite.id().as_str()))
        .collect())
}

#[test]
fn discover_suite_tree() -> Result<()> {
    test_init();

    let config = TallyConfig::from_sources(suite_tree_dir(), None)?;
    let profile = config.profile(TallyConfig::DEFAULT_PROFILE)?;
    let suites = discover(&profile.roots(), profile.manifest_suffix())?;

    let ids: Vec<_> = suites.iter().map(|suite| suite.id().as_str()).collect();
    let expected: Vec<_> = EXPECTED_SUITES.iter().map(|fixture| fixture.id).collect();
    assert_eq!(ids, expected, "suites are discovered in identifier order");

    for suite in &suites {
        let fixture = EXPECTED_SUITES
            .get(suite.id().as_str())
            .ok_or_else(|| eyre!("unexpected suite {}", suite.id()))?;
        ensure!(
            suite.category() == fixture.category,
            "category for {} matches",
            fixture.id
        );
        ensure!(
            suite.declared_count() == fixture.declared_count,
            "declared count for {} matches",
            fixture.id
        );
    }

    Ok(())
}

#[test]
fn reconcile_suite_tree() -> Result<()> {
    test_init();

    let temp = TempSuiteTree::new()?;
    let config = TallyConfig::from_sources(temp.workspace_root(), None)?;
    let profile = config.profile(TallyConfig::DEFAULT_PROFILE)?;
    let suites = discover_enabled(&config, TallyConfig::DEFAULT_PROFILE)?;

    let loader = suite_tree_loader();
    let reconciler = ReconcilerBuilder::default().build(&profile, &loader)?;
    let report = reconciler.reconcile(suites.iter().cloned());

    let summary = report.to_summary();
    check_summary(&summary, enabled_suites())?;

    let expected_declared: usize = enabled_suites()
        .map(|fixture| fixture.declared_count.unwrap_or(fixture.observed_total()))
        .sum();
    let expected_observed: usize = enabled_suites().map(|f| f.observed_total()).sum();
    let expected_failed: usize = enabled_suites().map(|f| f.failed).sum();
    assert_eq!(report.total_declared(), expected_declared);
    assert_eq!(report.total_observed(), expected_observed);
    assert_eq!(report.total_failed(), expected_failed);
    assert_eq!(
        report.total_passed() + report.total_failed(),
        report.total_observed()
    );

    assert!(!report.is_success());
    assert_eq!(summary.result, ReconcileResult::Fail);
    assert_eq!(report.exit_code(), TallyExitCode::RECONCILE_FAILED);

    let storage = report
        .get("storage/integration")
        .ok_or_else(|| eyre!("storage/integration missing"))?;
    let abort = storage
        .result()
        .abort()
        .ok_or_else(|| eyre!("storage/integration aborted"))?;
    assert_eq!(abort.kind(), AbortKind::Panic);
    ensure!(
        abort.message().contains("storage backend unavailable"),
        "panic message is preserved: {}",
        abort.message()
    );
    assert_eq!(
        storage.count_status(),
        CountStatus::Mismatched {
            declared: 4,
            observed: 1
        }
    );

    let legacy = report
        .get("legacy/unit")
        .ok_or_else(|| eyre!("legacy/unit missing"))?;
    let abort = legacy
        .result()
        .abort()
        .ok_or_else(|| eyre!("legacy/unit aborted"))?;
    assert_eq!(abort.kind(), AbortKind::Load);
    ensure!(
        abort.message().contains("legacy-unit"),
        "load error names the missing suite: {}",
        abort.message()
    );

    // Declares exactly the synthetic count, and is still a mismatch.
    let smoke = report
        .get("legacy/smoke")
        .ok_or_else(|| eyre!("legacy/smoke missing"))?;
    assert_eq!(
        smoke.count_status(),
        CountStatus::Mismatched {
            declared: 1,
            observed: 1
        }
    );
    ensure!(
        summary
            .mismatched_suites()
            .any(|id| id.as_str() == "legacy/smoke"),
        "legacy/smoke listed as mismatched in the summary"
    );

    let picker = report
        .get("picker")
        .ok_or_else(|| eyre!("picker missing"))?;
    let failed_names: Vec<_> = picker
        .result()
        .failure_details()
        .iter()
        .map(|failure| failure.name.as_str())
        .collect();
    assert_eq!(failed_names, ["pick_07", "pick_19"]);

    Ok(())
}

#[cfg(unix)]
#[test]
fn reconcile_command_suites() -> Result<()> {
    test_init();

    let temp = TempSuiteTree::new()?;
    let config = TallyConfig::from_sources(temp.workspace_root(), None)?;
    let profile = config.profile(TallyConfig::DEFAULT_PROFILE)?;
    let suites: Vec<_> = discover_enabled(&config, TallyConfig::DEFAULT_PROFILE)?
        .into_iter()
        .filter(|suite| suite.id().as_str().starts_with("cli/"))
        .collect();
    assert_eq!(suites.len(), 2);

    let loader = suite_tree_loader();
    let reconciler = ReconcilerBuilder::default().build(&profile, &loader)?;
    let report = reconciler.reconcile(suites);

    let status = report
        .get("cli/status")
        .ok_or_else(|| eyre!("cli/status missing"))?;
    assert_eq!(status.count_status(), CountStatus::Matched { count: 3 });
    assert_eq!(status.result().passed(), 3);

    let libtest = report
        .get("cli/libtest")
        .ok_or_else(|| eyre!("cli/libtest missing"))?;
    assert_eq!(libtest.count_status(), CountStatus::Matched { count: 3 });
    let failures = libtest.result().failure_details();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].name, "status::dirty");
    ensure!(
        failures[0].message.contains("expected dirty tree"),
        "failure message captured: {}",
        failures[0].message
    );

    // One failed test case, but no mismatches.
    assert_eq!(report.mismatch_count(), 0);
    assert_eq!(report.exit_code(), TallyExitCode::RECONCILE_FAILED);

    Ok(())
}

#[test]
fn repeated_runs_format_identically() -> Result<()> {
    test_init();

    let temp = TempSuiteTree::new()?;
    let config = TallyConfig::from_sources(temp.workspace_root(), None)?;
    let profile = config.profile(TallyConfig::DEFAULT_PROFILE)?;
    let loader = suite_tree_loader();
    let reconciler = ReconcilerBuilder::default().build(&profile, &loader)?;

    let first = reconciler.reconcile(discover_enabled(&config, TallyConfig::DEFAULT_PROFILE)?);
    // Pass the suites in reverse order the second time: the report is ordered by identifier.
    let mut suites = discover_enabled(&config, TallyConfig::DEFAULT_PROFILE)?;
    suites.reverse();
    let second = reconciler.reconcile(suites);

    assert_eq!(first.format(), second.format());
    assert_eq!(first.to_summary(), second.to_summary());

    let mut formatter = ReportFormatter::new();
    formatter.colorize();
    assert_eq!(formatter.format(&first), formatter.format(&second));

    let text = first.format();
    ensure!(text.starts_with("Result: FAIL\n"), "unexpected output:\n{text}");
    ensure!(
        text.contains("picker: declared 32, observed 30 (-2)"),
        "mismatch listed:\n{text}"
    );
    ensure!(
        text.contains("picker/unit"),
        "undeclared suite listed:\n{text}"
    );

    let json = first.to_summary().to_json_pretty();
    let parsed = ReportSummary::parse_json(&json)?;
    assert_eq!(parsed, first.to_summary());

    Ok(())
}

#[test]
fn reconcile_events_in_order() -> Result<()> {
    test_init();

    let temp = TempSuiteTree::new()?;
    let config = TallyConfig::from_sources(temp.workspace_root(), None)?;
    let profile = config.profile(TallyConfig::DEFAULT_PROFILE)?;
    let loader = suite_tree_loader();
    let reconciler = ReconcilerBuilder::default().build(&profile, &loader)?;
    let suites = discover_enabled(&config, TallyConfig::DEFAULT_PROFILE)?;
    let expected_ids: Vec<_> = enabled_suites().map(|fixture| fixture.id.to_owned()).collect();

    let mut started = Vec::new();
    let mut finished = Vec::new();
    let mut run_started = None;
    let mut run_finished = false;
    reconciler.reconcile_with_callback(suites, |event| match event {
        ReconcileEvent::RunStarted { suite_count } => run_started = Some(suite_count),
        ReconcileEvent::SuiteStarted {
            descriptor, index, ..
        } => started.push((index, descriptor.id().to_string())),
        ReconcileEvent::SuiteFinished { outcome, index, .. } => {
            finished.push((index, outcome.id().to_string()))
        }
        ReconcileEvent::RunFinished { report } => {
            run_finished = report.len() == expected_ids.len();
        }
        _ => {}
    });

    let expected: Vec<_> = expected_ids.iter().cloned().enumerate().collect();
    assert_eq!(run_started, Some(expected_ids.len()));
    assert_eq!(started, expected);
    assert_eq!(finished, expected);
    assert!(run_finished, "run finished with every suite in the report");

    Ok(())
}

#[test]
fn ci_profile_writes_junit() -> Result<()> {
    test_init();

    let temp = TempSuiteTree::new()?;
    let config = TallyConfig::from_sources(temp.workspace_root(), None)?;
    let profile = config.profile("ci")?;
    assert_eq!(profile.suite_timeout(), Duration::from_secs(30));
    assert_eq!(
        profile.roots(),
        [temp.workspace_root().join("suites")],
        "roots are inherited from the default profile"
    );

    let junit = profile
        .junit()
        .ok_or_else(|| eyre!("junit enabled for the ci profile"))?;
    assert_eq!(
        junit.path(),
        temp.workspace_root().join("target/tally/junit.xml")
    );
    assert_eq!(junit.report_name(), "suite-tree");

    let loader = suite_tree_loader();
    let reconciler = ReconcilerBuilder::default().build(&profile, &loader)?;
    assert_eq!(reconciler.suite_timeout(), Duration::from_secs(30));
    let report = reconciler.reconcile(discover_enabled(&config, "ci")?);
    report.write_junit(&junit)?;

    let xml = std::fs::read_to_string(junit.path())?;
    ensure!(
        xml.contains(r#"<testsuites name="suite-tree""#),
        "report name used:\n{xml}"
    );
    for fixture in enabled_suites() {
        ensure!(
            xml.contains(&format!(r#"<testsuite name="{}""#, fixture.id)),
            "suite {} present:\n{xml}",
            fixture.id
        );
    }
    ensure!(
        xml.contains("declared 32, observed 30"),
        "mismatch recorded:\n{xml}"
    );

    Ok(())
}

#[test]
fn unknown_profile() -> Result<()> {
    test_init();

    let config = TallyConfig::from_sources(suite_tree_dir(), None)?;
    let err = config
        .profile("nightly")
        .expect_err("nightly profile isn't defined");
    let message = err.to_string();
    ensure!(message.contains("nightly"), "profile named: {message}");
    ensure!(message.contains("ci"), "known profiles listed: {message}");

    Ok(())
}
