// Copyright (c) The tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::{Utf8Path, Utf8PathBuf};
use camino_tempfile::Utf8TempDir;
use color_eyre::eyre::{Context, Result, eyre};
use fixture_data::{models::SuiteFixture, suite_tree::registered};
use std::sync::Once;
use tally_runner::{
    errors::SuiteError,
    suite::{Suite, SuiteContext, SuiteLoader, SuiteRegistry, SuiteRun},
    test_mode,
};
use tally_metadata::{CountStatusSummary, ReportSummary};
use walkdir::WalkDir;

pub(crate) fn test_init() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        // Ignore errors: another test binary or harness may have installed these already.
        _ = color_eyre::install();
        _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

/// A temporary copy of the `suite-tree` fixture, so that reports can be written into it.
#[derive(Debug)]
pub(crate) struct TempSuiteTree {
    // Held to keep the directory alive.
    _temp_dir: Utf8TempDir,
    workspace_root: Utf8PathBuf,
}

impl TempSuiteTree {
    pub(crate) fn new() -> Result<Self> {
        let temp_dir = camino_tempfile::Builder::new()
            .prefix("tally-suite-tree-")
            .tempdir()?;
        let workspace_root = temp_dir.path().join("suite-tree");
        copy_dir_all(&suite_tree_dir(), &workspace_root)?;
        Ok(Self {
            _temp_dir: temp_dir,
            workspace_root,
        })
    }

    pub(crate) fn workspace_root(&self) -> &Utf8Path {
        &self.workspace_root
    }
}

pub(crate) fn suite_tree_dir() -> Utf8PathBuf {
    Utf8Path::new(env!("CARGO_MANIFEST_DIR")).join("../fixtures/suite-tree")
}

fn copy_dir_all(src: &Utf8Path, dst: &Utf8Path) -> Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry?;
        let path = Utf8Path::from_path(entry.path())
            .ok_or_else(|| eyre!("non-UTF-8 fixture path: {}", entry.path().display()))?;
        let relative = path.strip_prefix(src)?;
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)
                .wrap_err_with(|| format!("failed to create {target}"))?;
        } else {
            std::fs::copy(path, &target)
                .wrap_err_with(|| format!("failed to copy {path} to {target}"))?;
        }
    }
    Ok(())
}

/// Returns a loader with every in-process suite that the fixture's manifests name, except for
/// `legacy-smoke` and `legacy-unit`.
pub(crate) fn suite_tree_loader() -> SuiteLoader {
    let mut registry = SuiteRegistry::new();
    registry
        .register_fn(registered::PARSER_UNIT, |cx| {
            ensure_test_mode(cx)?;
            let mut run = SuiteRun::default();
            for _ in 0..12 {
                run.pass();
            }
            Ok(run)
        })
        .register(registered::PICKER_FEATURE, || {
            let suite: Box<dyn Suite> = Box::new(PickerFeature::default());
            Ok(suite)
        })
        .register_fn(registered::PICKER_UNIT, |_| {
            let mut run = SuiteRun::default();
            for _ in 0..5 {
                run.pass();
            }
            Ok(run)
        })
        .register_fn(registered::STORAGE_INTEGRATION, |_| -> Result<SuiteRun, SuiteError> {
            panic!("storage backend unavailable")
        });
    SuiteLoader::new(registry)
}

fn ensure_test_mode(cx: &SuiteContext) -> Result<(), SuiteError> {
    if !cx.is_test_mode() || test_mode::active_suite().as_ref() != Some(cx.suite_id()) {
        return Err(SuiteError::new("test mode is not active for this suite"));
    }
    Ok(())
}

/// A suite with a setup phase: 30 cases, of which two fail.
#[derive(Debug, Default)]
struct PickerFeature {
    cases: Vec<(String, bool)>,
}

impl Suite for PickerFeature {
    fn setup(&mut self, _cx: &SuiteContext) -> Result<(), SuiteError> {
        self.cases = (0..30)
            .map(|i| (format!("pick_{i:02}"), i != 7 && i != 19))
            .collect();
        Ok(())
    }

    fn run(&mut self, _cx: &SuiteContext) -> Result<SuiteRun, SuiteError> {
        let mut run = SuiteRun::default();
        for (name, passes) in &self.cases {
            if *passes {
                run.pass();
            } else {
                run.fail(name, format!("{name}: picked the wrong item"));
            }
        }
        Ok(run)
    }
}

/// Checks a serialized summary against the expected fixture results.
pub(crate) fn check_summary<'a>(
    summary: &ReportSummary,
    expected: impl IntoIterator<Item = &'a SuiteFixture>,
) -> Result<()> {
    let mut expected_count = 0;
    for fixture in expected {
        expected_count += 1;
        let suite = summary
            .suites
            .get(fixture.id)
            .ok_or_else(|| eyre!("suite {} missing from summary", fixture.id))?;
        let actual = (
            suite.category,
            suite.declared_count,
            suite.passed,
            suite.failed,
            suite.abort.as_ref().map(|abort| abort.kind),
            suite.count_status,
        );
        let expected = (
            fixture.category,
            fixture.declared_count,
            fixture.passed,
            fixture.failed,
            fixture.abort,
            fixture.expected_count_status(),
        );
        if actual != expected {
            return Err(eyre!(
                "suite {}: expected {expected:?}, found {actual:?}",
                fixture.id
            ));
        }
        if suite.observed_total != fixture.observed_total() {
            return Err(eyre!(
                "suite {}: observed total {} doesn't match {}",
                fixture.id,
                suite.observed_total,
                fixture.observed_total(),
            ));
        }
        if suite.count_status == CountStatusSummary::Mismatch
            && !summary.mismatched_suites().any(|id| id.as_str() == fixture.id)
        {
            return Err(eyre!("suite {} not listed as mismatched", fixture.id));
        }
    }
    if summary.suites.len() != expected_count {
        return Err(eyre!(
            "expected {expected_count} suites, found {}",
            summary.suites.len()
        ));
    }
    Ok(())
}
