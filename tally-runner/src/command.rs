// Copyright (c) The tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Suites that run as child processes.
//!
//! A command suite runs an optional `setup` command, the `run` command, and an optional
//! `teardown` command. Every command runs with the suite's working directory and environment,
//! plus:
//!
//! * `TALLY_TEST_MODE=1`
//! * `TALLY_SUITE_ID`: the suite identifier
//! * `TALLY_SUITE_CATEGORY`: the suite category
//!
//! The standard output of the `run` command is parsed according to the suite's
//! [`OutputFormat`].

use crate::{
    errors::{CommandRunError, SuiteLoadError},
    suite::{SuiteContext, SuiteRun},
};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::{collections::BTreeMap, fmt, process::Stdio};
use tally_metadata::{FailureDetail, SuiteRunSummary};
use tokio::process::Command;
use tracing::debug;

/// Environment variable set to `1` for every command a command suite runs.
pub const TEST_MODE_ENV: &str = "TALLY_TEST_MODE";

/// Environment variable containing the suite identifier.
pub const SUITE_ID_ENV: &str = "TALLY_SUITE_ID";

/// Environment variable containing the suite category.
pub const SUITE_CATEGORY_ENV: &str = "TALLY_SUITE_CATEGORY";

/// The number of trailing lines of standard error included in error messages.
const STDERR_TAIL_LINES: usize = 20;

/// The format of the output printed by a command suite's `run` command.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// A [`SuiteRunSummary`] printed as a line of JSON.
    #[default]
    Json,

    /// The output of a libtest test binary.
    Libtest,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Libtest => write!(f, "libtest"),
        }
    }
}

/// Describes how to run a command suite.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandSpec {
    run: Vec<String>,
    setup: Option<Vec<String>>,
    teardown: Option<Vec<String>>,
    format: OutputFormat,
    cwd: Utf8PathBuf,
    env: BTreeMap<String, String>,
}

impl CommandSpec {
    /// Creates a new spec which runs `run` in the working directory `cwd`.
    pub fn new(run: Vec<String>, cwd: impl Into<Utf8PathBuf>) -> Self {
        Self {
            run,
            setup: None,
            teardown: None,
            format: OutputFormat::default(),
            cwd: cwd.into(),
            env: BTreeMap::new(),
        }
    }

    /// Sets the command run before the `run` command.
    pub fn with_setup(mut self, setup: Vec<String>) -> Self {
        self.setup = Some(setup);
        self
    }

    /// Sets the command run after the `run` command, whether or not it succeeded.
    pub fn with_teardown(mut self, teardown: Vec<String>) -> Self {
        self.teardown = Some(teardown);
        self
    }

    /// Sets the output format of the `run` command.
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Adds an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Returns the `run` command.
    pub fn run(&self) -> &[String] {
        &self.run
    }

    /// Returns the `setup` command, if any.
    pub fn setup(&self) -> Option<&[String]> {
        self.setup.as_deref()
    }

    /// Returns the `teardown` command, if any.
    pub fn teardown(&self) -> Option<&[String]> {
        self.teardown.as_deref()
    }

    /// Returns the output format.
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Returns the working directory.
    pub fn cwd(&self) -> &Utf8Path {
        &self.cwd
    }

    /// Returns the additional environment variables.
    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }
}

/// An error produced while running one of a command suite's commands.
#[derive(Debug)]
pub(crate) enum CommandError {
    /// The program could not be started.
    Spawn(SuiteLoadError),

    /// The program ran, but didn't produce a usable result.
    Run(CommandRunError),
}

/// A command suite that has passed validation.
#[derive(Clone, Debug)]
pub(crate) struct CommandSuite {
    spec: CommandSpec,
}

impl CommandSuite {
    /// Validates the spec: every command must be non-empty and the working directory must exist.
    pub(crate) fn load(spec: &CommandSpec) -> Result<Self, SuiteLoadError> {
        let phases = [
            ("setup", spec.setup()),
            ("run", Some(spec.run())),
            ("teardown", spec.teardown()),
        ];
        for (phase, argv) in phases {
            if argv.is_some_and(|argv| argv.is_empty()) {
                return Err(SuiteLoadError::EmptyCommand { phase });
            }
        }
        if !spec.cwd.is_dir() {
            return Err(SuiteLoadError::CwdNotFound {
                cwd: spec.cwd.clone(),
            });
        }

        Ok(Self { spec: spec.clone() })
    }

    pub(crate) async fn setup(&self, cx: &SuiteContext) -> Result<(), CommandError> {
        match &self.spec.setup {
            Some(argv) => self.run_phase("setup", argv, cx).await,
            None => Ok(()),
        }
    }

    pub(crate) async fn run(&self, cx: &SuiteContext) -> Result<SuiteRun, CommandError> {
        let output = self.spawn_and_wait(&self.spec.run, cx).await?;
        let program = self.spec.run[0].clone();
        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!(
            "suite {}: `{program}` exited with {}",
            cx.suite_id(),
            output.status
        );

        let parsed = match self.spec.format {
            OutputFormat::Json => parse_json_output(&stdout),
            OutputFormat::Libtest => parse_libtest_output(&stdout),
        };
        match parsed {
            Ok(Some(run)) => Ok(run),
            Ok(None) => Err(CommandError::Run(CommandRunError::MissingSummary {
                program,
                status: output.status,
                stderr: stderr_tail(&output.stderr),
            })),
            Err(err) => Err(CommandError::Run(CommandRunError::InvalidSummary {
                program,
                err,
            })),
        }
    }

    pub(crate) async fn teardown(&self, cx: &SuiteContext) -> Result<(), CommandError> {
        match &self.spec.teardown {
            Some(argv) => self.run_phase("teardown", argv, cx).await,
            None => Ok(()),
        }
    }

    pub(crate) fn has_teardown(&self) -> bool {
        self.spec.teardown.is_some()
    }

    async fn run_phase(
        &self,
        phase: &'static str,
        argv: &[String],
        cx: &SuiteContext,
    ) -> Result<(), CommandError> {
        let output = self.spawn_and_wait(argv, cx).await?;
        if output.status.success() {
            debug!("suite {}: {phase} command succeeded", cx.suite_id());
            Ok(())
        } else {
            Err(CommandError::Run(CommandRunError::PhaseFailed {
                phase,
                program: argv[0].clone(),
                status: output.status,
                stderr: stderr_tail(&output.stderr),
            }))
        }
    }

    async fn spawn_and_wait(
        &self,
        argv: &[String],
        cx: &SuiteContext,
    ) -> Result<std::process::Output, CommandError> {
        let (program, args) = argv.split_first().ok_or(CommandError::Spawn(
            SuiteLoadError::EmptyCommand { phase: "run" },
        ))?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(&self.spec.cwd)
            .envs(&self.spec.env)
            .env(TEST_MODE_ENV, "1")
            .env(SUITE_ID_ENV, cx.suite_id().as_str())
            .env(SUITE_CATEGORY_ENV, cx.category().as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // The child is killed if the suite times out and this future is dropped.
            .kill_on_drop(true);

        debug!("suite {}: running {argv:?} in {}", cx.suite_id(), self.spec.cwd);
        let child = cmd.spawn().map_err(|err| {
            CommandError::Spawn(SuiteLoadError::Spawn {
                program: program.clone(),
                err,
            })
        })?;

        child.wait_with_output().await.map_err(|err| {
            CommandError::Run(CommandRunError::Wait {
                program: program.clone(),
                err,
            })
        })
    }
}

/// Finds the last line of `stdout` that parses as a [`SuiteRunSummary`].
///
/// Returns `Ok(None)` if no line parses.
pub(crate) fn parse_json_output(
    stdout: &str,
) -> Result<Option<SuiteRun>, tally_metadata::RunSummaryError> {
    let summary = stdout.lines().rev().find_map(|line| {
        let line = line.trim();
        if !line.starts_with('{') {
            return None;
        }
        serde_json::from_str::<SuiteRunSummary>(line).ok()
    });

    match summary {
        Some(summary) => SuiteRun::from_summary(summary).map(Some),
        None => Ok(None),
    }
}

/// Tallies the output of one or more libtest test binaries.
///
/// Returns `Ok(None)` if no `test result:` line was printed.
pub(crate) fn parse_libtest_output(
    stdout: &str,
) -> Result<Option<SuiteRun>, tally_metadata::RunSummaryError> {
    let mut passed = 0;
    let mut failed_names = Vec::new();
    let mut messages: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    let mut saw_result = false;
    let mut current_block: Option<&str> = None;

    for line in stdout.lines() {
        if let Some(name) = line
            .strip_prefix("---- ")
            .and_then(|rest| rest.strip_suffix(" stdout ----"))
        {
            current_block = Some(name);
            messages.entry(name).or_default();
            continue;
        }

        if line.starts_with("test result: ") {
            saw_result = true;
            current_block = None;
            continue;
        }

        if let Some(rest) = line.strip_prefix("test ") {
            if let Some((name, status)) = rest.split_once(" ... ") {
                current_block = None;
                if status == "ok" {
                    passed += 1;
                } else if status == "FAILED" {
                    failed_names.push(name);
                }
                // Anything else (`ignored`, `ignored, <reason>`, benchmarks) isn't executed as a
                // test case.
                continue;
            }
        }

        if line == "failures:" {
            current_block = None;
            continue;
        }

        if let Some(name) = current_block {
            messages.entry(name).or_default().push(line);
        }
    }

    if !saw_result {
        return Ok(None);
    }

    let failures = failed_names
        .into_iter()
        .map(|name| {
            let message = messages
                .get(name)
                .map(|lines| lines.join("\n").trim().to_owned())
                .filter(|message| !message.is_empty())
                .unwrap_or_else(|| "test failed".to_owned());
            FailureDetail::new(name, message)
        })
        .collect();
    Ok(Some(SuiteRun::new(passed, failures)))
}

fn stderr_tail(stderr: &[u8]) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = stderr.trim_end().lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use tally_metadata::RunSummaryError;

    #[test]
    fn json_last_summary_wins() {
        let stdout = indoc! {r#"
            starting suite
            {"total":1,"passed":1,"failed":0}
            {"not": "a summary"}
            {"total":3,"passed":2,"failed":1,"failures":[{"name":"sorts","message":"expected 1, got 2"}]}
            done
        "#};

        let run = parse_json_output(stdout)
            .expect("summary is valid")
            .expect("summary is present");
        assert_eq!(run.observed_total(), 3);
        assert_eq!(run.passed(), 2);
        assert_eq!(
            run.failures(),
            [FailureDetail::new("sorts", "expected 1, got 2")]
        );
    }

    #[test]
    fn json_missing_summary() {
        assert_eq!(
            parse_json_output("no summary here\n{broken").expect("no invalid summary"),
            None
        );
        assert_eq!(parse_json_output("").expect("no invalid summary"), None);
    }

    #[test]
    fn json_inconsistent_summary() {
        let err = parse_json_output(r#"{"total":3,"passed":2,"failed":0}"#).unwrap_err();
        assert!(
            matches!(err, RunSummaryError::InconsistentCounts { total: 3, .. }),
            "unexpected error: {err}"
        );

        let err = parse_json_output(r#"{"total":1,"passed":0,"failed":1}"#).unwrap_err();
        assert!(
            matches!(
                err,
                RunSummaryError::FailureDetailsMismatch {
                    failed: 1,
                    details: 0
                }
            ),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn libtest_output() {
        let stdout = indoc! {"
            running 4 tests
            test picker::opens ... ok
            test picker::sorts ... FAILED
            test picker::slow ... ignored, takes too long
            test picker::filters ... FAILED

            failures:

            ---- picker::sorts stdout ----
            thread 'picker::sorts' panicked at src/picker.rs:10:5:
            assertion `left == right` failed

            ---- picker::filters stdout ----

            failures:
                picker::sorts
                picker::filters

            test result: FAILED. 1 passed; 2 failed; 1 ignored; 0 measured; 0 filtered out; finished in 0.01s

            running 1 test
            test render ... ok

            test result: ok. 1 passed; 0 failed; 0 ignored; 0 measured; 0 filtered out; finished in 0.00s
        "};

        let run = parse_libtest_output(stdout)
            .expect("output is valid")
            .expect("result line is present");
        assert_eq!(run.passed(), 2);
        assert_eq!(run.failed(), 2);
        assert_eq!(run.observed_total(), 4);
        assert_eq!(
            run.failures(),
            [
                FailureDetail::new(
                    "picker::sorts",
                    "thread 'picker::sorts' panicked at src/picker.rs:10:5:\n\
                     assertion `left == right` failed"
                ),
                FailureDetail::new("picker::filters", "test failed"),
            ]
        );
    }

    #[test]
    fn libtest_missing_result_line() {
        let stdout = indoc! {"
            running 2 tests
            test a ... ok
        "};
        assert_eq!(parse_libtest_output(stdout).expect("no error"), None);
    }

    #[test]
    fn stderr_tail_keeps_last_lines() {
        let stderr: String = (0..30).map(|i| format!("line {i}\n")).collect();
        let tail = stderr_tail(stderr.as_bytes());
        assert_eq!(tail.lines().count(), STDERR_TAIL_LINES);
        assert_eq!(tail.lines().next(), Some("line 10"));
        assert_eq!(tail.lines().last(), Some("line 29"));
    }

    #[test]
    fn load_validates_spec() {
        let dir = camino_tempfile::tempdir().expect("tempdir created");

        let err = CommandSuite::load(&CommandSpec::new(vec![], dir.path())).unwrap_err();
        assert!(
            matches!(err, SuiteLoadError::EmptyCommand { phase: "run" }),
            "unexpected error: {err}"
        );

        let err = CommandSuite::load(
            &CommandSpec::new(vec!["true".to_owned()], dir.path()).with_teardown(vec![]),
        )
        .unwrap_err();
        assert!(
            matches!(err, SuiteLoadError::EmptyCommand { phase: "teardown" }),
            "unexpected error: {err}"
        );

        let missing = dir.path().join("missing");
        let err =
            CommandSuite::load(&CommandSpec::new(vec!["true".to_owned()], &missing)).unwrap_err();
        match err {
            SuiteLoadError::CwdNotFound { cwd } => assert_eq!(cwd, missing),
            other => panic!("unexpected error: {other}"),
        }

        CommandSuite::load(&CommandSpec::new(vec!["true".to_owned()], dir.path()))
            .expect("valid spec loads");
    }
}
