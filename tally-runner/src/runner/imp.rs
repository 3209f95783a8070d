// Copyright (c) The tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{ExecutionAbort, ExecutionResult};
use crate::{
    command::{CommandError, CommandSuite},
    config::TallyProfile,
    discovery::SuiteDescriptor,
    errors::{DisplayErrorChain, ReconcilerBuildError},
    helpers::{panic_message, plural},
    report::{ReconciliationReport, SuiteOutcome},
    suite::{LoadedSuite, Suite, SuiteContext, SuiteLoader, SuiteRun},
    test_mode::TestModeGuard,
};
use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    time::{Duration, Instant},
};
use tally_metadata::AbortKind;
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

/// How long a timed-out in-process suite keeps the test-mode flag while it finishes, by default.
pub const DEFAULT_ABANDON_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Reconciler options.
#[derive(Debug, Default)]
pub struct ReconcilerBuilder {
    suite_timeout: Option<Duration>,
    abandon_grace_period: Option<Duration>,
}

impl ReconcilerBuilder {
    /// Sets the per-suite timeout, overriding the profile's `suite-timeout`.
    pub fn set_suite_timeout(&mut self, suite_timeout: Duration) -> &mut Self {
        self.suite_timeout = Some(suite_timeout);
        self
    }

    /// Sets how long a timed-out in-process suite is given to finish (including its teardown)
    /// before it is abandoned.
    ///
    /// The suite keeps the test-mode flag during this period, so the next suite doesn't start
    /// while it is still running. Defaults to [`DEFAULT_ABANDON_GRACE_PERIOD`].
    pub fn set_abandon_grace_period(&mut self, grace_period: Duration) -> &mut Self {
        self.abandon_grace_period = Some(grace_period);
        self
    }

    /// Creates a new reconciler.
    pub fn build<'a>(
        self,
        profile: &TallyProfile<'_>,
        loader: &'a SuiteLoader,
    ) -> Result<Reconciler<'a>, ReconcilerBuildError> {
        let suite_timeout = self
            .suite_timeout
            .unwrap_or_else(|| profile.suite_timeout());

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .thread_name("tally-runner-worker")
            .build()
            .map_err(ReconcilerBuildError::TokioRuntimeCreate)?;

        Ok(Reconciler {
            loader,
            suite_timeout,
            abandon_grace_period: self
                .abandon_grace_period
                .unwrap_or(DEFAULT_ABANDON_GRACE_PERIOD),
            runtime: Some(runtime),
        })
    }
}

/// Executes suites and reconciles their declared and observed counts.
///
/// Created using [`ReconcilerBuilder::build`]. The methods on this type block, and must not be
/// called from within a Tokio runtime.
#[derive(Debug)]
pub struct Reconciler<'a> {
    loader: &'a SuiteLoader,
    suite_timeout: Duration,
    abandon_grace_period: Duration,
    // Only taken in Drop.
    runtime: Option<Runtime>,
}

impl Reconciler<'_> {
    /// Returns the per-suite timeout.
    pub fn suite_timeout(&self) -> Duration {
        self.suite_timeout
    }

    /// Executes a single suite.
    ///
    /// This never fails: if the suite can't be loaded or run to completion, a synthetic result
    /// with one failed test case is returned.
    pub fn execute(&self, descriptor: &SuiteDescriptor) -> ExecutionResult {
        let start = Instant::now();
        let cx = SuiteContext::new(descriptor);

        let outcome = match self.loader.load(descriptor) {
            Ok(suite) => {
                let _guard = TestModeGuard::acquire(descriptor.id());
                match suite {
                    LoadedSuite::InProcess(suite) => self.execute_in_process(suite, &cx),
                    LoadedSuite::Command(suite) => self.execute_command(&suite, &cx),
                }
            }
            Err(err) => Err(ExecutionAbort::new(
                AbortKind::Load,
                DisplayErrorChain::new(&err).to_string(),
            )),
        };

        let time_taken = start.elapsed();
        match outcome {
            Ok(run) => {
                debug!(
                    "suite {} ran {} {} ({} passed, {} failed)",
                    descriptor.id(),
                    run.observed_total(),
                    plural::tests_str(run.observed_total()),
                    run.passed(),
                    run.failed(),
                );
                ExecutionResult::completed(run, time_taken)
            }
            Err(abort) => {
                debug!("suite {} aborted: {abort}", descriptor.id());
                ExecutionResult::aborted(descriptor.id(), abort, time_taken)
            }
        }
    }

    /// Executes every suite once, in identifier order, and reconciles the results.
    pub fn reconcile<I>(&self, descriptors: I) -> ReconciliationReport
    where
        I: IntoIterator<Item = SuiteDescriptor>,
    {
        self.reconcile_with_callback(descriptors, |_| {})
    }

    /// Executes every suite once, in identifier order, and reconciles the results.
    ///
    /// The callback is called with progress events as suites run.
    pub fn reconcile_with_callback<I, F>(
        &self,
        descriptors: I,
        mut callback: F,
    ) -> ReconciliationReport
    where
        I: IntoIterator<Item = SuiteDescriptor>,
        F: FnMut(ReconcileEvent<'_>),
    {
        let start = Instant::now();

        let mut descriptors: Vec<_> = descriptors.into_iter().collect();
        descriptors.sort_by(|a, b| a.id().cmp(b.id()));
        descriptors.dedup_by(|later, earlier| {
            let duplicate = later.id() == earlier.id();
            if duplicate {
                warn!("suite {} was provided more than once, running it once", later.id());
            }
            duplicate
        });

        let suite_count = descriptors.len();
        info!(
            "reconciling {suite_count} {}",
            plural::suites_str(suite_count)
        );
        callback(ReconcileEvent::RunStarted { suite_count });

        let mut outcomes = Vec::with_capacity(suite_count);
        for (index, descriptor) in descriptors.into_iter().enumerate() {
            callback(ReconcileEvent::SuiteStarted {
                descriptor: &descriptor,
                index,
                suite_count,
            });

            let result = self.execute(&descriptor);
            let outcome = SuiteOutcome::new(descriptor, result);

            callback(ReconcileEvent::SuiteFinished {
                outcome: &outcome,
                index,
                suite_count,
            });
            outcomes.push(outcome);
        }

        let report = ReconciliationReport::new(outcomes, start.elapsed());
        info!(
            "reconciliation {}: {} declared, {} observed, {} failed, {} {}",
            if report.is_success() {
                "passed"
            } else {
                "failed"
            },
            report.total_declared(),
            report.total_observed(),
            report.total_failed(),
            report.mismatch_count(),
            plural::mismatches_str(report.mismatch_count()),
        );
        callback(ReconcileEvent::RunFinished { report: &report });

        report
    }

    fn runtime(&self) -> &Runtime {
        self.runtime
            .as_ref()
            .expect("runtime is only taken on drop")
    }

    fn execute_in_process(
        &self,
        suite: Box<dyn Suite>,
        cx: &SuiteContext,
    ) -> Result<SuiteRun, ExecutionAbort> {
        let suite_timeout = self.suite_timeout;
        let grace_period = self.abandon_grace_period;
        let blocking_cx = cx.clone();

        self.runtime().block_on(async move {
            let mut handle =
                tokio::task::spawn_blocking(move || run_suite_phases(suite, &blocking_cx));
            match tokio::time::timeout(suite_timeout, &mut handle).await {
                Ok(Ok(result)) => result,
                Ok(Err(join_error)) => Err(ExecutionAbort::new(
                    AbortKind::Panic,
                    join_error.to_string(),
                )),
                Err(_) => {
                    // The caller holds the test-mode flag until this returns, so the suite keeps
                    // it while it finishes within the grace period.
                    warn!(
                        "suite {} timed out, waiting up to {} for it to finish",
                        cx.suite_id(),
                        humantime::format_duration(grace_period),
                    );
                    if tokio::time::timeout(grace_period, &mut handle).await.is_err() {
                        // The blocking thread can't be cancelled. It's left to finish on its own,
                        // outside test mode.
                        cx.abandon();
                        warn!(
                            "suite {} did not finish within the grace period, abandoning its thread",
                            cx.suite_id()
                        );
                    }
                    Err(ExecutionAbort::timeout(suite_timeout))
                }
            }
        })
    }

    fn execute_command(
        &self,
        suite: &CommandSuite,
        cx: &SuiteContext,
    ) -> Result<SuiteRun, ExecutionAbort> {
        let suite_timeout = self.suite_timeout;

        self.runtime().block_on(async {
            let main = async {
                suite
                    .setup(cx)
                    .await
                    .map_err(|err| command_abort(err, AbortKind::Setup))?;
                suite
                    .run(cx)
                    .await
                    .map_err(|err| command_abort(err, AbortKind::Run))
            };
            // Dropping `main` on timeout kills the running child.
            let result = match tokio::time::timeout(suite_timeout, main).await {
                Ok(result) => result,
                Err(_) => Err(ExecutionAbort::timeout(suite_timeout)),
            };

            if suite.has_teardown() {
                match tokio::time::timeout(suite_timeout, suite.teardown(cx)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        let abort = command_abort(err, AbortKind::Run);
                        warn!("suite {}: teardown failed: {}", cx.suite_id(), abort.message());
                    }
                    Err(_) => {
                        warn!("suite {}: teardown timed out", cx.suite_id());
                    }
                }
            }

            result
        })
    }
}

impl Drop for Reconciler<'_> {
    fn drop(&mut self) {
        // Abandoned in-process suites may still be running on blocking threads. Don't wait for
        // them.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// Runs setup, run and teardown for an in-process suite. Teardown runs on every path.
fn run_suite_phases(
    mut suite: Box<dyn Suite>,
    cx: &SuiteContext,
) -> Result<SuiteRun, ExecutionAbort> {
    let result = match catch_unwind(AssertUnwindSafe(|| suite.setup(cx))) {
        Ok(Ok(())) => match catch_unwind(AssertUnwindSafe(|| suite.run(cx))) {
            Ok(Ok(run)) => Ok(run),
            Ok(Err(err)) => Err(ExecutionAbort::new(
                AbortKind::Run,
                DisplayErrorChain::new(&err).to_string(),
            )),
            Err(payload) => Err(ExecutionAbort::new(
                AbortKind::Panic,
                panic_message(&*payload),
            )),
        },
        Ok(Err(err)) => Err(ExecutionAbort::new(
            AbortKind::Setup,
            DisplayErrorChain::new(&err).to_string(),
        )),
        Err(payload) => Err(ExecutionAbort::new(
            AbortKind::Panic,
            format!("setup panicked: {}", panic_message(&*payload)),
        )),
    };

    match catch_unwind(AssertUnwindSafe(|| suite.teardown(cx))) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            warn!(
                "suite {}: teardown failed: {}",
                cx.suite_id(),
                DisplayErrorChain::new(&err)
            );
        }
        Err(payload) => {
            warn!(
                "suite {}: teardown panicked: {}",
                cx.suite_id(),
                panic_message(&*payload)
            );
        }
    }

    result
}

fn command_abort(err: CommandError, kind: AbortKind) -> ExecutionAbort {
    match err {
        CommandError::Spawn(err) => {
            // A `run` program that can't be started means the suite couldn't be loaded.
            let kind = if kind == AbortKind::Run {
                AbortKind::Load
            } else {
                kind
            };
            ExecutionAbort::new(kind, DisplayErrorChain::new(&err).to_string())
        }
        CommandError::Run(err) => {
            ExecutionAbort::new(kind, DisplayErrorChain::new(&err).to_string())
        }
    }
}

/// A progress event produced by [`Reconciler::reconcile_with_callback`].
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum ReconcileEvent<'a> {
    /// The run is about to start.
    RunStarted {
        /// The number of suites that will be executed.
        suite_count: usize,
    },

    /// A suite is about to be executed.
    SuiteStarted {
        /// The suite.
        descriptor: &'a SuiteDescriptor,

        /// The zero-based position of this suite in the run.
        index: usize,

        /// The number of suites in the run.
        suite_count: usize,
    },

    /// A suite finished executing.
    SuiteFinished {
        /// The suite and its result.
        outcome: &'a SuiteOutcome,

        /// The zero-based position of this suite in the run.
        index: usize,

        /// The number of suites in the run.
        suite_count: usize,
    },

    /// Every suite has been executed.
    RunFinished {
        /// The final report.
        report: &'a ReconciliationReport,
    },
}
