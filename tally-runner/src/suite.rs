// Copyright (c) The tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The suite run contract, and loading suites from descriptors.
//!
//! In-process suites implement [`Suite`] and are registered by name with a [`SuiteRegistry`].
//! Manifests refer to them with `registered = "<name>"`. A [`SuiteLoader`] turns a
//! [`SuiteDescriptor`] into something that can be run, either by calling a registered factory or
//! by validating a command suite.

use crate::{
    command::CommandSuite,
    discovery::{SuiteDescriptor, SuiteSource},
    errors::{SuiteError, SuiteLoadError},
    helpers::panic_message,
};
use camino::{Utf8Path, Utf8PathBuf};
use debug_ignore::DebugIgnore;
use std::{
    collections::BTreeMap,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use tally_metadata::{FailureDetail, RunSummaryError, SuiteCategory, SuiteId, SuiteRunSummary};
use tracing::debug;

/// The run contract for an in-process suite.
///
/// `setup` and `teardown` are optional. `teardown` is called after `run` on every exit path,
/// including when `setup` or `run` fails or panics.
///
/// If the suite times out, it keeps the test-mode flag for a grace period while it finishes. A
/// suite still running after that is abandoned: it runs to completion on its own thread, with
/// [`SuiteContext::is_test_mode`] returning false.
pub trait Suite: Send {
    /// Prepares the suite for running.
    fn setup(&mut self, _cx: &SuiteContext) -> Result<(), SuiteError> {
        Ok(())
    }

    /// Runs every test case in the suite.
    fn run(&mut self, cx: &SuiteContext) -> Result<SuiteRun, SuiteError>;

    /// Cleans up after the suite. Errors are logged but not counted as failures.
    fn teardown(&mut self, _cx: &SuiteContext) -> Result<(), SuiteError> {
        Ok(())
    }
}

/// The isolation token passed to every operation of a suite.
///
/// Suites should read their identity and test-mode status from here rather than from
/// process-wide state.
#[derive(Clone, Debug)]
pub struct SuiteContext {
    suite_id: SuiteId,
    category: SuiteCategory,
    manifest_dir: Option<Utf8PathBuf>,
    // Shared with every clone handed to the suite. Cleared when the suite is abandoned.
    test_mode: Arc<AtomicBool>,
}

impl SuiteContext {
    pub(crate) fn new(descriptor: &SuiteDescriptor) -> Self {
        Self {
            suite_id: descriptor.id().clone(),
            category: descriptor.category(),
            manifest_dir: descriptor.manifest_dir().map(ToOwned::to_owned),
            test_mode: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Returns the identifier of the suite being run.
    pub fn suite_id(&self) -> &SuiteId {
        &self.suite_id
    }

    /// Returns the category of the suite being run.
    pub fn category(&self) -> SuiteCategory {
        self.category
    }

    /// Returns the directory containing the suite's manifest, if it has one.
    pub fn manifest_dir(&self) -> Option<&Utf8Path> {
        self.manifest_dir.as_deref()
    }

    /// Returns true if the suite is running in test mode.
    ///
    /// This is true while a reconciler is executing the suite. It turns false if the suite
    /// timed out and was abandoned, so code still running on an abandoned suite's thread can
    /// tell that the test-mode flag no longer belongs to it.
    pub fn is_test_mode(&self) -> bool {
        self.test_mode.load(Ordering::Acquire)
    }

    /// Marks the suite as abandoned: [`is_test_mode`](Self::is_test_mode) returns false from now
    /// on, in every clone of this context.
    pub(crate) fn abandon(&self) {
        self.test_mode.store(false, Ordering::Release);
    }
}

/// The results of running a suite to completion.
///
/// The number of failed test cases is the number of failure details, so `passed + failed` always
/// equals the observed total.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SuiteRun {
    passed: usize,
    failures: Vec<FailureDetail>,
}

impl SuiteRun {
    /// Creates a new run from a number of passing test cases and one detail per failing test case.
    pub fn new(passed: usize, failures: Vec<FailureDetail>) -> Self {
        Self { passed, failures }
    }

    /// Creates a new run from a summary printed by a command suite, validating it first.
    pub fn from_summary(summary: SuiteRunSummary) -> Result<Self, RunSummaryError> {
        summary.validate()?;
        Ok(Self::new(summary.passed, summary.failures))
    }

    /// Records a passing test case.
    pub fn pass(&mut self) {
        self.passed = self.passed.saturating_add(1);
    }

    /// Records a failing test case.
    pub fn fail(&mut self, name: impl Into<String>, message: impl Into<String>) {
        self.failures.push(FailureDetail::new(name, message));
    }

    /// Returns the number of test cases executed.
    pub fn observed_total(&self) -> usize {
        self.passed.saturating_add(self.failures.len())
    }

    /// Returns the number of passing test cases.
    pub fn passed(&self) -> usize {
        self.passed
    }

    /// Returns the number of failing test cases.
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Returns details for each failing test case.
    pub fn failures(&self) -> &[FailureDetail] {
        &self.failures
    }

    pub(crate) fn into_parts(self) -> (usize, Vec<FailureDetail>) {
        (self.passed, self.failures)
    }
}

/// A factory that creates a fresh instance of an in-process suite.
pub type SuiteFactory = Arc<dyn Fn() -> Result<Box<dyn Suite>, SuiteError> + Send + Sync>;

/// A set of in-process suites, looked up by name.
#[derive(Clone, Debug, Default)]
pub struct SuiteRegistry {
    factories: BTreeMap<String, DebugIgnore<SuiteFactory>>,
}

impl SuiteRegistry {
    /// Creates a new, empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory under `name`, replacing any existing factory with that name.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Result<Box<dyn Suite>, SuiteError> + Send + Sync + 'static,
    {
        self.factories
            .insert(name.into(), DebugIgnore(Arc::new(factory)));
        self
    }

    /// Registers a suite with no setup or teardown, implemented by a function.
    pub fn register_fn<F>(&mut self, name: impl Into<String>, run: F) -> &mut Self
    where
        F: Fn(&SuiteContext) -> Result<SuiteRun, SuiteError> + Send + Sync + 'static,
    {
        let run = Arc::new(run);
        self.register(name, move || {
            let suite: Box<dyn Suite> = Box::new(FnSuite {
                run: Arc::clone(&run),
            });
            Ok(suite)
        })
    }

    /// Returns the registered names, in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.factories.keys().map(String::as_str)
    }

    /// Returns true if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Returns the number of registered suites.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Returns true if no suites are registered.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

struct FnSuite<F> {
    run: Arc<F>,
}

impl<F> Suite for FnSuite<F>
where
    F: Fn(&SuiteContext) -> Result<SuiteRun, SuiteError> + Send + Sync,
{
    fn run(&mut self, cx: &SuiteContext) -> Result<SuiteRun, SuiteError> {
        (self.run)(cx)
    }
}

/// Loads suites described by [`SuiteDescriptor`]s.
#[derive(Clone, Debug)]
pub struct SuiteLoader {
    registry: SuiteRegistry,
}

impl SuiteLoader {
    /// Creates a new loader which looks up in-process suites in `registry`.
    pub fn new(registry: SuiteRegistry) -> Self {
        Self { registry }
    }

    /// Returns the registry of in-process suites.
    pub fn registry(&self) -> &SuiteRegistry {
        &self.registry
    }

    pub(crate) fn load(&self, descriptor: &SuiteDescriptor) -> Result<LoadedSuite, SuiteLoadError> {
        match descriptor.source() {
            SuiteSource::Registered { name } => {
                let factory =
                    self.registry
                        .factories
                        .get(name)
                        .ok_or_else(|| SuiteLoadError::NotRegistered {
                            name: name.clone(),
                            known: self.registry.names().map(ToOwned::to_owned).collect(),
                        })?;
                debug!("loading registered suite `{name}` for {}", descriptor.id());

                match catch_unwind(AssertUnwindSafe(|| (factory.0)())) {
                    Ok(Ok(suite)) => Ok(LoadedSuite::InProcess(suite)),
                    Ok(Err(err)) => Err(SuiteLoadError::Factory {
                        name: name.clone(),
                        err,
                    }),
                    Err(payload) => Err(SuiteLoadError::FactoryPanic {
                        name: name.clone(),
                        message: panic_message(&*payload),
                    }),
                }
            }
            SuiteSource::Command(spec) => {
                debug!("loading command suite for {}", descriptor.id());
                CommandSuite::load(spec).map(LoadedSuite::Command)
            }
        }
    }
}

/// A suite that has been loaded and is ready to run.
pub(crate) enum LoadedSuite {
    InProcess(Box<dyn Suite>),
    Command(CommandSuite),
}
