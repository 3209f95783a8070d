// Copyright (c) The tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for tally, a test count reconciler.
//!
//! The basic flow of operations is:
//!
//! 1. Load a [`TallyConfig`](config::TallyConfig) and pick a profile.
//! 2. [`discover`](discovery::discover) suite manifests under the profile's roots.
//! 3. Build a [`Reconciler`](runner::Reconciler) with a [`SuiteLoader`](suite::SuiteLoader) that
//!    knows about the in-process suites, and reconcile the discovered suites.
//! 4. Render the resulting [`ReconciliationReport`](report::ReconciliationReport) as text, JSON
//!    or JUnit XML, and map it to an exit code.

pub mod command;
pub mod config;
pub mod discovery;
pub mod errors;
mod helpers;
pub mod report;
pub mod reporter;
pub mod runner;
pub mod suite;
pub mod test_mode;
