// Copyright (c) The tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Executing suites and reconciling their counts.
//!
//! The main structure in this module is [`Reconciler`], built with a [`ReconcilerBuilder`].
//! Suites run one at a time, in identifier order. Every per-suite failure, whether the suite
//! couldn't be loaded, its setup failed, it panicked, or it ran out of time, is recorded as a
//! synthetic [`ExecutionResult`] with a single failed test case.

mod imp;
mod result;

pub use imp::*;
pub use result::*;
