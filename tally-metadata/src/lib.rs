// Copyright (c) The tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Machine-readable output for tally.
//!
//! This crate contains the data structures that cross a process or file boundary:
//!
//! * [`SuiteRunSummary`]: the JSON line a command suite prints to report its results.
//! * [`ReportSummary`]: the serialized form of a reconciliation report.
//! * [`TallyExitCode`]: documented exit codes for tools built on top of tally.

mod errors;
mod exit_codes;
mod suite;
mod summary;

pub use errors::*;
pub use exit_codes::*;
pub use suite::*;
pub use summary::*;
