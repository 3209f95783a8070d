// Copyright (c) The tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reporting reconciliation results.
//!
//! * [`ReportFormatter`] renders a [`ReconciliationReport`](crate::report::ReconciliationReport)
//!   as deterministic, human-readable text.
//! * The [`junit`] module converts a report to JUnit XML.

mod displayer;
pub mod junit;

pub use displayer::*;
