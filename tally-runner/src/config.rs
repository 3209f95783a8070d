// Copyright (c) The tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration support for tally.
//!
//! Configuration is read from an embedded default config, layered with `.config/tally.toml` in the
//! workspace root (or an explicitly provided file). Settings are grouped into profiles:
//! `[profile.default]` always exists, and custom profiles fall back to it for any setting they
//! don't specify.

mod imp;
mod junit;

pub use imp::*;
pub use junit::*;
