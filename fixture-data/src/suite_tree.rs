// Copyright (c) The tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Information about the `suite-tree` fixture under `fixtures/suite-tree`.

use crate::models::SuiteFixture;
use iddqd::{IdOrdMap, id_ord_map};
use std::sync::LazyLock;
use tally_metadata::{AbortKind, SuiteCategory};

/// Registered suite names used by the fixture's manifests.
pub mod registered {
    pub const PARSER_UNIT: &str = "parser-unit";
    pub const PICKER_FEATURE: &str = "picker-feature";
    pub const PICKER_UNIT: &str = "picker-unit";
    pub const STORAGE_INTEGRATION: &str = "storage-integration";
}

pub static EXPECTED_SUITES: LazyLock<IdOrdMap<SuiteFixture>> = LazyLock::new(|| {
    id_ord_map! {
        SuiteFixture::new("cli/libtest", SuiteCategory::Command, Some(3))
            .with_results(2, 1)
            .unix_only(),
        SuiteFixture::new("cli/status", SuiteCategory::Command, Some(3))
            .with_results(3, 0)
            .unix_only(),
        // Both name suites that aren't registered.
        SuiteFixture::new("legacy/smoke", SuiteCategory::Unit, Some(1))
            .with_abort(AbortKind::Load),
        SuiteFixture::new("legacy/unit", SuiteCategory::Unit, Some(3))
            .with_abort(AbortKind::Load),
        SuiteFixture::new("parser/unit", SuiteCategory::Unit, Some(12)).with_results(12, 0),
        // Overrides its path-derived identifier.
        SuiteFixture::new("picker", SuiteCategory::Feature, Some(32)).with_results(28, 2),
        SuiteFixture::new("picker/unit", SuiteCategory::Unit, None).with_results(5, 0),
        SuiteFixture::new("storage/integration", SuiteCategory::Integration, Some(4))
            .with_abort(AbortKind::Panic),
    }
});

/// Returns the fixtures expected to be part of a run on the current platform.
pub fn enabled_suites() -> impl Iterator<Item = &'static SuiteFixture> {
    EXPECTED_SUITES.iter().filter(|suite| suite.is_enabled())
}
