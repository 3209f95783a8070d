// Copyright (c) The tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;

/// JUnit configuration for a profile, with paths resolved against the workspace root.
#[derive(Clone, Debug)]
pub struct JunitConfig<'cfg> {
    path: Utf8PathBuf,
    report_name: &'cfg str,
}

impl<'cfg> JunitConfig<'cfg> {
    pub(super) fn new(
        workspace_root: &Utf8Path,
        settings: Option<&'cfg JunitImpl>,
        default_settings: &'cfg DefaultJunitImpl,
    ) -> Option<Self> {
        let path = settings
            .and_then(|settings| settings.path.as_deref())
            .or(default_settings.path.as_deref())?;
        let report_name = settings
            .and_then(|settings| settings.report_name.as_deref())
            .unwrap_or(&default_settings.report_name);
        Some(Self {
            path: workspace_root.join(path),
            report_name,
        })
    }

    /// Creates a new `JunitConfig` from an absolute path and a report name.
    pub fn from_parts(path: impl Into<Utf8PathBuf>, report_name: &'cfg str) -> Self {
        Self {
            path: path.into(),
            report_name,
        }
    }

    /// Returns the absolute path to the JUnit report.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns the name of the JUnit report.
    pub fn report_name(&self) -> &'cfg str {
        self.report_name
    }
}

#[derive(Clone, Debug)]
pub(super) struct DefaultJunitImpl {
    path: Option<Utf8PathBuf>,
    report_name: String,
}

impl DefaultJunitImpl {
    pub(super) fn from_custom(junit: JunitImpl) -> Self {
        Self {
            path: junit.path,
            report_name: junit
                .report_name
                .expect("junit.report-name present in default profile"),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(super) struct JunitImpl {
    #[serde(default)]
    path: Option<Utf8PathBuf>,
    #[serde(default)]
    report_name: Option<String>,
}
