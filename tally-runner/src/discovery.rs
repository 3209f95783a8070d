// Copyright (c) The tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Discovering suites from manifest files on disk.
//!
//! A suite is defined by a TOML manifest whose file name ends with the manifest suffix
//! (`.suite.toml` by default). Each manifest declares the suite's category, an optional declared
//! count, and how to obtain its run contract: either the name of an in-process suite registered
//! with a [`SuiteRegistry`](crate::suite::SuiteRegistry), or a `[command]` table describing a
//! process to run.
//!
//! ```toml
//! category = "unit"
//! declared-count = 8
//! registered = "picker-unit"
//! ```

use crate::{
    command::{CommandSpec, OutputFormat},
    errors::DiscoveryError,
    helpers::plural,
};
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use itertools::Itertools;
use serde::Deserialize;
use std::{collections::BTreeMap, io};
use tally_metadata::{SuiteCategory, SuiteId};
use tracing::debug;
use walkdir::WalkDir;

/// The default suffix for suite manifest files.
pub const DEFAULT_MANIFEST_SUFFIX: &str = ".suite.toml";

/// Describes a single discoverable suite.
///
/// Descriptors are immutable once discovered.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SuiteDescriptor {
    id: SuiteId,
    declared_count: Option<usize>,
    category: SuiteCategory,
    source: SuiteSource,
    manifest_path: Option<Utf8PathBuf>,
}

impl SuiteDescriptor {
    /// Creates a descriptor for an in-process suite that isn't backed by a manifest file.
    pub fn registered(
        id: impl Into<SuiteId>,
        category: SuiteCategory,
        declared_count: Option<usize>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            declared_count,
            category,
            source: SuiteSource::Registered { name: name.into() },
            manifest_path: None,
        }
    }

    /// Creates a descriptor for a command suite that isn't backed by a manifest file.
    pub fn command(
        id: impl Into<SuiteId>,
        category: SuiteCategory,
        declared_count: Option<usize>,
        spec: CommandSpec,
    ) -> Self {
        Self {
            id: id.into(),
            declared_count,
            category,
            source: SuiteSource::Command(spec),
            manifest_path: None,
        }
    }

    /// Returns the suite's identifier.
    pub fn id(&self) -> &SuiteId {
        &self.id
    }

    /// Returns the number of test cases the suite declares, if any.
    pub fn declared_count(&self) -> Option<usize> {
        self.declared_count
    }

    /// Returns the suite's category.
    pub fn category(&self) -> SuiteCategory {
        self.category
    }

    /// Returns where the suite's run contract comes from.
    pub fn source(&self) -> &SuiteSource {
        &self.source
    }

    /// Returns the manifest this suite was discovered from, if any.
    pub fn manifest_path(&self) -> Option<&Utf8Path> {
        self.manifest_path.as_deref()
    }

    /// Returns the directory containing the manifest, if any.
    pub fn manifest_dir(&self) -> Option<&Utf8Path> {
        self.manifest_path.as_deref().and_then(Utf8Path::parent)
    }
}

/// Where a suite's run contract comes from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SuiteSource {
    /// An in-process suite looked up by name in a [`SuiteRegistry`](crate::suite::SuiteRegistry).
    Registered {
        /// The registered name.
        name: String,
    },

    /// A suite run as a child process.
    Command(CommandSpec),
}

/// Discovers suites under the given roots.
///
/// Every root is searched recursively for files whose names end with `manifest_suffix`. The
/// returned descriptors are sorted by identifier.
///
/// Any error is fatal: either every suite is discovered or an error is returned.
pub fn discover<P: AsRef<Utf8Path>>(
    roots: &[P],
    manifest_suffix: &str,
) -> Result<Vec<SuiteDescriptor>, DiscoveryError> {
    let mut suites: BTreeMap<SuiteId, SuiteDescriptor> = BTreeMap::new();

    for root in roots {
        let root = root.as_ref();
        check_root(root)?;
        debug!("searching for suite manifests under {root}");

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|err| DiscoveryError::Walk {
                root: root.to_owned(),
                err,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = Utf8Path::from_path(entry.path()).ok_or_else(|| {
                DiscoveryError::NonUtf8Path {
                    path: entry.path().to_owned(),
                }
            })?;
            if !path.as_str().ends_with(manifest_suffix) {
                continue;
            }

            let descriptor = read_manifest(root, path, manifest_suffix)?;
            debug!("discovered suite {} at {path}", descriptor.id);

            if let Some(existing) = suites.get(&descriptor.id) {
                return Err(DiscoveryError::DuplicateId {
                    id: descriptor.id,
                    first: existing
                        .manifest_path
                        .clone()
                        .expect("discovered suites have manifests"),
                    second: path.to_owned(),
                });
            }
            suites.insert(descriptor.id.clone(), descriptor);
        }
    }

    debug!(
        "discovered {} {}",
        suites.len(),
        plural::suites_str(suites.len())
    );
    Ok(suites.into_values().collect())
}

fn check_root(root: &Utf8Path) -> Result<(), DiscoveryError> {
    match root.metadata() {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(DiscoveryError::RootNotADirectory {
            root: root.to_owned(),
        }),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Err(DiscoveryError::RootNotFound {
            root: root.to_owned(),
        }),
        Err(err) => Err(DiscoveryError::RootUnreadable {
            root: root.to_owned(),
            err,
        }),
    }
}

fn read_manifest(
    root: &Utf8Path,
    path: &Utf8Path,
    manifest_suffix: &str,
) -> Result<SuiteDescriptor, DiscoveryError> {
    let contents = std::fs::read_to_string(path).map_err(|err| DiscoveryError::ReadManifest {
        path: path.to_owned(),
        err,
    })?;
    let manifest: SuiteManifest =
        toml::from_str(&contents).map_err(|err| DiscoveryError::ParseManifest {
            path: path.to_owned(),
            err,
        })?;

    let invalid = |reason: &'static str| DiscoveryError::InvalidManifest {
        path: path.to_owned(),
        reason: reason.into(),
    };

    let id = match manifest.id {
        Some(id) if id.is_empty() => return Err(invalid("`id` must not be empty")),
        Some(id) => SuiteId::from(id),
        None => derive_id(root, path, manifest_suffix).ok_or_else(|| {
            invalid("manifest file name has nothing before the manifest suffix")
        })?,
    };

    let manifest_dir = path.parent().unwrap_or(root);
    let source = match (manifest.registered, manifest.command) {
        (Some(name), None) => SuiteSource::Registered { name },
        (None, Some(command)) => SuiteSource::Command(command.into_spec(manifest_dir)),
        (Some(_), Some(_)) => {
            return Err(invalid(
                "exactly one of `registered` or `[command]` must be specified, found both",
            ));
        }
        (None, None) => {
            return Err(invalid(
                "exactly one of `registered` or `[command]` must be specified, found neither",
            ));
        }
    };

    Ok(SuiteDescriptor {
        id,
        declared_count: manifest.declared_count,
        category: manifest.category,
        source,
        manifest_path: Some(path.to_owned()),
    })
}

/// Derives an identifier from the manifest's path relative to its root, with the suffix removed
/// and components joined by `/`.
fn derive_id(root: &Utf8Path, path: &Utf8Path, manifest_suffix: &str) -> Option<SuiteId> {
    let relative = path.strip_prefix(root).ok()?;
    let joined = relative
        .components()
        .filter_map(|component| match component {
            Utf8Component::Normal(s) => Some(s),
            _ => None,
        })
        .join("/");
    let id = joined.strip_suffix(manifest_suffix)?;
    if id.is_empty() || id.ends_with('/') {
        return None;
    }
    Some(SuiteId::new(id))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct SuiteManifest {
    #[serde(default)]
    id: Option<String>,
    category: SuiteCategory,
    #[serde(default)]
    declared_count: Option<usize>,
    #[serde(default)]
    registered: Option<String>,
    #[serde(default)]
    command: Option<CommandManifest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct CommandManifest {
    run: Vec<String>,
    #[serde(default)]
    setup: Option<Vec<String>>,
    #[serde(default)]
    teardown: Option<Vec<String>>,
    #[serde(default)]
    format: OutputFormat,
    #[serde(default)]
    cwd: Option<Utf8PathBuf>,
    #[serde(default)]
    env: BTreeMap<String, String>,
}

impl CommandManifest {
    fn into_spec(self, manifest_dir: &Utf8Path) -> CommandSpec {
        let cwd = match self.cwd {
            Some(cwd) => manifest_dir.join(cwd),
            None => manifest_dir.to_owned(),
        };
        let mut spec = CommandSpec::new(self.run, cwd).with_format(self.format);
        if let Some(setup) = self.setup {
            spec = spec.with_setup(setup);
        }
        if let Some(teardown) = self.teardown {
            spec = spec.with_teardown(teardown);
        }
        for (key, value) in self.env {
            spec = spec.with_env(key, value);
        }
        spec
    }
}
