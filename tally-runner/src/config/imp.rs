// Copyright (c) The tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::junit::{DefaultJunitImpl, JunitConfig, JunitImpl};
use crate::errors::{ConfigParseError, ConfigParseErrorKind, ProfileNotFound};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, builder::DefaultState};
use itertools::Itertools;
use serde::Deserialize;
use std::{
    collections::{BTreeMap, BTreeSet},
    time::Duration,
};
use tracing::{debug, warn};

/// Overall configuration for tally.
///
/// This is the root data structure for tally configuration. Most settings are managed through
/// [profiles](TallyProfile), obtained through the [`profile`](Self::profile) method.
#[derive(Clone, Debug)]
pub struct TallyConfig {
    workspace_root: Utf8PathBuf,
    inner: TallyConfigImpl,
}

impl TallyConfig {
    /// The default location of the config within the path: `.config/tally.toml`, used to read the
    /// config from the given directory.
    pub const CONFIG_PATH: &'static str = ".config/tally.toml";

    /// Contains the default config as a TOML file.
    ///
    /// Repository-specific configuration is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../../default-config.toml");

    /// The name of the default profile.
    pub const DEFAULT_PROFILE: &'static str = "default";

    /// Reads the tally config from the given file, or if not specified from `.config/tally.toml`
    /// in the workspace root.
    ///
    /// If no config file is specified and the workspace doesn't have `.config/tally.toml`, uses
    /// the default config options.
    pub fn from_sources(
        workspace_root: impl Into<Utf8PathBuf>,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        let workspace_root = workspace_root.into();
        let inner = Self::read_from_sources(&workspace_root, config_file)?;
        Ok(Self {
            workspace_root,
            inner,
        })
    }

    /// Returns the default tally config.
    pub fn default_config(workspace_root: impl Into<Utf8PathBuf>) -> Self {
        let config = Self::make_default_config()
            .build()
            .expect("default config is always valid");

        let mut unknown = BTreeSet::new();
        let deserialized: TallyConfigDeserialize =
            serde_ignored::deserialize(config, |path: serde_ignored::Path| {
                unknown.insert(path.to_string());
            })
            .expect("default config is always valid");

        // Make sure there aren't any unknown keys in the default config, since it is
        // embedded/shipped with this binary.
        if !unknown.is_empty() {
            panic!(
                "found unknown keys in default config: {}",
                unknown.iter().join(", ")
            );
        }

        Self {
            workspace_root: workspace_root.into(),
            inner: deserialized.into_config_impl(),
        }
    }

    /// Returns the workspace root that relative paths in the config are resolved against.
    pub fn workspace_root(&self) -> &Utf8Path {
        &self.workspace_root
    }

    /// Returns the profile with the given name, or an error if a profile was specified but not
    /// found.
    pub fn profile(&self, name: impl AsRef<str>) -> Result<TallyProfile<'_>, ProfileNotFound> {
        self.make_profile(name.as_ref())
    }

    // ---
    // Helper methods
    // ---

    fn read_from_sources(
        workspace_root: &Utf8Path,
        file: Option<&Utf8Path>,
    ) -> Result<TallyConfigImpl, ConfigParseError> {
        let (config_file, source) = match file {
            Some(file) => (file.to_owned(), File::new(file.as_str(), FileFormat::Toml)),
            None => {
                let config_file = workspace_root.join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };
        debug!("reading tally config from {config_file}");

        let builder = Self::make_default_config().add_source(source);
        let (deserialized, unknown) = Self::build_and_deserialize_config(builder)
            .map_err(|kind| ConfigParseError::new(&config_file, kind))?;

        if !unknown.is_empty() {
            warn!(
                "ignoring unknown configuration keys in config file {}: {}",
                config_file
                    .strip_prefix(workspace_root)
                    .unwrap_or(&config_file),
                unknown.iter().join(", "),
            );
        }

        Ok(deserialized.into_config_impl())
    }

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    fn make_profile(&self, name: &str) -> Result<TallyProfile<'_>, ProfileNotFound> {
        let custom_profile = if name == Self::DEFAULT_PROFILE {
            None
        } else {
            let profile = self.inner.other_profiles.get(name).ok_or_else(|| {
                ProfileNotFound::new(
                    name,
                    std::iter::once(Self::DEFAULT_PROFILE)
                        .chain(self.inner.other_profiles.keys().map(String::as_str)),
                )
            })?;
            Some(profile)
        };

        Ok(TallyProfile {
            name: name.to_owned(),
            workspace_root: &self.workspace_root,
            default_profile: &self.inner.default_profile,
            custom_profile,
        })
    }

    fn build_and_deserialize_config(
        builder: ConfigBuilder<DefaultState>,
    ) -> Result<(TallyConfigDeserialize, BTreeSet<String>), ConfigParseErrorKind> {
        let config = builder
            .build()
            .map_err(|error| ConfigParseErrorKind::BuildError(Box::new(error)))?;

        let mut ignored = BTreeSet::new();
        let mut cb = |path: serde_ignored::Path| {
            ignored.insert(path.to_string());
        };
        let ignored_de = serde_ignored::Deserializer::new(config, &mut cb);
        let config: TallyConfigDeserialize = serde_path_to_error::deserialize(ignored_de)
            .map_err(|error| {
                // Both serde_path_to_error and the config crate report the key. Drop the key from
                // the config error so it is only displayed once.
                let path = error.path().clone();
                let config_error = error.into_inner();
                let error = match config_error {
                    ConfigError::At { error, .. } => *error,
                    other => other,
                };
                ConfigParseErrorKind::DeserializeError(Box::new(serde_path_to_error::Error::new(
                    path, error,
                )))
            })?;

        Ok((config, ignored))
    }
}

/// A configuration profile for tally.
///
/// Obtained through [`TallyConfig::profile`]. Settings that a custom profile doesn't specify are
/// inherited from the default profile.
#[derive(Clone, Debug)]
pub struct TallyProfile<'cfg> {
    name: String,
    workspace_root: &'cfg Utf8Path,
    default_profile: &'cfg DefaultProfileImpl,
    custom_profile: Option<&'cfg CustomProfileImpl>,
}

impl<'cfg> TallyProfile<'cfg> {
    /// Returns the name of the profile.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the directories to search for suite manifests, resolved against the workspace
    /// root.
    pub fn roots(&self) -> Vec<Utf8PathBuf> {
        self.custom_profile
            .and_then(|profile| profile.roots.as_deref())
            .unwrap_or(&self.default_profile.roots)
            .iter()
            .map(|root| self.workspace_root.join(root))
            .collect()
    }

    /// Returns the suffix that identifies suite manifest files.
    pub fn manifest_suffix(&self) -> &'cfg str {
        self.custom_profile
            .and_then(|profile| profile.manifest_suffix.as_deref())
            .unwrap_or(&self.default_profile.manifest_suffix)
    }

    /// Returns the time each suite is given to finish.
    pub fn suite_timeout(&self) -> Duration {
        self.custom_profile
            .and_then(|profile| profile.suite_timeout)
            .unwrap_or(self.default_profile.suite_timeout)
    }

    /// Returns the JUnit configuration for this profile, if JUnit output is enabled.
    pub fn junit(&self) -> Option<JunitConfig<'cfg>> {
        JunitConfig::new(
            self.workspace_root,
            self.custom_profile.map(|profile| &profile.junit),
            &self.default_profile.junit,
        )
    }
}

#[derive(Clone, Debug)]
struct TallyConfigImpl {
    default_profile: DefaultProfileImpl,
    other_profiles: BTreeMap<String, CustomProfileImpl>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct TallyConfigDeserialize {
    #[serde(rename = "profile")]
    profiles: BTreeMap<String, CustomProfileImpl>,
}

impl TallyConfigDeserialize {
    fn into_config_impl(mut self) -> TallyConfigImpl {
        let p = self
            .profiles
            .remove(TallyConfig::DEFAULT_PROFILE)
            .expect("default profile should exist");
        let default_profile = DefaultProfileImpl::new(p);

        TallyConfigImpl {
            default_profile,
            other_profiles: self.profiles,
        }
    }
}

#[derive(Clone, Debug)]
struct DefaultProfileImpl {
    roots: Vec<Utf8PathBuf>,
    manifest_suffix: String,
    suite_timeout: Duration,
    junit: DefaultJunitImpl,
}

impl DefaultProfileImpl {
    fn new(p: CustomProfileImpl) -> Self {
        Self {
            roots: p.roots.expect("roots present in default profile"),
            manifest_suffix: p
                .manifest_suffix
                .expect("manifest-suffix present in default profile"),
            suite_timeout: p
                .suite_timeout
                .expect("suite-timeout present in default profile"),
            junit: DefaultJunitImpl::from_custom(p.junit),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct CustomProfileImpl {
    #[serde(default)]
    roots: Option<Vec<Utf8PathBuf>>,
    #[serde(default)]
    manifest_suffix: Option<String>,
    #[serde(default, with = "humantime_serde")]
    suite_timeout: Option<Duration>,
    #[serde(default)]
    junit: JunitImpl,
}
