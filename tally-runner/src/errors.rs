// Copyright (c) The tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by tally.

use camino::Utf8PathBuf;
use config::ConfigError;
use itertools::Itertools;
use std::{borrow::Cow, error::Error, fmt, path::PathBuf, process::ExitStatus};
use tally_metadata::{RunSummaryError, SuiteId};
use thiserror::Error;

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse tally config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file for this error.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }

    /// Returns the kind of error this is.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of error that occurred while parsing a config.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// An error occurred while building the config.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// An error occurred while deserializing the config.
    #[error(transparent)]
    DeserializeError(Box<serde_path_to_error::Error<ConfigError>>),
}

/// An error which indicates that a profile was requested but not known to tally.
#[derive(Clone, Debug, Error)]
#[error("profile `{profile}` not found (known profiles: {})", .all_profiles.join(", "))]
pub struct ProfileNotFound {
    profile: String,
    all_profiles: Vec<String>,
}

impl ProfileNotFound {
    pub(crate) fn new(
        profile: impl Into<String>,
        all_profiles: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let mut all_profiles: Vec<_> = all_profiles.into_iter().map(|s| s.into()).collect();
        all_profiles.sort_unstable();
        Self {
            profile: profile.into(),
            all_profiles,
        }
    }
}

/// An error that occurred while discovering suites.
///
/// Discovery errors are fatal: no suites are run if discovery fails.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DiscoveryError {
    /// A root directory does not exist.
    #[error("suite root `{root}` does not exist")]
    RootNotFound {
        /// The root that was searched.
        root: Utf8PathBuf,
    },

    /// Metadata for a root could not be read.
    #[error("suite root `{root}` is not readable")]
    RootUnreadable {
        /// The root that was searched.
        root: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: std::io::Error,
    },

    /// A root path exists but is not a directory.
    #[error("suite root `{root}` is not a directory")]
    RootNotADirectory {
        /// The root that was searched.
        root: Utf8PathBuf,
    },

    /// An error occurred while walking a root directory.
    #[error("error reading directory under suite root `{root}`")]
    Walk {
        /// The root that was searched.
        root: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: walkdir::Error,
    },

    /// A path found during discovery isn't valid UTF-8.
    #[error("path `{}` is not valid UTF-8", .path.display())]
    NonUtf8Path {
        /// The path that was found.
        path: PathBuf,
    },

    /// A manifest could not be read.
    #[error("error reading suite manifest `{path}`")]
    ReadManifest {
        /// The manifest path.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: std::io::Error,
    },

    /// A manifest could not be parsed.
    #[error("error parsing suite manifest `{path}`")]
    ParseManifest {
        /// The manifest path.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: toml::de::Error,
    },

    /// A manifest parsed, but its contents are invalid.
    #[error("invalid suite manifest `{path}`: {reason}")]
    InvalidManifest {
        /// The manifest path.
        path: Utf8PathBuf,

        /// Why the manifest is invalid.
        reason: Cow<'static, str>,
    },

    /// Two manifests resolve to the same suite identifier.
    #[error("duplicate suite `{id}`: defined by both `{first}` and `{second}`")]
    DuplicateId {
        /// The identifier.
        id: SuiteId,

        /// The manifest that defined the identifier first.
        first: Utf8PathBuf,

        /// The manifest that defined the identifier again.
        second: Utf8PathBuf,
    },
}

/// The error type returned by a suite's setup and run operations.
///
/// This is a message with an optional source error.
#[derive(Debug)]
pub struct SuiteError {
    message: Cow<'static, str>,
    source: Option<Box<dyn Error + Send + Sync + 'static>>,
}

impl SuiteError {
    /// Creates a new error with the given message.
    pub fn new(message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new error with the given message and source.
    pub fn with_source(
        message: impl Into<Cow<'static, str>>,
        source: impl Into<Box<dyn Error + Send + Sync + 'static>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Returns the message for this error.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for SuiteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for SuiteError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_deref()
            .map(|source| source as &(dyn Error + 'static))
    }
}

/// An error that occurred while loading a suite.
///
/// Load errors are not fatal: the suite is recorded as a single failed test case.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SuiteLoadError {
    /// The manifest refers to an in-process suite that isn't registered.
    #[error(
        "suite `{name}` is not registered (known suites: {})",
        display_known(.known)
    )]
    NotRegistered {
        /// The name in the manifest.
        name: String,

        /// The registered names.
        known: Vec<String>,
    },

    /// The factory for a registered suite returned an error.
    #[error("failed to initialize registered suite `{name}`")]
    Factory {
        /// The registered name.
        name: String,

        /// The underlying error.
        #[source]
        err: SuiteError,
    },

    /// The factory for a registered suite panicked.
    #[error("factory for registered suite `{name}` panicked: {message}")]
    FactoryPanic {
        /// The registered name.
        name: String,

        /// The panic message.
        message: String,
    },

    /// A command suite has an empty command line.
    #[error("command suite has an empty `{phase}` command")]
    EmptyCommand {
        /// Either "setup", "run" or "teardown".
        phase: &'static str,
    },

    /// A command suite's working directory doesn't exist.
    #[error("working directory `{cwd}` does not exist")]
    CwdNotFound {
        /// The working directory.
        cwd: Utf8PathBuf,
    },

    /// A command suite's program could not be started.
    #[error("failed to start `{program}`")]
    Spawn {
        /// The program.
        program: String,

        /// The underlying error.
        #[source]
        err: std::io::Error,
    },
}

fn display_known(known: &[String]) -> String {
    if known.is_empty() {
        "(none)".to_owned()
    } else {
        known.iter().join(", ")
    }
}

/// An error that occurred while running a command suite.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CommandRunError {
    /// Waiting for the process failed.
    #[error("failed to wait for `{program}`")]
    Wait {
        /// The program.
        program: String,

        /// The underlying error.
        #[source]
        err: std::io::Error,
    },

    /// A setup or teardown command exited unsuccessfully.
    #[error("{phase} command `{program}` failed with {status}{}", display_stderr(.stderr))]
    PhaseFailed {
        /// Either "setup" or "teardown".
        phase: &'static str,

        /// The program.
        program: String,

        /// The exit status.
        status: ExitStatus,

        /// The tail of standard error.
        stderr: String,
    },

    /// The run command didn't print a result summary.
    #[error("`{program}` exited with {status} without printing a result summary{}", display_stderr(.stderr))]
    MissingSummary {
        /// The program.
        program: String,

        /// The exit status.
        status: ExitStatus,

        /// The tail of standard error.
        stderr: String,
    },

    /// The run command printed an invalid result summary.
    #[error("`{program}` printed an invalid result summary")]
    InvalidSummary {
        /// The program.
        program: String,

        /// The underlying error.
        #[source]
        err: RunSummaryError,
    },
}

fn display_stderr(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(", stderr:\n{stderr}")
    }
}

/// An error that occurred while building a [`Reconciler`](crate::runner::Reconciler).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReconcilerBuildError {
    /// An error occurred while creating the Tokio runtime.
    #[error("error creating Tokio runtime")]
    TokioRuntimeCreate(#[source] std::io::Error),
}

/// An error that occurred while writing a JUnit report.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WriteJunitError {
    /// An error occurred while operating on the file system.
    #[error("error operating on path {file}")]
    Fs {
        /// The file being operated on.
        file: Utf8PathBuf,

        /// The underlying IO error.
        #[source]
        error: std::io::Error,
    },

    /// An error occurred while producing JUnit XML.
    #[error("error writing JUnit output to {file}")]
    Junit {
        /// The output file.
        file: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: quick_junit::SerializeError,
    },
}

/// Displays an error along with its chain of sources, one per line.
pub struct DisplayErrorChain<E> {
    error: E,
}

impl<E: Error> DisplayErrorChain<E> {
    /// Creates a new `DisplayErrorChain`.
    pub fn new(error: E) -> Self {
        Self { error }
    }
}

impl<E: Error> fmt::Display for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        let mut current = self.error.source();
        while let Some(error) = current {
            write!(f, "\n  caused by: {error}")?;
            current = error.source();
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_error_chain() {
        let err = SuiteLoadError::Factory {
            name: "picker".to_owned(),
            err: SuiteError::with_source(
                "missing dependency",
                std::io::Error::new(std::io::ErrorKind::NotFound, "libfoo.so"),
            ),
        };
        assert_eq!(
            DisplayErrorChain::new(&err).to_string(),
            "failed to initialize registered suite `picker`\n  \
             caused by: missing dependency\n  \
             caused by: libfoo.so"
        );
    }

    #[test]
    fn not_registered_lists_known_suites() {
        let err = SuiteLoadError::NotRegistered {
            name: "nope".to_owned(),
            known: vec![],
        };
        assert_eq!(
            err.to_string(),
            "suite `nope` is not registered (known suites: (none))"
        );

        let err = SuiteLoadError::NotRegistered {
            name: "nope".to_owned(),
            known: vec!["a".to_owned(), "b".to_owned()],
        };
        assert_eq!(
            err.to_string(),
            "suite `nope` is not registered (known suites: a, b)"
        );
    }
}
