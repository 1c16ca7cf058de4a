// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by gotest-report.

use camino::Utf8PathBuf;
use config::ConfigError;
use thiserror::Error;

/// An internal consistency fault detected while building a report.
///
/// The runner never prints compiler output and test results for the same package, so these
/// indicate a misclassified line rather than bad input.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ReportBuildError {
    /// A package with a pending build error also had tests or benchmarks.
    #[error("package `{package}` failed to build but has {test_count} tests")]
    BuildErrorWithTests {
        /// The package name.
        package: String,
        /// The number of tests found.
        test_count: usize,
    },
}

/// An error that occurred while parsing a transcript.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// Reading the input failed.
    #[error("error reading input")]
    Io(#[from] std::io::Error),

    /// The report could not be assembled.
    #[error("error building report")]
    Build(#[from] ReportBuildError),
}

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse gotest-junit config at `{config_file}`")]
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

    /// Returns the kind of error.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of [`ConfigParseError`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// The config sources could not be combined or read.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// The combined config did not match the expected schema.
    #[error(transparent)]
    DeserializeError(Box<serde_path_to_error::Error<ConfigError>>),
}

/// An error which indicates that a profile was requested but is not defined.
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

    /// Returns the requested profile name.
    pub fn profile(&self) -> &str {
        &self.profile
    }
}

/// Error returned while parsing a `key=value` property.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid property `{input}`: expected `key=value`")]
pub struct InvalidProperty {
    input: String,
}

impl InvalidProperty {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// An error that occurred while writing a JUnit report.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WriteReportError {
    /// Writing to the destination failed.
    #[error("error writing report")]
    Io(#[from] std::io::Error),

    /// Serializing the report failed.
    #[error("error serializing JUnit report")]
    Junit(#[from] quick_junit::SerializeError),
}
