// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    exit_codes::GotestJunitExitCode,
    output::{NO_HEADING_TARGET, StderrStyles},
};
use camino::Utf8PathBuf;
use gotest_report::errors::{
    ConfigParseError, InvalidProperty, ParseError, ProfileNotFound, WriteReportError,
};
use owo_colors::OwoColorize;
use std::error::Error;
use thiserror::Error;
use tracing::error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

// Note that the #[error()] strings are mostly placeholder messages -- the expected way to print out
// errors is with the display_to_stderr method, which colorizes errors.

/// An expected error: bad input, bad configuration, or a failure to read or write.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("could not determine current directory")]
    CurrentDirFailed {
        #[source]
        err: std::io::Error,
    },
    #[error("current directory is not valid UTF-8")]
    CurrentDirInvalidUtf8 {
        #[source]
        err: camino::FromPathBufError,
    },
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("profile not found")]
    ProfileNotFound {
        #[from]
        err: ProfileNotFound,
    },
    #[error("invalid property")]
    InvalidProperty {
        #[from]
        err: InvalidProperty,
    },
    #[error("invalid timestamp")]
    InvalidTimestamp {
        input: String,
        #[source]
        err: chrono::ParseError,
    },
    #[error("failed to open input file")]
    InputOpenFailed {
        path: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("failed to create output file")]
    OutputCreateFailed {
        path: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("failed to parse input")]
    ParseFailed {
        #[from]
        err: ParseError,
    },
    #[error("failed to write events")]
    WriteEventsFailed {
        #[source]
        err: std::io::Error,
    },
    #[error("failed to write report")]
    WriteReportFailed {
        path: Option<Utf8PathBuf>,
        #[source]
        err: WriteReportError,
    },
}

impl ExpectedError {
    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::CurrentDirFailed { .. }
            | Self::CurrentDirInvalidUtf8 { .. }
            | Self::ConfigParseError { .. }
            | Self::ProfileNotFound { .. }
            | Self::InvalidProperty { .. }
            | Self::InvalidTimestamp { .. } => GotestJunitExitCode::SETUP_ERROR,
            Self::InputOpenFailed { .. }
            | Self::OutputCreateFailed { .. }
            | Self::WriteEventsFailed { .. }
            | Self::WriteReportFailed { .. } => GotestJunitExitCode::IO_ERROR,
            Self::ParseFailed { err } => match err {
                ParseError::Io(_) => GotestJunitExitCode::IO_ERROR,
                _ => GotestJunitExitCode::INTERNAL_ERROR,
            },
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match &self {
            Self::CurrentDirFailed { err } => {
                error!("could not determine current directory");
                Some(err as &dyn Error)
            }
            Self::CurrentDirInvalidUtf8 { err } => {
                error!("current directory is not valid UTF-8");
                Some(err as &dyn Error)
            }
            Self::ConfigParseError { err } => {
                error!(
                    "failed to parse config at `{}`",
                    err.config_file().style(styles.bold)
                );
                Some(err.kind() as &dyn Error)
            }
            Self::ProfileNotFound { err } => {
                error!("{err}");
                err.source()
            }
            Self::InvalidProperty { err } => {
                error!("{err}");
                err.source()
            }
            Self::InvalidTimestamp { input, err } => {
                error!(
                    "invalid timestamp `{}`: expected an RFC 3339 date and time",
                    input.style(styles.bold)
                );
                Some(err as &dyn Error)
            }
            Self::InputOpenFailed { path, err } => {
                error!("failed to open input file `{}`", path.style(styles.bold));
                Some(err as &dyn Error)
            }
            Self::OutputCreateFailed { path, err } => {
                error!("failed to create output file `{}`", path.style(styles.bold));
                Some(err as &dyn Error)
            }
            Self::ParseFailed { err } => {
                match err {
                    ParseError::Io(_) => error!("failed to read input"),
                    _ => error!("failed to build report (this is a bug, please report it)"),
                }
                err.source()
            }
            Self::WriteEventsFailed { err } => {
                error!("failed to write events to stderr");
                Some(err as &dyn Error)
            }
            Self::WriteReportFailed { path, err } => {
                match path {
                    Some(path) => error!("failed to write report to `{}`", path.style(styles.bold)),
                    None => error!("failed to write report to stdout"),
                }
                Some(err as &dyn Error)
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gotest_report::errors::ReportBuildError;

    #[test]
    fn exit_codes() {
        let io_error = || std::io::Error::other("disk on fire");

        let cases = [
            (
                ExpectedError::InvalidTimestamp {
                    input: "yesterday".to_owned(),
                    err: "yesterday"
                        .parse::<chrono::DateTime<chrono::FixedOffset>>()
                        .expect_err("not a timestamp"),
                },
                GotestJunitExitCode::SETUP_ERROR,
            ),
            (
                ExpectedError::InputOpenFailed {
                    path: "input.txt".into(),
                    err: io_error(),
                },
                GotestJunitExitCode::IO_ERROR,
            ),
            (
                ExpectedError::ParseFailed {
                    err: ParseError::Io(io_error()),
                },
                GotestJunitExitCode::IO_ERROR,
            ),
            (
                ExpectedError::ParseFailed {
                    err: ParseError::Build(ReportBuildError::BuildErrorWithTests {
                        package: "package/name".to_owned(),
                        test_count: 1,
                    }),
                },
                GotestJunitExitCode::INTERNAL_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.process_exit_code(), expected, "{error:?}");
        }
    }
}
