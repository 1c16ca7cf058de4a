// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `gotest-junit`.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum GotestJunitExitCode {}

impl GotestJunitExitCode {
    /// The report was written, and either it contains no failures or `--set-exit-code` wasn't
    /// passed.
    pub const OK: i32 = 0;

    /// The report contains failing tests, or packages that failed to build or run, and
    /// `--set-exit-code` was passed.
    pub const TEST_FAILURES: i32 = 1;

    /// Reading the input or writing the report produced an error.
    pub const IO_ERROR: i32 = 2;

    /// A user issue happened while setting up a run: for example, an invalid argument or config
    /// file.
    pub const SETUP_ERROR: i32 = 3;

    /// The report could not be built because the input was inconsistent in a way that indicates
    /// a bug in gotest-junit.
    pub const INTERNAL_ERROR: i32 = 4;
}
