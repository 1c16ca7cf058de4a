// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Convert `go test` output into JUnit XML reports.
//!
//! This crate contains the command-line interface. The parser and report model live in
//! [`gotest_report`].
//!
//! # Usage
//!
//! ```text
//! go test -v ./... 2>&1 | gotest-junit --set-exit-code > report.xml
//! ```
//!
//! Options can also be set through profiles in `.config/gotest-junit.toml`.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod exit_codes;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use exit_codes::GotestJunitExitCode;
#[doc(hidden)]
pub use output::OutputWriter;
