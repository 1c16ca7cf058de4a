// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for [gotest-junit](https://crates.io/crates/gotest-junit): turning the
//! output of `go test` into a structured report, and that report into JUnit XML.
//!
//! The flow of operations is:
//!
//! 1. [`reader::LimitedLineReader`] splits the input into lines. For `go test -json` input,
//!    [`json::JsonReader`] first unwraps each JSON record into the line it carries.
//! 2. [`classifier::LineClassifier`] turns each line into one or two [`events::Event`]s.
//! 3. [`builder::ReportBuilder`] folds the events into a [`report::Report`].
//! 4. [`junit::JunitOptions`] serializes the report as JUnit XML.
//!
//! [`parser::Parser`] ties steps 1 to 3 together.

pub mod builder;
pub mod classifier;
pub mod collector;
pub mod config;
pub mod errors;
pub mod events;
pub mod json;
pub mod junit;
pub mod parser;
pub mod reader;
pub mod report;
