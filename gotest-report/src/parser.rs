// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The parsing pipeline: lines are read, classified into events, and folded into a [`Report`].

use crate::{
    builder::{ReportBuilder, SubtestMode, TimestampSource},
    classifier::LineClassifier,
    errors::{InvalidProperty, ParseError},
    events::Event,
    json::JsonReader,
    reader::LimitedLineReader,
    report::Report,
};
use debug_ignore::DebugIgnore;
use indexmap::IndexMap;
use serde::Deserialize;
use std::{
    fmt,
    io::{BufReader, Read},
    str::FromStr,
};

/// The format of the input transcript.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    /// Plain `go test -v` output.
    #[default]
    GoTest,

    /// `go test -json` output.
    GoJson,
}

impl InputFormat {
    /// All known input formats.
    pub const VARIANTS: &'static [&'static str] = &["gotest", "gojson"];
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GoTest => write!(f, "gotest"),
            Self::GoJson => write!(f, "gojson"),
        }
    }
}

impl FromStr for InputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gotest" => Ok(Self::GoTest),
            "gojson" => Ok(Self::GoJson),
            other => Err(format!(
                "unknown input format `{other}` (known values: {})",
                Self::VARIANTS.join(", ")
            )),
        }
    }
}

/// Options for a [`Parser`].
#[derive(Clone, Debug, PartialEq)]
pub struct ParserConfig {
    /// The package name used if the input ends without a summary line.
    pub package_name: String,

    /// How tests with subtests are reported.
    pub subtest_mode: SubtestMode,

    /// Where package timestamps come from.
    pub timestamp: TimestampSource,

    /// Whether `# <package>` headers start build error entries.
    pub detect_build_output: bool,

    /// The format of the input.
    pub input_format: InputFormat,

    /// Properties attached to every package.
    pub properties: IndexMap<String, String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            package_name: String::new(),
            subtest_mode: SubtestMode::Default,
            timestamp: TimestampSource::Now,
            detect_build_output: true,
            input_format: InputFormat::GoTest,
            properties: IndexMap::new(),
        }
    }
}

/// Parses a `go test` transcript into a [`Report`].
#[derive(Debug)]
pub struct Parser {
    config: ParserConfig,
    events: DebugIgnore<Vec<Event>>,
}

impl Parser {
    /// Creates a new parser.
    pub fn new(config: ParserConfig) -> Self {
        Self {
            config,
            events: DebugIgnore(Vec::new()),
        }
    }

    /// Returns the events classified during the last call to [`Self::parse`].
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Reads the whole of `input` and returns the resulting report.
    pub fn parse(&mut self, input: impl Read) -> Result<Report, ParseError> {
        self.events.clear();
        match self.config.input_format {
            InputFormat::GoTest => self.parse_lines(LimitedLineReader::new(BufReader::new(input))),
            InputFormat::GoJson => self.parse_lines(LimitedLineReader::new(BufReader::new(
                JsonReader::new(BufReader::new(input)),
            ))),
        }
    }

    fn parse_lines(
        &mut self,
        lines: impl Iterator<Item = std::io::Result<String>>,
    ) -> Result<Report, ParseError> {
        let classifier = LineClassifier::new(self.config.detect_build_output);
        let mut builder = ReportBuilder::new();
        builder
            .set_package_name(self.config.package_name.clone())
            .set_subtest_mode(self.config.subtest_mode)
            .set_timestamp(self.config.timestamp);
        for (key, value) in &self.config.properties {
            builder.set_property(key.clone(), value.clone());
        }

        for line in lines {
            let line = line?;
            for event in classifier.classify(&line) {
                self.events.push(event.clone());
                builder.process(event)?;
            }
        }

        Ok(builder.finish()?)
    }
}

/// Parses a `key=value` property. The value may itself contain `=`.
pub fn parse_property(input: &str) -> Result<(String, String), InvalidProperty> {
    match input.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_owned(), value.to_owned())),
        _ => Err(InvalidProperty::new(input)),
    }
}
