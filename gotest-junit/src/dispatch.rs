// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    ExpectedError, Result,
    exit_codes::GotestJunitExitCode,
    output::{OutputContext, OutputOpts, OutputWriter},
};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::DateTime;
use clap::{Args, ValueEnum};
use gotest_report::{
    builder::{SubtestMode, TimestampSource},
    config::GotestJunitConfig,
    junit::JunitOptions,
    parser::{InputFormat, Parser, ParserConfig, parse_property},
    report::Report,
};
use std::{
    fs::File,
    io::{self, BufWriter, Read, Write},
};
use tracing::debug;

/// Convert `go test` output into a JUnit XML report.
///
/// Reads the output of `go test -v` (or `go test -json`) from stdin or a file, and writes a JUnit
/// XML report to stdout or a file.
#[derive(Debug, clap::Parser)]
#[command(
    version,
    styles = crate::output::clap_styles::style(),
    max_term_width = 100,
)]
pub struct GotestJunitApp {
    #[clap(flatten)]
    io: IoOpts,

    #[clap(flatten)]
    report: ReportOpts,

    #[clap(flatten)]
    config: ConfigOpts,

    #[clap(flatten)]
    output: OutputOpts,
}

#[derive(Debug, Args)]
#[command(next_help_heading = "Input and output options")]
struct IoOpts {
    /// Read `go test` output from this file [default: stdin]
    #[arg(long, short = 'i', value_name = "PATH")]
    input: Option<Utf8PathBuf>,

    /// Write the JUnit report to this file [default: stdout]
    #[arg(long, short = 'o', value_name = "PATH")]
    output: Option<Utf8PathBuf>,

    /// Copy the input to stdout as it is read
    #[arg(long)]
    iocopy: bool,

    /// Print each classified event as a line of JSON to stderr
    #[arg(long)]
    print_events: bool,
}

#[derive(Debug, Args)]
#[command(next_help_heading = "Report options")]
struct ReportOpts {
    /// The format of the input
    #[arg(long = "parser", value_enum, value_name = "FORMAT")]
    input_format: Option<InputFormatOpt>,

    /// Package name to use for tests that appear after the last package summary
    #[arg(long, value_name = "NAME")]
    package_name: Option<String>,

    /// How tests with subtests are reported
    #[arg(long, value_enum, value_name = "MODE")]
    subtest_mode: Option<SubtestModeOpt>,

    /// Don't treat `# <package>` lines as the start of build errors
    #[arg(long)]
    no_build_output_detection: bool,

    /// Add a property to every test suite (can be repeated)
    #[arg(long = "property", short = 'p', value_name = "KEY=VALUE")]
    properties: Vec<String>,

    /// Hostname to record on every test suite
    #[arg(long, value_name = "NAME")]
    hostname: Option<String>,

    /// Fixed timestamp for every test suite, in RFC 3339 format
    #[arg(long, value_name = "TIMESTAMP")]
    timestamp: Option<String>,

    /// Omit the XML declaration from the report
    #[arg(long)]
    no_xml_header: bool,

    /// Exit with status 1 if the report contains failures
    #[arg(long)]
    set_exit_code: bool,
}

#[derive(Debug, Args)]
#[command(next_help_heading = "Config options")]
struct ConfigOpts {
    /// Config file [default: .config/gotest-junit.toml in the current directory]
    #[arg(long, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,

    /// Config profile to use
    #[arg(
        long,
        value_name = "PROFILE",
        env = "GOTEST_JUNIT_PROFILE",
        default_value = GotestJunitConfig::DEFAULT_PROFILE,
    )]
    profile: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum InputFormatOpt {
    /// `go test -v` output
    Gotest,
    /// `go test -json` output
    Gojson,
}

impl From<InputFormatOpt> for InputFormat {
    fn from(opt: InputFormatOpt) -> Self {
        match opt {
            InputFormatOpt::Gotest => InputFormat::GoTest,
            InputFormatOpt::Gojson => InputFormat::GoJson,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum SubtestModeOpt {
    /// Report tests with subtests like any other test
    Default,
    /// Report tests with subtests, but always as passing
    IgnoreParentResults,
    /// Leave tests with subtests out of the report
    ExcludeParents,
}

impl From<SubtestModeOpt> for SubtestMode {
    fn from(opt: SubtestModeOpt) -> Self {
        match opt {
            SubtestModeOpt::Default => SubtestMode::Default,
            SubtestModeOpt::IgnoreParentResults => SubtestMode::IgnoreParentResults,
            SubtestModeOpt::ExcludeParents => SubtestMode::ExcludeParents,
        }
    }
}

impl GotestJunitApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app.
    ///
    /// Returns the exit code.
    pub fn exec(self, output_writer: &mut OutputWriter) -> Result<i32> {
        let current_dir = current_dir()?;
        let config =
            GotestJunitConfig::from_sources(&current_dir, self.config.config_file.as_deref())?;
        let profile = config.profile(&self.config.profile)?;
        debug!(
            "using profile `{}` from {}",
            profile.name(),
            config.config_file()
        );

        let mut parser_config = profile.parser_config();
        let mut junit_options = profile.junit_options();
        self.report.apply(&mut parser_config, &mut junit_options)?;
        let set_exit_code = self.report.set_exit_code || profile.set_exit_code();

        let mut parser = Parser::new(parser_config);
        let report = self.io.parse(&mut parser, output_writer)?;
        debug!(
            "parsed {} packages with {} tests",
            report.packages.len(),
            report.tests().count()
        );

        if self.io.print_events {
            print_events(&parser, output_writer)?;
        }
        self.io
            .write_report(&report, &junit_options, output_writer)?;

        if set_exit_code && !report.is_successful() {
            debug!("report contains failures");
            Ok(GotestJunitExitCode::TEST_FAILURES)
        } else {
            Ok(GotestJunitExitCode::OK)
        }
    }
}

impl ReportOpts {
    fn apply(
        &self,
        parser_config: &mut ParserConfig,
        junit_options: &mut JunitOptions,
    ) -> Result<()> {
        if let Some(input_format) = self.input_format {
            parser_config.input_format = input_format.into();
        }
        if let Some(package_name) = &self.package_name {
            parser_config.package_name = package_name.clone();
        }
        if let Some(subtest_mode) = self.subtest_mode {
            parser_config.subtest_mode = subtest_mode.into();
        }
        if self.no_build_output_detection {
            parser_config.detect_build_output = false;
        }
        for property in &self.properties {
            let (key, value) = parse_property(property)?;
            parser_config.properties.shift_remove(&key);
            parser_config.properties.insert(key, value);
        }
        if let Some(timestamp) = &self.timestamp {
            let parsed = DateTime::parse_from_rfc3339(timestamp).map_err(|err| {
                ExpectedError::InvalidTimestamp {
                    input: timestamp.clone(),
                    err,
                }
            })?;
            parser_config.timestamp = TimestampSource::Fixed(parsed);
        }

        if let Some(hostname) = &self.hostname {
            junit_options.hostname = Some(hostname.clone());
        }
        if self.no_xml_header {
            junit_options.xml_header = false;
        }
        Ok(())
    }
}

impl IoOpts {
    fn parse(&self, parser: &mut Parser, output_writer: &mut OutputWriter) -> Result<Report> {
        let input: Box<dyn Read> = match &self.input {
            Some(path) => {
                debug!("reading input from {path}");
                Box::new(open_input(path)?)
            }
            None => {
                debug!("reading input from stdin");
                Box::new(io::stdin().lock())
            }
        };

        let report = if self.iocopy {
            let mut stdout = output_writer.stdout_writer();
            let report = parser.parse(TeeReader {
                inner: input,
                copy: &mut stdout,
            })?;
            stdout
                .flush()
                .map_err(|err| ExpectedError::ParseFailed { err: err.into() })?;
            report
        } else {
            parser.parse(input)?
        };
        Ok(report)
    }

    fn write_report(
        &self,
        report: &Report,
        junit_options: &JunitOptions,
        output_writer: &mut OutputWriter,
    ) -> Result<()> {
        match &self.output {
            Some(path) => {
                let file = File::create(path).map_err(|err| ExpectedError::OutputCreateFailed {
                    path: path.clone(),
                    err,
                })?;
                junit_options
                    .write(report, BufWriter::new(file))
                    .map_err(|err| ExpectedError::WriteReportFailed {
                        path: Some(path.clone()),
                        err,
                    })
            }
            None => junit_options
                .write(report, output_writer.stdout_writer())
                .map_err(|err| ExpectedError::WriteReportFailed { path: None, err }),
        }
    }
}

fn print_events(parser: &Parser, output_writer: &mut OutputWriter) -> Result<()> {
    let mut stderr = output_writer.stderr_writer();
    for event in parser.events() {
        serde_json::to_writer(&mut stderr, event)
            .map_err(|err| ExpectedError::WriteEventsFailed { err: err.into() })?;
        writeln!(stderr).map_err(|err| ExpectedError::WriteEventsFailed { err })?;
    }
    stderr
        .flush()
        .map_err(|err| ExpectedError::WriteEventsFailed { err })
}

fn open_input(path: &Utf8Path) -> Result<File> {
    File::open(path).map_err(|err| ExpectedError::InputOpenFailed {
        path: path.to_owned(),
        err,
    })
}

fn current_dir() -> Result<Utf8PathBuf> {
    let dir = std::env::current_dir().map_err(|err| ExpectedError::CurrentDirFailed { err })?;
    Utf8PathBuf::try_from(dir).map_err(|err| ExpectedError::CurrentDirInvalidUtf8 { err })
}

/// Copies everything read from `inner` to `copy`.
struct TeeReader<'a, R, W> {
    inner: R,
    copy: &'a mut W,
}

impl<R: Read, W: Write> Read for TeeReader<'_, R, W> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.copy.write_all(&buf[..n])?;
        Ok(n)
    }
}
