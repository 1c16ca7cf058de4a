// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Code to generate JUnit XML reports from a parsed [`Report`].

use crate::{
    errors::WriteReportError,
    events::TestResult,
    report::{ErrorEntry, Package, Report, Test},
};
use itertools::Itertools;
use quick_junit::{NonSuccessKind, TestCase, TestCaseStatus, TestSuite};
use std::{io, time::Duration};

/// The property used to record statement coverage on a suite.
pub const COVERAGE_PROPERTY: &str = "coverage.statements.pct";

static XML_DECLARATION_PREFIX: &str = "<?xml";

/// Options that control how a [`Report`] is turned into JUnit XML.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JunitOptions {
    /// The name of the root `<testsuites>` element.
    pub report_name: String,

    /// The hostname recorded on every `<testsuite>`, if any.
    pub hostname: Option<String>,

    /// Whether to emit the `<?xml ...?>` declaration.
    pub xml_header: bool,
}

impl Default for JunitOptions {
    fn default() -> Self {
        Self {
            report_name: "gotest-junit".to_owned(),
            hostname: None,
            xml_header: true,
        }
    }
}

impl JunitOptions {
    /// Converts `report` into its JUnit representation.
    pub fn to_junit(&self, report: &Report) -> quick_junit::Report {
        let mut junit = quick_junit::Report::new(self.report_name.as_str());
        junit.add_test_suites(report.packages.iter().map(|package| self.test_suite(package)));
        junit
    }

    /// Serializes `report` as JUnit XML to `writer`.
    pub fn write(&self, report: &Report, mut writer: impl io::Write) -> Result<(), WriteReportError> {
        let xml = self.to_junit(report).to_string()?;
        let xml = if self.xml_header {
            xml.as_str()
        } else {
            strip_declaration(&xml)
        };
        writer.write_all(xml.as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    fn test_suite(&self, package: &Package) -> TestSuite {
        let mut suite = TestSuite::new(package.name.as_str());
        if let Some(hostname) = &self.hostname {
            suite
                .extra
                .insert("hostname".into(), hostname.as_str().into());
        }
        if let Some(timestamp) = package.timestamp {
            suite.set_timestamp(timestamp);
        }

        let time = if package.duration.is_zero() {
            package.total_test_duration()
        } else {
            package.duration
        };
        suite.set_time(time);

        for (key, value) in &package.properties {
            suite.add_property((key.as_str(), value.as_str()));
        }
        if let Some(coverage) = package.coverage {
            suite.add_property((COVERAGE_PROPERTY.to_owned(), format!("{coverage:.2}")));
        }
        if !package.output.is_empty() {
            suite.set_system_out(package.output.join("\n"));
        }

        for test in &package.tests {
            suite.add_test_case(test_case(&package.name, test));
        }
        if let Some(build_error) = &package.build_error {
            suite.add_test_case(error_case(
                build_error,
                build_error.cause.as_str(),
                "Build error",
            ));
        }
        if let Some(run_error) = &package.run_error {
            suite.add_test_case(error_case(run_error, "Failure", "Runtime error"));
        }

        suite
    }
}

fn test_case(classname: &str, test: &Test) -> TestCase {
    let output = format_output(&test.output, test.indent);
    let status = match test.result {
        TestResult::Pass => TestCaseStatus::success(),
        TestResult::Fail => non_success(NonSuccessKind::Failure, "Failed", &output),
        TestResult::Skip => {
            let mut status = TestCaseStatus::skipped();
            status.set_message("Skipped");
            if !output.is_empty() {
                status.set_description(output.as_str());
            }
            status
        }
        TestResult::Unknown => non_success(NonSuccessKind::Error, "No test result found", &output),
    };

    let time = match &test.benchmark {
        Some(measurement) => nanos(measurement.ns_per_op),
        None => test.duration,
    };

    let mut testcase = TestCase::new(test.name.as_str(), status);
    testcase.set_classname(classname).set_time(time);
    if test.result == TestResult::Pass && !output.is_empty() {
        testcase.set_system_out(output);
    }
    testcase
}

fn error_case(entry: &ErrorEntry, name: &str, message: &str) -> TestCase {
    let status = non_success(NonSuccessKind::Error, message, &entry.output.join("\n"));
    let mut testcase = TestCase::new(name, status);
    testcase
        .set_classname(entry.name.as_str())
        .set_time(entry.duration);
    testcase
}

fn non_success(kind: NonSuccessKind, message: &str, output: &str) -> TestCaseStatus {
    let mut status = TestCaseStatus::non_success(kind);
    status.set_message(message);
    if !output.is_empty() {
        status.set_description(output);
    }
    status
}

fn nanos(ns: f64) -> Duration {
    Duration::try_from_secs_f64(ns / 1e9).unwrap_or_default()
}

/// Joins the output lines of a test nested `indent` levels deep, removing the indentation `go
/// test` adds.
pub fn format_output(lines: &[String], indent: usize) -> String {
    lines
        .iter()
        .map(|line| trim_prefix_spaces(line, indent))
        .join("\n")
}

/// Removes the indentation `go test` adds to the output of a test nested `indent` levels deep.
///
/// If the leading run of spaces is a multiple of four, up to `indent + 1` groups of four spaces
/// are removed. A single leading tab is then removed.
pub fn trim_prefix_spaces(line: &str, indent: usize) -> &str {
    let prefix_len = line.len() - line.trim_start_matches(' ').len();
    let mut rest = line;
    if prefix_len % 4 == 0 {
        for _ in 0..=indent {
            match rest.strip_prefix("    ") {
                Some(stripped) => rest = stripped,
                None => break,
            }
        }
    }
    rest.strip_prefix('\t').unwrap_or(rest)
}

fn strip_declaration(xml: &str) -> &str {
    if xml.starts_with(XML_DECLARATION_PREFIX) {
        match xml.find('\n') {
            Some(idx) => &xml[idx + 1..],
            None => "",
        }
    } else {
        xml
    }
}
