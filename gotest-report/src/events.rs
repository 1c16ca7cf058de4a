// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Events produced by classifying lines of a `go test` transcript.
//!
//! Every line of input produces zero or more [`Event`]s. Events are pure data: all of the
//! interpretation happens in [`ReportBuilder`](crate::builder::ReportBuilder).

use serde::Serialize;
use std::{fmt, time::Duration};

/// The outcome of a single test, benchmark or package.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestResult {
    /// The test passed.
    Pass,

    /// The test failed.
    Fail,

    /// The test was skipped.
    Skip,

    /// No result was observed.
    #[default]
    Unknown,
}

impl TestResult {
    /// Parses the result word used by `--- PASS:` style markers and bare status lines.
    ///
    /// `BENCH` is how the runner reports a benchmark that finished normally, so it maps to
    /// [`TestResult::Pass`].
    pub fn from_marker(marker: &str) -> Self {
        match marker {
            "PASS" | "BENCH" => Self::Pass,
            "FAIL" => Self::Fail,
            "SKIP" => Self::Skip,
            _ => Self::Unknown,
        }
    }

    /// Parses the leading word of a package summary line (`ok`, `FAIL` or `?`).
    pub fn from_summary(word: &str) -> Self {
        match word {
            "ok" => Self::Pass,
            "FAIL" => Self::Fail,
            _ => Self::Unknown,
        }
    }

    /// Returns true if this result counts as a failure for the purposes of reporting.
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Fail)
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "pass"),
            Self::Fail => write!(f, "fail"),
            Self::Skip => write!(f, "skip"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Measurements reported on a single benchmark result line.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct BenchmarkMeasurement {
    /// The number of iterations the benchmark ran for.
    pub iterations: u64,

    /// Nanoseconds per operation.
    pub ns_per_op: f64,

    /// Throughput in MB/s, if the benchmark called `SetBytes`.
    pub mb_per_sec: f64,

    /// Bytes allocated per operation, if memory stats were requested.
    pub bytes_per_op: u64,

    /// Allocations per operation, if memory stats were requested.
    pub allocs_per_op: u64,
}

impl BenchmarkMeasurement {
    /// Returns the approximate wall-clock time spent in the measured loop.
    pub fn approximate_duration(&self) -> Duration {
        let nanos = self.iterations as f64 * self.ns_per_op;
        if nanos.is_finite() && nanos > 0.0 {
            Duration::from_nanos(nanos as u64)
        } else {
            Duration::ZERO
        }
    }
}

/// A single classified marker or line of free-text output.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// `=== RUN <name>`
    RunTest {
        /// The test name.
        name: String,
    },

    /// `=== PAUSE <name>`
    PauseTest {
        /// The test name.
        name: String,
    },

    /// `=== CONT <name>`
    ContTest {
        /// The test name.
        name: String,
    },

    /// `--- PASS: <name> (<seconds>s)` and its FAIL/SKIP variants.
    EndTest {
        /// The test name.
        name: String,
        /// The result of the test.
        result: TestResult,
        /// The time the test took.
        #[serde(with = "humantime_serde")]
        duration: Duration,
        /// The subtest nesting depth, 0 for top-level tests.
        indent: usize,
    },

    /// A bare `PASS`, `FAIL` or `SKIP` line.
    Status {
        /// The status.
        result: TestResult,
    },

    /// A package summary line such as `ok  package/name 0.160s`.
    Summary {
        /// The package name.
        name: String,
        /// The package result.
        result: TestResult,
        /// The time reported for the package, zero if absent.
        #[serde(with = "humantime_serde")]
        duration: Duration,
        /// `(cached)` and/or a bracketed message such as `[build failed]`, space-separated.
        annotation: String,
        /// Statement coverage reported on the summary line.
        coverage_pct: Option<f64>,
        /// Packages the coverage figure applies to.
        coverage_packages: Vec<String>,
    },

    /// A standalone `coverage: <pct>% of statements` line.
    Coverage {
        /// The coverage percentage.
        pct: f64,
        /// Packages the coverage figure applies to.
        packages: Vec<String>,
    },

    /// A bare benchmark name, printed when a benchmark starts.
    RunBenchmark {
        /// The benchmark name, without the `-<procs>` suffix.
        name: String,
    },

    /// A benchmark result line.
    Benchmark {
        /// The benchmark name, without the `-<procs>` suffix.
        name: String,
        /// The measured values.
        #[serde(flatten)]
        measurement: BenchmarkMeasurement,
    },

    /// `--- BENCH: <name>` and its FAIL/SKIP variants.
    EndBenchmark {
        /// The benchmark name, without the `-<procs>` suffix.
        name: String,
        /// The result of the benchmark.
        result: TestResult,
    },

    /// A `# <package>` banner that precedes compiler output.
    BuildOutput {
        /// The package being built.
        package: String,
    },

    /// Any line that isn't a marker.
    Output {
        /// The line, without its terminator.
        text: String,
    },
}

impl Event {
    pub(crate) fn output(text: impl Into<String>) -> Self {
        Self::Output { text: text.into() }
    }
}
