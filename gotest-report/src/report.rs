// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The structured report produced from a transcript.

use crate::events::{BenchmarkMeasurement, TestResult};
use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;
use serde::Serialize;
use std::{fmt, time::Duration};

/// Identifies a test, benchmark or build error for the lifetime of a report.
///
/// Ids are handed out by a single counter and are never reused, even across packages.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// The pseudo-id that output belongs to while no test is active.
    pub const PACKAGE: Self = Self(0);

    /// The first id handed out to an entity.
    pub(crate) const FIRST: Self = Self(1);

    pub(crate) fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A complete report: the packages seen in a transcript, in order.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Report {
    /// The packages, in the order their summaries appeared.
    pub packages: Vec<Package>,
}

impl Report {
    /// Returns true if no package failed to build or run, and no test failed or lacked a result.
    pub fn is_successful(&self) -> bool {
        self.packages.iter().all(Package::is_successful)
    }

    /// Returns an iterator over every test in every package.
    pub fn tests(&self) -> impl Iterator<Item = &Test> {
        self.packages.iter().flat_map(|package| package.tests.iter())
    }
}

/// A single Go package.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Package {
    /// The import path of the package.
    pub name: String,

    /// The time the package took, as reported by its summary line.
    pub duration: Duration,

    /// When the package was finalized.
    pub timestamp: Option<DateTime<FixedOffset>>,

    /// Statement coverage, if reported.
    pub coverage: Option<f64>,

    /// Output that could not be attributed to any test.
    pub output: Vec<String>,

    /// The tests and benchmarks in this package, in creation order.
    pub tests: Vec<Test>,

    /// User-supplied key/value pairs.
    pub properties: IndexMap<String, String>,

    /// Set if the package failed to compile. Build-failed packages never have tests.
    pub build_error: Option<ErrorEntry>,

    /// Set if the package failed without any test failing.
    pub run_error: Option<ErrorEntry>,
}

impl Package {
    pub(crate) fn new(name: impl Into<String>, duration: Duration) -> Self {
        Self {
            name: name.into(),
            duration,
            timestamp: None,
            coverage: None,
            output: Vec::new(),
            tests: Vec::new(),
            properties: IndexMap::new(),
            build_error: None,
            run_error: None,
        }
    }

    /// Sets a property, replacing any earlier value for the same key.
    ///
    /// A replaced key moves to the end of the property list.
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        self.properties.shift_remove(&key);
        self.properties.insert(key, value.into());
    }

    /// Returns true if this package has no build error, no run error and no failing tests.
    pub fn is_successful(&self) -> bool {
        self.build_error.is_none()
            && self.run_error.is_none()
            && self
                .tests
                .iter()
                .all(|test| !matches!(test.result, TestResult::Fail | TestResult::Unknown))
    }

    /// Returns the sum of the durations of this package's tests.
    pub fn total_test_duration(&self) -> Duration {
        self.tests
            .iter()
            .map(|test| test.duration)
            .fold(Duration::ZERO, Duration::saturating_add)
    }
}

/// Whether a [`Test`] is a regular test or a benchmark.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestKind {
    /// A `TestXxx` function or one of its subtests.
    Test,

    /// A `BenchmarkXxx` function.
    Benchmark,
}

impl TestKind {
    /// Determines the kind of a test from its name.
    pub fn from_name(name: &str) -> Self {
        if name.starts_with("Benchmark") {
            Self::Benchmark
        } else {
            Self::Test
        }
    }
}

/// A test or a benchmark.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Test {
    /// The unique id of this test.
    pub id: EntityId,

    /// The full name, including any `parent/` prefixes.
    pub name: String,

    /// Whether this is a test or a benchmark.
    pub kind: TestKind,

    /// The result.
    pub result: TestResult,

    /// The time the test took. For benchmarks, the approximate time spent in the measured loop.
    pub duration: Duration,

    /// The subtest nesting depth, 0 for top-level tests.
    pub indent: usize,

    /// Output attributed to this test.
    pub output: Vec<String>,

    /// Measurements, if this is a benchmark that reported a result line.
    pub benchmark: Option<BenchmarkMeasurement>,
}

impl Test {
    pub(crate) fn new(id: EntityId, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id,
            kind: TestKind::from_name(&name),
            name,
            result: TestResult::Unknown,
            duration: Duration::ZERO,
            indent: 0,
            output: Vec::new(),
            benchmark: None,
        }
    }
}

/// A package-level failure with no test to attach it to.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ErrorEntry {
    /// The id this error's output was collected under, if any.
    pub id: Option<EntityId>,

    /// The package name.
    pub name: String,

    /// Free-form annotation from the summary line, e.g. `[build failed]`.
    pub cause: String,

    /// The duration reported on the summary line.
    pub duration: Duration,

    /// The output collected for this error.
    pub output: Vec<String>,
}
