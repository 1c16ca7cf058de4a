// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Assembles a [`Report`] from a stream of [`Event`]s.
//!
//! The classifier keeps no state, so the builder is where output gets attributed. At any point
//! at most one entity (a test, benchmark or build error) is *active*: free-text output is
//! recorded against it. Output seen while nothing is active belongs to the package.

use crate::{
    collector::OutputCollector,
    errors::ReportBuildError,
    events::{BenchmarkMeasurement, Event, TestResult},
    report::{EntityId, ErrorEntry, Package, Report, Test, TestKind},
};
use chrono::{DateTime, FixedOffset, Local};
use indexmap::IndexMap;
use serde::Deserialize;
use std::{
    collections::{HashMap, HashSet},
    fmt,
    str::FromStr,
    time::Duration,
};
use tracing::debug;

/// How tests that have subtests are reported.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubtestMode {
    /// Parents are reported like any other test.
    #[default]
    Default,

    /// Parents are reported, but always as passing. Their failure is implied by their subtests.
    IgnoreParentResults,

    /// Parents are dropped, and their output is moved to the package.
    ExcludeParents,
}

impl SubtestMode {
    /// All known subtest modes.
    pub const VARIANTS: &'static [&'static str] =
        &["default", "ignore-parent-results", "exclude-parents"];
}

impl fmt::Display for SubtestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::IgnoreParentResults => write!(f, "ignore-parent-results"),
            Self::ExcludeParents => write!(f, "exclude-parents"),
        }
    }
}

impl FromStr for SubtestMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(Self::Default),
            "ignore-parent-results" => Ok(Self::IgnoreParentResults),
            "exclude-parents" => Ok(Self::ExcludeParents),
            other => Err(format!(
                "unknown subtest mode `{other}` (known values: {})",
                Self::VARIANTS.join(", ")
            )),
        }
    }
}

/// Where package timestamps come from.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum TimestampSource {
    /// The local time at which each package is finalized.
    #[default]
    Now,

    /// A fixed time, for reproducible reports.
    Fixed(DateTime<FixedOffset>),
}

impl TimestampSource {
    fn timestamp(&self) -> DateTime<FixedOffset> {
        match self {
            Self::Now => Local::now().fixed_offset(),
            Self::Fixed(timestamp) => *timestamp,
        }
    }
}

/// Builds a [`Report`] one event at a time.
#[derive(Debug)]
pub struct ReportBuilder {
    packages: Vec<Package>,

    // Per-package state.
    tests: IndexMap<EntityId, Test>,
    names: HashMap<String, Vec<EntityId>>,
    parents: HashSet<EntityId>,
    coverage: Option<f64>,
    active: Option<EntityId>,

    // Pending build errors survive package boundaries until their summary arrives.
    build_errors: IndexMap<EntityId, String>,
    output: OutputCollector,
    next_id: EntityId,

    package_name: String,
    subtest_mode: SubtestMode,
    timestamp: TimestampSource,
    properties: IndexMap<String, String>,
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportBuilder {
    /// Creates a new builder with default options.
    pub fn new() -> Self {
        Self {
            packages: Vec::new(),
            tests: IndexMap::new(),
            names: HashMap::new(),
            parents: HashSet::new(),
            coverage: None,
            active: None,
            build_errors: IndexMap::new(),
            output: OutputCollector::new(),
            next_id: EntityId::FIRST,
            package_name: String::new(),
            subtest_mode: SubtestMode::Default,
            timestamp: TimestampSource::Now,
            properties: IndexMap::new(),
        }
    }

    /// Sets the package name used if the input ends without a summary line.
    pub fn set_package_name(&mut self, package_name: impl Into<String>) -> &mut Self {
        self.package_name = package_name.into();
        self
    }

    /// Sets how tests with subtests are reported.
    pub fn set_subtest_mode(&mut self, subtest_mode: SubtestMode) -> &mut Self {
        self.subtest_mode = subtest_mode;
        self
    }

    /// Sets where package timestamps come from.
    pub fn set_timestamp(&mut self, timestamp: TimestampSource) -> &mut Self {
        self.timestamp = timestamp;
        self
    }

    /// Sets a property on every package created from now on.
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let key = key.into();
        self.properties.shift_remove(&key);
        self.properties.insert(key, value.into());
        self
    }

    /// Applies a single event.
    pub fn process(&mut self, event: Event) -> Result<(), ReportBuildError> {
        match event {
            Event::RunTest { name } => {
                self.create_test(&name);
            }
            Event::PauseTest { name } => self.pause_test(&name),
            Event::ContTest { name } => self.continue_test(&name),
            Event::EndTest {
                name,
                result,
                duration,
                indent,
            } => self.end_test(&name, result, duration, indent),
            Event::Status { .. } => self.end(),
            Event::Summary {
                name,
                result,
                duration,
                annotation,
                coverage_pct,
                coverage_packages,
            } => {
                if let Some(pct) = coverage_pct {
                    self.coverage(pct, &coverage_packages);
                }
                self.create_package(&name, result, duration, &annotation)?;
            }
            Event::Coverage { pct, packages } => self.coverage(pct, &packages),
            Event::RunBenchmark { name } => {
                self.create_benchmark(&name);
            }
            Event::Benchmark { name, measurement } => self.benchmark_result(&name, measurement),
            Event::EndBenchmark { name, result } => self.end_benchmark(&name, result),
            Event::BuildOutput { package } => {
                self.create_build_error(&package);
            }
            Event::Output { text } => self.append_output(text),
        }
        Ok(())
    }

    /// Creates a test and makes it active.
    ///
    /// If a test exists whose name is an ancestor path of `name`, that test is marked as having
    /// subtests.
    pub fn create_test(&mut self, name: &str) -> EntityId {
        if let Some(parent) = self.find_parent(name) {
            self.parents.insert(parent);
        }
        let id = self.allocate_id();
        self.names.entry(name.to_owned()).or_default().push(id);
        self.tests.insert(id, Test::new(id, name));
        id
    }

    /// Clears the active context.
    pub fn pause_test(&mut self, _name: &str) {
        self.active = None;
    }

    /// Makes the most recently created test called `name` active.
    pub fn continue_test(&mut self, name: &str) {
        self.active = self.find_test(name);
    }

    /// Records the result of the most recently created test called `name`.
    ///
    /// Without `-v` the runner only prints end markers, so the test is created if necessary.
    pub fn end_test(&mut self, name: &str, result: TestResult, duration: Duration, indent: usize) {
        let id = match self.find_test(name) {
            Some(id) => id,
            None => {
                debug!("no run marker seen for `{name}`, creating test");
                self.create_test(name)
            }
        };

        if let Some(test) = self.tests.get_mut(&id) {
            test.result = result;
            test.duration = duration;
            test.indent = indent;
        }
        self.active = None;
    }

    /// Clears the active context.
    pub fn end(&mut self) {
        self.active = None;
    }

    /// Creates a benchmark and makes it active.
    pub fn create_benchmark(&mut self, name: &str) -> EntityId {
        self.create_test(name)
    }

    /// Records a benchmark measurement.
    ///
    /// The most recent benchmark called `name` is updated only if it doesn't have a result yet.
    /// Otherwise this is a repeated run and a new entry is created.
    pub fn benchmark_result(&mut self, name: &str, measurement: BenchmarkMeasurement) {
        let id = match self.find_test(name) {
            Some(id) if self.tests.get(&id).map(|test| test.result) == Some(TestResult::Unknown) => {
                id
            }
            _ => self.create_test(name),
        };

        let mut test = Test::new(id, name);
        test.result = TestResult::Pass;
        test.duration = measurement.approximate_duration();
        test.benchmark = Some(measurement);
        self.tests.insert(id, test);
    }

    /// Records the final result of the most recent benchmark called `name`.
    ///
    /// `--- BENCH` lines carry no timing, so the duration is reset to zero. The measurement is
    /// kept.
    pub fn end_benchmark(&mut self, name: &str, result: TestResult) {
        let id = match self.find_test(name) {
            Some(id) => id,
            None => self.create_benchmark(name),
        };

        if let Some(test) = self.tests.get_mut(&id) {
            test.result = result;
            test.duration = Duration::ZERO;
            test.indent = 0;
        }
        self.active = None;
    }

    /// Starts collecting compiler output for `package` and makes it active.
    pub fn create_build_error(&mut self, package: &str) -> EntityId {
        let id = self.allocate_id();
        self.build_errors.insert(id, package.to_owned());
        id
    }

    /// Attributes a line of output to the active context, or to the package.
    pub fn append_output(&mut self, text: impl Into<String>) {
        self.output
            .append(self.active.unwrap_or(EntityId::PACKAGE), text);
    }

    /// Records the coverage percentage for the package being assembled.
    pub fn coverage(&mut self, pct: f64, _packages: &[String]) {
        self.coverage = Some(pct);
    }

    /// Finalizes a package from everything collected since the last one.
    pub fn create_package(
        &mut self,
        name: &str,
        result: TestResult,
        duration: Duration,
        annotation: &str,
    ) -> Result<(), ReportBuildError> {
        let mut package = Package::new(name, duration);
        package.timestamp = Some(self.timestamp.timestamp());
        package.properties = self.properties.clone();

        // Build errors belong to exactly one package, so only the matching one is consumed.
        let build_id = self
            .build_errors
            .iter()
            .find(|(_, pending)| *pending == name)
            .map(|(id, _)| *id);
        if let Some(id) = build_id {
            if !self.tests.is_empty() {
                return Err(ReportBuildError::BuildErrorWithTests {
                    package: name.to_owned(),
                    test_count: self.tests.len(),
                });
            }
            self.build_errors.shift_remove(&id);
            package.build_error = Some(ErrorEntry {
                id: Some(id),
                name: name.to_owned(),
                cause: annotation.to_owned(),
                duration,
                output: self.output.get(id),
            });
            self.output.clear(id);
            self.packages.push(package);
            return Ok(());
        }

        // Output with no tests at all: either there really were no tests, or something failed
        // outside of them.
        if self.tests.is_empty() && self.output.contains(EntityId::PACKAGE) {
            let output = self.output.get(EntityId::PACKAGE);
            if result.is_failure() {
                package.run_error = Some(run_error(name, output));
            } else {
                package.output = output;
            }
            package.coverage = self.coverage;
            self.packages.push(package);
            self.reset();
            return Ok(());
        }

        // The package failed but none of its tests did.
        if result.is_failure() && !self.tests.is_empty() && !self.contains_failures() {
            package.run_error = Some(run_error(name, self.output.get(EntityId::PACKAGE)));
            self.output.clear(EntityId::PACKAGE);
        }

        let tests = std::mem::take(&mut self.tests);
        let round_ids: Vec<_> = tests.keys().copied().collect();
        let mut collected = Vec::with_capacity(tests.len());
        for (id, mut test) in tests {
            if self.parents.contains(&id) {
                match self.subtest_mode {
                    SubtestMode::Default => {}
                    SubtestMode::IgnoreParentResults => test.result = TestResult::Pass,
                    SubtestMode::ExcludeParents => {
                        self.output.merge(id, EntityId::PACKAGE);
                        continue;
                    }
                }
            }
            test.output = self.output.get(id);
            collected.push(test);
        }

        package.tests = self.group_benchmarks(collected);
        package.coverage = self.coverage;
        package.output = self.output.get(EntityId::PACKAGE);
        self.packages.push(package);

        for id in round_ids {
            self.output.clear(id);
        }
        self.reset();
        Ok(())
    }

    /// Finishes the report.
    ///
    /// Tests seen after the last summary line are collected into a package named after the
    /// configured package name.
    pub fn finish(mut self) -> Result<Report, ReportBuildError> {
        if !self.tests.is_empty() {
            let package_name = self.package_name.clone();
            debug!("input ended without a summary, creating package `{package_name}`");
            self.create_package(&package_name, TestResult::Unknown, Duration::ZERO, "")?;
        }
        Ok(Report {
            packages: self.packages,
        })
    }

    fn allocate_id(&mut self) -> EntityId {
        let id = self.next_id;
        self.next_id = id.next();
        self.active = Some(id);
        id
    }

    /// Resets per-package state. Ids keep counting up.
    fn reset(&mut self) {
        self.active = None;
        self.output.clear(EntityId::PACKAGE);
        self.coverage = None;
        self.tests.clear();
        self.names.clear();
        self.parents.clear();
    }

    fn find_test(&self, name: &str) -> Option<EntityId> {
        if let Some(active) = self.active
            && self.tests.get(&active).is_some_and(|test| test.name == name)
        {
            return Some(active);
        }
        self.names.get(name).and_then(|ids| ids.last()).copied()
    }

    fn find_parent(&self, name: &str) -> Option<EntityId> {
        let mut parent = drop_last_segment(name);
        while let Some(candidate) = parent {
            if let Some(id) = self.find_test(candidate) {
                return Some(id);
            }
            parent = drop_last_segment(candidate);
        }
        None
    }

    fn contains_failures(&self) -> bool {
        self.tests
            .values()
            .any(|test| matches!(test.result, TestResult::Fail | TestResult::Unknown))
    }

    /// Merges repeated runs of the same benchmark into a single entry, placed where the first
    /// run was.
    fn group_benchmarks(&self, tests: Vec<Test>) -> Vec<Test> {
        enum Slot {
            Single(Test),
            Group(Vec<Test>),
        }

        let mut slots: Vec<Slot> = Vec::with_capacity(tests.len());
        let mut group_index: HashMap<String, usize> = HashMap::new();
        for test in tests {
            if test.kind != TestKind::Benchmark {
                slots.push(Slot::Single(test));
                continue;
            }
            match group_index.get(&test.name) {
                Some(&idx) => {
                    if let Slot::Group(samples) = &mut slots[idx] {
                        samples.push(test);
                    }
                }
                None => {
                    group_index.insert(test.name.clone(), slots.len());
                    slots.push(Slot::Group(vec![test]));
                }
            }
        }

        slots
            .into_iter()
            .filter_map(|slot| match slot {
                Slot::Single(test) => Some(test),
                Slot::Group(samples) => self.merge_samples(samples),
            })
            .collect()
    }

    fn merge_samples(&self, samples: Vec<Test>) -> Option<Test> {
        let first = samples.first()?;
        let mut merged = Test::new(first.id, first.name.clone());

        // Integer fields are summed as u128 so averaging large samples can't overflow.
        let mut iterations = 0u128;
        let mut bytes_per_op = 0u128;
        let mut allocs_per_op = 0u128;
        let mut total = BenchmarkMeasurement::default();
        let mut count = 0u64;
        for sample in samples.iter().filter(|s| s.result == TestResult::Pass) {
            if let Some(measurement) = &sample.benchmark {
                iterations += u128::from(measurement.iterations);
                total.ns_per_op += measurement.ns_per_op;
                total.mb_per_sec += measurement.mb_per_sec;
                bytes_per_op += u128::from(measurement.bytes_per_op);
                allocs_per_op += u128::from(measurement.allocs_per_op);
                count += 1;
            }
        }
        if count > 0 {
            total.iterations = mean(iterations, count);
            total.ns_per_op /= count as f64;
            total.mb_per_sec /= count as f64;
            total.bytes_per_op = mean(bytes_per_op, count);
            total.allocs_per_op = mean(allocs_per_op, count);
            merged.benchmark = Some(total);
        }

        merged.duration = samples
            .iter()
            .map(|s| s.duration)
            .fold(Duration::ZERO, Duration::saturating_add);
        merged.result = group_result(&samples);
        merged.output = self.output.get_all(samples.iter().map(|s| s.id));
        Some(merged)
    }
}

/// The mean of `count` u64 values summing to `sum`, which always fits in a u64.
fn mean(sum: u128, count: u64) -> u64 {
    u64::try_from(sum / u128::from(count)).unwrap_or(u64::MAX)
}

fn run_error(name: &str, output: Vec<String>) -> ErrorEntry {
    ErrorEntry {
        id: None,
        name: name.to_owned(),
        cause: String::new(),
        duration: Duration::ZERO,
        output,
    }
}

/// Any failure fails the group. Otherwise, the first pass sticks, so an unknown sample doesn't
/// mask a later pass.
fn group_result(samples: &[Test]) -> TestResult {
    let mut result = TestResult::Unknown;
    for sample in samples {
        if sample.result == TestResult::Fail {
            return TestResult::Fail;
        }
        if result != TestResult::Pass {
            result = sample.result;
        }
    }
    result
}

fn drop_last_segment(name: &str) -> Option<&str> {
    name.rfind('/').map(|idx| &name[..idx])
}
