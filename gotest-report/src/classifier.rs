// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Classification of transcript lines into [`Event`]s.

use crate::events::{BenchmarkMeasurement, Event, TestResult};
use regex::Regex;
use smallvec::{SmallVec, smallvec};
use std::{sync::LazyLock, time::Duration};

/// Lines longer than this are never matched against the marker grammar.
///
/// This is the largest token a default-configured line scanner resolves in one pass. Lines this
/// long are almost always data dumped by a test rather than runner markers.
pub const MAX_CLASSIFIED_LINE_SIZE: usize = 64 * 1024;

static END_TEST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"((?:    )*)--- (PASS|FAIL|SKIP): ([^ ]+) \((\d+\.\d+)(?: seconds|s)\)")
        .expect("end test regex is valid")
});

static STATUS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(PASS|FAIL|SKIP)$").expect("status regex is valid"));

static SUMMARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(\?|ok|FAIL)",
        r"\s+([^ \t]+)",
        r"(?:\s+(\d+\.\d+)s)?",
        r"(?:\s+(\(cached\)))?",
        r"(?:\s+(\[[^\]]+\]))?",
        r"(?:\s+coverage:\s+(\d+\.\d+)%\sof\sstatements(?:\sin\s(.+))?)?$",
    ))
    .expect("summary regex is valid")
});

static COVERAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^coverage:\s+(\d+|\d+\.\d+)%\s+of\s+statements(?:\sin\s(.+))?$")
        .expect("coverage regex is valid")
});

static BENCHMARK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(Benchmark[^ -]+)$").expect("benchmark regex is valid"));

static BENCH_SUMMARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(Benchmark[^ -]+)(?:-\d+\s+|\s+)(\d+)\s+(\d+|\d+\.\d+)\sns/op",
        r"(?:\s+(\d+|\d+\.\d+)\sMB/s)?",
        r"(?:\s+(\d+)\sB/op)?",
        r"(?:\s+(\d+)\sallocs/op)?",
    ))
    .expect("benchmark summary regex is valid")
});

static END_BENCHMARK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^--- (BENCH|FAIL|SKIP): (Benchmark[^ -]+)(?:-\d+)?$")
        .expect("end benchmark regex is valid")
});

/// Turns single lines of `go test -v` output into events.
///
/// The classifier carries no state between lines. The only knob is whether `# package` banners
/// are recognized as the start of compiler output.
#[derive(Copy, Clone, Debug)]
pub struct LineClassifier {
    detect_build_output: bool,
}

impl Default for LineClassifier {
    fn default() -> Self {
        Self::new(true)
    }
}

impl LineClassifier {
    /// Creates a new classifier.
    ///
    /// If `detect_build_output` is false, lines starting with `# ` are always treated as output.
    pub fn new(detect_build_output: bool) -> Self {
        Self {
            detect_build_output,
        }
    }

    /// Returns whether `# package` banners are recognized.
    pub fn detect_build_output(&self) -> bool {
        self.detect_build_output
    }

    /// Classifies a single line, without its line terminator.
    ///
    /// Every line produces at least one event. At most two events are produced: text that
    /// precedes an end-of-test marker on the same line is emitted as output first.
    pub fn classify(&self, line: &str) -> SmallVec<[Event; 2]> {
        if line.len() > MAX_CLASSIFIED_LINE_SIZE {
            return smallvec![Event::output(line)];
        }

        if let Some(rest) = line.strip_prefix("=== RUN ") {
            return smallvec![Event::RunTest {
                name: rest.trim().to_owned(),
            }];
        }
        if let Some(rest) = line.strip_prefix("=== PAUSE ") {
            return smallvec![Event::PauseTest {
                name: rest.trim().to_owned(),
            }];
        }
        if let Some(rest) = line.strip_prefix("=== CONT ") {
            return smallvec![Event::ContTest {
                name: rest.trim().to_owned(),
            }];
        }

        if let Some(caps) = END_TEST.captures(line) {
            let mut events = SmallVec::new();
            let start = caps.get(0).map_or(0, |m| m.start());
            if start > 0 {
                events.push(Event::output(&line[..start]));
            }
            events.push(Event::EndTest {
                name: caps[3].to_owned(),
                result: TestResult::from_marker(&caps[2]),
                duration: parse_seconds(&caps[4]),
                indent: caps[1].len() / 4,
            });
            return events;
        }

        if let Some(caps) = STATUS.captures(line) {
            return smallvec![Event::Status {
                result: TestResult::from_marker(&caps[1]),
            }];
        }

        if let Some(caps) = SUMMARY.captures(line) {
            let cached = caps.get(4).map_or("", |m| m.as_str());
            let message = caps.get(5).map_or("", |m| m.as_str());
            return smallvec![Event::Summary {
                name: caps[2].to_owned(),
                result: TestResult::from_summary(&caps[1]),
                duration: caps.get(3).map_or(Duration::ZERO, |m| parse_seconds(m.as_str())),
                annotation: format!("{cached} {message}").trim().to_owned(),
                coverage_pct: caps.get(6).and_then(|m| m.as_str().parse().ok()),
                coverage_packages: parse_packages(caps.get(7).map_or("", |m| m.as_str())),
            }];
        }

        if let Some(caps) = COVERAGE.captures(line) {
            return smallvec![Event::Coverage {
                pct: caps[1].parse().unwrap_or_default(),
                packages: parse_packages(caps.get(2).map_or("", |m| m.as_str())),
            }];
        }

        if let Some(caps) = BENCHMARK.captures(line) {
            return smallvec![Event::RunBenchmark {
                name: caps[1].to_owned(),
            }];
        }

        if let Some(caps) = BENCH_SUMMARY.captures(line) {
            let parse_u64 = |idx: usize| {
                caps.get(idx)
                    .and_then(|m| m.as_str().parse::<u64>().ok())
                    .unwrap_or_default()
            };
            return smallvec![Event::Benchmark {
                name: caps[1].to_owned(),
                measurement: BenchmarkMeasurement {
                    iterations: parse_u64(2),
                    ns_per_op: caps[3].parse().unwrap_or_default(),
                    mb_per_sec: caps
                        .get(4)
                        .and_then(|m| m.as_str().parse().ok())
                        .unwrap_or_default(),
                    bytes_per_op: parse_u64(5),
                    allocs_per_op: parse_u64(6),
                },
            }];
        }

        if let Some(caps) = END_BENCHMARK.captures(line) {
            return smallvec![Event::EndBenchmark {
                name: caps[2].to_owned(),
                result: TestResult::from_marker(&caps[1]),
            }];
        }

        if self.detect_build_output
            && let Some(rest) = line.strip_prefix("# ")
        {
            // `# package` or `# package [package.test]`.
            let mut fields = rest.split_whitespace();
            if let Some(package) = fields.next()
                && fields.nth(1).is_none()
            {
                return smallvec![Event::BuildOutput {
                    package: package.to_owned(),
                }];
            }
        }

        smallvec![Event::output(line)]
    }
}

/// Parses a decimal number of seconds such as `0.160` exactly, without going through floats.
fn parse_seconds(s: &str) -> Duration {
    let (secs, frac) = s.split_once('.').unwrap_or((s, ""));
    let Ok(secs) = secs.parse::<u64>() else {
        return Duration::ZERO;
    };

    let mut nanos = 0u32;
    let mut digits = 0;
    for digit in frac.bytes().take(9) {
        nanos = nanos * 10 + u32::from(digit - b'0');
        digits += 1;
    }
    for _ in digits..9 {
        nanos *= 10;
    }

    Duration::new(secs, nanos)
}

fn parse_packages(list: &str) -> Vec<String> {
    if list.is_empty() {
        return Vec::new();
    }
    list.split(", ").map(str::to_owned).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;
    use test_strategy::proptest;

    fn run(name: &str) -> Event {
        Event::RunTest {
            name: name.to_owned(),
        }
    }

    fn end(name: &str, result: TestResult, millis: u64, indent: usize) -> Event {
        Event::EndTest {
            name: name.to_owned(),
            result,
            duration: Duration::from_millis(millis),
            indent,
        }
    }

    fn summary(name: &str, result: TestResult, millis: u64, annotation: &str) -> Event {
        Event::Summary {
            name: name.to_owned(),
            result,
            duration: Duration::from_millis(millis),
            annotation: annotation.to_owned(),
            coverage_pct: None,
            coverage_packages: Vec::new(),
        }
    }

    fn bench(name: &str, iterations: u64, ns_per_op: f64) -> Event {
        Event::Benchmark {
            name: name.to_owned(),
            measurement: BenchmarkMeasurement {
                iterations,
                ns_per_op,
                ..Default::default()
            },
        }
    }

    #[test_case("=== RUN TestOne", vec![run("TestOne")] ; "run")]
    #[test_case("=== RUN   TestTwo/Subtest", vec![run("TestTwo/Subtest")] ; "run with padding")]
    #[test_case(
        "=== PAUSE TestOne",
        vec![Event::PauseTest { name: "TestOne".to_owned() }] ;
        "pause"
    )]
    #[test_case(
        "=== CONT  TestOne",
        vec![Event::ContTest { name: "TestOne".to_owned() }] ;
        "cont"
    )]
    #[test_case(
        "--- PASS: TestOne (12.34 seconds)",
        vec![end("TestOne", TestResult::Pass, 12_340, 0)] ;
        "end test with seconds suffix"
    )]
    #[test_case(
        "    --- SKIP: TestSkip (1.20s)",
        vec![end("TestSkip", TestResult::Skip, 1_200, 1)] ;
        "end subtest"
    )]
    #[test_case(
        "        --- FAIL: TestOne/Sub/Deep (0.00s)",
        vec![end("TestOne/Sub/Deep", TestResult::Fail, 0, 2)] ;
        "end nested subtest"
    )]
    #[test_case(
        "some text--- PASS: TestTwo (0.06 seconds)",
        vec![Event::output("some text"), end("TestTwo", TestResult::Pass, 60, 0)] ;
        "end test preceded by output"
    )]
    #[test_case("PASS", vec![Event::Status { result: TestResult::Pass }] ; "status pass")]
    #[test_case("FAIL", vec![Event::Status { result: TestResult::Fail }] ; "status fail")]
    #[test_case(
        "ok  \tpackage/name/ok1\t0.100s",
        vec![summary("package/name/ok1", TestResult::Pass, 100, "")] ;
        "summary ok"
    )]
    #[test_case(
        "FAIL\tpackage/name/failing1 [build failed]",
        vec![summary("package/name/failing1", TestResult::Fail, 0, "[build failed]")] ;
        "summary build failed"
    )]
    #[test_case(
        "ok  \tpackage/other     (cached)",
        vec![summary("package/other", TestResult::Pass, 0, "(cached)")] ;
        "summary cached"
    )]
    #[test_case(
        "?   \tpackage/name\t[no test files]",
        vec![summary("package/name", TestResult::Unknown, 0, "[no test files]")] ;
        "summary no test files"
    )]
    #[test_case(
        "ok  \tpackage/name\t(cached) [no tests to run]",
        vec![summary("package/name", TestResult::Pass, 0, "(cached) [no tests to run]")] ;
        "summary cached no tests to run"
    )]
    #[test_case(
        "BenchmarkOne",
        vec![Event::RunBenchmark { name: "BenchmarkOne".to_owned() }] ;
        "run benchmark"
    )]
    #[test_case(
        "BenchmarkOne-8   2000000\t  604 ns/op",
        vec![bench("BenchmarkOne", 2_000_000, 604.0)] ;
        "benchmark strips procs"
    )]
    #[test_case(
        "BenchmarkThree 2000000000 0.26 ns/op",
        vec![bench("BenchmarkThree", 2_000_000_000, 0.26)] ;
        "benchmark without procs"
    )]
    #[test_case(
        "--- BENCH: BenchmarkOK-8",
        vec![Event::EndBenchmark { name: "BenchmarkOK".to_owned(), result: TestResult::Pass }] ;
        "end benchmark"
    )]
    #[test_case(
        "--- FAIL: BenchmarkError",
        vec![Event::EndBenchmark { name: "BenchmarkError".to_owned(), result: TestResult::Fail }] ;
        "end benchmark failed"
    )]
    #[test_case(
        "# package/name/failing1",
        vec![Event::BuildOutput { package: "package/name/failing1".to_owned() }] ;
        "build output"
    )]
    #[test_case(
        "# package/name/failing2 [package/name/failing2.test]",
        vec![Event::BuildOutput { package: "package/name/failing2".to_owned() }] ;
        "build output with test binary"
    )]
    #[test_case("# some more output", vec![Event::output("# some more output")] ; "comment")]
    #[test_case("single", vec![Event::output("single")] ; "plain output")]
    #[test_case("", vec![Event::output("")] ; "empty line")]
    #[test_case("=== RUNNING", vec![Event::output("=== RUNNING")] ; "not quite a run marker")]
    fn classify(line: &str, expected: Vec<Event>) {
        let events = LineClassifier::default().classify(line);
        assert_eq!(events.into_vec(), expected);
    }

    #[test]
    fn classify_summary_with_coverage() {
        let events = LineClassifier::default()
            .classify("ok  \tpackage/name\t0.400s\tcoverage: 10.0% of statements in pkg/a, pkg/b");
        assert_eq!(
            events.into_vec(),
            vec![Event::Summary {
                name: "package/name".to_owned(),
                result: TestResult::Pass,
                duration: Duration::from_millis(400),
                annotation: String::new(),
                coverage_pct: Some(10.0),
                coverage_packages: vec!["pkg/a".to_owned(), "pkg/b".to_owned()],
            }]
        );
    }

    #[test_case(
        "coverage: 5% of statements",
        5.0,
        &[] ;
        "integer percentage"
    )]
    #[test_case(
        "coverage: 13.37% of statements in package/name",
        13.37,
        &["package/name"] ;
        "with packages"
    )]
    fn classify_coverage(line: &str, pct: f64, packages: &[&str]) {
        let events = LineClassifier::default().classify(line);
        assert_eq!(
            events.into_vec(),
            vec![Event::Coverage {
                pct,
                packages: packages.iter().map(|p| (*p).to_owned()).collect(),
            }]
        );
    }

    #[test]
    fn classify_benchmark_with_memory_stats() {
        let events = LineClassifier::default()
            .classify("BenchmarkAlloc-4\t  100000\t 1250.5 ns/op\t 12.50 MB/s\t  512 B/op\t   3 allocs/op");
        assert_eq!(
            events.into_vec(),
            vec![Event::Benchmark {
                name: "BenchmarkAlloc".to_owned(),
                measurement: BenchmarkMeasurement {
                    iterations: 100_000,
                    ns_per_op: 1250.5,
                    mb_per_sec: 12.5,
                    bytes_per_op: 512,
                    allocs_per_op: 3,
                },
            }]
        );
    }

    #[test]
    fn build_output_detection_disabled() {
        let classifier = LineClassifier::new(false);
        assert!(!classifier.detect_build_output());
        assert_eq!(
            classifier.classify("# package/name").into_vec(),
            vec![Event::output("# package/name")]
        );
    }

    #[test]
    fn oversized_lines_are_output() {
        let mut line = "--- PASS: TestOne (0.00s)".to_owned();
        line.push_str(&" ".repeat(MAX_CLASSIFIED_LINE_SIZE));
        let events = LineClassifier::default().classify(&line);
        assert_eq!(events.into_vec(), vec![Event::output(line)]);
    }

    #[test_case("0.06", Duration::from_millis(60) ; "millis")]
    #[test_case("12.34", Duration::from_millis(12_340) ; "seconds")]
    #[test_case("1.0000000019", Duration::new(1, 1) ; "truncated past nanos")]
    #[test_case("3", Duration::from_secs(3) ; "integer")]
    fn seconds(input: &str, expected: Duration) {
        assert_eq!(parse_seconds(input), expected);
    }

    #[proptest]
    fn classification_is_idempotent(line: String) {
        let classifier = LineClassifier::default();
        let first = classifier.classify(&line);
        let second = classifier.classify(&line);
        assert_eq!(first, second);
    }

    #[proptest]
    fn classification_is_total(line: String) {
        let events = LineClassifier::default().classify(&line);
        assert!(!events.is_empty());
        assert!(events.len() <= 2);
    }
}
