// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Support for `go test -json` output.
//!
//! Every line printed by the test binary is wrapped in a JSON object whose `Output` field holds
//! the original line. [`JsonReader`] unwraps these objects so the regular line classifier can be
//! used unchanged.

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use std::io::{self, BufRead, Read};
use tracing::debug;

/// A single record emitted by `go test -json` (the `test2json` format).
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct JsonEvent {
    /// When the event was recorded.
    pub time: Option<DateTime<FixedOffset>>,

    /// `run`, `pause`, `cont`, `pass`, `fail`, `skip`, `bench`, `output` and so on.
    #[serde(default)]
    pub action: String,

    /// The package being tested.
    #[serde(default)]
    pub package: String,

    /// The test, if the event belongs to one.
    #[serde(default)]
    pub test: String,

    /// Seconds elapsed, for `pass` and `fail` events.
    #[serde(default)]
    pub elapsed: f64,

    /// Output, including its trailing newline.
    #[serde(default)]
    pub output: String,
}

/// Adapts a `go test -json` stream into the plain transcript it wraps.
///
/// Lines that don't start with `{` are passed through as is, since `go test -json` still prints
/// build failures as plain text.
#[derive(Debug)]
pub struct JsonReader<R> {
    inner: R,
    line: Vec<u8>,
    pending: Vec<u8>,
    pos: usize,
}

impl<R: BufRead> JsonReader<R> {
    /// Creates a new adapter.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            line: Vec::new(),
            pending: Vec::new(),
            pos: 0,
        }
    }

    /// Fills `pending` with the next non-empty chunk of transcript. Returns false at end of input.
    fn refill(&mut self) -> io::Result<bool> {
        loop {
            self.line.clear();
            if self.inner.read_until(b'\n', &mut self.line)? == 0 {
                return Ok(false);
            }

            self.pending.clear();
            self.pos = 0;
            if self.line.first() == Some(&b'{') {
                match serde_json::from_slice::<JsonEvent>(&self.line) {
                    Ok(event) => self.pending.extend_from_slice(event.output.as_bytes()),
                    Err(error) => {
                        debug!("passing through line that isn't a valid JSON event: {error}");
                        self.pending.extend_from_slice(&self.line);
                    }
                }
            } else {
                self.pending.extend_from_slice(&self.line);
            }

            if !self.pending.is_empty() {
                return Ok(true);
            }
        }
    }
}

impl<R: BufRead> Read for JsonReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.pos >= self.pending.len() && !self.refill()? {
            return Ok(0);
        }

        let remaining = &self.pending[self.pos..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.pos += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn unwrap(input: &str) -> String {
        let mut reader = JsonReader::new(Cursor::new(input.as_bytes().to_vec()));
        let mut out = String::new();
        reader
            .read_to_string(&mut out)
            .expect("reading from a cursor succeeds");
        out
    }

    #[test]
    fn unwraps_output() {
        let input = indoc! {r#"
            {"Time":"2022-01-01T00:00:00.000000000Z","Action":"run","Package":"package/name","Test":"TestOne"}
            {"Time":"2022-01-01T00:00:00.000000000Z","Action":"output","Package":"package/name","Test":"TestOne","Output":"=== RUN   TestOne\n"}
            {"Time":"2022-01-01T00:00:00.000000000Z","Action":"output","Package":"package/name","Test":"TestOne","Output":"--- PASS: TestOne (0.00s)\n"}
            {"Time":"2022-01-01T00:00:00.000000000Z","Action":"pass","Package":"package/name","Test":"TestOne","Elapsed":0}
            {"Time":"2022-01-01T00:00:00.000000000Z","Action":"output","Package":"package/name","Output":"ok  \tpackage/name\t0.001s\n"}
        "#};
        assert_eq!(
            unwrap(input),
            "=== RUN   TestOne\n--- PASS: TestOne (0.00s)\nok  \tpackage/name\t0.001s\n"
        );
    }

    #[test]
    fn plain_lines_pass_through() {
        let input = indoc! {r#"
            # package/name/failing1
            failing1/main.go:5:1: syntax error
            {"Action":"output","Package":"package/name/failing1","Output":"FAIL\tpackage/name/failing1 [build failed]\n"}
        "#};
        assert_eq!(
            unwrap(input),
            "# package/name/failing1\nfailing1/main.go:5:1: syntax error\n\
             FAIL\tpackage/name/failing1 [build failed]\n"
        );
    }

    #[test]
    fn invalid_json_passes_through() {
        assert_eq!(unwrap("{not json\nnext\n"), "{not json\nnext\n");
    }

    #[test]
    fn small_reads() {
        let input = r#"{"Output":"hello world\n"}"#;
        let mut reader = JsonReader::new(Cursor::new(input.as_bytes().to_vec()));
        let mut out = Vec::new();
        let mut buf = [0u8; 3];
        loop {
            let n = reader.read(&mut buf).expect("reading from a cursor succeeds");
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq!(out, b"hello world\n");
    }

    #[test]
    fn decodes_event_fields() {
        let event: JsonEvent = serde_json::from_str(
            r#"{"Time":"2022-01-01T00:00:00Z","Action":"fail","Package":"p","Test":"TestX","Elapsed":1.5}"#,
        )
        .expect("valid event");
        assert_eq!(event.action, "fail");
        assert_eq!(event.test, "TestX");
        assert_eq!(event.elapsed, 1.5);
        assert_eq!(event.output, "");
        assert!(event.time.is_some());
    }
}
