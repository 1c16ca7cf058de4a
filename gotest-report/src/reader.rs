// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded line reading.
//!
//! Tests can print arbitrarily long lines. [`LimitedLineReader`] never holds more than a fixed
//! number of bytes for a single line, but always consumes the whole physical line so the next
//! read starts at the right place.

use bstr::ByteSlice;
use std::io::{self, BufRead};

/// The maximum number of bytes kept for a single line. The rest of the line is discarded.
pub const MAX_LINE_SIZE: usize = 4 * 1024 * 1024;

/// Reads lines from a [`BufRead`], truncating lines longer than a limit.
#[derive(Debug)]
pub struct LimitedLineReader<R> {
    inner: R,
    limit: usize,
    buf: Vec<u8>,
}

impl<R: BufRead> LimitedLineReader<R> {
    /// Creates a reader with the default limit of [`MAX_LINE_SIZE`].
    pub fn new(inner: R) -> Self {
        Self::with_limit(inner, MAX_LINE_SIZE)
    }

    /// Creates a reader that keeps at most `limit` bytes per line.
    pub fn with_limit(inner: R, limit: usize) -> Self {
        Self {
            inner,
            limit,
            buf: Vec::new(),
        }
    }

    /// Reads the next line, without its `\n` or `\r\n` terminator.
    ///
    /// Returns `Ok(None)` at end of input. Invalid UTF-8 is replaced with U+FFFD.
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        self.buf.clear();
        let mut read_any = false;

        loop {
            let available = match self.inner.fill_buf() {
                Ok(available) => available,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
                Err(error) => return Err(error),
            };
            if available.is_empty() {
                break;
            }
            read_any = true;

            let (chunk, consumed, done) = match available.find_byte(b'\n') {
                Some(idx) => (&available[..idx], idx + 1, true),
                None => (available, available.len(), false),
            };
            let room = self.limit.saturating_sub(self.buf.len());
            self.buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
            self.inner.consume(consumed);

            if done {
                break;
            }
        }

        if !read_any {
            return Ok(None);
        }
        if self.buf.last() == Some(&b'\r') {
            self.buf.pop();
        }
        Ok(Some(self.buf.to_str_lossy().into_owned()))
    }
}

impl<R: BufRead> Iterator for LimitedLineReader<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_line().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::{BufReader, Cursor};
    use test_case::test_case;

    fn read_all(input: &[u8], limit: usize) -> Vec<String> {
        LimitedLineReader::with_limit(Cursor::new(input), limit)
            .collect::<io::Result<Vec<_>>>()
            .expect("reading from a cursor succeeds")
    }

    #[test_case(b"", &[] ; "empty")]
    #[test_case(b"one", &["one"] ; "no trailing newline")]
    #[test_case(b"one\ntwo\n", &["one", "two"] ; "trailing newline")]
    #[test_case(b"one\r\ntwo\r\n", &["one", "two"] ; "crlf")]
    #[test_case(b"\n\n", &["", ""] ; "blank lines")]
    fn lines(input: &[u8], expected: &[&str]) {
        assert_eq!(read_all(input, MAX_LINE_SIZE), expected);
    }

    #[test]
    fn long_lines_are_truncated_but_consumed() {
        let input = b"0123456789\nabc\n0123\n";
        assert_eq!(read_all(input, 4), vec!["0123", "abc", "0123"]);
    }

    #[test]
    fn lines_spanning_buffer_refills() {
        // A tiny buffer forces each line to be assembled from many fill_buf calls.
        let mut input = "x".repeat(100);
        input.push('\n');
        input.push_str(&"y".repeat(10));
        let reader = BufReader::with_capacity(7, Cursor::new(input.into_bytes()));
        let lines: Vec<_> = LimitedLineReader::with_limit(reader, 64)
            .collect::<io::Result<_>>()
            .expect("reading from a cursor succeeds");
        assert_eq!(lines, vec!["x".repeat(64), "y".repeat(10)]);
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        assert_eq!(read_all(b"ok \xff\n", MAX_LINE_SIZE), vec!["ok \u{fffd}"]);
    }
}
