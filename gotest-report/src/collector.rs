// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collection of free-text output, keyed by the id it was attributed to.

use crate::report::EntityId;
use std::collections::HashMap;

#[derive(Clone, Debug)]
struct Line {
    seq: u64,
    text: String,
}

/// Records output lines per id along with their global arrival order.
///
/// Output for one id may be built up in fragments, interrupted by lines for other ids. Reading
/// back always returns lines in the order they arrived, including when several ids are merged.
#[derive(Clone, Debug, Default)]
pub struct OutputCollector {
    lines: HashMap<EntityId, Vec<Line>>,
    next_seq: u64,
}

impl OutputCollector {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a line to the output for `id`.
    pub fn append(&mut self, id: EntityId, text: impl Into<String>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.lines.entry(id).or_default().push(Line {
            seq,
            text: text.into(),
        });
    }

    /// Returns true if any output was recorded for `id`.
    pub fn contains(&self, id: EntityId) -> bool {
        self.lines.contains_key(&id)
    }

    /// Returns the output recorded for `id`.
    pub fn get(&self, id: EntityId) -> Vec<String> {
        self.lines
            .get(&id)
            .map(|lines| lines.iter().map(|line| line.text.clone()).collect())
            .unwrap_or_default()
    }

    /// Returns the output recorded for all of `ids`, interleaved in arrival order.
    pub fn get_all(&self, ids: impl IntoIterator<Item = EntityId>) -> Vec<String> {
        let mut merged: Vec<&Line> = ids
            .into_iter()
            .filter_map(|id| self.lines.get(&id))
            .flatten()
            .collect();
        merged.sort_by_key(|line| line.seq);
        merged.into_iter().map(|line| line.text.clone()).collect()
    }

    /// Moves all output from `from` into `into`, preserving arrival order.
    pub fn merge(&mut self, from: EntityId, into: EntityId) {
        let Some(from_lines) = self.lines.remove(&from) else {
            return;
        };
        let into_lines = self.lines.entry(into).or_default();
        into_lines.extend(from_lines);
        into_lines.sort_by_key(|line| line.seq);
    }

    /// Discards the output recorded for `id`.
    pub fn clear(&mut self, id: EntityId) {
        self.lines.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_strategy::proptest;

    fn id(n: u64) -> EntityId {
        let mut id = EntityId::PACKAGE;
        for _ in 0..n {
            id = id.next();
        }
        id
    }

    #[test]
    fn append_and_get() {
        let mut collector = OutputCollector::new();
        assert!(!collector.contains(id(1)));
        assert_eq!(collector.get(id(1)), Vec::<String>::new());

        collector.append(id(1), "a");
        collector.append(id(2), "b");
        collector.append(id(1), "c");

        assert!(collector.contains(id(1)));
        assert_eq!(collector.get(id(1)), vec!["a", "c"]);
        assert_eq!(collector.get(id(2)), vec!["b"]);
    }

    #[test]
    fn get_all_interleaves() {
        let mut collector = OutputCollector::new();
        collector.append(id(1), "1");
        collector.append(id(2), "2");
        collector.append(id(3), "3");
        collector.append(id(1), "4");
        collector.append(id(2), "5");

        assert_eq!(collector.get_all([id(2), id(1)]), vec!["1", "2", "4", "5"]);
        assert_eq!(collector.get_all([id(3), id(4)]), vec!["3"]);
    }

    #[test]
    fn merge_preserves_order() {
        let mut collector = OutputCollector::new();
        collector.append(EntityId::PACKAGE, "package 1");
        collector.append(id(1), "test 1");
        collector.append(EntityId::PACKAGE, "package 2");
        collector.append(id(1), "test 2");

        collector.merge(id(1), EntityId::PACKAGE);

        assert!(!collector.contains(id(1)));
        assert_eq!(
            collector.get(EntityId::PACKAGE),
            vec!["package 1", "test 1", "package 2", "test 2"]
        );

        // Merging an id without output is a no-op.
        collector.merge(id(5), EntityId::PACKAGE);
        assert!(!collector.contains(id(5)));
    }

    #[test]
    fn clear() {
        let mut collector = OutputCollector::new();
        collector.append(id(1), "a");
        collector.clear(id(1));
        assert!(!collector.contains(id(1)));
        assert_eq!(collector.get(id(1)), Vec::<String>::new());
    }

    #[proptest]
    fn interleaved_output_is_reconstructed(lines: Vec<(bool, String)>) {
        let mut collector = OutputCollector::new();
        for (is_first, text) in &lines {
            collector.append(if *is_first { id(1) } else { id(2) }, text.clone());
        }

        let expected = |want: bool| -> Vec<String> {
            lines
                .iter()
                .filter(|(is_first, _)| *is_first == want)
                .map(|(_, text)| text.clone())
                .collect()
        };
        assert_eq!(collector.get(id(1)), expected(true));
        assert_eq!(collector.get(id(2)), expected(false));
        assert_eq!(
            collector.get_all([id(1), id(2)]),
            lines.iter().map(|(_, text)| text.clone()).collect::<Vec<_>>()
        );
    }
}
