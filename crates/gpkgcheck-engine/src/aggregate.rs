//! Bounded grouping of per-row findings
//!
//! Geometry rules produce one finding per offending row. Those are folded
//! into one group per key, each with a count and a handful of example ids,
//! so a table with millions of bad rows still yields a single line.

use std::collections::HashMap;
use std::hash::Hash;

/// Past this many findings a count is no longer claimed to be exact
pub const MAX_VALIDATION_ITERATIONS: usize = 100;

/// Example ids kept per group
pub const MAX_EXAMPLE_IDS: usize = 5;

/// Findings sharing one key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group<K> {
    pub key: K,
    pub count: usize,
    pub example_ids: Vec<i64>,
}

impl<K> Group<K> {
    /// Whether the count crossed the iteration ceiling
    pub fn possibly_more(&self) -> bool {
        self.count > MAX_VALIDATION_ITERATIONS
    }

    /// `"3 time(s), example id(s): 1, 4, 9"`
    pub fn descriptor(&self) -> String {
        let ids = self
            .example_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(", ");

        if self.possibly_more() {
            format!("{} times and possibly more, example id(s): {}", self.count, ids)
        } else {
            format!("{} time(s), example id(s): {}", self.count, ids)
        }
    }
}

/// Groups findings by key in first-seen order
#[derive(Debug, Clone)]
pub struct Aggregator<K> {
    index: HashMap<K, usize>,
    groups: Vec<Group<K>>,
}

impl<K: Eq + Hash + Clone> Aggregator<K> {
    pub fn new() -> Self {
        Self {
            index: HashMap::new(),
            groups: Vec::new(),
        }
    }

    /// Count one finding for `key`
    pub fn add(&mut self, key: K, id: i64) {
        let slot = match self.index.get(&key) {
            Some(&slot) => slot,
            None => {
                self.groups.push(Group {
                    key: key.clone(),
                    count: 0,
                    example_ids: Vec::with_capacity(MAX_EXAMPLE_IDS),
                });
                self.index.insert(key, self.groups.len() - 1);
                self.groups.len() - 1
            }
        };

        let group = &mut self.groups[slot];
        group.count += 1;
        if group.example_ids.len() < MAX_EXAMPLE_IDS {
            group.example_ids.push(id);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn groups(&self) -> &[Group<K>] {
        &self.groups
    }

    pub fn into_groups(self) -> Vec<Group<K>> {
        self.groups
    }
}

impl<K: Eq + Hash + Clone> Default for Aggregator<K> {
    fn default() -> Self {
        Self::new()
    }
}
