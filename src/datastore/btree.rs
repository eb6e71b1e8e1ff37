//! BTreeMap-based index storage
//!
//! Entries live in `BTreeMap<IndexKey, Vec<String>>`: composite key values
//! in collation order, each mapped to the sorted ids of the documents that
//! produced it.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde_json::Value;

use super::{IndexEntry, ScanSpan};
use crate::expr::collate_slices;

/// Composite index key, ordered by value collation
#[derive(Debug, Clone)]
pub struct IndexKey(pub Vec<Value>);

impl PartialEq for IndexKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for IndexKey {}

impl PartialOrd for IndexKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexKey {
    fn cmp(&self, other: &Self) -> Ordering {
        collate_slices(&self.0, &other.0)
    }
}

/// Compares the leading components of `key` against a bound that may be
/// shorter than the key
fn prefix_cmp(key: &[Value], bound: &[Value]) -> Ordering {
    let n = key.len().min(bound.len());
    collate_slices(&key[..n], &bound[..n])
}

/// One index's entries
#[derive(Debug, Default)]
pub struct IndexTree {
    tree: BTreeMap<IndexKey, Vec<String>>,
}

impl IndexTree {
    pub fn new() -> Self {
        Self {
            tree: BTreeMap::new(),
        }
    }

    /// Insert a document id for a key, keeping ids sorted ascending
    pub fn insert(&mut self, key: IndexKey, id: &str) {
        let ids = self.tree.entry(key).or_default();
        if let Err(pos) = ids.binary_search_by(|existing| existing.as_str().cmp(id)) {
            ids.insert(pos, id.to_string());
        }
    }

    /// Remove a document id; drops the key once it has no ids left
    pub fn remove(&mut self, key: &IndexKey, id: &str) {
        if let Some(ids) = self.tree.get_mut(key) {
            if let Ok(pos) = ids.binary_search_by(|existing| existing.as_str().cmp(id)) {
                ids.remove(pos);
            }
            if ids.is_empty() {
                self.tree.remove(key);
            }
        }
    }

    /// Entries inside `span`, in key order then id order.
    ///
    /// A seek visits only keys whose leading components equal it.
    pub fn scan(&self, span: &ScanSpan, limit: Option<usize>) -> Vec<IndexEntry> {
        let mut out = Vec::new();
        let full = |out: &Vec<IndexEntry>| limit.map(|l| out.len() >= l).unwrap_or(false);

        if let Some(seek) = &span.seek {
            for (key, ids) in self.tree.range(IndexKey(seek.clone())..) {
                if prefix_cmp(&key.0, seek) != Ordering::Equal {
                    break;
                }
                for id in ids {
                    if full(&out) {
                        return out;
                    }
                    out.push(IndexEntry::new(key.0.clone(), id.clone()));
                }
            }
            return out;
        }

        let entries: Box<dyn Iterator<Item = (&IndexKey, &Vec<String>)>> = if span.low.is_empty() {
            Box::new(self.tree.iter())
        } else {
            Box::new(self.tree.range(IndexKey(span.low.clone())..))
        };

        for (key, ids) in entries {
            if !span.low.is_empty() {
                match prefix_cmp(&key.0, &span.low) {
                    Ordering::Less => continue,
                    Ordering::Equal if !span.inclusion.low_inclusive() => continue,
                    _ => {}
                }
            }
            if !span.high.is_empty() {
                match prefix_cmp(&key.0, &span.high) {
                    Ordering::Greater => break,
                    Ordering::Equal if !span.inclusion.high_inclusive() => continue,
                    _ => {}
                }
            }
            for id in ids {
                if full(&out) {
                    return out;
                }
                out.push(IndexEntry::new(key.0.clone(), id.clone()));
            }
        }
        out
    }

    /// Returns the number of distinct keys
    pub fn key_count(&self) -> usize {
        self.tree.len()
    }

    /// Returns the total number of entries
    pub fn entry_count(&self) -> usize {
        self.tree.values().map(Vec::len).sum()
    }
}
