//! Secondary equality indices.
//!
//! Each indexed path maps a value to the set of keys currently holding it.
//! The set of indexed paths is fixed when the collection is created; bucket
//! contents change on every write and are kept in a concurrent map because
//! writers of different keys update the same buckets without any ordering
//! between them.

use crate::{record::canonical_value, schema::IndexRule, FieldPath, Record, RecordKey};
use dashmap::DashMap;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Hashable form of a JSON value used as a bucket key.
///
/// Two values map to the same `IndexValue` exactly when they are equal
/// with numbers compared by value, so `20` and `20.0` share a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexValue(String);

impl IndexValue {
    pub fn new(value: &Value) -> Self {
        // Object keys serialize in sorted order, so the encoding is canonical.
        Self(canonical_value(value).to_string())
    }
}

/// Index over a single path.
#[derive(Debug)]
struct PathIndex {
    rule: IndexRule,
    buckets: DashMap<IndexValue, HashSet<RecordKey>>,
}

impl PathIndex {
    fn new(rule: IndexRule) -> Self {
        Self {
            rule,
            buckets: DashMap::new(),
        }
    }

    fn add(&self, key: &RecordKey, value: &Value) {
        self.buckets
            .entry(IndexValue::new(value))
            .or_default()
            .insert(key.clone());
    }

    fn remove(&self, key: &RecordKey, value: &Value) {
        let bucket = IndexValue::new(value);
        if let Some(mut keys) = self.buckets.get_mut(&bucket) {
            keys.remove(key);
        }
        self.buckets.remove_if(&bucket, |_, keys| keys.is_empty());
    }
}

/// Outcome of consulting the index for an equality query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexLookup {
    /// The index is complete for this value; these keys hold it
    Hit(Vec<RecordKey>),
    /// No usable index; the caller must scan
    Scan,
}

/// Maintains every index declared by a collection's schema.
#[derive(Debug, Default)]
pub struct IndexManager {
    paths: HashMap<FieldPath, PathIndex>,
}

impl IndexManager {
    /// Create indices for the given rules.
    pub fn new(rules: impl IntoIterator<Item = (FieldPath, IndexRule)>) -> Self {
        Self {
            paths: rules
                .into_iter()
                .map(|(path, rule)| (path, PathIndex::new(rule)))
                .collect(),
        }
    }

    /// Rule registered for `path`, if any.
    pub fn rule(&self, path: &str) -> Option<&IndexRule> {
        self.paths.get(path).map(|index| &index.rule)
    }

    /// Indexed paths, in no particular order.
    pub fn paths(&self) -> impl Iterator<Item = &FieldPath> {
        self.paths.keys()
    }

    /// Move `key` from the buckets of `old` to the buckets of `new`.
    ///
    /// Either side may be absent (insert or removal). Both halves always
    /// run, so the key never keeps an association with a value it no longer
    /// holds.
    pub fn update_index(&self, key: &RecordKey, old: Option<&Record>, new: Option<&Record>) {
        for (path, index) in &self.paths {
            if let Some(value) = old.and_then(|r| r.value_at(path)) {
                if index.rule.tracks(value) {
                    index.remove(key, value);
                }
            }
            if let Some(value) = new.and_then(|r| r.value_at(path)) {
                if index.rule.tracks(value) {
                    index.add(key, value);
                }
            }
        }
    }

    /// Keys indexed under `value` at `path`.
    ///
    /// Returns [`IndexLookup::Scan`] when the path has no index or when its
    /// partial index does not cover `value`.
    pub fn lookup(&self, path: &str, value: &Value) -> IndexLookup {
        let Some(index) = self.paths.get(path) else {
            return IndexLookup::Scan;
        };
        if !index.rule.tracks(value) {
            return IndexLookup::Scan;
        }

        let keys = index
            .buckets
            .get(&IndexValue::new(value))
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default();
        IndexLookup::Hit(keys)
    }

    /// Number of keys in the bucket for `value` at `path`.
    pub fn bucket_len(&self, path: &str, value: &Value) -> usize {
        self.paths
            .get(path)
            .and_then(|index| index.buckets.get(&IndexValue::new(value)).map(|k| k.len()))
            .unwrap_or(0)
    }

    /// Number of distinct values bucketed at `path`.
    pub fn bucket_count(&self, path: &str) -> usize {
        self.paths
            .get(path)
            .map(|index| index.buckets.len())
            .unwrap_or(0)
    }
}
