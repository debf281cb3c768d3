//! Collection - the in-memory record store.
//!
//! A collection keeps records in two tiers per key: a clean tier holding
//! records already acknowledged by the sync collaborator, and a dirty tier
//! holding writes that still need to be pushed. The dirty record, when
//! present, shadows the clean one.
//!
//! Writes are serialized per key with a [`KeyedMutex`]; reads take no key
//! lock. Both tiers of a key live in one map slot, so every state change a
//! reader can observe (install, tier move, delete) is a single atomic update
//! of that slot.

use crate::{
    config::StoreConfig,
    error::Result,
    index::{IndexLookup, IndexManager},
    lock::KeyedMutex,
    record::values_equal,
    validator::{SchemaValidator, VERSION_FIELD},
    Error, FieldPath, Record, RecordKey, SchemaDefinition, SyncFailure, Version,
};
use dashmap::DashMap;
use serde_json::Value;

/// Clean and dirty tiers of a single key.
#[derive(Debug, Clone, Default)]
struct Tiers {
    clean: Option<Record>,
    dirty: Option<Record>,
}

impl Tiers {
    fn current(&self) -> Option<&Record> {
        self.dirty.as_ref().or(self.clean.as_ref())
    }
}

/// A named set of records sharing a primary key and schema.
#[derive(Debug)]
pub struct Collection {
    /// Field holding each record's key
    primary_key: String,
    /// Schema for validation and index discovery
    schema: SchemaDefinition,
    config: StoreConfig,
    /// Records by key; a slot exists only while one of its tiers is set
    records: DashMap<RecordKey, Tiers>,
    indexes: IndexManager,
    /// Last sync failure per key
    sync_errors: DashMap<RecordKey, SyncFailure>,
    locks: KeyedMutex<RecordKey>,
}

impl Collection {
    /// Create an empty collection with the default configuration.
    pub fn new(primary_key: impl Into<String>, schema: SchemaDefinition) -> Self {
        Self::with_config(primary_key, schema, StoreConfig::default())
    }

    /// Create an empty collection.
    ///
    /// Index rules are discovered from the schema here and stay fixed for the
    /// collection's lifetime.
    pub fn with_config(
        primary_key: impl Into<String>,
        schema: SchemaDefinition,
        config: StoreConfig,
    ) -> Self {
        let indexes = IndexManager::new(schema.index_rules());
        Self {
            primary_key: primary_key.into(),
            schema,
            config,
            records: DashMap::new(),
            indexes,
            sync_errors: DashMap::new(),
            locks: KeyedMutex::new(),
        }
    }

    /// Get the primary-key field name.
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Get the schema.
    pub fn schema(&self) -> &SchemaDefinition {
        &self.schema
    }

    /// Get the index manager.
    pub fn indexes(&self) -> &IndexManager {
        &self.indexes
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the collection has no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Get a record by key. The dirty tier wins over the clean tier.
    pub fn get(&self, key: &RecordKey) -> Option<Record> {
        self.records
            .get(key)
            .and_then(|tiers| tiers.current().cloned())
    }

    /// Get every live record, in no particular order.
    pub fn get_all(&self) -> Vec<Record> {
        self.records
            .iter()
            .filter_map(|tiers| tiers.current().cloned())
            .collect()
    }

    /// Create or replace the record identified by `data[primary_key]`.
    ///
    /// The key is checked first, then the payload is sanitized; neither step
    /// takes the key's lock. The new record gets the next version and is
    /// pending sync.
    pub fn set_record(&self, data: &Value) -> Result<Record> {
        let input = data
            .as_object()
            .ok_or_else(|| Error::InvalidPayload("record must be an object".into()))?;
        let key = RecordKey::from_field(input, &self.primary_key)?;

        let mut fields = SchemaValidator::new(&self.schema, &self.primary_key).validate(data)?;
        if self.primary_key != VERSION_FIELD {
            fields.remove(VERSION_FIELD);
        }

        let record = self.locks.acquire(&key, || {
            let current = self.get(&key);
            let version = current.as_ref().map_or(1, |r| r.version + 1);
            let record = Record::new(fields, version);

            self.indexes
                .update_index(&key, current.as_ref(), Some(&record));

            let mut tiers = self.records.entry(key.clone()).or_default();
            tiers.dirty = Some(record.clone());
            tiers.clean = None;

            record
        });

        tracing::debug!(key = %key, version = record.version, "record written");
        Ok(record)
    }

    /// Apply [`set_record`](Self::set_record) to each item independently.
    ///
    /// Results are returned in input order; one failing item does not stop
    /// the others.
    pub fn set_records(&self, items: &[Value]) -> Vec<Result<Record>> {
        items.iter().map(|item| self.set_record(item)).collect()
    }

    /// Remove a record from both tiers and from every index.
    ///
    /// Removing an absent key is a no-op returning `Ok(false)`. When
    /// `expected_version` is given and differs from the current version, the
    /// record is left untouched and [`Error::VersionConflict`] is returned.
    ///
    /// Presence is only checked under the key lock, so a remove always
    /// observes every write to the key that arrived before it.
    pub fn remove_record(&self, key: &RecordKey, expected_version: Option<Version>) -> Result<bool> {
        self.locks.acquire(key, || {
            let Some(current) = self.get(key) else {
                return Ok(false);
            };

            if let Some(expected) = expected_version {
                if expected != current.version {
                    tracing::warn!(
                        key = %key,
                        expected,
                        actual = current.version,
                        "remove rejected on version conflict"
                    );
                    return Err(Error::VersionConflict {
                        expected,
                        actual: current.version,
                    });
                }
            }

            self.indexes.update_index(key, Some(&current), None);
            self.records.remove(key);
            self.sync_errors.remove(key);

            tracing::debug!(key = %key, version = current.version, "record removed");
            Ok(true)
        })
    }

    /// Find records whose value at `path` equals `value`.
    ///
    /// Uses the index when it is complete for `value` and falls back to a
    /// linear scan otherwise. Index hits are re-read through [`get`](Self::get)
    /// and re-checked, so keys removed or changed since the index was read
    /// are silently dropped.
    pub fn find_by_index(&self, path: &str, value: &Value) -> Vec<Record> {
        match self.indexes.lookup(path, value) {
            IndexLookup::Hit(keys) => keys
                .iter()
                .filter_map(|key| self.get(key))
                .filter(|record| holds(record, path, value))
                .collect(),
            IndexLookup::Scan => self.scan(path, value),
        }
    }

    fn scan(&self, path: &str, value: &Value) -> Vec<Record> {
        let mut visited = 0usize;
        let matches: Vec<Record> = self
            .records
            .iter()
            .filter_map(|tiers| {
                visited += 1;
                tiers
                    .current()
                    .filter(|record| holds(record, path, value))
                    .cloned()
            })
            .collect();

        if visited > self.config.scan_warn_threshold {
            tracing::warn!(path, visited, "large scan for unindexed query");
        } else {
            tracing::debug!(path, visited, matched = matches.len(), "scan fallback");
        }
        matches
    }

    /// All records waiting to be pushed by the sync collaborator.
    pub fn get_unsynced(&self) -> Vec<Record> {
        self.records
            .iter()
            .filter_map(|tiers| tiers.dirty.as_ref().filter(|r| r.pending_sync).cloned())
            .collect()
    }

    /// Pending records with their keys, ordered by key.
    pub(crate) fn pending_entries(&self) -> Vec<(RecordKey, Record)> {
        let mut entries: Vec<(RecordKey, Record)> = self
            .records
            .iter()
            .filter_map(|entry| {
                entry
                    .dirty
                    .as_ref()
                    .filter(|r| r.pending_sync)
                    .map(|r| (entry.key().clone(), r.clone()))
            })
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Acknowledge the dirty record of `key`, moving it to the clean tier.
    ///
    /// Returns false, doing nothing, when the key has no dirty record.
    pub fn mark_synced(&self, key: &RecordKey) -> bool {
        self.acknowledge(key, None)
    }

    /// Acknowledge `key` only if its dirty record still has `version`.
    ///
    /// Used when the acknowledgement refers to a specific pushed write; a
    /// newer write made during the push stays pending.
    pub fn mark_synced_version(&self, key: &RecordKey, version: Version) -> bool {
        self.acknowledge(key, Some(version))
    }

    fn acknowledge(&self, key: &RecordKey, version: Option<Version>) -> bool {
        if !self.has_dirty(key) {
            return false;
        }

        let synced = self.locks.acquire(key, || {
            let mut tiers = self.records.get_mut(key)?;
            match tiers.dirty.take() {
                Some(dirty) if version.map_or(true, |v| v == dirty.version) => {
                    let version = dirty.version;
                    tiers.clean = Some(dirty.into_synced());
                    Some(version)
                }
                other => {
                    tiers.dirty = other;
                    None
                }
            }
        });

        let Some(version) = synced else {
            return false;
        };

        // Failures recorded for a newer write after the lock was released stay.
        if !self.config.retain_sync_errors {
            self.sync_errors
                .remove_if(key, |_, failure| failure.version <= version);
        }
        tracing::debug!(key = %key, version, "record synced");
        true
    }

    /// Record a sync failure for `key`.
    ///
    /// The dirty record is left pending. Returns false, doing nothing, when
    /// the key has no dirty record.
    pub fn mark_sync_failed(&self, key: &RecordKey, error: impl Into<String>) -> bool {
        let Some(version) = self
            .records
            .get(key)
            .and_then(|tiers| tiers.dirty.as_ref().map(|r| r.version))
        else {
            return false;
        };

        let failure = SyncFailure::new(error, version);
        tracing::warn!(key = %key, version, error = %failure.message, "sync failed");
        self.sync_errors.insert(key.clone(), failure);
        true
    }

    /// Last recorded sync failure for `key`.
    pub fn sync_error(&self, key: &RecordKey) -> Option<SyncFailure> {
        self.sync_errors.get(key).map(|failure| failure.clone())
    }

    /// Every recorded sync failure.
    pub fn sync_errors(&self) -> Vec<(RecordKey, SyncFailure)> {
        self.sync_errors
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    fn has_dirty(&self, key: &RecordKey) -> bool {
        self.records
            .get(key)
            .is_some_and(|tiers| tiers.dirty.is_some())
    }

    /// Indexed field paths of this collection.
    pub fn indexed_paths(&self) -> Vec<FieldPath> {
        let mut paths: Vec<FieldPath> = self.indexes.paths().cloned().collect();
        paths.sort();
        paths
    }

    /// Keys currently holding or waiting on a write lock.
    pub fn active_locks(&self) -> usize {
        self.locks.active_keys()
    }
}

/// Whether `record` has a value equal to `value` at `path`.
fn holds(record: &Record, path: &str, value: &Value) -> bool {
    record
        .value_at(path)
        .is_some_and(|found| values_equal(found, value))
}
