//! Registry - named collections and the CRUD/query contract.
//!
//! A [`Registry`] is an explicit context object owned by the composition
//! root. It maps collection names to shared [`Collection`]s and exposes the
//! by-name operations used by collaborators (HTTP handlers, sync workers).

use crate::{
    config::StoreConfig,
    error::Result,
    sync::{SyncReport, SyncTarget},
    Collection, CollectionName, Error, Record, RecordKey, SchemaDefinition, Version,
};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Owns every collection by name.
#[derive(Debug, Default)]
pub struct Registry {
    config: StoreConfig,
    collections: RwLock<HashMap<CollectionName, Arc<Collection>>>,
}

impl Registry {
    /// Create an empty registry with the default configuration.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Create an empty registry whose collections use `config`.
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            config,
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Create a collection.
    ///
    /// Fails if `name` is already taken.
    pub fn create(
        &self,
        name: impl Into<CollectionName>,
        primary_key: impl Into<String>,
        schema: SchemaDefinition,
    ) -> Result<Arc<Collection>> {
        let name = name.into();
        let mut collections = self.collections.write();
        if collections.contains_key(&name) {
            return Err(Error::CollectionAlreadyExists(name));
        }

        let collection = Arc::new(Collection::with_config(
            primary_key,
            schema,
            self.config.clone(),
        ));
        collections.insert(name.clone(), Arc::clone(&collection));

        tracing::info!(
            collection = %name,
            primary_key = collection.primary_key(),
            indexes = ?collection.indexed_paths(),
            "collection created"
        );
        Ok(collection)
    }

    /// Get a collection by name.
    pub fn get(&self, name: &str) -> Option<Arc<Collection>> {
        self.collections.read().get(name).cloned()
    }

    /// Get a collection by name, failing if it does not exist.
    pub fn require(&self, name: &str) -> Result<Arc<Collection>> {
        self.get(name)
            .ok_or_else(|| Error::CollectionNotFound(name.to_string()))
    }

    /// Rename a collection, keeping its records and indexes.
    pub fn rename(&self, old_name: &str, new_name: impl Into<CollectionName>) -> Result<()> {
        let new_name = new_name.into();
        let mut collections = self.collections.write();

        if !collections.contains_key(old_name) {
            return Err(Error::CollectionNotFound(old_name.to_string()));
        }
        if old_name == new_name {
            return Ok(());
        }
        if collections.contains_key(&new_name) {
            return Err(Error::CollectionAlreadyExists(new_name));
        }

        if let Some(collection) = collections.remove(old_name) {
            collections.insert(new_name.clone(), collection);
        }

        tracing::info!(from = old_name, to = %new_name, "collection renamed");
        Ok(())
    }

    /// Delete a collection. Returns whether it existed.
    pub fn delete(&self, name: &str) -> bool {
        let removed = self.collections.write().remove(name).is_some();
        if removed {
            tracing::info!(collection = name, "collection deleted");
        }
        removed
    }

    /// Delete every collection.
    pub fn clear(&self) {
        let mut collections = self.collections.write();
        let count = collections.len();
        collections.clear();
        tracing::info!(count, "registry cleared");
    }

    /// Names of all collections, sorted.
    pub fn names(&self) -> Vec<CollectionName> {
        let mut names: Vec<_> = self.collections.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.collections.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.read().is_empty()
    }

    // CRUD/query contract by collection name

    /// Validate and write a record.
    pub fn submit(&self, collection: &str, data: &Value) -> Result<Record> {
        self.require(collection)?.set_record(data)
    }

    /// Write several records, one result per item.
    pub fn submit_many(&self, collection: &str, items: &[Value]) -> Result<Vec<Result<Record>>> {
        Ok(self.require(collection)?.set_records(items))
    }

    /// Get a record by key.
    pub fn fetch(&self, collection: &str, key: &RecordKey) -> Result<Option<Record>> {
        Ok(self.require(collection)?.get(key))
    }

    /// Get every record of a collection.
    pub fn fetch_all(&self, collection: &str) -> Result<Vec<Record>> {
        Ok(self.require(collection)?.get_all())
    }

    /// Remove a record; an absent key is not an error.
    pub fn remove(
        &self,
        collection: &str,
        key: &RecordKey,
        expected_version: Option<Version>,
    ) -> Result<bool> {
        self.require(collection)?.remove_record(key, expected_version)
    }

    /// Find records whose value at `path` equals `value`.
    pub fn query(&self, collection: &str, path: &str, value: &Value) -> Result<Vec<Record>> {
        Ok(self.require(collection)?.find_by_index(path, value))
    }

    /// Records of a collection waiting to be synced.
    pub fn unsynced(&self, collection: &str) -> Result<Vec<Record>> {
        Ok(self.require(collection)?.get_unsynced())
    }

    /// Acknowledge a synced record.
    pub fn mark_synced(&self, collection: &str, key: &RecordKey) -> Result<bool> {
        Ok(self.require(collection)?.mark_synced(key))
    }

    /// Record a sync failure.
    pub fn mark_sync_failed(
        &self,
        collection: &str,
        key: &RecordKey,
        error: impl Into<String>,
    ) -> Result<bool> {
        Ok(self.require(collection)?.mark_sync_failed(key, error))
    }

    /// Run one sync pass over a collection.
    pub fn sync<T: SyncTarget>(&self, collection: &str, target: &mut T) -> Result<SyncReport> {
        let collection = self.require(collection)?;
        Ok(collection.sync_with(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaField;
    use serde_json::json;

    fn schema() -> SchemaDefinition {
        SchemaDefinition::new()
            .with_field("id", SchemaField::string().required())
            .with_field("score", SchemaField::number().indexed())
    }

    #[test]
    fn create_and_get() {
        let registry = Registry::new();
        let created = registry.create("users", "id", schema()).unwrap();

        let fetched = registry.get("users").unwrap();
        assert!(Arc::ptr_eq(&created, &fetched));
        assert!(registry.get("posts").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn create_duplicate_fails() {
        let registry = Registry::new();
        registry.create("users", "id", schema()).unwrap();

        let result = registry.create("users", "id", schema());
        assert!(matches!(result, Err(Error::CollectionAlreadyExists(n)) if n == "users"));
    }

    #[test]
    fn require_missing_fails() {
        let registry = Registry::new();
        let result = registry.require("ghosts");
        assert!(matches!(result, Err(Error::CollectionNotFound(n)) if n == "ghosts"));
    }

    #[test]
    fn rename_preserves_identity_and_state() {
        let registry = Registry::new();
        let users = registry.create("users", "id", schema()).unwrap();
        registry
            .submit("users", &json!({"id": "a", "score": 5}))
            .unwrap();

        registry.rename("users", "members").unwrap();

        assert!(registry.get("users").is_none());
        let members = registry.require("members").unwrap();
        assert!(Arc::ptr_eq(&users, &members));
        assert_eq!(
            registry.query("members", "score", &json!(5)).unwrap().len(),
            1
        );
    }

    #[test]
    fn rename_conflicts() {
        let registry = Registry::new();
        registry.create("a", "id", schema()).unwrap();
        registry.create("b", "id", schema()).unwrap();

        assert!(matches!(
            registry.rename("a", "b"),
            Err(Error::CollectionAlreadyExists(n)) if n == "b"
        ));
        assert!(matches!(
            registry.rename("zzz", "c"),
            Err(Error::CollectionNotFound(n)) if n == "zzz"
        ));
        assert_eq!(registry.rename("a", "a"), Ok(()));
        assert_eq!(registry.names(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn delete_and_clear() {
        let registry = Registry::new();
        registry.create("a", "id", schema()).unwrap();
        registry.create("b", "id", schema()).unwrap();

        assert!(registry.delete("a"));
        assert!(!registry.delete("a"));
        assert_eq!(registry.names(), vec!["b".to_string()]);

        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn contract_on_missing_collection() {
        let registry = Registry::new();
        let key = RecordKey::from("a");

        assert!(matches!(
            registry.submit("nope", &json!({"id": "a"})),
            Err(Error::CollectionNotFound(_))
        ));
        assert!(matches!(
            registry.fetch("nope", &key),
            Err(Error::CollectionNotFound(_))
        ));
        assert!(matches!(
            registry.remove("nope", &key, None),
            Err(Error::CollectionNotFound(_))
        ));
    }

    #[test]
    fn contract_round_trip() {
        let registry = Registry::new();
        registry.create("users", "id", schema()).unwrap();
        let key = RecordKey::from("a");

        let record = registry
            .submit("users", &json!({"id": "a", "score": 1}))
            .unwrap();
        assert_eq!(registry.fetch("users", &key).unwrap(), Some(record));
        assert_eq!(registry.fetch_all("users").unwrap().len(), 1);
        assert_eq!(registry.unsynced("users").unwrap().len(), 1);

        assert!(registry.mark_sync_failed("users", &key, "offline").unwrap());
        assert!(registry.mark_synced("users", &key).unwrap());
        assert!(registry.unsynced("users").unwrap().is_empty());

        assert_eq!(registry.remove("users", &key, Some(1)), Ok(true));
        assert_eq!(registry.remove("users", &key, Some(1)), Ok(false));
        assert_eq!(registry.fetch("users", &key).unwrap(), None);
    }

    #[test]
    fn collections_inherit_config() {
        let config = StoreConfig {
            retain_sync_errors: true,
            scan_warn_threshold: 5,
        };
        let registry = Registry::with_config(config.clone());
        registry.create("users", "id", schema()).unwrap();
        let key = RecordKey::from("a");

        registry.submit("users", &json!({"id": "a"})).unwrap();
        registry.mark_sync_failed("users", &key, "boom").unwrap();
        registry.mark_synced("users", &key).unwrap();

        let users = registry.require("users").unwrap();
        assert!(users.sync_error(&key).is_some());
        assert_eq!(registry.config(), &config);
    }
}
