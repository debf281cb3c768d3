//! # Memoria Engine
//!
//! A per-collection, in-memory record store for services that sync their
//! data to a remote system in the background.
//!
//! The store is purely volatile: nothing is persisted, and a restart
//! discards every collection.
//!
//! ## Core Concepts
//!
//! ### Records
//!
//! Records are JSON objects identified by a primary-key field. Each record
//! carries:
//! - A version, 1 on first write and incremented on every write
//! - A `pendingSync` flag, true until the sync collaborator acknowledges it
//!
//! ### Collections
//!
//! A [`Collection`] stores records in two tiers. Fresh writes land in the
//! dirty tier; acknowledged writes move to the clean tier. The dirty record
//! of a key always shadows its clean record.
//!
//! Writes to the same key are serialized in arrival order by a
//! [`KeyedMutex`]. Writes to different keys run in parallel, and reads never
//! wait on a key lock.
//!
//! ### Schemas
//!
//! Every collection has a [`SchemaDefinition`]. Incoming data is sanitized
//! by the [`SchemaValidator`]: defaults are applied, required fields and
//! types are checked recursively, and undeclared fields are dropped.
//!
//! ### Indexes
//!
//! Fields may declare a full index (`"index": true`) or a partial index on
//! one literal (`"index": "public"`). Queries use the index when it covers
//! the requested value and fall back to a scan otherwise, so every field is
//! queryable.
//!
//! ## Quick Start
//!
//! ```rust
//! use memoria_engine::{Registry, RecordKey, SchemaDefinition};
//! use serde_json::json;
//!
//! // 1. Declare a schema
//! let schema = SchemaDefinition::from_json(&json!({
//!     "id":    { "type": "string", "required": true },
//!     "score": { "type": "number", "required": true, "index": true }
//! }))
//! .unwrap();
//!
//! // 2. Create a collection
//! let registry = Registry::new();
//! registry.create("players", "id", schema).unwrap();
//!
//! // 3. Write records
//! let record = registry
//!     .submit("players", &json!({"id": "a", "score": 10}))
//!     .unwrap();
//! assert_eq!(record.version, 1);
//! assert!(record.pending_sync);
//!
//! // 4. Query
//! let hits = registry.query("players", "score", &json!(10)).unwrap();
//! assert_eq!(hits.len(), 1);
//!
//! // 5. Sync
//! let report = registry
//!     .sync("players", &mut |_: &memoria_engine::Record| Ok::<(), String>(()))
//!     .unwrap();
//! assert_eq!(report.synced, vec![RecordKey::from("a")]);
//! ```

pub mod config;
pub mod error;
pub mod index;
pub mod lock;
pub mod record;
pub mod registry;
pub mod schema;
pub mod store;
pub mod sync;
pub mod validator;

// Re-export main types at crate root
pub use config::{ConfigError, StoreConfig};
pub use error::Error;
pub use index::{IndexLookup, IndexManager, IndexValue};
pub use lock::{KeyGuard, KeyedMutex};
pub use record::{Record, RecordKey, SyncFailure};
pub use registry::Registry;
pub use schema::{FieldKind, IndexRule, SchemaDefinition, SchemaField};
pub use store::Collection;
pub use sync::{SyncReport, SyncTarget};
pub use validator::SchemaValidator;

/// Type aliases for clarity
pub type CollectionName = String;
pub type FieldPath = String;
pub type Version = u64;
