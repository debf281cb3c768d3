//! Shared helpers for integration tests.

#![allow(dead_code)]

use memoria_engine::{Registry, SchemaDefinition};
use serde_json::{json, Value};
use std::sync::Once;

static TRACING: Once = Once::new();

/// Install a test subscriber once per test binary.
///
/// Filter with `RUST_LOG`, e.g. `RUST_LOG=memoria_engine=debug`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "memoria_engine=warn".into()),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Schema used by the score scenarios.
pub fn score_schema() -> SchemaDefinition {
    SchemaDefinition::from_json(&json!({
        "id": {"type": "string", "required": true},
        "score": {"type": "number", "required": true, "index": true}
    }))
    .unwrap()
}

/// Registry with a `scores` collection keyed by `id`.
pub fn score_registry() -> Registry {
    init_tracing();
    let registry = Registry::new();
    registry.create("scores", "id", score_schema()).unwrap();
    registry
}

/// String value of `field`, for sorting and assertions.
pub fn field_str(record: &memoria_engine::Record, field: &str) -> String {
    match record.get(field) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}
