//! Record types for storing data.

use crate::{error::Result, Error, Version};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Primary-key value identifying a record within a collection.
///
/// Only strings and integers are accepted as keys; a float with an integral
/// value counts as that integer. `"1"` and `1` are distinct keys, and both
/// `""` and `0` are legitimate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordKey {
    Int(i64),
    String(String),
}

impl RecordKey {
    /// Extract the key from `data[field]`.
    ///
    /// An absent or `null` field is a missing key; any other non-key type is
    /// rejected.
    pub fn from_field(data: &Map<String, Value>, field: &str) -> Result<Self> {
        match data.get(field) {
            None | Some(Value::Null) => Err(Error::MissingKey(field.to_string())),
            Some(value) => Self::from_value(value).ok_or_else(|| Error::InvalidKey {
                field: field.to_string(),
                got: json_type_name(value).to_string(),
            }),
        }
    }

    /// Convert a JSON value into a key, if it has a key type.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(RecordKey::String(s.clone())),
            Value::Number(n) => canonical_number(n).as_i64().map(RecordKey::Int),
            _ => None,
        }
    }

    /// The key as a JSON value.
    pub fn to_value(&self) -> Value {
        match self {
            RecordKey::Int(n) => Value::from(*n),
            RecordKey::String(s) => Value::from(s.as_str()),
        }
    }
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKey::Int(n) => write!(f, "{}", n),
            RecordKey::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for RecordKey {
    fn from(s: &str) -> Self {
        RecordKey::String(s.to_string())
    }
}

impl From<String> for RecordKey {
    fn from(s: String) -> Self {
        RecordKey::String(s)
    }
}

impl From<i64> for RecordKey {
    fn from(n: i64) -> Self {
        RecordKey::Int(n)
    }
}

/// A versioned record in a collection.
///
/// Serializes flat: the sanitized fields alongside `version` and
/// `pendingSync`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Sanitized field values, including the primary-key field
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    /// Version number, 1 on first write and incremented on each write
    pub version: Version,
    /// True until the external sync collaborator acknowledges the write
    pub pending_sync: bool,
}

impl Record {
    /// Create a record pending sync.
    pub fn new(fields: Map<String, Value>, version: Version) -> Self {
        Self {
            fields,
            version,
            pending_sync: true,
        }
    }

    /// Get a top-level field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Resolve a dotted path (`profile.visibility`) against the fields.
    pub fn value_at(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.fields.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// This record marked as acknowledged by the sync collaborator.
    pub fn into_synced(mut self) -> Self {
        self.pending_sync = false;
        self
    }

    /// The flat JSON representation of this record.
    pub fn to_value(&self) -> Value {
        let mut obj = self.fields.clone();
        obj.insert("version".into(), Value::from(self.version));
        obj.insert("pendingSync".into(), Value::Bool(self.pending_sync));
        Value::Object(obj)
    }
}

/// Last sync failure recorded for a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncFailure {
    /// Failure reason reported by the sync collaborator
    pub message: String,
    /// Version of the dirty record when the failure was reported
    pub version: Version,
    /// When the failure was recorded
    pub failed_at: DateTime<Utc>,
}

impl SyncFailure {
    pub fn new(message: impl Into<String>, version: Version) -> Self {
        Self {
            message: message.into(),
            version,
            failed_at: Utc::now(),
        }
    }
}

/// Numeric form of `n` with integral floats folded into integers.
///
/// JSON has a single number type, so `20`, `20.0` and `-0.0`/`0` must
/// compare and hash alike.
pub(crate) fn canonical_number(n: &Number) -> Number {
    // 2^64 and -2^63 as exact f64 bounds
    const U64_END: f64 = 18_446_744_073_709_551_616.0;
    const I64_START: f64 = -9_223_372_036_854_775_808.0;

    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 => {
            if (0.0..U64_END).contains(&f) {
                Number::from(f as u64)
            } else if (I64_START..0.0).contains(&f) {
                Number::from(f as i64)
            } else {
                n.clone()
            }
        }
        _ => n.clone(),
    }
}

/// `value` with every number replaced by its canonical form.
pub(crate) fn canonical_value(value: &Value) -> Value {
    match value {
        Value::Number(n) => Value::Number(canonical_number(n)),
        Value::Array(items) => Value::Array(items.iter().map(canonical_value).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), canonical_value(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// JSON equality where numbers compare by numeric value.
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => canonical_number(x) == canonical_number(y),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
