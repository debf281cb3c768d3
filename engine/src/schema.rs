//! Schema definition.
//!
//! A collection's schema is a tree of [`SchemaField`]s. Objects may declare
//! nested properties; arrays are checked structurally only. Fields can carry
//! an [`IndexRule`], which is flattened to a dotted path when the collection
//! is created.
//!
//! Schemas are usually declared as JSON:
//!
//! ```json
//! {
//!   "id":      { "type": "string", "required": true },
//!   "age":     { "type": "number", "default": 0, "index": true },
//!   "profile": {
//!     "type": "object",
//!     "properties": { "visibility": { "type": "string", "index": "public" } }
//!   }
//! }
//! ```

use crate::{error::Result, record::values_equal, Error, FieldPath};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Declared type of a field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    /// A mapping, optionally with a declared shape
    Object {
        properties: Option<SchemaDefinition>,
    },
    /// A sequence; elements are not checked
    Array,
}

impl FieldKind {
    /// Name used in declarations and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Boolean => "boolean",
            FieldKind::Object { .. } => "object",
            FieldKind::Array => "array",
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Index rule attached to a field.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexRule {
    /// Track every value of the field
    Full,
    /// Track only records whose value equals the literal
    Literal(Value),
}

impl IndexRule {
    /// Whether a value at the indexed path is tracked by this rule.
    pub fn tracks(&self, value: &Value) -> bool {
        match self {
            IndexRule::Full => true,
            IndexRule::Literal(literal) => values_equal(literal, value),
        }
    }

    fn from_declaration(value: Value) -> Result<Option<Self>> {
        match value {
            Value::Null | Value::Bool(false) => Ok(None),
            Value::Bool(true) => Ok(Some(IndexRule::Full)),
            Value::String(_) | Value::Number(_) => Ok(Some(IndexRule::Literal(value))),
            other => Err(Error::InvalidSchema(format!(
                "index must be true or a literal, got {}",
                other
            ))),
        }
    }

    fn to_declaration(&self) -> Value {
        match self {
            IndexRule::Full => Value::Bool(true),
            IndexRule::Literal(v) => v.clone(),
        }
    }
}

/// Definition of a single field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawField", into = "RawField")]
pub struct SchemaField {
    /// Declared type
    pub kind: FieldKind,
    /// Whether the field must be present and non-null
    pub required: bool,
    /// Value substituted when the field is absent
    pub default: Option<Value>,
    /// Secondary index rule
    pub index: Option<IndexRule>,
}

impl SchemaField {
    pub fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            required: false,
            default: None,
            index: None,
        }
    }

    pub fn string() -> Self {
        Self::new(FieldKind::String)
    }

    pub fn number() -> Self {
        Self::new(FieldKind::Number)
    }

    pub fn boolean() -> Self {
        Self::new(FieldKind::Boolean)
    }

    pub fn array() -> Self {
        Self::new(FieldKind::Array)
    }

    /// An object field without a declared shape.
    pub fn object() -> Self {
        Self::new(FieldKind::Object { properties: None })
    }

    /// An object field whose properties are validated recursively.
    pub fn object_with(properties: SchemaDefinition) -> Self {
        Self::new(FieldKind::Object {
            properties: Some(properties),
        })
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Full index on this field.
    pub fn indexed(mut self) -> Self {
        self.index = Some(IndexRule::Full);
        self
    }

    /// Partial index tracking only `literal`.
    pub fn indexed_on(mut self, literal: impl Into<Value>) -> Self {
        self.index = Some(IndexRule::Literal(literal.into()));
        self
    }
}

/// Declaration format of a field.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawField {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    properties: Option<SchemaDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    index: Option<Value>,
}

impl TryFrom<RawField> for SchemaField {
    type Error = Error;

    fn try_from(raw: RawField) -> Result<Self> {
        let kind = match (raw.kind.as_str(), raw.properties) {
            ("object", properties) => FieldKind::Object { properties },
            (_, Some(_)) => {
                return Err(Error::InvalidSchema(format!(
                    "properties declared on non-object type '{}'",
                    raw.kind
                )))
            }
            ("string", None) => FieldKind::String,
            ("number", None) => FieldKind::Number,
            ("boolean", None) => FieldKind::Boolean,
            ("array", None) => FieldKind::Array,
            (other, None) => {
                return Err(Error::InvalidSchema(format!("unknown type '{}'", other)));
            }
        };

        Ok(Self {
            kind,
            required: raw.required,
            default: raw.default,
            index: raw
                .index
                .map(IndexRule::from_declaration)
                .transpose()?
                .flatten(),
        })
    }
}

impl From<SchemaField> for RawField {
    fn from(field: SchemaField) -> Self {
        let kind = field.kind.name().to_string();
        let properties = match field.kind {
            FieldKind::Object { properties } => properties,
            _ => None,
        };
        Self {
            kind,
            required: field.required,
            default: field.default,
            properties,
            index: field.index.as_ref().map(IndexRule::to_declaration),
        }
    }
}

/// Schema tree of a collection: field name to definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaDefinition {
    fields: BTreeMap<String, SchemaField>,
}

impl SchemaDefinition {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a schema from its JSON declaration.
    pub fn from_json(declaration: &Value) -> Result<Self> {
        serde_json::from_value(declaration.clone())
            .map_err(|e| Error::InvalidSchema(e.to_string()))
    }

    /// Builder-style method to add a field.
    pub fn with_field(mut self, name: impl Into<String>, field: SchemaField) -> Self {
        self.add_field(name, field);
        self
    }

    /// Add a field to the schema.
    pub fn add_field(&mut self, name: impl Into<String>, field: SchemaField) -> &mut Self {
        self.fields.insert(name.into(), field);
        self
    }

    /// Get a field definition by name.
    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.get(name)
    }

    /// Iterate declared fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = (&String, &SchemaField)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// All index rules in the tree, keyed by dotted path.
    pub fn index_rules(&self) -> Vec<(FieldPath, IndexRule)> {
        let mut rules = Vec::new();
        self.collect_index_rules("", &mut rules);
        rules
    }

    fn collect_index_rules(&self, prefix: &str, rules: &mut Vec<(FieldPath, IndexRule)>) {
        for (name, field) in &self.fields {
            let path = join_path(prefix, name);
            if let Some(rule) = &field.index {
                rules.push((path.clone(), rule.clone()));
            }
            if let FieldKind::Object {
                properties: Some(nested),
            } = &field.kind
            {
                nested.collect_index_rules(&path, rules);
            }
        }
    }
}

pub(crate) fn join_path(prefix: &str, name: &str) -> FieldPath {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}
