//! Schema validation and sanitization.
//!
//! The validator walks the schema tree and builds a fresh, sanitized copy of
//! the input. Undeclared fields are dropped; the primary-key field and the
//! top-level `version` field are the only exceptions and are copied verbatim.
//!
//! Array fields are checked structurally only: the value must be a sequence,
//! but its elements are not validated against any schema.

use crate::{
    error::Result,
    record::json_type_name,
    schema::{join_path, FieldKind, SchemaDefinition, SchemaField},
    Error,
};
use serde_json::{Map, Value};

/// Metadata field preserved from the input even when undeclared.
pub const VERSION_FIELD: &str = "version";

/// Validates input records against a collection schema.
#[derive(Debug, Clone, Copy)]
pub struct SchemaValidator<'a> {
    schema: &'a SchemaDefinition,
    primary_key: &'a str,
}

impl<'a> SchemaValidator<'a> {
    pub fn new(schema: &'a SchemaDefinition, primary_key: &'a str) -> Self {
        Self {
            schema,
            primary_key,
        }
    }

    /// Validate `data` and return its sanitized copy.
    ///
    /// The input is never modified.
    pub fn validate(&self, data: &Value) -> Result<Map<String, Value>> {
        let input = data
            .as_object()
            .ok_or_else(|| Error::InvalidPayload("record must be an object".into()))?;

        let mut output = sanitize_object(self.schema, input, "")?;

        for preserved in [self.primary_key, VERSION_FIELD] {
            if output.contains_key(preserved) {
                continue;
            }
            if let Some(value) = input.get(preserved) {
                output.insert(preserved.to_string(), value.clone());
            }
        }

        Ok(output)
    }
}

fn sanitize_object(
    schema: &SchemaDefinition,
    input: &Map<String, Value>,
    prefix: &str,
) -> Result<Map<String, Value>> {
    let mut output = Map::new();

    for (name, field) in schema.fields() {
        let path = join_path(prefix, name);
        if let Some(value) = sanitize_field(field, input.get(name), &path)? {
            output.insert(name.clone(), value);
        }
    }

    Ok(output)
}

/// Returns `None` when the field is absent and may stay absent.
fn sanitize_field(field: &SchemaField, value: Option<&Value>, path: &str) -> Result<Option<Value>> {
    let value = value.or(field.default.as_ref());

    let value = match value {
        None | Some(Value::Null) if field.required => {
            return Err(Error::MissingRequiredField(path.to_string()));
        }
        None => return Ok(None),
        Some(Value::Null) => return Ok(Some(Value::Null)),
        Some(v) => v,
    };

    let sanitized = match (&field.kind, value) {
        (FieldKind::Object { properties: Some(nested) }, Value::Object(obj)) => {
            Value::Object(sanitize_object(nested, obj, path)?)
        }
        (FieldKind::Object { properties: None }, Value::Object(_))
        | (FieldKind::Array, Value::Array(_))
        | (FieldKind::String, Value::String(_))
        | (FieldKind::Number, Value::Number(_))
        | (FieldKind::Boolean, Value::Bool(_)) => value.clone(),
        (kind, other) => {
            return Err(Error::TypeMismatch {
                field: path.to_string(),
                expected: kind.to_string(),
                got: json_type_name(other).to_string(),
            })
        }
    };

    Ok(Some(sanitized))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaField;
    use serde_json::json;

    fn person_schema() -> SchemaDefinition {
        SchemaDefinition::new()
            .with_field("name", SchemaField::string().required())
            .with_field("age", SchemaField::number().with_default(0))
    }

    fn nested_schema() -> SchemaDefinition {
        SchemaDefinition::new()
            .with_field("id", SchemaField::string().required())
            .with_field(
                "profile",
                SchemaField::object_with(
                    SchemaDefinition::new()
                        .with_field("visibility", SchemaField::string().with_default("private"))
                        .with_field("bio", SchemaField::string().required()),
                )
                .required(),
            )
            .with_field("tags", SchemaField::array())
            .with_field("extra", SchemaField::object())
    }

    #[test]
    fn applies_defaults() {
        let schema = person_schema();
        let validator = SchemaValidator::new(&schema, "name");

        let out = validator.validate(&json!({"name": "Dan"})).unwrap();
        assert_eq!(Value::Object(out), json!({"name": "Dan", "age": 0}));
    }

    #[test]
    fn missing_required_names_field() {
        let schema = person_schema();
        let validator = SchemaValidator::new(&schema, "name");

        let result = validator.validate(&json!({}));
        assert!(matches!(result, Err(Error::MissingRequiredField(f)) if f == "name"));
    }

    #[test]
    fn null_required_is_missing() {
        let schema = person_schema();
        let validator = SchemaValidator::new(&schema, "name");

        let result = validator.validate(&json!({"name": null}));
        assert!(matches!(result, Err(Error::MissingRequiredField(f)) if f == "name"));
    }

    #[test]
    fn optional_null_passes_through() {
        let schema = SchemaDefinition::new().with_field("note", SchemaField::string());
        let validator = SchemaValidator::new(&schema, "id");

        let out = validator.validate(&json!({"note": null})).unwrap();
        assert_eq!(out.get("note"), Some(&Value::Null));
    }

    #[test]
    fn type_mismatch() {
        let schema = person_schema();
        let validator = SchemaValidator::new(&schema, "name");

        let result = validator.validate(&json!({"name": "Dan", "age": "21"}));
        assert!(matches!(
            result,
            Err(Error::TypeMismatch { field, expected, got })
                if field == "age" && expected == "number" && got == "string"
        ));
    }

    #[test]
    fn drops_undeclared_fields_but_keeps_metadata() {
        let schema = person_schema();
        let validator = SchemaValidator::new(&schema, "uid");

        let out = validator
            .validate(&json!({"uid": 7, "name": "Dan", "version": 3, "junk": true, "pendingSync": false}))
            .unwrap();

        assert_eq!(
            Value::Object(out),
            json!({"uid": 7, "name": "Dan", "age": 0, "version": 3})
        );
    }

    #[test]
    fn recurses_into_nested_objects() {
        let schema = nested_schema();
        let validator = SchemaValidator::new(&schema, "id");

        let out = validator
            .validate(&json!({
                "id": "u1",
                "profile": {"bio": "hi", "secret": "dropped"},
                "tags": [1, "two", {"three": 3}],
                "extra": {"anything": ["goes"]}
            }))
            .unwrap();

        assert_eq!(
            Value::Object(out),
            json!({
                "id": "u1",
                "profile": {"bio": "hi", "visibility": "private"},
                "tags": [1, "two", {"three": 3}],
                "extra": {"anything": ["goes"]}
            })
        );
    }

    #[test]
    fn nested_errors_cite_dotted_path() {
        let schema = nested_schema();
        let validator = SchemaValidator::new(&schema, "id");

        let result = validator.validate(&json!({"id": "u1", "profile": {}}));
        assert!(matches!(result, Err(Error::MissingRequiredField(f)) if f == "profile.bio"));

        let result = validator.validate(&json!({"id": "u1", "profile": {"bio": 5}}));
        assert!(matches!(result, Err(Error::TypeMismatch { field, .. }) if field == "profile.bio"));
    }

    #[test]
    fn object_must_not_be_array() {
        let schema = nested_schema();
        let validator = SchemaValidator::new(&schema, "id");

        let result = validator.validate(&json!({"id": "u1", "profile": [{"bio": "x"}]}));
        assert!(matches!(
            result,
            Err(Error::TypeMismatch { field, got, .. }) if field == "profile" && got == "array"
        ));
    }

    #[test]
    fn array_must_be_sequence() {
        let schema = nested_schema();
        let validator = SchemaValidator::new(&schema, "id");

        let result = validator.validate(&json!({"id": "u1", "profile": {"bio": "x"}, "tags": "a,b"}));
        assert!(matches!(result, Err(Error::TypeMismatch { field, .. }) if field == "tags"));
    }

    #[test]
    fn rejects_non_object_payload() {
        let schema = person_schema();
        let validator = SchemaValidator::new(&schema, "name");

        assert!(matches!(
            validator.validate(&json!([1, 2])),
            Err(Error::InvalidPayload(_))
        ));
    }

    #[test]
    fn does_not_mutate_input() {
        let schema = person_schema();
        let validator = SchemaValidator::new(&schema, "name");
        let input = json!({"name": "Dan", "junk": 1});

        validator.validate(&input).unwrap();
        assert_eq!(input, json!({"name": "Dan", "junk": 1}));
    }
}
