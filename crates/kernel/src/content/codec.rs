//! Value codec.
//!
//! Encodes typed input values into the flat string form stored per
//! attribute row, and decodes them back. The comma-joined list encoding
//! for relation and media fields lives only here and in the predicate
//! compiler's membership operator; nothing else may assume it.

use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use serde_json::Value;

use crate::error::{EngineError, EngineResult};
use crate::schema::{FieldDefinition, FieldType};

/// Encode an input value into its stored form.
///
/// Returns `None` when there is nothing to store (empty input). `existing`
/// is the currently stored value when updating: a blank password submitted
/// on edit re-encodes to the existing hash unchanged, so a field is never
/// cleared by submitting blank.
pub fn encode(
    field: &FieldDefinition,
    input: &Value,
    existing: Option<&str>,
) -> EngineResult<Option<String>> {
    if is_empty_input(input) {
        if field.field_type == FieldType::Password {
            return Ok(existing.map(str::to_string));
        }
        return Ok(None);
    }

    match field.field_type {
        FieldType::Password => {
            let plain = scalar_text(field, input)?;
            Ok(Some(hash_password(&field.name, &plain)?))
        }

        FieldType::Media | FieldType::Relation => Ok(Some(join_list(field, input)?)),

        FieldType::Json => {
            let encoded = serde_json::to_string(input).map_err(|e| EngineError::InvalidValue {
                field: field.name.clone(),
                reason: e.to_string(),
            })?;
            Ok(Some(encoded))
        }

        FieldType::Text
        | FieldType::LongText
        | FieldType::RichText
        | FieldType::Number
        | FieldType::Boolean
        | FieldType::Date
        | FieldType::Email
        | FieldType::Select
        | FieldType::Color => Ok(Some(scalar_text(field, input)?)),
    }
}

/// Decode a stored value back into its typed form.
pub fn decode(field_type: FieldType, stored: &str) -> EngineResult<Value> {
    match field_type {
        FieldType::Media | FieldType::Relation => Ok(Value::Array(
            split_list(stored).into_iter().map(Value::String).collect(),
        )),
        FieldType::Json => serde_json::from_str(stored).map_err(|e| EngineError::InvalidValue {
            field: String::new(),
            reason: format!("stored json is unparseable: {e}"),
        }),
        _ => Ok(Value::String(stored.to_string())),
    }
}

/// Verify a plaintext password against a stored hash.
pub fn verify_password(plain: &str, stored: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(stored) else {
        return false;
    };

    Argon2::default()
        .verify_password(plain.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Split a stored comma-joined list, dropping empties.
pub fn split_list(stored: &str) -> Vec<String> {
    stored
        .split(',')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Hash a password using Argon2id. Salted: two hashes of the same
/// plaintext differ, so stored hashes must never be compared for equality.
fn hash_password(field: &str, plain: &str) -> EngineResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| EngineError::InvalidValue {
            field: field.to_string(),
            reason: format!("failed to hash password: {e}"),
        })?;

    Ok(hash.to_string())
}

/// Join list input (a JSON array or a comma-joined string) with commas,
/// dropping empty elements.
fn join_list(field: &FieldDefinition, input: &Value) -> EngineResult<String> {
    let items: Vec<String> = match input {
        Value::Array(values) => {
            let mut items = Vec::with_capacity(values.len());
            for value in values {
                items.push(scalar_text(field, value)?);
            }
            items
        }
        Value::String(s) => s.split(',').map(str::to_string).collect(),
        _ => {
            return Err(EngineError::InvalidValue {
                field: field.name.clone(),
                reason: "expected a list or comma-joined string".to_string(),
            });
        }
    };

    Ok(items
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(","))
}

/// The canonical text form of a scalar input.
fn scalar_text(field: &FieldDefinition, input: &Value) -> EngineResult<String> {
    match input {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(EngineError::InvalidValue {
            field: field.name.clone(),
            reason: "expected a scalar value".to_string(),
        }),
    }
}

/// Empty inputs store nothing: JSON null, the empty string, or an empty
/// array.
fn is_empty_input(input: &Value) -> bool {
    match input {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::schema::{FieldOptions, FieldValidations};
    use serde_json::json;
    use uuid::Uuid;

    fn field(name: &str, field_type: FieldType) -> FieldDefinition {
        FieldDefinition {
            id: Uuid::nil(),
            project_id: Uuid::nil(),
            collection_id: Uuid::nil(),
            name: name.to_string(),
            label: name.to_string(),
            field_type,
            description: None,
            placeholder: None,
            options: FieldOptions::default(),
            validations: FieldValidations::default(),
            position: 0,
        }
    }

    #[test]
    fn relation_list_round_trip() {
        let f = field("authors", FieldType::Relation);
        let stored = encode(&f, &json!(["3", "7"]), None).unwrap().unwrap();
        assert_eq!(stored, "3,7");

        let decoded = decode(FieldType::Relation, &stored).unwrap();
        assert_eq!(decoded, json!(["3", "7"]));
    }

    #[test]
    fn relation_accepts_comma_joined_string() {
        let f = field("authors", FieldType::Relation);
        let stored = encode(&f, &json!("3,7"), None).unwrap().unwrap();
        assert_eq!(stored, "3,7");
    }

    #[test]
    fn media_join_drops_empty_elements() {
        let f = field("photos", FieldType::Media);
        let stored = encode(&f, &json!(["a", "", "b"]), None).unwrap().unwrap();
        assert_eq!(stored, "a,b");
    }

    #[test]
    fn json_round_trip() {
        let f = field("meta", FieldType::Json);
        let input = json!({"k": [1, 2], "nested": {"x": true}});
        let stored = encode(&f, &input, None).unwrap().unwrap();
        let decoded = decode(FieldType::Json, &stored).unwrap();
        assert_eq!(decoded, input);
    }

    #[test]
    fn scalar_types_store_text_form() {
        assert_eq!(
            encode(&field("price", FieldType::Number), &json!(42), None).unwrap(),
            Some("42".to_string())
        );
        assert_eq!(
            encode(&field("active", FieldType::Boolean), &json!(true), None).unwrap(),
            Some("true".to_string())
        );
        assert_eq!(
            encode(&field("title", FieldType::Text), &json!("hi"), None).unwrap(),
            Some("hi".to_string())
        );
    }

    #[test]
    fn non_scalar_input_for_scalar_type_is_invalid() {
        let err = encode(&field("title", FieldType::Text), &json!({"a": 1}), None).unwrap_err();
        assert!(matches!(err, EngineError::InvalidValue { .. }));
    }

    #[test]
    fn empty_input_stores_nothing() {
        for input in [json!(null), json!(""), json!([])] {
            assert_eq!(
                encode(&field("title", FieldType::Text), &input, None).unwrap(),
                None
            );
        }
    }

    #[test]
    fn password_is_hashed_and_salted() {
        let f = field("secret", FieldType::Password);
        let first = encode(&f, &json!("hunter2"), None).unwrap().unwrap();
        let second = encode(&f, &json!("hunter2"), None).unwrap().unwrap();

        assert!(first.starts_with("$argon2"));
        // Salted: two hashes of the same plaintext differ.
        assert_ne!(first, second);
        assert!(verify_password("hunter2", &first));
        assert!(verify_password("hunter2", &second));
        assert!(!verify_password("wrong", &first));
    }

    #[test]
    fn blank_password_on_update_keeps_existing_hash() {
        let f = field("secret", FieldType::Password);
        let stored = encode(&f, &json!("hunter2"), None).unwrap().unwrap();

        let unchanged = encode(&f, &json!(""), Some(&stored)).unwrap();
        assert_eq!(unchanged, Some(stored.clone()));

        let replaced = encode(&f, &json!("new-pass"), Some(&stored))
            .unwrap()
            .unwrap();
        assert_ne!(replaced, stored);
        assert!(verify_password("new-pass", &replaced));
    }

    #[test]
    fn blank_password_without_existing_stores_nothing() {
        let f = field("secret", FieldType::Password);
        assert_eq!(encode(&f, &json!(""), None).unwrap(), None);
    }

    #[test]
    fn decode_splits_stored_lists() {
        assert_eq!(decode(FieldType::Media, "a,b").unwrap(), json!(["a", "b"]));
        assert_eq!(decode(FieldType::Relation, "").unwrap(), json!([]));
    }
}
