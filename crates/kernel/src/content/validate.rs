//! Validation rule generation and application.
//!
//! Rules derive from schema metadata: required-ness, a type rule for email
//! and number fields, and one char-count rule per field chosen by policy.
//! For number fields the char-count bounds apply to the numeric value and
//! the generated message omits "characters". Format and length rules skip
//! absent or empty values; only required-ness fires on emptiness.

use serde_json::{Map, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{EngineResult, ValidationErrors};
use crate::models::Attribute;
use crate::schema::{CharCountPolicy, FieldDefinition, FieldType};

/// A generated validation rule for one field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRule {
    pub field: String,
    pub kind: RuleKind,
    pub message: String,
}

/// Rule kinds derived from schema metadata.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RuleKind {
    Required,
    Email,
    Numeric,
    Between { min: i64, max: i64 },
    Min { min: i64 },
    Max { max: i64 },
}

/// Derive the validation rules for a collection's fields.
pub fn rules_for(fields: &[FieldDefinition]) -> Vec<FieldRule> {
    let mut rules = Vec::new();

    for field in fields {
        let name = &field.name;

        if field.validations.required.status {
            let message = field
                .validations
                .required
                .message
                .clone()
                .unwrap_or_else(|| format!("The {name} field is required."));
            rules.push(FieldRule {
                field: name.clone(),
                kind: RuleKind::Required,
                message,
            });
        }

        match field.field_type {
            FieldType::Email => rules.push(FieldRule {
                field: name.clone(),
                kind: RuleKind::Email,
                message: format!("The {name} must be a valid email address."),
            }),
            FieldType::Number => rules.push(FieldRule {
                field: name.clone(),
                kind: RuleKind::Numeric,
                message: format!("The {name} must be numeric."),
            }),
            _ => {}
        }

        let charcount = &field.validations.charcount;
        if charcount.status {
            // Messages mention "characters" except for numeric fields,
            // where the bounds apply to the value itself.
            let suffix = if field.field_type == FieldType::Number {
                ""
            } else {
                " characters"
            };

            match charcount.policy {
                CharCountPolicy::Between => {
                    if let (Some(min), Some(max)) = (charcount.min, charcount.max) {
                        rules.push(FieldRule {
                            field: name.clone(),
                            kind: RuleKind::Between { min, max },
                            message: format!(
                                "The {name} must be between {min} and {max}{suffix}."
                            ),
                        });
                    }
                }
                CharCountPolicy::Min => {
                    if let Some(min) = charcount.min {
                        rules.push(FieldRule {
                            field: name.clone(),
                            kind: RuleKind::Min { min },
                            message: format!("The {name} must be at least {min}{suffix}."),
                        });
                    }
                }
                CharCountPolicy::Max => {
                    if let Some(max) = charcount.max {
                        rules.push(FieldRule {
                            field: name.clone(),
                            kind: RuleKind::Max { max },
                            message: format!("The {name} may not be greater than {max}{suffix}."),
                        });
                    }
                }
                CharCountPolicy::None => {}
            }
        }
    }

    rules
}

/// Apply generated rules to submitted field values.
pub fn apply_rules(
    rules: &[FieldRule],
    fields: &[FieldDefinition],
    values: &Map<String, Value>,
) -> ValidationErrors {
    let mut errors = ValidationErrors::default();

    for rule in rules {
        let value = values.get(&rule.field);
        let present = value.is_some_and(has_content);

        if rule.kind == RuleKind::Required {
            if !present {
                errors.add(&rule.field, rule.message.clone());
            }
            continue;
        }

        // Format and size rules only apply to submitted, non-empty values.
        if !present {
            continue;
        }
        let Some(text) = value.and_then(value_text) else {
            continue;
        };

        let field_type = FieldDefinition::lookup(fields, &rule.field).map(|f| f.field_type);

        match rule.kind {
            RuleKind::Email => {
                if !is_valid_email(&text) {
                    errors.add(&rule.field, rule.message.clone());
                }
            }
            RuleKind::Numeric => {
                if text.parse::<f64>().is_err() {
                    errors.add(&rule.field, rule.message.clone());
                }
            }
            RuleKind::Between { min, max } => {
                if let Some(size) = rule_size(field_type, &text)
                    && (size < min as f64 || size > max as f64)
                {
                    errors.add(&rule.field, rule.message.clone());
                }
            }
            RuleKind::Min { min } => {
                if let Some(size) = rule_size(field_type, &text)
                    && size < min as f64
                {
                    errors.add(&rule.field, rule.message.clone());
                }
            }
            RuleKind::Max { max } => {
                if let Some(size) = rule_size(field_type, &text)
                    && size > max as f64
                {
                    errors.add(&rule.field, rule.message.clone());
                }
            }
            RuleKind::Required => unreachable!("handled above"),
        }
    }

    errors
}

/// Check uniqueness constraints against live attribute rows in the same
/// collection. When updating, the record's own rows are excluded so a
/// record can always keep its current value.
pub async fn check_unique(
    pool: &PgPool,
    collection_id: Uuid,
    fields: &[FieldDefinition],
    values: &Map<String, Value>,
    exclude_content: Option<Uuid>,
) -> EngineResult<ValidationErrors> {
    let mut errors = ValidationErrors::default();

    for field in fields {
        if !field.validations.unique.status {
            continue;
        }
        let Some(value) = values.get(&field.name) else {
            continue;
        };
        let Some(text) = value_text(value) else {
            continue;
        };
        if text.is_empty() {
            continue;
        }

        let count =
            Attribute::count_value(pool, collection_id, &field.name, &text, exclude_content)
                .await?;

        if count != 0 {
            let message = field
                .validations
                .unique
                .message
                .clone()
                .unwrap_or_else(|| format!("The {} has already been taken.", field.name));
            errors.add(&field.name, message);
        }
    }

    Ok(errors)
}

/// The size a char-count rule compares: the numeric value for number
/// fields, the character count otherwise.
fn rule_size(field_type: Option<FieldType>, text: &str) -> Option<f64> {
    if field_type == Some(FieldType::Number) {
        return text.parse::<f64>().ok();
    }
    Some(text.chars().count() as f64)
}

/// The text form a validation rule inspects.
fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// A submitted value counts as present when it is not null, not the empty
/// string, and not an empty array.
fn has_content(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}

/// Requires exactly one `@` with non-empty local and domain parts, and the
/// domain must contain a dot.
fn is_valid_email(s: &str) -> bool {
    let parts: Vec<&str> = s.splitn(3, '@').collect();
    if parts.len() != 2 {
        return false;
    }
    let local = parts[0];
    let domain = parts[1];
    !local.is_empty() && !domain.is_empty() && domain.contains('.')
}
