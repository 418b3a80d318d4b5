//! Field definitions and the closed field-type enumeration.
//!
//! A field's behavior is driven entirely by its type: the value codec, the
//! validation rule generator, and the predicate compiler all match
//! exhaustively on [`FieldType`]. Adding a field type means adding one
//! variant and following the compiler errors.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Content field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    LongText,
    RichText,
    Number,
    Boolean,
    Date,
    Email,
    Password,
    Select,
    Color,
    Media,
    Relation,
    Json,
}

impl FieldType {
    /// Storage name, as persisted in the `collection_fields` table.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::LongText => "long_text",
            FieldType::RichText => "rich_text",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Email => "email",
            FieldType::Password => "password",
            FieldType::Select => "select",
            FieldType::Color => "color",
            FieldType::Media => "media",
            FieldType::Relation => "relation",
            FieldType::Json => "json",
        }
    }

    /// Parse a storage name back into a field type.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(FieldType::Text),
            "long_text" => Some(FieldType::LongText),
            "rich_text" => Some(FieldType::RichText),
            "number" => Some(FieldType::Number),
            "boolean" => Some(FieldType::Boolean),
            "date" => Some(FieldType::Date),
            "email" => Some(FieldType::Email),
            "password" => Some(FieldType::Password),
            "select" => Some(FieldType::Select),
            "color" => Some(FieldType::Color),
            "media" => Some(FieldType::Media),
            "relation" => Some(FieldType::Relation),
            "json" => Some(FieldType::Json),
            _ => None,
        }
    }

    /// Ordered comparisons against this type are numeric, not lexicographic.
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Number)
    }

    /// Ordered comparisons against this type are calendar-date comparisons.
    pub fn is_date(&self) -> bool {
        matches!(self, FieldType::Date)
    }

    /// Values of this type are stored as a comma-joined list.
    pub fn is_list(&self) -> bool {
        matches!(self, FieldType::Media | FieldType::Relation)
    }
}

/// Options for a relation field: which collection it points at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationOptions {
    /// Target collection id.
    pub collection: Uuid,

    /// Whether the field holds multiple target ids.
    #[serde(default)]
    pub multiple: bool,
}

/// Options for a media field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaOptions {
    /// Whether the field holds multiple file ids.
    #[serde(default)]
    pub multiple: bool,
}

/// Type-specific field options, stored as JSONB.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<RelationOptions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaOptions>,
}

/// An on/off validation rule with an optional custom message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleFlag {
    #[serde(default)]
    pub status: bool,

    #[serde(default)]
    pub message: Option<String>,
}

/// Character-count policy for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CharCountPolicy {
    #[default]
    None,
    Min,
    Max,
    Between,
}

/// Character-count constraint configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CharCount {
    #[serde(default)]
    pub status: bool,

    #[serde(default, rename = "type")]
    pub policy: CharCountPolicy,

    #[serde(default)]
    pub min: Option<i64>,

    #[serde(default)]
    pub max: Option<i64>,
}

/// Validation rules for a field, stored as JSONB.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldValidations {
    #[serde(default)]
    pub required: RuleFlag,

    #[serde(default)]
    pub unique: RuleFlag,

    #[serde(default)]
    pub charcount: CharCount,
}

/// A schema element of a collection.
///
/// `name` is the join key into the attribute store and must stay stable once
/// content referencing it exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub id: Uuid,
    pub project_id: Uuid,
    pub collection_id: Uuid,

    /// Attribute key, unique within the collection.
    pub name: String,

    /// Human-readable label.
    pub label: String,

    #[serde(rename = "type")]
    pub field_type: FieldType,

    pub description: Option<String>,
    pub placeholder: Option<String>,

    #[serde(default)]
    pub options: FieldOptions,

    #[serde(default)]
    pub validations: FieldValidations,

    /// Display order within the collection.
    pub position: i32,
}

impl FieldDefinition {
    /// Find a field by attribute name.
    pub fn lookup<'a>(fields: &'a [FieldDefinition], name: &str) -> Option<&'a FieldDefinition> {
        fields.iter().find(|f| f.name == name)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn field_type_roundtrip() {
        for ty in [
            FieldType::Text,
            FieldType::LongText,
            FieldType::RichText,
            FieldType::Number,
            FieldType::Boolean,
            FieldType::Date,
            FieldType::Email,
            FieldType::Password,
            FieldType::Select,
            FieldType::Color,
            FieldType::Media,
            FieldType::Relation,
            FieldType::Json,
        ] {
            assert_eq!(FieldType::parse(ty.as_str()), Some(ty));
        }
        assert_eq!(FieldType::parse("nonexistent"), None);
    }

    #[test]
    fn comparison_typing() {
        assert!(FieldType::Number.is_numeric());
        assert!(!FieldType::Text.is_numeric());
        assert!(FieldType::Date.is_date());
        assert!(FieldType::Media.is_list());
        assert!(FieldType::Relation.is_list());
        assert!(!FieldType::Json.is_list());
    }

    #[test]
    fn validations_parse_from_stored_json() {
        let raw = serde_json::json!({
            "required": {"status": true, "message": "Give it a title."},
            "unique": {"status": false, "message": null},
            "charcount": {"status": true, "type": "Between", "min": 3, "max": 80}
        });

        let validations: FieldValidations = serde_json::from_value(raw).unwrap();
        assert!(validations.required.status);
        assert_eq!(
            validations.required.message.as_deref(),
            Some("Give it a title.")
        );
        assert_eq!(validations.charcount.policy, CharCountPolicy::Between);
        assert_eq!(validations.charcount.min, Some(3));
        assert_eq!(validations.charcount.max, Some(80));
    }

    #[test]
    fn validations_default_when_fields_missing() {
        let validations: FieldValidations = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(!validations.required.status);
        assert!(!validations.unique.status);
        assert_eq!(validations.charcount.policy, CharCountPolicy::None);
    }

    #[test]
    fn relation_options_parse() {
        let id = Uuid::now_v7();
        let raw = serde_json::json!({"relation": {"collection": id, "multiple": true}});
        let options: FieldOptions = serde_json::from_value(raw).unwrap();
        let relation = options.relation.unwrap();
        assert_eq!(relation.collection, id);
        assert!(relation.multiple);
    }
}
