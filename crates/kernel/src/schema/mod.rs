//! Collection schema: field definitions and the schema registry.

mod field;
mod registry;

pub use field::{
    CharCount, CharCountPolicy, FieldDefinition, FieldOptions, FieldType, FieldValidations,
    MediaOptions, RelationOptions, RuleFlag,
};
pub use registry::SchemaRegistry;
