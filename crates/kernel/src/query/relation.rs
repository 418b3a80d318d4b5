//! Relation resolver.
//!
//! Resolves a filter on a relation target collection's field into a
//! containment predicate on the relation attribute itself. The lookup
//! assumes a single expected match: when no target record matches, the
//! whole query fails with not-found rather than returning an empty set.
//! Target resolution happens synchronously before the outer query is
//! compiled.

use serde_json::Value;
use sqlx::PgPool;

use crate::error::{EngineError, EngineResult};
use crate::models::Attribute;
use crate::query::compiler::escape_like;
use crate::query::types::{CompareOp, Comparison, Operand, Scope};
use crate::schema::{FieldDefinition, FieldType, SchemaRegistry};

/// Resolver for relation lookups.
pub struct RelationResolver<'a> {
    pool: &'a PgPool,
    schema: &'a SchemaRegistry,
}

impl<'a> RelationResolver<'a> {
    pub fn new(pool: &'a PgPool, schema: &'a SchemaRegistry) -> Self {
        Self { pool, schema }
    }

    /// Resolve a relation filter map into containment comparisons.
    ///
    /// The wire shape is `{ relationField: { targetField: value, ... }, ... }`.
    /// Each resolved entry intersects (AND) with the rest of the query.
    pub async fn resolve(
        &self,
        scope: &Scope,
        fields: &[FieldDefinition],
        raw: &Value,
    ) -> EngineResult<Vec<Comparison>> {
        let Some(object) = raw.as_object() else {
            return Err(EngineError::MalformedFilter(
                "relation filter must be an object".to_string(),
            ));
        };

        let mut comparisons = Vec::new();

        for (field_name, nested) in object {
            let field = FieldDefinition::lookup(fields, field_name)
                .ok_or_else(|| EngineError::UnknownField(field_name.clone()))?;

            if field.field_type != FieldType::Relation {
                return Err(EngineError::InvalidOperatorForType {
                    field: field_name.clone(),
                });
            }

            let Some(relation) = &field.options.relation else {
                return Err(EngineError::InvalidOperatorForType {
                    field: field_name.clone(),
                });
            };

            let Some(nested) = nested.as_object() else {
                return Err(EngineError::MalformedFilter(format!(
                    "relation filter for [{field_name}] must be an object"
                )));
            };

            let target_fields = self.schema.fields(relation.collection).await?;

            for (target_name, target_value) in nested {
                if FieldDefinition::lookup(&target_fields, target_name).is_none() {
                    return Err(EngineError::UnknownField(target_name.clone()));
                }

                let needle = match target_value {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    _ => {
                        return Err(EngineError::MalformedFilter(format!(
                            "relation filter value for [{target_name}] must be a scalar"
                        )));
                    }
                };

                // Substring match against the target collection's values.
                let pattern = format!("%{}%", escape_like(&needle));
                let target_id = Attribute::first_containing(
                    self.pool,
                    scope.project_id,
                    relation.collection,
                    target_name,
                    &pattern,
                )
                .await?
                .ok_or(EngineError::NotFound)?;

                // Equality on a relation field compiles to membership in the
                // comma-joined stored list.
                comparisons.push(Comparison {
                    field: field_name.clone(),
                    op: CompareOp::Eq,
                    operand: Operand::Value(target_id.to_string()),
                });
            }
        }

        Ok(comparisons)
    }
}
