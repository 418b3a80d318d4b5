//! Schema registry: per-collection field definitions.
//!
//! Read-only at query time. Field rows are loaded once per collection and
//! cached in-process; administration writes must invalidate the collection.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use dashmap::DashMap;
use sqlx::PgPool;
use uuid::Uuid;

use super::field::{FieldDefinition, FieldOptions, FieldType, FieldValidations};

/// Registry of collection field definitions with an in-process cache.
#[derive(Clone)]
pub struct SchemaRegistry {
    inner: Arc<SchemaRegistryInner>,
}

struct SchemaRegistryInner {
    pool: PgPool,
    cache: DashMap<Uuid, Arc<Vec<FieldDefinition>>>,
}

/// Raw field row as stored; converted into a typed definition on load.
#[derive(sqlx::FromRow)]
struct FieldRow {
    id: Uuid,
    project_id: Uuid,
    collection_id: Uuid,
    name: String,
    label: String,
    field_type: String,
    description: Option<String>,
    placeholder: Option<String>,
    options: serde_json::Value,
    validations: serde_json::Value,
    position: i32,
}

impl TryFrom<FieldRow> for FieldDefinition {
    type Error = anyhow::Error;

    fn try_from(row: FieldRow) -> Result<Self> {
        let field_type = FieldType::parse(&row.field_type)
            .ok_or_else(|| anyhow!("unknown field type '{}' for field '{}'", row.field_type, row.name))?;

        let options: FieldOptions = serde_json::from_value(row.options)
            .with_context(|| format!("failed to parse options for field '{}'", row.name))?;

        let validations: FieldValidations = serde_json::from_value(row.validations)
            .with_context(|| format!("failed to parse validations for field '{}'", row.name))?;

        Ok(FieldDefinition {
            id: row.id,
            project_id: row.project_id,
            collection_id: row.collection_id,
            name: row.name,
            label: row.label,
            field_type,
            description: row.description,
            placeholder: row.placeholder,
            options,
            validations,
            position: row.position,
        })
    }
}

impl SchemaRegistry {
    /// Create a new schema registry.
    pub fn new(pool: PgPool) -> Self {
        Self {
            inner: Arc::new(SchemaRegistryInner {
                pool,
                cache: DashMap::new(),
            }),
        }
    }

    /// Get the ordered field definitions for a collection.
    pub async fn fields(&self, collection_id: Uuid) -> Result<Arc<Vec<FieldDefinition>>> {
        if let Some(fields) = self.inner.cache.get(&collection_id) {
            return Ok(fields.clone());
        }

        let rows = sqlx::query_as::<_, FieldRow>(
            "SELECT id, project_id, collection_id, name, label, field_type, description, placeholder, options, validations, position \
             FROM collection_fields WHERE collection_id = $1 ORDER BY position ASC",
        )
        .bind(collection_id)
        .fetch_all(&self.inner.pool)
        .await
        .context("failed to load collection fields")?;

        let fields: Vec<FieldDefinition> = rows
            .into_iter()
            .map(FieldDefinition::try_from)
            .collect::<Result<_>>()?;

        let fields = Arc::new(fields);
        self.inner.cache.insert(collection_id, fields.clone());
        Ok(fields)
    }

    /// Drop the cached definitions for a collection.
    pub fn invalidate(&self, collection_id: Uuid) {
        self.inner.cache.remove(&collection_id);
    }

    /// Clear the entire cache.
    pub fn clear_cache(&self) {
        self.inner.cache.clear();
    }
}
