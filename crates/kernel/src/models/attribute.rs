//! Attribute model (EAV rows).
//!
//! One row per (content, field name) with the value in its flat string
//! form. At most one live row exists per key: writes upsert, they never
//! append. Attribute rows are owned by their content record and are
//! soft/hard-deleted and restored in lockstep with it, never independently.

use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// Attribute row: one field value of one content record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Attribute {
    /// Unique identifier (UUIDv7).
    pub id: Uuid,

    pub project_id: Uuid,
    pub collection_id: Uuid,

    /// Owning content record.
    pub content_id: Uuid,

    /// Attribute key; matches a `FieldDefinition::name`.
    pub field_name: String,

    /// Flat stored form (see the value codec for per-type encoding).
    pub value: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Soft-delete tombstone, set in lockstep with the owning record.
    pub deleted_at: Option<DateTime<Utc>>,
}

const COLUMNS: &str = "id, project_id, collection_id, content_id, field_name, value, \
                       created_at, updated_at, deleted_at";

impl Attribute {
    /// Find the live row for a (content, field) key.
    pub async fn find_live(
        pool: &PgPool,
        content_id: Uuid,
        field_name: &str,
    ) -> Result<Option<Self>> {
        let attribute = sqlx::query_as::<_, Attribute>(&format!(
            "SELECT {COLUMNS} FROM content_attribute \
             WHERE content_id = $1 AND field_name = $2 AND deleted_at IS NULL",
        ))
        .bind(content_id)
        .bind(field_name)
        .fetch_optional(pool)
        .await
        .context("failed to fetch attribute")?;

        Ok(attribute)
    }

    /// Insert a new attribute row.
    pub async fn insert(
        conn: &mut PgConnection,
        project_id: Uuid,
        collection_id: Uuid,
        content_id: Uuid,
        field_name: &str,
        value: &str,
    ) -> Result<Self> {
        let now = Utc::now();

        let attribute = sqlx::query_as::<_, Attribute>(&format!(
            "INSERT INTO content_attribute \
             (id, project_id, collection_id, content_id, field_name, value, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7) \
             RETURNING {COLUMNS}",
        ))
        .bind(Uuid::now_v7())
        .bind(project_id)
        .bind(collection_id)
        .bind(content_id)
        .bind(field_name)
        .bind(value)
        .bind(now)
        .fetch_one(&mut *conn)
        .await
        .context("failed to insert attribute")?;

        Ok(attribute)
    }

    /// Update the value of an existing row.
    pub async fn update_value(conn: &mut PgConnection, id: Uuid, value: &str) -> Result<()> {
        sqlx::query("UPDATE content_attribute SET value = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(value)
            .bind(Utc::now())
            .execute(&mut *conn)
            .await
            .context("failed to update attribute value")?;

        Ok(())
    }

    /// Load attribute values for a set of content records as
    /// content id -> (field name -> value).
    pub async fn map_for_contents(
        pool: &PgPool,
        content_ids: &[Uuid],
        include_deleted: bool,
    ) -> Result<HashMap<Uuid, BTreeMap<String, String>>> {
        if content_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let sql = if include_deleted {
            "SELECT content_id, field_name, value FROM content_attribute \
             WHERE content_id = ANY($1) ORDER BY created_at ASC"
        } else {
            "SELECT content_id, field_name, value FROM content_attribute \
             WHERE content_id = ANY($1) AND deleted_at IS NULL ORDER BY created_at ASC"
        };

        let rows = sqlx::query_as::<_, (Uuid, String, String)>(sql)
            .bind(content_ids)
            .fetch_all(pool)
            .await
            .context("failed to load attributes for content")?;

        let mut map: HashMap<Uuid, BTreeMap<String, String>> = HashMap::new();
        for (content_id, field_name, value) in rows {
            map.entry(content_id).or_default().insert(field_name, value);
        }

        Ok(map)
    }

    /// Count live rows in a collection holding the given value for a field,
    /// optionally excluding one content record (the one being updated).
    pub async fn count_value(
        pool: &PgPool,
        collection_id: Uuid,
        field_name: &str,
        value: &str,
        exclude_content: Option<Uuid>,
    ) -> Result<i64> {
        let count: i64 = match exclude_content {
            Some(content_id) => sqlx::query_scalar(
                "SELECT COUNT(*) FROM content_attribute \
                 WHERE collection_id = $1 AND field_name = $2 AND value = $3 \
                 AND content_id != $4 AND deleted_at IS NULL",
            )
            .bind(collection_id)
            .bind(field_name)
            .bind(value)
            .bind(content_id)
            .fetch_one(pool)
            .await
            .context("failed to count attribute values")?,
            None => sqlx::query_scalar(
                "SELECT COUNT(*) FROM content_attribute \
                 WHERE collection_id = $1 AND field_name = $2 AND value = $3 \
                 AND deleted_at IS NULL",
            )
            .bind(collection_id)
            .bind(field_name)
            .bind(value)
            .fetch_one(pool)
            .await
            .context("failed to count attribute values")?,
        };

        Ok(count)
    }

    /// Find the first content record in a collection whose attribute value
    /// contains the given text, oldest first. Used by the relation resolver.
    pub async fn first_containing(
        pool: &PgPool,
        project_id: Uuid,
        collection_id: Uuid,
        field_name: &str,
        pattern: &str,
    ) -> Result<Option<Uuid>> {
        let content_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT content_id FROM content_attribute \
             WHERE project_id = $1 AND collection_id = $2 AND field_name = $3 \
             AND value LIKE $4 AND deleted_at IS NULL \
             ORDER BY created_at ASC LIMIT 1",
        )
        .bind(project_id)
        .bind(collection_id)
        .bind(field_name)
        .bind(pattern)
        .fetch_optional(pool)
        .await
        .context("failed to search attribute values")?;

        Ok(content_id)
    }

    /// Soft-delete all live rows of a content record.
    pub async fn soft_delete_for_content(conn: &mut PgConnection, content_id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE content_attribute SET deleted_at = $2 \
             WHERE content_id = $1 AND deleted_at IS NULL",
        )
        .bind(content_id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await
        .context("failed to soft-delete attributes")?;

        Ok(())
    }

    /// Physically remove all rows of a content record.
    pub async fn hard_delete_for_content(conn: &mut PgConnection, content_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM content_attribute WHERE content_id = $1")
            .bind(content_id)
            .execute(&mut *conn)
            .await
            .context("failed to delete attributes")?;

        Ok(())
    }

    /// Clear the tombstone on all rows of a content record.
    pub async fn restore_for_content(conn: &mut PgConnection, content_id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE content_attribute SET deleted_at = NULL \
             WHERE content_id = $1 AND deleted_at IS NOT NULL",
        )
        .bind(content_id)
        .execute(&mut *conn)
        .await
        .context("failed to restore attributes")?;

        Ok(())
    }
}
