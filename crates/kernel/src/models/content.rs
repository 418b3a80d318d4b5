//! Content model.
//!
//! A content record holds identity, locale, and lifecycle timestamps only;
//! its field values live in attribute rows. Publish state is driven by the
//! nullable `published_at`; soft deletion by the `deleted_at` tombstone.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// Content record (one instance of a collection).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Content {
    /// Unique identifier (UUIDv7).
    pub id: Uuid,

    pub project_id: Uuid,
    pub collection_id: Uuid,

    pub locale: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Null means draft; non-null means published.
    pub published_at: Option<DateTime<Utc>>,

    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub published_by: Option<Uuid>,

    /// Soft-delete tombstone.
    pub deleted_at: Option<DateTime<Utc>>,
}

const COLUMNS: &str = "id, project_id, collection_id, locale, created_at, updated_at, \
                       published_at, created_by, updated_by, published_by, deleted_at";

impl Content {
    /// Check if this record is published.
    pub fn is_published(&self) -> bool {
        self.published_at.is_some()
    }

    /// Check if this record is soft-deleted.
    pub fn is_trashed(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Find a live record by id within a scope.
    pub async fn find_scoped(
        pool: &PgPool,
        project_id: Uuid,
        collection_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>> {
        let content = sqlx::query_as::<_, Content>(&format!(
            "SELECT {COLUMNS} FROM content \
             WHERE id = $1 AND project_id = $2 AND collection_id = $3 AND deleted_at IS NULL",
        ))
        .bind(id)
        .bind(project_id)
        .bind(collection_id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch content by id")?;

        Ok(content)
    }

    /// Find a record by id within a scope, including soft-deleted rows.
    pub async fn find_scoped_with_trashed(
        pool: &PgPool,
        project_id: Uuid,
        collection_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>> {
        let content = sqlx::query_as::<_, Content>(&format!(
            "SELECT {COLUMNS} FROM content \
             WHERE id = $1 AND project_id = $2 AND collection_id = $3",
        ))
        .bind(id)
        .bind(project_id)
        .bind(collection_id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch content by id")?;

        Ok(content)
    }

    /// Insert a new record. Runs inside the caller's transaction so the
    /// record row and its attribute rows commit atomically.
    pub async fn insert(
        conn: &mut PgConnection,
        project_id: Uuid,
        collection_id: Uuid,
        locale: &str,
        published_at: Option<DateTime<Utc>>,
        actor: Option<Uuid>,
    ) -> Result<Self> {
        let id = Uuid::now_v7();
        let now = Utc::now();

        let content = sqlx::query_as::<_, Content>(&format!(
            "INSERT INTO content \
             (id, project_id, collection_id, locale, created_at, updated_at, published_at, created_by, updated_by, published_by) \
             VALUES ($1, $2, $3, $4, $5, $5, $6, $7, $7, $8) \
             RETURNING {COLUMNS}",
        ))
        .bind(id)
        .bind(project_id)
        .bind(collection_id)
        .bind(locale)
        .bind(now)
        .bind(published_at)
        .bind(actor)
        .bind(published_at.and(actor))
        .fetch_one(&mut *conn)
        .await
        .context("failed to insert content")?;

        Ok(content)
    }

    /// Update a record's locale and publish state.
    pub async fn update_state(
        conn: &mut PgConnection,
        id: Uuid,
        locale: Option<&str>,
        published_at: Option<DateTime<Utc>>,
        actor: Option<Uuid>,
    ) -> Result<Option<Self>> {
        let content = sqlx::query_as::<_, Content>(&format!(
            "UPDATE content SET \
             locale = COALESCE($2, locale), \
             published_at = $3, \
             published_by = $4, \
             updated_at = $5, \
             updated_by = COALESCE($6, updated_by) \
             WHERE id = $1 AND deleted_at IS NULL \
             RETURNING {COLUMNS}",
        ))
        .bind(id)
        .bind(locale)
        .bind(published_at)
        .bind(published_at.and(actor))
        .bind(Utc::now())
        .bind(actor)
        .fetch_optional(&mut *conn)
        .await
        .context("failed to update content")?;

        Ok(content)
    }

    /// Soft-delete a live record. Returns false if no live row matched.
    pub async fn soft_delete(conn: &mut PgConnection, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE content SET deleted_at = $2 WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await
        .context("failed to soft-delete content")?;

        Ok(result.rows_affected() > 0)
    }

    /// Physically remove a record. Attribute rows are removed by the caller
    /// in the same transaction.
    pub async fn hard_delete(conn: &mut PgConnection, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM content WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await
            .context("failed to delete content")?;

        Ok(result.rows_affected() > 0)
    }

    /// Clear the tombstone on a trashed record. Returns false if the record
    /// is not trashed.
    pub async fn restore(conn: &mut PgConnection, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE content SET deleted_at = NULL WHERE id = $1 AND deleted_at IS NOT NULL",
        )
        .bind(id)
        .execute(&mut *conn)
        .await
        .context("failed to restore content")?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn record(published: bool, trashed: bool) -> Content {
        let now = Utc::now();
        Content {
            id: Uuid::now_v7(),
            project_id: Uuid::now_v7(),
            collection_id: Uuid::now_v7(),
            locale: "en".to_string(),
            created_at: now,
            updated_at: now,
            published_at: published.then_some(now),
            created_by: None,
            updated_by: None,
            published_by: None,
            deleted_at: trashed.then_some(now),
        }
    }

    #[test]
    fn publish_state_from_timestamp() {
        assert!(record(true, false).is_published());
        assert!(!record(false, false).is_published());
    }

    #[test]
    fn trash_state_from_tombstone() {
        assert!(record(true, true).is_trashed());
        assert!(!record(true, false).is_trashed());
    }
}
