//! Collection model.
//!
//! A collection is a tenant-defined content type; its schema lives in
//! `collection_fields` rows, not code.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Collection record (content-type definition).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Collection {
    /// Unique identifier (UUIDv7).
    pub id: Uuid,

    pub project_id: Uuid,

    pub name: String,

    /// URL-safe slug, unique within the project.
    pub slug: String,

    /// Display order within the project.
    pub position: i32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Collection {
    /// Find a collection by slug within a project.
    pub async fn find_by_slug(pool: &PgPool, project_id: Uuid, slug: &str) -> Result<Option<Self>> {
        let collection = sqlx::query_as::<_, Collection>(
            "SELECT id, project_id, name, slug, position, created_at, updated_at \
             FROM collections WHERE project_id = $1 AND slug = $2",
        )
        .bind(project_id)
        .bind(slug)
        .fetch_optional(pool)
        .await
        .context("failed to fetch collection by slug")?;

        Ok(collection)
    }

    /// List a project's collections in display order.
    pub async fn list_by_project(pool: &PgPool, project_id: Uuid) -> Result<Vec<Self>> {
        let collections = sqlx::query_as::<_, Collection>(
            "SELECT id, project_id, name, slug, position, created_at, updated_at \
             FROM collections WHERE project_id = $1 ORDER BY position ASC",
        )
        .bind(project_id)
        .fetch_all(pool)
        .await
        .context("failed to list collections")?;

        Ok(collections)
    }
}
