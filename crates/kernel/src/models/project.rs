//! Project model.
//!
//! A project is the tenant boundary: it owns collections, content, and
//! attribute rows, and deletion cascades to all of them.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Project record (tenant).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    /// Unique identifier (UUIDv7).
    pub id: Uuid,

    pub name: String,

    pub description: Option<String>,

    /// Locale used for content created without an explicit locale.
    pub default_locale: String,

    /// Allowed locale codes (JSONB array).
    pub locales: serde_json::Value,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Find a project by ID.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        let project = sqlx::query_as::<_, Project>(
            "SELECT id, name, description, default_locale, locales, created_at, updated_at \
             FROM projects WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch project by id")?;

        Ok(project)
    }

    /// Allowed locale codes as strings.
    pub fn locale_codes(&self) -> Vec<String> {
        self.locales
            .as_array()
            .map(|a| {
                a.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn locale_codes_from_jsonb_array() {
        let project = Project {
            id: Uuid::nil(),
            name: "demo".to_string(),
            description: None,
            default_locale: "en".to_string(),
            locales: serde_json::json!(["en", "tr", "de"]),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert_eq!(project.locale_codes(), vec!["en", "tr", "de"]);
    }

    #[test]
    fn locale_codes_tolerates_non_array() {
        let project = Project {
            id: Uuid::nil(),
            name: "demo".to_string(),
            description: None,
            default_locale: "en".to_string(),
            locales: serde_json::json!(null),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert!(project.locale_codes().is_empty());
    }
}
