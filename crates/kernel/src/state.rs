//! Application state shared across all handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::config::Config;
use crate::content::ContentService;
use crate::db;
use crate::query::QueryService;
use crate::schema::SchemaRegistry;

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// PostgreSQL connection pool.
    db: PgPool,

    /// Schema registry with per-collection field cache.
    schema: SchemaRegistry,

    /// Query engine.
    query: QueryService,

    /// Content write path.
    content: ContentService,
}

impl AppState {
    /// Create new application state with database connections.
    pub async fn new(config: &Config) -> Result<Self> {
        let db = db::create_pool(config)
            .await
            .context("failed to create database pool")?;

        db::run_migrations(&db)
            .await
            .context("failed to run migrations")?;

        let schema = SchemaRegistry::new(db.clone());
        let query = QueryService::new(db.clone(), schema.clone());
        let content = ContentService::new(db.clone(), schema.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                db,
                schema,
                query,
                content,
            }),
        })
    }

    /// Build state from an existing pool (used by tests).
    pub fn from_pool(db: PgPool) -> Self {
        let schema = SchemaRegistry::new(db.clone());
        let query = QueryService::new(db.clone(), schema.clone());
        let content = ContentService::new(db.clone(), schema.clone());

        Self {
            inner: Arc::new(AppStateInner {
                db,
                schema,
                query,
                content,
            }),
        }
    }

    /// Get the database pool.
    pub fn db(&self) -> &PgPool {
        &self.inner.db
    }

    /// Get the schema registry.
    pub fn schema(&self) -> &SchemaRegistry {
        &self.inner.schema
    }

    /// Get the query service.
    pub fn query(&self) -> &QueryService {
        &self.inner.query
    }

    /// Get the content service.
    pub fn content(&self) -> &ContentService {
        &self.inner.content
    }

    /// Check if PostgreSQL is healthy.
    pub async fn postgres_healthy(&self) -> bool {
        db::check_health(&self.inner.db).await
    }
}
