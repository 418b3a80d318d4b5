//! Content service.
//!
//! CRUD operations over content records and their attribute rows. The
//! write path runs the validation rule generator and uniqueness checks,
//! encodes values through the codec, and commits the record row together
//! with its attribute rows in one transaction.

use anyhow::Context;
use chrono::Utc;
use serde_json::{Map, Value};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::content::{codec, validate};
use crate::error::{EngineError, EngineResult};
use crate::models::{Attribute, Content, Project};
use crate::query::{ContentRecord, QueryService, Scope};
use crate::schema::{FieldDefinition, FieldType, SchemaRegistry};

/// Input for creating a content record.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default)]
pub struct CreateContent {
    /// Locale override; the project default applies when absent.
    pub locale: Option<String>,

    /// Create as draft (no publish timestamp).
    pub draft: bool,

    /// Field name -> submitted value.
    pub fields: Map<String, Value>,
}

/// Input for updating a content record.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default)]
pub struct UpdateContent {
    pub locale: Option<String>,

    /// Unpublish: updating republishes unless the draft flag is set.
    pub draft: bool,

    pub fields: Map<String, Value>,
}

/// Delete mode: soft (trash) or hard (physical removal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteMode {
    #[default]
    Soft,
    Hard,
}

/// Service for content CRUD operations.
#[derive(Clone)]
pub struct ContentService {
    pool: PgPool,
    schema: SchemaRegistry,
    query: QueryService,
}

impl ContentService {
    /// Create a new content service.
    pub fn new(pool: PgPool, schema: SchemaRegistry) -> Self {
        let query = QueryService::new(pool.clone(), schema.clone());
        Self {
            pool,
            schema,
            query,
        }
    }

    /// Create a record with its attribute rows.
    pub async fn create(&self, scope: &Scope, input: CreateContent) -> EngineResult<ContentRecord> {
        let project = Project::find_by_id(&self.pool, scope.project_id)
            .await?
            .ok_or(EngineError::NotFound)?;

        let fields = self.schema.fields(scope.collection_id).await?;
        self.validate(scope, &fields, &input.fields, None).await?;

        let locale = input
            .locale
            .as_deref()
            .unwrap_or(&project.default_locale)
            .to_string();
        let published_at = (!input.draft).then(Utc::now);

        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to start transaction")?;

        let content = Content::insert(
            &mut tx,
            scope.project_id,
            scope.collection_id,
            &locale,
            published_at,
            None,
        )
        .await?;

        for (name, value) in &input.fields {
            let field = FieldDefinition::lookup(&fields, name)
                .ok_or_else(|| EngineError::UnknownField(name.clone()))?;

            if let Some(encoded) = codec::encode(field, value, None)? {
                Attribute::insert(
                    &mut tx,
                    scope.project_id,
                    scope.collection_id,
                    content.id,
                    name,
                    &encoded,
                )
                .await?;
            }
        }

        tx.commit().await.context("failed to commit transaction")?;

        info!(content_id = %content.id, collection_id = %scope.collection_id, "content created");
        self.query.find_record(scope, content.id).await
    }

    /// Update a record, upserting its attribute rows.
    pub async fn update(
        &self,
        scope: &Scope,
        id: Uuid,
        input: UpdateContent,
    ) -> EngineResult<ContentRecord> {
        let existing = Content::find_scoped(&self.pool, scope.project_id, scope.collection_id, id)
            .await?
            .ok_or(EngineError::NotFound)?;

        let fields = self.schema.fields(scope.collection_id).await?;
        self.validate(scope, &fields, &input.fields, Some(existing.id))
            .await?;

        let published_at = (!input.draft).then(Utc::now);

        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to start transaction")?;

        Content::update_state(&mut tx, id, input.locale.as_deref(), published_at, None)
            .await?
            .ok_or(EngineError::NotFound)?;

        for (name, value) in &input.fields {
            let field = FieldDefinition::lookup(&fields, name)
                .ok_or_else(|| EngineError::UnknownField(name.clone()))?;

            let current = Attribute::find_live(&self.pool, id, name).await?;
            let encoded = codec::encode(field, value, current.as_ref().map(|a| a.value.as_str()))?;

            match (current, encoded) {
                (Some(row), Some(new_value)) => {
                    Attribute::update_value(&mut tx, row.id, &new_value).await?;
                }
                (Some(row), None) => {
                    // An explicitly empty update clears the stored value.
                    // Password fields never reach here: blank re-encodes to
                    // the existing hash.
                    Attribute::update_value(&mut tx, row.id, "").await?;
                }
                (None, Some(new_value)) => {
                    Attribute::insert(
                        &mut tx,
                        scope.project_id,
                        scope.collection_id,
                        id,
                        name,
                        &new_value,
                    )
                    .await?;
                }
                (None, None) => {}
            }
        }

        tx.commit().await.context("failed to commit transaction")?;

        info!(content_id = %id, "content updated");
        self.query.find_record(scope, id).await
    }

    /// Delete a record: soft sets the tombstone on the record and its
    /// attributes in lockstep; hard physically removes both.
    pub async fn delete(&self, scope: &Scope, id: Uuid, mode: DeleteMode) -> EngineResult<()> {
        let existing =
            Content::find_scoped_with_trashed(&self.pool, scope.project_id, scope.collection_id, id)
                .await?
                .ok_or(EngineError::NotFound)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to start transaction")?;

        match mode {
            DeleteMode::Soft => {
                if !Content::soft_delete(&mut tx, existing.id).await? {
                    return Err(EngineError::NotFound);
                }
                Attribute::soft_delete_for_content(&mut tx, existing.id).await?;
            }
            DeleteMode::Hard => {
                Attribute::hard_delete_for_content(&mut tx, existing.id).await?;
                if !Content::hard_delete(&mut tx, existing.id).await? {
                    return Err(EngineError::NotFound);
                }
            }
        }

        tx.commit().await.context("failed to commit transaction")?;

        info!(content_id = %id, mode = ?mode, "content deleted");
        Ok(())
    }

    /// Restore a trashed record and its attributes.
    pub async fn restore(&self, scope: &Scope, id: Uuid) -> EngineResult<()> {
        let existing =
            Content::find_scoped_with_trashed(&self.pool, scope.project_id, scope.collection_id, id)
                .await?
                .ok_or(EngineError::NotFound)?;

        if !existing.is_trashed() {
            return Err(EngineError::NotFound);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to start transaction")?;

        Content::restore(&mut tx, existing.id).await?;
        Attribute::restore_for_content(&mut tx, existing.id).await?;

        tx.commit().await.context("failed to commit transaction")?;

        info!(content_id = %id, "content restored");
        Ok(())
    }

    /// Run rule validation and uniqueness checks, aggregating failures.
    async fn validate(
        &self,
        scope: &Scope,
        fields: &[FieldDefinition],
        values: &Map<String, Value>,
        exclude_content: Option<Uuid>,
    ) -> EngineResult<()> {
        let rules = validate::rules_for(fields);
        let mut errors = validate::apply_rules(&rules, fields, values);

        if errors.is_empty() {
            let unique = validate::check_unique(
                &self.pool,
                scope.collection_id,
                fields,
                values,
                exclude_content,
            )
            .await?;
            errors.merge(unique);
        }

        if errors.is_empty() {
            return Ok(());
        }
        Err(EngineError::Validation(errors))
    }

    /// Decode a record's stored values into their typed forms.
    ///
    /// Materialized records carry stored string values; this helper is for
    /// callers that want typed lists and parsed JSON instead.
    pub fn decode_fields(
        fields: &[FieldDefinition],
        record: &ContentRecord,
    ) -> EngineResult<Map<String, Value>> {
        let mut decoded = Map::new();
        for (name, stored) in &record.fields {
            let field_type = FieldDefinition::lookup(fields, name)
                .map(|f| f.field_type)
                .unwrap_or(FieldType::Text);
            decoded.insert(name.clone(), codec::decode(field_type, stored)?);
        }
        Ok(decoded)
    }
}
