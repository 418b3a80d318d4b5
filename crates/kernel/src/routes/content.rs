//! Content API route handlers.
//!
//! Thin HTTP surface over the engine operations. The scope (project by id,
//! collection by slug) is resolved per request and passed explicitly into
//! every engine call; authentication is a concern of the deployment's
//! gateway, not of this layer.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use crate::content::{CreateContent, DeleteMode, UpdateContent};
use crate::error::{EngineError, EngineResult};
use crate::models::{Collection, Project};
use crate::query::{QueryRequest, ResultSet, Scope};
use crate::state::AppState;

/// Create the content API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/projects/{project_id}/collections/{slug}/query",
            post(query_content),
        )
        .route(
            "/api/projects/{project_id}/collections/{slug}/content",
            post(create_content),
        )
        .route(
            "/api/projects/{project_id}/collections/{slug}/content/{id}",
            get(get_content)
                .put(update_content)
                .delete(delete_content),
        )
        .route(
            "/api/projects/{project_id}/collections/{slug}/content/{id}/restore",
            post(restore_content),
        )
}

/// Resolve the (project, collection) scope or fail with not-found.
async fn resolve_scope(state: &AppState, project_id: Uuid, slug: &str) -> EngineResult<Scope> {
    let project = Project::find_by_id(state.db(), project_id)
        .await?
        .ok_or(EngineError::NotFound)?;

    let collection = Collection::find_by_slug(state.db(), project.id, slug)
        .await?
        .ok_or(EngineError::NotFound)?;

    Ok(Scope {
        project_id: project.id,
        collection_id: collection.id,
    })
}

/// Execute a filter/sort/pagination query against a collection.
async fn query_content(
    State(state): State<AppState>,
    Path((project_id, slug)): Path<(Uuid, String)>,
    Json(request): Json<QueryRequest>,
) -> EngineResult<Response> {
    let scope = resolve_scope(&state, project_id, &slug).await?;
    let result = state.query().query(&scope, &request).await?;

    let response = match result {
        ResultSet::Count(count) => Json(serde_json::json!({ "count": count })).into_response(),
        ResultSet::One(record) => Json(*record).into_response(),
        ResultSet::Many(records) => Json(records).into_response(),
    };

    Ok(response)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GetContentParams {
    timestamps: bool,
}

/// Fetch a single published record by id.
async fn get_content(
    State(state): State<AppState>,
    Path((project_id, slug, id)): Path<(Uuid, String, Uuid)>,
    Query(params): Query<GetContentParams>,
) -> EngineResult<Response> {
    let scope = resolve_scope(&state, project_id, &slug).await?;
    let record = state.query().find_by_id(&scope, id, params.timestamps).await?;
    Ok(Json(record).into_response())
}

/// Create a record.
async fn create_content(
    State(state): State<AppState>,
    Path((project_id, slug)): Path<(Uuid, String)>,
    Json(input): Json<CreateContent>,
) -> EngineResult<Response> {
    let scope = resolve_scope(&state, project_id, &slug).await?;
    let record = state.content().create(&scope, input).await?;
    Ok((StatusCode::CREATED, Json(record)).into_response())
}

/// Update a record.
async fn update_content(
    State(state): State<AppState>,
    Path((project_id, slug, id)): Path<(Uuid, String, Uuid)>,
    Json(input): Json<UpdateContent>,
) -> EngineResult<Response> {
    let scope = resolve_scope(&state, project_id, &slug).await?;
    let record = state.content().update(&scope, id, input).await?;
    Ok(Json(record).into_response())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DeleteContentParams {
    mode: DeleteMode,
}

/// Delete a record (soft by default, hard on request).
async fn delete_content(
    State(state): State<AppState>,
    Path((project_id, slug, id)): Path<(Uuid, String, Uuid)>,
    Query(params): Query<DeleteContentParams>,
) -> EngineResult<Response> {
    let scope = resolve_scope(&state, project_id, &slug).await?;
    state.content().delete(&scope, id, params.mode).await?;
    Ok(Json(serde_json::json!({ "message": "Record deleted." })).into_response())
}

/// Restore a trashed record.
async fn restore_content(
    State(state): State<AppState>,
    Path((project_id, slug, id)): Path<(Uuid, String, Uuid)>,
) -> EngineResult<Response> {
    let scope = resolve_scope(&state, project_id, &slug).await?;
    state.content().restore(&scope, id).await?;
    Ok(Json(serde_json::json!({ "message": "Record restored." })).into_response())
}
