//! Query executor.
//!
//! Owns scoping, publish/trash state selection, pagination, count mode,
//! and result materialization. Builds the final SELECT with SeaQuery from
//! the compiled predicate tree and runs it over sqlx.

use sea_query::{Alias, Asterisk, Cond, Expr, ExprTrait, Order, PostgresQueryBuilder, Query};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::{Attribute, Content};
use crate::query::compiler::PredicateCompiler;
use crate::query::relation::RelationResolver;
use crate::query::sort::{SortPlanner, parse_sort};
use crate::query::types::{
    ContentRecord, FilterExpr, QueryRequest, RecordTimestamps, ResultSet, Scope, StateMode,
};
use crate::query::wire::parse_filter;
use crate::schema::SchemaRegistry;

/// Service executing filter/sort/pagination queries over one collection.
#[derive(Clone)]
pub struct QueryService {
    pool: PgPool,
    schema: SchemaRegistry,
}

impl QueryService {
    /// Create a new query service.
    pub fn new(pool: PgPool, schema: SchemaRegistry) -> Self {
        Self { pool, schema }
    }

    /// Execute a query request within a scope.
    pub async fn query(&self, scope: &Scope, request: &QueryRequest) -> EngineResult<ResultSet> {
        if request.offset.is_some() && request.limit.is_none() {
            return Err(EngineError::MalformedPagination(
                "offset must be used with limit".to_string(),
            ));
        }

        let fields = self.schema.fields(scope.collection_id).await?;
        let compiler = PredicateCompiler::new(*scope, &fields);

        let mut condition = Cond::all()
            .add(Expr::col((Alias::new("content"), Alias::new("project_id"))).eq(scope.project_id))
            .add(
                Expr::col((Alias::new("content"), Alias::new("collection_id")))
                    .eq(scope.collection_id),
            );
        condition = add_state_condition(condition, request.state);

        if let Some(raw) = &request.filter {
            let expr = parse_filter(raw)?;
            condition = condition.add(compiler.compile(&expr)?);
        }

        if let Some(raw) = &request.relation_filter {
            let resolver = RelationResolver::new(&self.pool, &self.schema);
            for comparison in resolver.resolve(scope, &fields, raw).await? {
                condition = condition.add(compiler.compile(&FilterExpr::Compare(comparison))?);
            }
        }

        // Count mode returns the scoped cardinality before pagination.
        if request.count {
            let mut count_query = Query::select();
            count_query
                .expr(Expr::col(Asterisk).count())
                .from(Alias::new("content"))
                .cond_where(condition);

            let sql = count_query.to_string(PostgresQueryBuilder);
            tracing::debug!(sql = %sql, "executing count query");
            let total: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
            return Ok(ResultSet::Count(total));
        }

        let mut query = Query::select();
        query
            .column((Alias::new("content"), Asterisk))
            .from(Alias::new("content"))
            .cond_where(condition);

        if let Some(raw) = &request.sort {
            let keys = parse_sort(raw)?;
            SortPlanner::new(&fields).apply(&mut query, &keys)?;
        }
        // Deterministic final tie-break.
        query.order_by((Alias::new("content"), Alias::new("id")), Order::Asc);

        if let Some(limit) = request.limit {
            query.limit(limit);
        }
        if let Some(offset) = request.offset {
            query.offset(offset);
        }

        let sql = query.to_string(PostgresQueryBuilder);
        tracing::debug!(sql = %sql, "executing query");
        let rows = sqlx::query_as::<_, Content>(&sql).fetch_all(&self.pool).await?;

        let include_deleted = request.state == StateMode::Trashed;
        let mut records = self
            .materialize(rows, request.timestamps, include_deleted)
            .await?;

        if request.first {
            if records.is_empty() {
                return Err(EngineError::NotFound);
            }
            return Ok(ResultSet::One(Box::new(records.remove(0))));
        }

        Ok(ResultSet::Many(records))
    }

    /// Fetch a single published record by id.
    pub async fn find_by_id(
        &self,
        scope: &Scope,
        id: Uuid,
        timestamps: bool,
    ) -> EngineResult<ContentRecord> {
        let content = Content::find_scoped(&self.pool, scope.project_id, scope.collection_id, id)
            .await?
            .filter(Content::is_published)
            .ok_or(EngineError::NotFound)?;

        let mut records = self.materialize(vec![content], timestamps, false).await?;
        // materialize returns one record per input row
        Ok(records.remove(0))
    }

    /// Fetch a single live record by id regardless of publish state, with
    /// timestamps attached. Used by the write path to echo saved records.
    pub async fn find_record(&self, scope: &Scope, id: Uuid) -> EngineResult<ContentRecord> {
        let content = Content::find_scoped(&self.pool, scope.project_id, scope.collection_id, id)
            .await?
            .ok_or(EngineError::NotFound)?;

        let mut records = self.materialize(vec![content], true, false).await?;
        Ok(records.remove(0))
    }

    /// Attach each record's attribute rows as a name -> value map.
    async fn materialize(
        &self,
        rows: Vec<Content>,
        timestamps: bool,
        include_deleted: bool,
    ) -> EngineResult<Vec<ContentRecord>> {
        let ids: Vec<Uuid> = rows.iter().map(|c| c.id).collect();
        let mut values = Attribute::map_for_contents(&self.pool, &ids, include_deleted).await?;

        Ok(rows
            .into_iter()
            .map(|content| ContentRecord {
                id: content.id,
                project_id: content.project_id,
                collection_id: content.collection_id,
                locale: content.locale,
                timestamps: timestamps.then_some(RecordTimestamps {
                    created_at: content.created_at,
                    updated_at: content.updated_at,
                    published_at: content.published_at,
                }),
                fields: values.remove(&content.id).unwrap_or_default(),
            })
            .collect())
    }
}

/// Publish/trash visibility predicates for a state mode.
fn add_state_condition(condition: Cond, state: StateMode) -> Cond {
    let published = || Expr::col((Alias::new("content"), Alias::new("published_at")));
    let deleted = || Expr::col((Alias::new("content"), Alias::new("deleted_at")));

    match state {
        StateMode::Published => condition
            .add(published().is_not_null())
            .add(deleted().is_null()),
        StateMode::OnlyDraft => condition.add(published().is_null()).add(deleted().is_null()),
        StateMode::All => condition.add(deleted().is_null()),
        StateMode::Trashed => condition.add(deleted().is_not_null()),
    }
}
