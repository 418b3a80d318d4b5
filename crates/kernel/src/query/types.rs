//! Query engine types.
//!
//! Provides type definitions for the declarative filter engine:
//! - FilterExpr: tagged expression tree (And/Or/Compare)
//! - CompareOp / Operand: per-clause operator and its parsed operand
//! - QueryRequest / ResultSet: the engine's request and result shapes
//! - StateMode: publish/trash visibility selection

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fields stored on the content row itself rather than in the attribute
/// store. Everything else must resolve against the collection schema.
pub const CORE_FIELDS: &[&str] = &["id", "locale", "created_at", "updated_at", "published_at"];

/// Core fields holding timestamps; ordered comparisons against these use
/// the calendar date, not the stored instant.
pub const CORE_DATE_FIELDS: &[&str] = &["created_at", "updated_at", "published_at"];

/// Check whether a filter/sort field targets the content row.
pub fn is_core_field(name: &str) -> bool {
    CORE_FIELDS.contains(&name)
}

/// Check whether a core field is date-valued.
pub fn is_core_date_field(name: &str) -> bool {
    CORE_DATE_FIELDS.contains(&name)
}

/// The (project, collection) pair restricting every engine operation.
///
/// Always passed explicitly; the engine holds no ambient tenant state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scope {
    pub project_id: Uuid,
    pub collection_id: Uuid,
}

/// A filter expression, translated from the wire grammar into an explicit
/// tree so the compiler is a plain recursive evaluator.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    /// All children must match.
    And(Vec<FilterExpr>),
    /// Any child must match.
    Or(Vec<FilterExpr>),
    /// A single field comparison.
    Compare(Comparison),
}

/// One field comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub field: String,
    pub op: CompareOp,
    pub operand: Operand,
}

/// Comparison operators of the wire grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    /// Exact match; on a relation field, membership in the stored list.
    Eq,
    /// Value mismatch.
    Not,
    /// Membership in a literal list.
    In,
    /// Absence from a literal list.
    NotIn,
    /// Ordered comparisons; numeric/date-typed when the field is.
    Lt,
    Lte,
    Gt,
    Gte,
    /// Inclusive range with exactly two bounds.
    Between,
    NotBetween,
    /// Substring containment.
    Like,
    /// No live attribute row with a non-empty value exists.
    Null,
    /// A live attribute row with a non-empty value exists.
    NotNull,
}

impl CompareOp {
    /// Parse a wire operator key.
    pub fn parse(key: &str) -> Option<Self> {
        match key {
            "not" => Some(CompareOp::Not),
            "in" => Some(CompareOp::In),
            "not_in" => Some(CompareOp::NotIn),
            "lt" => Some(CompareOp::Lt),
            "lte" => Some(CompareOp::Lte),
            "gt" => Some(CompareOp::Gt),
            "gte" => Some(CompareOp::Gte),
            "between" => Some(CompareOp::Between),
            "not_between" => Some(CompareOp::NotBetween),
            "like" => Some(CompareOp::Like),
            "null" => Some(CompareOp::Null),
            "not_null" => Some(CompareOp::NotNull),
            _ => None,
        }
    }
}

/// Parsed operand for a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// No operand (null / not_null).
    None,
    /// A single scalar, in its wire text form.
    Value(String),
    /// A literal list (in / not_in).
    List(Vec<String>),
    /// Exactly two bounds (between / not_between).
    Range(String, String),
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Publish/trash visibility selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateMode {
    /// Published records only (default).
    #[default]
    Published,
    /// Draft records only.
    OnlyDraft,
    /// Both drafts and published records.
    All,
    /// Soft-deleted records only.
    Trashed,
}

/// A query request against one collection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct QueryRequest {
    /// Filter expression in the wire grammar (map of clauses or groups).
    #[serde(rename = "where")]
    pub filter: Option<serde_json::Value>,

    /// Relation lookups: relation field -> { target field -> value }.
    #[serde(rename = "where_relation")]
    pub relation_filter: Option<serde_json::Value>,

    /// Sort specification: "field:asc,other:desc".
    pub sort: Option<String>,

    /// Pagination. `offset` requires `limit`.
    pub offset: Option<u64>,
    pub limit: Option<u64>,

    pub state: StateMode,

    /// Return only the scoped cardinality, computed before pagination.
    pub count: bool,

    /// Include lifecycle timestamps in the record projection.
    pub timestamps: bool,

    /// Return only the first record; fail with not-found when empty.
    pub first: bool,
}

/// Lifecycle timestamps, attached to a record projection on request.
#[derive(Debug, Clone, Serialize)]
pub struct RecordTimestamps {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

/// A materialized content record: row identity plus the live attribute
/// values as a field name -> stored value map.
#[derive(Debug, Clone, Serialize)]
pub struct ContentRecord {
    pub id: Uuid,
    pub project_id: Uuid,
    pub collection_id: Uuid,
    pub locale: String,

    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<RecordTimestamps>,

    pub fields: BTreeMap<String, String>,
}

/// Result of a query.
#[derive(Debug, Clone)]
pub enum ResultSet {
    /// Count mode: the scoped cardinality.
    Count(i64),
    /// First mode: exactly one record.
    One(Box<ContentRecord>),
    /// The scoped, ordered, paginated records.
    Many(Vec<ContentRecord>),
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn core_field_routing() {
        for name in ["id", "locale", "created_at", "updated_at", "published_at"] {
            assert!(is_core_field(name));
        }
        assert!(!is_core_field("title"));
        assert!(is_core_date_field("published_at"));
        assert!(!is_core_date_field("id"));
        assert!(!is_core_date_field("locale"));
    }

    #[test]
    fn compare_op_parses_wire_keys() {
        assert_eq!(CompareOp::parse("not"), Some(CompareOp::Not));
        assert_eq!(CompareOp::parse("not_between"), Some(CompareOp::NotBetween));
        assert_eq!(CompareOp::parse("like"), Some(CompareOp::Like));
        assert_eq!(CompareOp::parse("equals"), None);
    }

    #[test]
    fn state_mode_wire_names() {
        assert_eq!(
            serde_json::from_str::<StateMode>("\"only_draft\"").unwrap(),
            StateMode::OnlyDraft
        );
        assert_eq!(
            serde_json::from_str::<StateMode>("\"trashed\"").unwrap(),
            StateMode::Trashed
        );
    }

    #[test]
    fn query_request_defaults() {
        let req: QueryRequest = serde_json::from_str("{}").unwrap();
        assert!(req.filter.is_none());
        assert_eq!(req.state, StateMode::Published);
        assert!(!req.count);
        assert!(!req.timestamps);
    }

    #[test]
    fn query_request_parses_wire_shape() {
        let req: QueryRequest = serde_json::from_value(serde_json::json!({
            "where": {"title": {"like": "rust"}},
            "sort": "price:desc",
            "offset": 5,
            "limit": 10,
            "state": "all",
            "timestamps": true
        }))
        .unwrap();

        assert!(req.filter.is_some());
        assert_eq!(req.sort.as_deref(), Some("price:desc"));
        assert_eq!(req.offset, Some(5));
        assert_eq!(req.limit, Some(10));
        assert_eq!(req.state, StateMode::All);
        assert!(req.timestamps);
    }

    #[test]
    fn record_serialization_omits_timestamps_by_default() {
        let record = ContentRecord {
            id: Uuid::nil(),
            project_id: Uuid::nil(),
            collection_id: Uuid::nil(),
            locale: "en".to_string(),
            timestamps: None,
            fields: BTreeMap::from([("title".to_string(), "hello".to_string())]),
        };

        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("created_at"));
        assert!(json.contains("\"title\":\"hello\""));
    }

    #[test]
    fn record_serialization_flattens_timestamps() {
        let now = Utc::now();
        let record = ContentRecord {
            id: Uuid::nil(),
            project_id: Uuid::nil(),
            collection_id: Uuid::nil(),
            locale: "en".to_string(),
            timestamps: Some(RecordTimestamps {
                created_at: now,
                updated_at: now,
                published_at: None,
            }),
            fields: BTreeMap::new(),
        };

        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("created_at").is_some());
        assert!(json.get("published_at").is_some_and(|v| v.is_null()));
        assert!(json.get("timestamps").is_none());
    }
}
