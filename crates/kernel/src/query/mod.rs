//! EAV query engine.
//!
//! This module provides:
//! - wire: translation of the wire filter grammar into an expression tree
//! - PredicateCompiler: SeaQuery-based predicate compilation
//! - RelationResolver: cross-collection relation lookups
//! - SortPlanner: column and latest-attribute-value ordering
//! - QueryService: scoping, pagination, count mode, materialization

pub mod compiler;
pub mod executor;
pub mod relation;
pub mod sort;
pub mod types;
pub mod wire;

pub use compiler::PredicateCompiler;
pub use executor::QueryService;
pub use relation::RelationResolver;
pub use sort::{SortPlanner, parse_sort};
pub use types::{
    CompareOp, Comparison, ContentRecord, FilterExpr, Operand, QueryRequest, RecordTimestamps,
    ResultSet, Scope, SortDirection, SortKey, StateMode,
};
pub use wire::parse_filter;
