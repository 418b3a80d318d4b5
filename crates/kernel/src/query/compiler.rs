//! Predicate compiler using SeaQuery.
//!
//! Compiles a [`FilterExpr`] tree into a WHERE condition over the content
//! row. Core fields become direct column predicates; attribute fields
//! become correlated EXISTS subqueries against the attribute store, one per
//! clause, all correlated on the same content id — which preserves the
//! row-level semantics of a single multi-join across the group.
//!
//! Compilation is pure: no I/O, no pool. Relation targets are resolved
//! before compilation (see the relation resolver).

use sea_query::{
    Alias, Cond, Expr, ExprTrait, PostgresQueryBuilder, Query, SelectStatement, SimpleExpr,
};

use crate::error::{EngineError, EngineResult};
use crate::query::types::{
    CompareOp, Comparison, FilterExpr, Operand, Scope, is_core_date_field, is_core_field,
};
use crate::schema::{FieldDefinition, FieldType};

/// Compiler for filter expressions over one collection's schema.
pub struct PredicateCompiler<'a> {
    scope: Scope,
    fields: &'a [FieldDefinition],
}

impl<'a> PredicateCompiler<'a> {
    /// Create a compiler for a scope and its field list.
    pub fn new(scope: Scope, fields: &'a [FieldDefinition]) -> Self {
        Self { scope, fields }
    }

    /// Compile an expression tree into a single condition.
    pub fn compile(&self, expr: &FilterExpr) -> EngineResult<SimpleExpr> {
        match expr {
            FilterExpr::And(children) => {
                if children.is_empty() {
                    return Ok(Expr::cust("TRUE"));
                }
                let mut cond = Cond::all();
                for child in children {
                    cond = cond.add(self.compile(child)?);
                }
                Ok(cond.into())
            }
            FilterExpr::Or(children) => {
                if children.is_empty() {
                    return Ok(Expr::cust("FALSE"));
                }
                let mut cond = Cond::any();
                for child in children {
                    cond = cond.add(self.compile(child)?);
                }
                Ok(cond.into())
            }
            FilterExpr::Compare(comparison) => self.compile_compare(comparison),
        }
    }

    fn compile_compare(&self, cmp: &Comparison) -> EngineResult<SimpleExpr> {
        if is_core_field(&cmp.field) {
            return self.compile_core(cmp);
        }

        let field = FieldDefinition::lookup(self.fields, &cmp.field)
            .ok_or_else(|| EngineError::UnknownField(cmp.field.clone()))?;

        self.compile_attribute(field, cmp)
    }

    /// Compile a predicate on a content-row column.
    ///
    /// Date-valued core fields compare by calendar date for equality and
    /// the ordered operators, and on the raw stored instant for everything
    /// else.
    fn compile_core(&self, cmp: &Comparison) -> EngineResult<SimpleExpr> {
        let column = || Expr::col((Alias::new("content"), Alias::new(cmp.field.as_str())));
        let by_date = is_core_date_field(&cmp.field)
            && matches!(
                cmp.op,
                CompareOp::Eq | CompareOp::Lt | CompareOp::Lte | CompareOp::Gt | CompareOp::Gte
            );

        if by_date {
            let value = expect_value(cmp)?;
            let sym = cmp_symbol(cmp.op);
            return Ok(Expr::cust_with_values(
                format!(
                    "CAST(\"content\".\"{}\" AS DATE) {sym} CAST($1 AS DATE)",
                    cmp.field
                ),
                [value.to_string()],
            ));
        }

        match cmp.op {
            CompareOp::Eq => Ok(column().eq(expect_value(cmp)?)),
            CompareOp::Not => Ok(column().ne(expect_value(cmp)?)),
            CompareOp::In => Ok(column().is_in(expect_list(cmp)?.to_vec())),
            CompareOp::NotIn => Ok(column().is_not_in(expect_list(cmp)?.to_vec())),
            CompareOp::Lt => Ok(column().lt(expect_value(cmp)?)),
            CompareOp::Lte => Ok(column().lte(expect_value(cmp)?)),
            CompareOp::Gt => Ok(column().gt(expect_value(cmp)?)),
            CompareOp::Gte => Ok(column().gte(expect_value(cmp)?)),
            CompareOp::Between | CompareOp::NotBetween => {
                let (low, high) = expect_range(cmp)?;
                let keyword = between_keyword(cmp.op);
                Ok(Expr::cust_with_values(
                    format!("\"content\".\"{}\" {keyword} $1 AND $2", cmp.field),
                    [low.to_string(), high.to_string()],
                ))
            }
            CompareOp::Like => Ok(column().like(contains_pattern(expect_value(cmp)?))),
            CompareOp::Null => Ok(column().is_null()),
            CompareOp::NotNull => Ok(column().is_not_null()),
        }
    }

    /// Compile a predicate on an attribute field as a correlated subquery.
    fn compile_attribute(
        &self,
        field: &FieldDefinition,
        cmp: &Comparison,
    ) -> EngineResult<SimpleExpr> {
        // The null operators test for the existence of a live row with a
        // non-empty value, not for SQL NULL on the value column.
        match cmp.op {
            CompareOp::Null => {
                let mut sub = self.attribute_base(&field.name);
                sub.and_where(Expr::col((Alias::new("m"), Alias::new("value"))).ne(""));
                return Ok(not_exists(sub));
            }
            CompareOp::NotNull => {
                let mut sub = self.attribute_base(&field.name);
                sub.and_where(Expr::col((Alias::new("m"), Alias::new("value"))).ne(""));
                return Ok(exists(sub));
            }
            _ => {}
        }

        let mut sub = self.attribute_base(&field.name);
        sub.and_where(self.value_condition(field, cmp)?);
        Ok(exists(sub))
    }

    /// Base attribute subquery: scoped to project, collection, and field,
    /// live rows only, correlated on the outer content row's id.
    fn attribute_base(&self, field_name: &str) -> SelectStatement {
        let mut sub = Query::select();
        sub.expr(Expr::val(1))
            .from_as(Alias::new("content_attribute"), Alias::new("m"))
            .and_where(
                Expr::col((Alias::new("m"), Alias::new("content_id")))
                    .equals((Alias::new("content"), Alias::new("id"))),
            )
            .and_where(
                Expr::col((Alias::new("m"), Alias::new("project_id"))).eq(self.scope.project_id),
            )
            .and_where(
                Expr::col((Alias::new("m"), Alias::new("collection_id")))
                    .eq(self.scope.collection_id),
            )
            .and_where(Expr::col((Alias::new("m"), Alias::new("field_name"))).eq(field_name))
            .and_where(Expr::col((Alias::new("m"), Alias::new("deleted_at"))).is_null());
        sub
    }

    /// The comparison against the stored value. Ordered operators are
    /// numeric for number fields and calendar-date for date fields, never
    /// lexicographic for those types.
    fn value_condition(&self, field: &FieldDefinition, cmp: &Comparison) -> EngineResult<SimpleExpr> {
        let value_col = || Expr::col((Alias::new("m"), Alias::new("value")));

        match cmp.op {
            CompareOp::Eq => {
                let value = expect_value(cmp)?;
                // Equality against a relation field is membership in the
                // comma-joined stored list, not plain string equality.
                if field.field_type == FieldType::Relation {
                    return Ok(Expr::cust_with_values(
                        "$1 = ANY(string_to_array(\"m\".\"value\", ','))",
                        [value.to_string()],
                    ));
                }
                Ok(value_col().eq(value))
            }
            CompareOp::Not => Ok(value_col().ne(expect_value(cmp)?)),
            CompareOp::In => Ok(value_col().is_in(expect_list(cmp)?.to_vec())),
            CompareOp::NotIn => Ok(value_col().is_not_in(expect_list(cmp)?.to_vec())),

            CompareOp::Lt | CompareOp::Lte | CompareOp::Gt | CompareOp::Gte => {
                let value = expect_value(cmp)?;
                let sym = cmp_symbol(cmp.op);
                if field.field_type.is_numeric() {
                    let number = parse_number(&cmp.field, value)?;
                    return Ok(Expr::cust_with_values(
                        format!("CAST(\"m\".\"value\" AS NUMERIC) {sym} $1"),
                        [number],
                    ));
                }
                if field.field_type.is_date() {
                    return Ok(Expr::cust_with_values(
                        format!("CAST(\"m\".\"value\" AS DATE) {sym} CAST($1 AS DATE)"),
                        [value.to_string()],
                    ));
                }
                match cmp.op {
                    CompareOp::Lt => Ok(value_col().lt(value)),
                    CompareOp::Lte => Ok(value_col().lte(value)),
                    CompareOp::Gt => Ok(value_col().gt(value)),
                    _ => Ok(value_col().gte(value)),
                }
            }

            CompareOp::Between | CompareOp::NotBetween => {
                let (low, high) = expect_range(cmp)?;
                let keyword = between_keyword(cmp.op);
                if field.field_type.is_numeric() {
                    let low = parse_number(&cmp.field, low)?;
                    let high = parse_number(&cmp.field, high)?;
                    return Ok(Expr::cust_with_values(
                        format!("CAST(\"m\".\"value\" AS NUMERIC) {keyword} $1 AND $2"),
                        [low, high],
                    ));
                }
                if field.field_type.is_date() {
                    return Ok(Expr::cust_with_values(
                        format!(
                            "CAST(\"m\".\"value\" AS DATE) {keyword} CAST($1 AS DATE) AND CAST($2 AS DATE)"
                        ),
                        [low.to_string(), high.to_string()],
                    ));
                }
                Ok(Expr::cust_with_values(
                    format!("\"m\".\"value\" {keyword} $1 AND $2"),
                    [low.to_string(), high.to_string()],
                ))
            }

            CompareOp::Like => Ok(value_col().like(contains_pattern(expect_value(cmp)?))),

            CompareOp::Null | CompareOp::NotNull => {
                unreachable!("null operators are compiled as existence checks")
            }
        }
    }
}

/// Wrap a subquery in EXISTS.
fn exists(sub: SelectStatement) -> SimpleExpr {
    Expr::cust(format!("EXISTS ({})", sub.to_string(PostgresQueryBuilder)))
}

/// Wrap a subquery in NOT EXISTS.
fn not_exists(sub: SelectStatement) -> SimpleExpr {
    Expr::cust(format!(
        "NOT EXISTS ({})",
        sub.to_string(PostgresQueryBuilder)
    ))
}

fn cmp_symbol(op: CompareOp) -> &'static str {
    match op {
        CompareOp::Eq => "=",
        CompareOp::Lt => "<",
        CompareOp::Lte => "<=",
        CompareOp::Gt => ">",
        CompareOp::Gte => ">=",
        _ => unreachable!("not an ordered operator"),
    }
}

fn between_keyword(op: CompareOp) -> &'static str {
    if op == CompareOp::NotBetween {
        "NOT BETWEEN"
    } else {
        "BETWEEN"
    }
}

/// Substring containment pattern with LIKE wildcards in the operand escaped.
fn contains_pattern(value: &str) -> String {
    format!("%{}%", escape_like(value))
}

/// Escape SQL LIKE wildcard characters (`%`, `_`, `\`) in a value.
pub(crate) fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn parse_number(field: &str, value: &str) -> EngineResult<f64> {
    value.parse::<f64>().map_err(|_| {
        EngineError::MalformedFilter(format!("operand for numeric field [{field}] must be numeric"))
    })
}

fn expect_value(cmp: &Comparison) -> EngineResult<&str> {
    match &cmp.operand {
        Operand::Value(v) => Ok(v),
        _ => Err(EngineError::MalformedFilter(format!(
            "operand for [{}] must be a scalar",
            cmp.field
        ))),
    }
}

fn expect_list(cmp: &Comparison) -> EngineResult<&[String]> {
    match &cmp.operand {
        Operand::List(items) => Ok(items),
        _ => Err(EngineError::MalformedFilter(format!(
            "operand for [{}] must be a list",
            cmp.field
        ))),
    }
}

fn expect_range(cmp: &Comparison) -> EngineResult<(&str, &str)> {
    match &cmp.operand {
        Operand::Range(low, high) => Ok((low, high)),
        _ => Err(EngineError::MalformedFilter(format!(
            "operand for [{}] must have exactly two bounds",
            cmp.field
        ))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::query::wire::parse_filter;
    use crate::schema::{FieldOptions, FieldType, FieldValidations, RelationOptions};
    use serde_json::json;
    use uuid::Uuid;

    fn field(name: &str, field_type: FieldType) -> FieldDefinition {
        FieldDefinition {
            id: Uuid::nil(),
            project_id: Uuid::nil(),
            collection_id: Uuid::nil(),
            name: name.to_string(),
            label: name.to_string(),
            field_type,
            description: None,
            placeholder: None,
            options: FieldOptions::default(),
            validations: FieldValidations::default(),
            position: 0,
        }
    }

    fn test_fields() -> Vec<FieldDefinition> {
        let mut author = field("author", FieldType::Relation);
        author.options = FieldOptions {
            relation: Some(RelationOptions {
                collection: Uuid::nil(),
                multiple: true,
            }),
            media: None,
        };
        vec![
            field("title", FieldType::Text),
            field("price", FieldType::Number),
            field("released", FieldType::Date),
            author,
        ]
    }

    fn compile_sql(filter: serde_json::Value) -> String {
        let fields = test_fields();
        let compiler = PredicateCompiler::new(
            Scope {
                project_id: Uuid::nil(),
                collection_id: Uuid::nil(),
            },
            &fields,
        );
        let expr = parse_filter(&filter).unwrap();
        let condition = compiler.compile(&expr).unwrap();

        let mut query = Query::select();
        query
            .expr(Expr::val(1))
            .from(Alias::new("content"))
            .and_where(condition);
        query.to_string(PostgresQueryBuilder)
    }

    fn compile_err(filter: serde_json::Value) -> EngineError {
        let fields = test_fields();
        let compiler = PredicateCompiler::new(
            Scope {
                project_id: Uuid::nil(),
                collection_id: Uuid::nil(),
            },
            &fields,
        );
        let expr = parse_filter(&filter).unwrap();
        compiler.compile(&expr).unwrap_err()
    }

    #[test]
    fn attribute_equality_compiles_to_correlated_exists() {
        let sql = compile_sql(json!({"title": "hello"}));

        assert!(sql.contains("EXISTS ("), "{sql}");
        assert!(sql.contains("\"m\".\"content_id\" = \"content\".\"id\""), "{sql}");
        assert!(sql.contains("\"m\".\"field_name\" = 'title'"), "{sql}");
        assert!(sql.contains("\"m\".\"value\" = 'hello'"), "{sql}");
        assert!(sql.contains("\"m\".\"deleted_at\" IS NULL"), "{sql}");
    }

    #[test]
    fn unknown_field_is_rejected() {
        let err = compile_err(json!({"missing": "x"}));
        assert!(matches!(err, EngineError::UnknownField(name) if name == "missing"));
    }

    #[test]
    fn eq_and_single_element_in_select_the_same_value() {
        let eq_sql = compile_sql(json!({"title": "v"}));
        let in_sql = compile_sql(json!({"title": {"in": "v"}}));

        assert!(eq_sql.contains("\"m\".\"value\" = 'v'"), "{eq_sql}");
        assert!(in_sql.contains("\"m\".\"value\" IN ('v')"), "{in_sql}");
    }

    #[test]
    fn numeric_field_ordered_comparison_casts() {
        let sql = compile_sql(json!({"price": {"gte": "10"}}));
        assert!(
            sql.contains("CAST(\"m\".\"value\" AS NUMERIC) >= 10"),
            "{sql}"
        );
    }

    #[test]
    fn numeric_field_rejects_non_numeric_operand() {
        let err = compile_err(json!({"price": {"lt": "cheap"}}));
        assert!(matches!(err, EngineError::MalformedFilter(_)));
    }

    #[test]
    fn date_field_ordered_comparison_casts() {
        let sql = compile_sql(json!({"released": {"lt": "2024-01-01"}}));
        assert!(
            sql.contains("CAST(\"m\".\"value\" AS DATE) < CAST('2024-01-01' AS DATE)"),
            "{sql}"
        );
    }

    #[test]
    fn text_field_between_is_inclusive_range() {
        let sql = compile_sql(json!({"title": {"between": "a,f"}}));
        assert!(sql.contains("\"m\".\"value\" BETWEEN 'a' AND 'f'"), "{sql}");
    }

    #[test]
    fn numeric_between_casts_both_bounds() {
        let sql = compile_sql(json!({"price": {"between": "3,7"}}));
        assert!(
            sql.contains("CAST(\"m\".\"value\" AS NUMERIC) BETWEEN 3 AND 7"),
            "{sql}"
        );
    }

    #[test]
    fn not_between_negates() {
        let sql = compile_sql(json!({"price": {"not_between": "3,7"}}));
        assert!(sql.contains("NOT BETWEEN"), "{sql}");
    }

    #[test]
    fn like_escapes_wildcards() {
        let sql = compile_sql(json!({"title": {"like": "100%_done"}}));
        assert!(!sql.contains("%100%_done%"), "{sql}");
        assert!(sql.contains("LIKE"), "{sql}");
    }

    #[test]
    fn relation_equality_is_list_membership() {
        let sql = compile_sql(json!({"author": "42"}));
        assert!(
            sql.contains("'42' = ANY(string_to_array(\"m\".\"value\", ','))"),
            "{sql}"
        );
    }

    #[test]
    fn null_sentinel_is_not_exists_with_non_empty_value() {
        let sql = compile_sql(json!({"title": "null"}));
        assert!(sql.contains("NOT EXISTS ("), "{sql}");
        assert!(sql.contains("\"m\".\"value\" <> ''"), "{sql}");
    }

    #[test]
    fn not_null_sentinel_is_exists_with_non_empty_value() {
        let sql = compile_sql(json!({"title": "not_null"}));
        assert!(sql.contains("EXISTS ("), "{sql}");
        assert!(!sql.contains("NOT EXISTS"), "{sql}");
        assert!(sql.contains("\"m\".\"value\" <> ''"), "{sql}");
    }

    #[test]
    fn core_date_field_equality_compares_by_calendar_date() {
        let sql = compile_sql(json!({"created_at": "2024-06-01"}));
        assert!(
            sql.contains("CAST(\"content\".\"created_at\" AS DATE) = CAST('2024-06-01' AS DATE)"),
            "{sql}"
        );
    }

    #[test]
    fn core_date_field_not_compares_raw_instant() {
        let sql = compile_sql(json!({"created_at": {"not": "2024-06-01T10:00:00Z"}}));
        assert!(!sql.contains("AS DATE"), "{sql}");
        assert!(
            sql.contains("\"content\".\"created_at\" <>"),
            "{sql}"
        );
    }

    #[test]
    fn core_field_in_list() {
        let sql = compile_sql(json!({"locale": {"in": "en,tr"}}));
        assert!(
            sql.contains("\"content\".\"locale\" IN ('en', 'tr')"),
            "{sql}"
        );
    }

    #[test]
    fn or_group_produces_disjunction() {
        let sql = compile_sql(json!({
            "0": {"title": "a"},
            "or": {"price": {"gt": 5}}
        }));
        assert!(sql.contains(" OR "), "{sql}");
    }

    #[test]
    fn group_clauses_share_no_join_but_correlate_on_content_id() {
        let sql = compile_sql(json!({
            "0": {"title": "a", "price": {"gt": 5}}
        }));
        // Two independent EXISTS, both correlated to the same outer row.
        assert_eq!(sql.matches("EXISTS (").count(), 2, "{sql}");
        assert_eq!(
            sql.matches("\"m\".\"content_id\" = \"content\".\"id\"").count(),
            2,
            "{sql}"
        );
    }

    #[test]
    fn attribute_subquery_is_tenant_scoped() {
        let sql = compile_sql(json!({"title": "x"}));
        assert!(sql.contains("\"m\".\"project_id\""), "{sql}");
        assert!(sql.contains("\"m\".\"collection_id\""), "{sql}");
    }

    #[test]
    fn escape_like_wildcards() {
        assert_eq!(escape_like("hello"), "hello");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b"), "a\\_b");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
    }
}
