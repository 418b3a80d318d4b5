//! Sort planner.
//!
//! Parses `"field:direction"` sort specifications and attaches ORDER BY
//! clauses. Core fields sort on their column; attribute fields sort on a
//! correlated lookup of the field's most-recently-created live value.
//! Attribute ordering compares the stored string form, so numeric-looking
//! values order lexicographically ("5" sorts after "10" descending).

use sea_query::{Alias, Expr, ExprTrait, Order, PostgresQueryBuilder, Query, SelectStatement};

use crate::error::{EngineError, EngineResult};
use crate::query::types::{SortDirection, SortKey, is_core_field};
use crate::schema::FieldDefinition;

/// Parse a sort specification: comma-joined `field:direction` pairs.
pub fn parse_sort(raw: &str) -> EngineResult<Vec<SortKey>> {
    let mut keys = Vec::new();

    for entry in raw.split(',') {
        let parts: Vec<&str> = entry.split(':').collect();
        let [field, direction] = parts.as_slice() else {
            return Err(EngineError::MalformedSort(format!(
                "sort entry [{entry}] must be field:direction"
            )));
        };

        let direction = match direction.to_ascii_lowercase().as_str() {
            "asc" => SortDirection::Asc,
            "desc" => SortDirection::Desc,
            other => {
                return Err(EngineError::MalformedSort(format!(
                    "sort direction [{other}] must be asc or desc"
                )));
            }
        };

        keys.push(SortKey {
            field: field.to_string(),
            direction,
        });
    }

    Ok(keys)
}

/// Planner that attaches ORDER BY clauses for one collection's schema.
pub struct SortPlanner<'a> {
    fields: &'a [FieldDefinition],
}

impl<'a> SortPlanner<'a> {
    pub fn new(fields: &'a [FieldDefinition]) -> Self {
        Self { fields }
    }

    /// Apply sort keys in order. The caller appends its own final
    /// tie-break (record id) so ordering is total.
    pub fn apply(&self, query: &mut SelectStatement, keys: &[SortKey]) -> EngineResult<()> {
        for key in keys {
            let order = match key.direction {
                SortDirection::Asc => Order::Asc,
                SortDirection::Desc => Order::Desc,
            };

            if is_core_field(&key.field) {
                query.order_by((Alias::new("content"), Alias::new(key.field.as_str())), order);
                continue;
            }

            if FieldDefinition::lookup(self.fields, &key.field).is_none() {
                return Err(EngineError::UnknownField(key.field.clone()));
            }

            query.order_by_expr(latest_value_subquery(&key.field), order);
        }

        Ok(())
    }
}

/// Correlated subquery selecting the most-recently-created live value of an
/// attribute field for the outer content row.
fn latest_value_subquery(field_name: &str) -> sea_query::SimpleExpr {
    let mut sub = Query::select();
    sub.column((Alias::new("m"), Alias::new("value")))
        .from_as(Alias::new("content_attribute"), Alias::new("m"))
        .and_where(
            Expr::col((Alias::new("m"), Alias::new("content_id")))
                .equals((Alias::new("content"), Alias::new("id"))),
        )
        .and_where(Expr::col((Alias::new("m"), Alias::new("field_name"))).eq(field_name))
        .and_where(Expr::col((Alias::new("m"), Alias::new("deleted_at"))).is_null())
        .order_by((Alias::new("m"), Alias::new("created_at")), Order::Desc)
        .limit(1);

    Expr::cust(format!("({})", sub.to_string(PostgresQueryBuilder)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::schema::{FieldOptions, FieldType, FieldValidations};
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

    fn plan_sql(fields: &[FieldDefinition], spec: &str) -> String {
        let keys = parse_sort(spec).unwrap();
        let planner = SortPlanner::new(fields);
        let mut query = Query::select();
        query.expr(Expr::val(1)).from(Alias::new("content"));
        planner.apply(&mut query, &keys).unwrap();
        query.to_string(PostgresQueryBuilder)
    }

    #[test]
    fn parse_multi_key_spec() {
        let keys = parse_sort("price:desc,name:asc").unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].field, "price");
        assert_eq!(keys[0].direction, SortDirection::Desc);
        assert_eq!(keys[1].direction, SortDirection::Asc);
    }

    #[test]
    fn direction_is_case_insensitive() {
        let keys = parse_sort("price:DESC").unwrap();
        assert_eq!(keys[0].direction, SortDirection::Desc);
    }

    #[test]
    fn entry_without_direction_is_malformed() {
        let err = parse_sort("price").unwrap_err();
        assert!(matches!(err, EngineError::MalformedSort(_)));
    }

    #[test]
    fn entry_with_extra_separator_is_malformed() {
        let err = parse_sort("price:desc:extra").unwrap_err();
        assert!(matches!(err, EngineError::MalformedSort(_)));
    }

    #[test]
    fn invalid_direction_is_malformed() {
        let err = parse_sort("price:down").unwrap_err();
        assert!(matches!(err, EngineError::MalformedSort(_)));
    }

    #[test]
    fn core_field_sorts_on_column() {
        let fields = vec![field("price", FieldType::Number)];
        let sql = plan_sql(&fields, "created_at:desc");
        assert!(sql.contains("ORDER BY \"content\".\"created_at\" DESC"), "{sql}");
    }

    #[test]
    fn attribute_field_sorts_on_latest_value_subquery() {
        let fields = vec![field("price", FieldType::Number)];
        let sql = plan_sql(&fields, "price:desc");

        assert!(sql.contains("ORDER BY (SELECT \"m\".\"value\""), "{sql}");
        assert!(sql.contains("\"m\".\"field_name\" = 'price'"), "{sql}");
        assert!(sql.contains("ORDER BY \"m\".\"created_at\" DESC"), "{sql}");
        assert!(sql.contains("LIMIT 1"), "{sql}");
        assert!(sql.contains("\"m\".\"deleted_at\" IS NULL"), "{sql}");
    }

    #[test]
    fn multiple_keys_apply_in_order() {
        let fields = vec![
            field("price", FieldType::Number),
            field("name", FieldType::Text),
        ];
        let sql = plan_sql(&fields, "price:desc,name:asc");

        let price_at = sql.find("\"field_name\" = 'price'").unwrap();
        let name_at = sql.find("\"field_name\" = 'name'").unwrap();
        assert!(price_at < name_at, "{sql}");
    }

    #[test]
    fn unknown_attribute_field_is_rejected() {
        let fields = vec![field("price", FieldType::Number)];
        let keys = parse_sort("missing:asc").unwrap();
        let planner = SortPlanner::new(&fields);
        let mut query = Query::select();
        query.expr(Expr::val(1)).from(Alias::new("content"));
        let err = planner.apply(&mut query, &keys).unwrap_err();
        assert!(matches!(err, EngineError::UnknownField(name) if name == "missing"));
    }
}
