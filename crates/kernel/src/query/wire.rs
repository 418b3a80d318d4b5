//! Wire grammar translation.
//!
//! Filters arrive as nested key/value maps. A filter is either a single
//! group of field -> clause entries (all ANDed), or a grouped form where
//! every top-level key is a decimal index or the literal `or` and every
//! value is a group. Groups combine by AND, except the group keyed `or`,
//! which combines by OR against the conjunction of its siblings.
//!
//! This module only translates the wire shape into the [`FilterExpr`]
//! tree; semantics live in the compiler.

use serde_json::{Map, Value};

use crate::error::{EngineError, EngineResult};
use crate::query::types::{CompareOp, Comparison, FilterExpr, Operand};

/// Translate a wire filter into an expression tree.
pub fn parse_filter(raw: &Value) -> EngineResult<FilterExpr> {
    let Some(object) = raw.as_object() else {
        return Err(EngineError::MalformedFilter(
            "filter must be an object".to_string(),
        ));
    };

    if is_grouped(object) {
        parse_grouped(object)
    } else {
        parse_group(object)
    }
}

/// Grouped form: every key is a decimal index or `or`, every value a group.
fn is_grouped(object: &Map<String, Value>) -> bool {
    !object.is_empty()
        && object
            .iter()
            .all(|(k, v)| (k == "or" || k.parse::<usize>().is_ok()) && v.is_object())
}

fn parse_grouped(object: &Map<String, Value>) -> EngineResult<FilterExpr> {
    let mut and_groups = Vec::new();
    let mut or_group = None;

    for (key, value) in object {
        let Some(group) = value.as_object() else {
            return Err(EngineError::MalformedFilter(format!(
                "filter group [{key}] must be an object"
            )));
        };
        let expr = parse_group(group)?;
        if key == "or" {
            or_group = Some(expr);
        } else {
            and_groups.push(expr);
        }
    }

    let conjunction = match and_groups.len() {
        0 => None,
        1 => Some(and_groups.remove(0)),
        _ => Some(FilterExpr::And(and_groups)),
    };

    match (conjunction, or_group) {
        (Some(and), Some(or)) => Ok(FilterExpr::Or(vec![and, or])),
        (Some(and), None) => Ok(and),
        (None, Some(or)) => Ok(or),
        (None, None) => Ok(FilterExpr::And(Vec::new())),
    }
}

/// One group: field -> clause entries, combined by AND.
fn parse_group(object: &Map<String, Value>) -> EngineResult<FilterExpr> {
    let mut clauses = Vec::new();
    for (field, value) in object {
        clauses.push(FilterExpr::Compare(parse_clause(field, value)?));
    }

    if clauses.len() == 1 {
        return Ok(clauses.remove(0));
    }
    Ok(FilterExpr::And(clauses))
}

/// One clause: a bare value (equality, or a null sentinel) or an operator
/// object with exactly one operator key.
fn parse_clause(field: &str, value: &Value) -> EngineResult<Comparison> {
    if let Some(object) = value.as_object() {
        if object.len() != 1 {
            return Err(EngineError::MalformedFilter(format!(
                "clause for [{field}] must contain exactly one operator"
            )));
        }
        // Single entry guaranteed above.
        let (key, operand) = match object.iter().next() {
            Some(entry) => entry,
            None => unreachable!("object has exactly one entry"),
        };
        let op = CompareOp::parse(key).ok_or_else(|| {
            EngineError::MalformedFilter(format!("unknown operator [{key}] for [{field}]"))
        })?;

        let operand = parse_operand(field, op, operand)?;
        return Ok(Comparison {
            field: field.to_string(),
            op,
            operand,
        });
    }

    let Some(text) = scalar_text(value) else {
        return Err(EngineError::MalformedFilter(format!(
            "clause for [{field}] must be a scalar or an operator object"
        )));
    };

    // Bare sentinels select the null operators; anything else is equality.
    let (op, operand) = match text.as_str() {
        "null" => (CompareOp::Null, Operand::None),
        "not_null" => (CompareOp::NotNull, Operand::None),
        _ => (CompareOp::Eq, Operand::Value(text)),
    };

    Ok(Comparison {
        field: field.to_string(),
        op,
        operand,
    })
}

fn parse_operand(field: &str, op: CompareOp, raw: &Value) -> EngineResult<Operand> {
    match op {
        CompareOp::Null | CompareOp::NotNull => Ok(Operand::None),

        CompareOp::In | CompareOp::NotIn => {
            let items = list_items(raw).ok_or_else(|| {
                EngineError::MalformedFilter(format!(
                    "operand for [{field}] must be a list or comma-joined string"
                ))
            })?;
            Ok(Operand::List(items))
        }

        CompareOp::Between | CompareOp::NotBetween => {
            let bounds = list_items(raw).ok_or_else(|| {
                EngineError::MalformedFilter(format!(
                    "operand for [{field}] must be two comma-separated bounds"
                ))
            })?;
            let [low, high] = <[String; 2]>::try_from(bounds).map_err(|_| {
                EngineError::MalformedFilter(format!(
                    "between operand for [{field}] must have exactly two bounds"
                ))
            })?;
            Ok(Operand::Range(low, high))
        }

        CompareOp::Eq
        | CompareOp::Not
        | CompareOp::Lt
        | CompareOp::Lte
        | CompareOp::Gt
        | CompareOp::Gte
        | CompareOp::Like => {
            let text = scalar_text(raw).ok_or_else(|| {
                EngineError::MalformedFilter(format!("operand for [{field}] must be a scalar"))
            })?;
            Ok(Operand::Value(text))
        }
    }
}

/// A list operand: a JSON array of scalars, or a comma-joined string.
fn list_items(raw: &Value) -> Option<Vec<String>> {
    if let Some(items) = raw.as_array() {
        return items.iter().map(scalar_text).collect();
    }
    let text = scalar_text(raw)?;
    Some(text.split(',').map(str::to_string).collect())
}

/// The wire text form of a scalar.
fn scalar_text(raw: &Value) -> Option<String> {
    match raw {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
