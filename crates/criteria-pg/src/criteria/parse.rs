//! Dynamic front door: parse the duck-typed JSON criteria object.
//!
//! ORM callers describe queries as loosely shaped JSON (`where`, `like`,
//! `or`, comparator keys, `sort`, `limit`, `skip`, `groupBy`, one aggregate
//! key). This module converts that shape into a validated [`Criteria`],
//! rejecting unrecognized keys eagerly instead of silently ignoring them.

use serde_json::Value as JsonValue;

use crate::error::{AdapterError, Result};
use crate::value::Value;

use super::{Aggregate, ComparisonOp, Criteria, Join, SortDirection, WhereNode};

/// Parse a full criteria object.
pub fn criteria_from_json(json: &JsonValue) -> Result<Criteria> {
    let object = match json {
        JsonValue::Object(map) => map,
        JsonValue::Null => return Ok(Criteria::default()),
        other => {
            return Err(AdapterError::UnsupportedCriteria(format!(
                "criteria must be an object, got {}",
                type_name(other)
            )))
        }
    };

    let mut criteria = Criteria::default();

    for (key, value) in object {
        match key.as_str() {
            "where" => criteria.where_clause = where_from_json(value)?,
            "sort" => criteria.sort = sort_from_json(value)?,
            "limit" => criteria.limit = Some(unsigned_from_json("limit", value)?),
            "skip" => criteria.skip = Some(unsigned_from_json("skip", value)?),
            "groupBy" => criteria.group_by = columns_from_json("groupBy", value)?,
            "sum" => criteria.aggregate = Some(Aggregate::Sum(columns_from_json("sum", value)?)),
            "average" => {
                criteria.aggregate = Some(Aggregate::Average(columns_from_json("average", value)?))
            }
            "min" => criteria.aggregate = Some(Aggregate::Min(columns_from_json("min", value)?)),
            "max" => criteria.aggregate = Some(Aggregate::Max(columns_from_json("max", value)?)),
            "joins" => criteria.joins = joins_from_json(value)?,
            other => return Err(AdapterError::UnsupportedOperator(other.to_string())),
        }
    }

    Ok(criteria)
}

/// Parse a `where` object into an expression tree.
///
/// A flat object is an AND over its keys; `or` takes an array of nested
/// clauses; `like` takes an object of column/pattern pairs.
pub fn where_from_json(json: &JsonValue) -> Result<Option<WhereNode>> {
    let object = match json {
        JsonValue::Null => return Ok(None),
        JsonValue::Object(map) => map,
        other => {
            return Err(AdapterError::UnsupportedCriteria(format!(
                "where must be an object, got {}",
                type_name(other)
            )))
        }
    };

    if object.is_empty() {
        return Ok(None);
    }

    let mut clauses = Vec::new();

    for (key, value) in object {
        match key.as_str() {
            "or" => {
                let branches = value.as_array().ok_or_else(|| {
                    AdapterError::UnsupportedCriteria("or expects an array of clauses".into())
                })?;
                let mut nodes = Vec::with_capacity(branches.len());
                for branch in branches {
                    match where_from_json(branch)? {
                        Some(node) => nodes.push(node),
                        None => {
                            return Err(AdapterError::UnsupportedCriteria(
                                "or branches must be non-empty clauses".into(),
                            ))
                        }
                    }
                }
                clauses.push(WhereNode::Or(nodes));
            }
            "like" => {
                let pairs = value.as_object().ok_or_else(|| {
                    AdapterError::UnsupportedCriteria(
                        "like expects an object of column/pattern pairs".into(),
                    )
                })?;
                for (column, pattern) in pairs {
                    clauses.push(WhereNode::Like(
                        column.clone(),
                        pattern_string(column, pattern)?,
                    ));
                }
            }
            column => clauses.extend(column_clauses(column, value)?),
        }
    }

    if clauses.is_empty() {
        return Ok(None);
    }
    Ok(Some(collapse(clauses)))
}

/// Clauses for a single column key: scalar equality, IN over an array, or an
/// operator object compiled in key order.
fn column_clauses(column: &str, value: &JsonValue) -> Result<Vec<WhereNode>> {
    match value {
        JsonValue::Array(items) => {
            let values = items
                .iter()
                .map(scalar_from_json)
                .collect::<Result<Vec<_>>>()?;
            Ok(vec![WhereNode::In(column.to_string(), values)])
        }
        JsonValue::Object(ops) => {
            let mut clauses = Vec::with_capacity(ops.len());
            for (op_key, operand) in ops {
                clauses.push(operator_clause(column, op_key, operand)?);
            }
            Ok(clauses)
        }
        scalar => Ok(vec![WhereNode::Equals(
            column.to_string(),
            scalar_from_json(scalar)?,
        )]),
    }
}

/// One operator-key entry under a column.
fn operator_clause(column: &str, op_key: &str, operand: &JsonValue) -> Result<WhereNode> {
    if let Some(op) = ComparisonOp::from_key(op_key) {
        return Ok(WhereNode::Compare(
            column.to_string(),
            op,
            scalar_from_json(operand)?,
        ));
    }

    match op_key {
        "not" | "!" => Ok(WhereNode::Not(
            column.to_string(),
            scalar_from_json(operand)?,
        )),
        "like" => Ok(WhereNode::Like(
            column.to_string(),
            pattern_string(column, operand)?,
        )),
        "contains" => Ok(WhereNode::Like(
            column.to_string(),
            format!("%{}%", pattern_string(column, operand)?),
        )),
        "startsWith" => Ok(WhereNode::Like(
            column.to_string(),
            format!("{}%", pattern_string(column, operand)?),
        )),
        "endsWith" => Ok(WhereNode::Like(
            column.to_string(),
            format!("%{}", pattern_string(column, operand)?),
        )),
        other => Err(AdapterError::UnsupportedOperator(other.to_string())),
    }
}

fn sort_from_json(json: &JsonValue) -> Result<Vec<(String, SortDirection)>> {
    let object = json.as_object().ok_or_else(|| {
        AdapterError::UnsupportedCriteria("sort expects an object of column/direction pairs".into())
    })?;

    let mut entries = Vec::with_capacity(object.len());
    for (column, direction) in object {
        let dir = match direction {
            JsonValue::Number(n) => SortDirection::from_numeric(n.as_i64().unwrap_or(-1)),
            JsonValue::String(s) if s.eq_ignore_ascii_case("asc") => SortDirection::Ascending,
            JsonValue::String(s) if s.eq_ignore_ascii_case("desc") => SortDirection::Descending,
            other => {
                return Err(AdapterError::UnsupportedCriteria(format!(
                    "sort direction for {} must be 1, -1, \"asc\", or \"desc\", got {}",
                    column,
                    type_name(other)
                )))
            }
        };
        entries.push((column.clone(), dir));
    }
    Ok(entries)
}

fn joins_from_json(json: &JsonValue) -> Result<Vec<Join>> {
    let items = json.as_array().ok_or_else(|| {
        AdapterError::UnsupportedCriteria("joins expects an array of join descriptors".into())
    })?;

    let mut joins = Vec::with_capacity(items.len());
    for item in items {
        let object = item.as_object().ok_or_else(|| {
            AdapterError::UnsupportedCriteria("join descriptor must be an object".into())
        })?;

        let child = required_string(object, "child")?;
        let parent_key = required_string(object, "parentKey")?;
        let child_key = required_string(object, "childKey")?;

        let mut join = Join::new(child, parent_key, child_key);
        if let Some(alias) = object.get("alias").and_then(JsonValue::as_str) {
            join = join.alias(alias);
        }
        if let Some(criteria) = object.get("criteria") {
            if !criteria.is_null() {
                join = join.criteria(criteria_from_json(criteria)?);
            }
        }
        joins.push(join);
    }
    Ok(joins)
}

fn required_string(
    object: &serde_json::Map<String, JsonValue>,
    key: &str,
) -> Result<String> {
    object
        .get(key)
        .and_then(JsonValue::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            AdapterError::UnsupportedCriteria(format!("join descriptor missing \"{}\"", key))
        })
}

/// Aggregate/groupBy column lists accept a single name or an array of names.
fn columns_from_json(key: &str, json: &JsonValue) -> Result<Vec<String>> {
    match json {
        JsonValue::String(s) => Ok(vec![s.clone()]),
        JsonValue::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    AdapterError::UnsupportedCriteria(format!(
                        "{} entries must be column names",
                        key
                    ))
                })
            })
            .collect(),
        other => Err(AdapterError::UnsupportedCriteria(format!(
            "{} must be a column name or array of column names, got {}",
            key,
            type_name(other)
        ))),
    }
}

fn unsigned_from_json(key: &str, json: &JsonValue) -> Result<u64> {
    json.as_u64().ok_or_else(|| {
        AdapterError::UnsupportedCriteria(format!("{} must be a non-negative integer", key))
    })
}

fn scalar_from_json(json: &JsonValue) -> Result<Value> {
    match json {
        JsonValue::Null => Ok(Value::Null),
        JsonValue::Bool(b) => Ok(Value::Bool(*b)),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Integer(i))
            } else {
                Ok(Value::Float(n.as_f64().unwrap_or_default()))
            }
        }
        JsonValue::String(s) => Ok(Value::Text(s.clone())),
        other => Err(AdapterError::UnsupportedCriteria(format!(
            "operand must be a scalar, got {}",
            type_name(other)
        ))),
    }
}

fn pattern_string(column: &str, json: &JsonValue) -> Result<String> {
    match json {
        JsonValue::String(s) => Ok(s.clone()),
        JsonValue::Number(n) => Ok(n.to_string()),
        other => Err(AdapterError::UnsupportedCriteria(format!(
            "pattern for {} must be a string, got {}",
            column,
            type_name(other)
        ))),
    }
}

/// A single clause stands alone; multiple clauses AND together.
fn collapse(mut clauses: Vec<WhereNode>) -> WhereNode {
    if clauses.len() == 1 {
        clauses.pop().expect("len checked")
    } else {
        WhereNode::And(clauses)
    }
}

fn type_name(json: &JsonValue) -> &'static str {
    match json {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
