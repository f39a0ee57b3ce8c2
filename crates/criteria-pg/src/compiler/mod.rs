//! Criteria compiler: structured criteria in, parameterized SQL out.
//!
//! Statements reference values only through positional `$n` placeholders;
//! identifiers are always double-quote wrapped and must already exist in the
//! schema, so no caller-supplied string ever lands in SQL text unvalidated.

use crate::criteria::{Criteria, Join, WhereNode};
use crate::error::{AdapterError, Result};
use crate::schema::{SchemaRegistry, TableSchema};
use crate::value::Value;

/// Parameterized SQL text plus its ordered bound values.
///
/// Placeholder `$i` (1-indexed) corresponds to `parameters[i - 1]`, numbered
/// in left-to-right order of first use; the number of placeholders in `text`
/// always equals `parameters.len()`.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStatement {
    /// SQL text with positional placeholders.
    pub text: String,

    /// Bound values, in placeholder order.
    pub parameters: Vec<Value>,
}

/// Quote an identifier, doubling embedded quotes.
#[must_use]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Qualify a column with its table: `"table"."column"`.
#[must_use]
pub fn qualify(table: &str, column: &str) -> String {
    format!("{}.{}", quote_ident(table), quote_ident(column))
}

/// Collects bound values and hands out placeholders in first-use order.
#[derive(Debug, Default)]
struct ParamBinder {
    values: Vec<Value>,
}

impl ParamBinder {
    fn bind(&mut self, value: Value) -> String {
        self.values.push(value);
        format!("${}", self.values.len())
    }

    fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// Compile a SELECT statement for the given table and criteria.
pub fn compile_select(
    table: &str,
    registry: &SchemaRegistry,
    criteria: &Criteria,
) -> Result<CompiledStatement> {
    let schema = registry.require(table)?;
    validate_criteria(criteria)?;

    let mut binder = ParamBinder::default();
    let mut text = String::from("SELECT ");
    text.push_str(&projection(table, schema, registry, criteria)?);
    text.push_str(" FROM ");
    text.push_str(&quote_ident(table));

    for join in &criteria.joins {
        text.push(' ');
        text.push_str(&join_clause(table, schema, registry, join, &mut binder)?);
    }

    if let Some(node) = &criteria.where_clause {
        text.push_str(" WHERE ");
        text.push_str(&compile_node(node, table, schema, &mut binder)?);
    }

    if !criteria.group_by.is_empty() {
        let grouped: Vec<String> = criteria
            .group_by
            .iter()
            .map(|c| qualify(table, c))
            .collect();
        text.push_str(" GROUP BY ");
        text.push_str(&grouped.join(", "));
    }

    let order_by = order_clause(table, schema, registry, criteria)?;
    if !order_by.is_empty() {
        text.push_str(" ORDER BY ");
        text.push_str(&order_by.join(", "));
    }

    if let Some(limit) = criteria.limit {
        text.push_str(&format!(" LIMIT {}", limit));
    }
    if let Some(skip) = criteria.skip {
        text.push_str(&format!(" OFFSET {}", skip));
    }

    Ok(CompiledStatement {
        text,
        parameters: binder.into_values(),
    })
}

/// Compile an INSERT for the given payload, returning the stored row.
pub fn compile_insert(
    table: &str,
    registry: &SchemaRegistry,
    data: &[(String, Value)],
) -> Result<CompiledStatement> {
    let schema = registry.require(table)?;
    for (column, _) in data {
        require_column(table, schema, column)?;
    }

    let mut binder = ParamBinder::default();
    let text = if data.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING *", quote_ident(table))
    } else {
        let columns: Vec<String> = data.iter().map(|(c, _)| quote_ident(c)).collect();
        let placeholders: Vec<String> = data
            .iter()
            .map(|(_, v)| binder.bind(v.clone()))
            .collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
            quote_ident(table),
            columns.join(", "),
            placeholders.join(", ")
        )
    };

    Ok(CompiledStatement {
        text,
        parameters: binder.into_values(),
    })
}

/// Compile an UPDATE: SET list from the payload, WHERE from the criteria.
///
/// The SET list precedes WHERE in the text, so SET parameters number first
/// and WHERE parameters continue the sequence — numbering always follows
/// final clause order.
pub fn compile_update(
    table: &str,
    registry: &SchemaRegistry,
    criteria: &Criteria,
    data: &[(String, Value)],
) -> Result<CompiledStatement> {
    let schema = registry.require(table)?;
    if data.is_empty() {
        return Err(AdapterError::UnsupportedCriteria(
            "update requires a non-empty payload".into(),
        ));
    }
    for (column, _) in data {
        require_column(table, schema, column)?;
    }

    let mut binder = ParamBinder::default();
    let assignments: Vec<String> = data
        .iter()
        .map(|(column, value)| format!("{} = {}", quote_ident(column), binder.bind(value.clone())))
        .collect();

    let mut text = format!(
        "UPDATE {} SET {}",
        quote_ident(table),
        assignments.join(", ")
    );

    if let Some(node) = &criteria.where_clause {
        text.push_str(" WHERE ");
        text.push_str(&compile_node(node, table, schema, &mut binder)?);
    }
    text.push_str(" RETURNING *");

    Ok(CompiledStatement {
        text,
        parameters: binder.into_values(),
    })
}

/// Compile a DELETE with the same WHERE semantics as SELECT.
pub fn compile_delete(
    table: &str,
    registry: &SchemaRegistry,
    criteria: &Criteria,
) -> Result<CompiledStatement> {
    let schema = registry.require(table)?;

    let mut binder = ParamBinder::default();
    let mut text = format!("DELETE FROM {}", quote_ident(table));

    if let Some(node) = &criteria.where_clause {
        text.push_str(" WHERE ");
        text.push_str(&compile_node(node, table, schema, &mut binder)?);
    }
    text.push_str(" RETURNING *");

    Ok(CompiledStatement {
        text,
        parameters: binder.into_values(),
    })
}

/// Compile one expression-tree node into a clause fragment, binding its
/// parameters in textual order.
fn compile_node(
    node: &WhereNode,
    table: &str,
    schema: &TableSchema,
    binder: &mut ParamBinder,
) -> Result<String> {
    match node {
        WhereNode::Equals(column, value) => {
            let def = require_column(table, schema, column)?;
            if value.is_null() {
                return Ok(format!("{} IS NULL", qualify(table, column)));
            }
            Ok(comparison(table, column, def, "=", value, binder))
        }
        WhereNode::Compare(column, op, value) => {
            let def = require_column(table, schema, column)?;
            Ok(comparison(table, column, def, op.symbol(), value, binder))
        }
        WhereNode::Like(column, pattern) => {
            require_column(table, schema, column)?;
            let placeholder = binder.bind(Value::Text(pattern.to_lowercase()));
            Ok(format!(
                "LOWER({}) LIKE {}",
                qualify(table, column),
                placeholder
            ))
        }
        WhereNode::In(column, values) => {
            let def = require_column(table, schema, column)?;
            if values.is_empty() {
                // IN over an empty set matches nothing
                return Ok("false".to_string());
            }
            let folds = def.column_type.folds_case();
            let placeholders: Vec<String> = values
                .iter()
                .map(|v| binder.bind(if folds { v.folded() } else { v.clone() }))
                .collect();
            let lhs = if folds {
                format!("LOWER({})", qualify(table, column))
            } else {
                qualify(table, column)
            };
            Ok(format!("{} IN ({})", lhs, placeholders.join(", ")))
        }
        WhereNode::Not(column, value) => {
            require_column(table, schema, column)?;
            if value.is_null() {
                return Ok(format!("{} IS NOT NULL", qualify(table, column)));
            }
            let placeholder = binder.bind(value.clone());
            Ok(format!("{} <> {}", qualify(table, column), placeholder))
        }
        WhereNode::And(nodes) => {
            let parts = nodes
                .iter()
                .map(|n| compile_node(n, table, schema, binder))
                .collect::<Result<Vec<_>>>()?;
            Ok(parts.join(" AND "))
        }
        WhereNode::Or(nodes) => {
            let parts = nodes
                .iter()
                .map(|n| compile_node(n, table, schema, binder).map(|p| format!("({})", p)))
                .collect::<Result<Vec<_>>>()?;
            Ok(format!("({})", parts.join(" OR ")))
        }
    }
}

/// One binary comparison, with case folding for text columns.
fn comparison(
    table: &str,
    column: &str,
    def: &crate::schema::ColumnDef,
    symbol: &str,
    value: &Value,
    binder: &mut ParamBinder,
) -> String {
    let folds = def.column_type.folds_case() && matches!(value, Value::Text(_));
    let bound = if folds { value.folded() } else { value.clone() };
    let placeholder = binder.bind(bound);
    let lhs = if folds {
        format!("LOWER({})", qualify(table, column))
    } else {
        qualify(table, column)
    };
    format!("{} {} {}", lhs, symbol, placeholder)
}

/// Build the SELECT projection list.
fn projection(
    table: &str,
    schema: &TableSchema,
    registry: &SchemaRegistry,
    criteria: &Criteria,
) -> Result<String> {
    if let Some(aggregate) = &criteria.aggregate {
        let mut parts = Vec::new();
        for column in &criteria.group_by {
            require_column(table, schema, column)?;
            parts.push(qualify(table, column));
        }
        for column in aggregate.columns() {
            require_column(table, schema, column)?;
            parts.push(format!(
                "CAST({}({}) AS float) AS {}",
                aggregate.function(),
                qualify(table, column),
                column
            ));
        }
        return Ok(parts.join(", "));
    }

    let mut parts: Vec<String> = schema
        .columns()
        .iter()
        .map(|c| qualify(table, &c.name))
        .collect();

    for join in &criteria.joins {
        let child = registry.require(&join.child_table)?;
        for column in child.columns() {
            parts.push(format!(
                "{} AS {}",
                qualify(&join.child_table, &column.name),
                quote_ident(&format!("{}{}", join.column_prefix(), column.name))
            ));
        }
    }

    Ok(parts.join(", "))
}

/// Build one LEFT JOIN clause, folding the child criteria's WHERE into the
/// ON condition so unmatched parents still surface.
fn join_clause(
    table: &str,
    schema: &TableSchema,
    registry: &SchemaRegistry,
    join: &Join,
    binder: &mut ParamBinder,
) -> Result<String> {
    let child = registry.require(&join.child_table)?;
    require_column(table, schema, &join.parent_key)?;
    require_column(&join.child_table, child, &join.child_key)?;

    let mut clause = format!(
        "LEFT JOIN {} ON {} = {}",
        quote_ident(&join.child_table),
        qualify(&join.child_table, &join.child_key),
        qualify(table, &join.parent_key)
    );

    if let Some(criteria) = &join.criteria {
        if let Some(node) = &criteria.where_clause {
            let fragment = compile_node(node, &join.child_table, child, binder)?;
            clause.push_str(&format!(" AND ({})", fragment));
        }
    }

    Ok(clause)
}

/// Parent sort entries followed by each join's child sort entries.
fn order_clause(
    table: &str,
    schema: &TableSchema,
    registry: &SchemaRegistry,
    criteria: &Criteria,
) -> Result<Vec<String>> {
    let mut entries = Vec::new();
    for (column, direction) in &criteria.sort {
        require_column(table, schema, column)?;
        entries.push(format!(
            "{} {}",
            qualify(table, column),
            direction.keyword()
        ));
    }

    for join in &criteria.joins {
        if let Some(child_criteria) = &join.criteria {
            let child = registry.require(&join.child_table)?;
            for (column, direction) in &child_criteria.sort {
                require_column(&join.child_table, child, column)?;
                entries.push(format!(
                    "{} {}",
                    qualify(&join.child_table, column),
                    direction.keyword()
                ));
            }
        }
    }

    Ok(entries)
}

/// Eager structural validation: aggregate/groupBy pairing and the join
/// criteria subset a single flat statement can express.
fn validate_criteria(criteria: &Criteria) -> Result<()> {
    if !criteria.group_by.is_empty() && criteria.aggregate.is_none() {
        return Err(AdapterError::InvalidAggregateRequest);
    }

    if criteria.aggregate.is_some() && !criteria.joins.is_empty() {
        return Err(AdapterError::UnsupportedCriteria(
            "aggregates cannot be combined with joins".into(),
        ));
    }

    for join in &criteria.joins {
        if let Some(child) = &join.criteria {
            if child.limit.is_some() || child.skip.is_some() {
                return Err(AdapterError::UnsupportedCriteria(format!(
                    "per-child limit/skip on join \"{}\" is not expressible in a single statement",
                    join.alias
                )));
            }
            if child.aggregate.is_some() || !child.group_by.is_empty() || !child.joins.is_empty() {
                return Err(AdapterError::UnsupportedCriteria(format!(
                    "join \"{}\" criteria may only filter and sort",
                    join.alias
                )));
            }
        }
    }

    Ok(())
}

fn require_column<'a>(
    table: &str,
    schema: &'a TableSchema,
    column: &str,
) -> Result<&'a crate::schema::ColumnDef> {
    schema
        .column(column)
        .ok_or_else(|| AdapterError::unknown_column(table, column))
}
