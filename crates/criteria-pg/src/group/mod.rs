//! Reshape flat, join-denormalized rows into nested parent/child graphs.
//!
//! A SELECT with joins yields one row per (parent, child) pair: the parent's
//! columns repeat for every matching child, and child columns surface under
//! `{alias}__` prefixes. Grouping collapses the duplication back into one
//! record per parent with a child sequence per association.

use std::collections::BTreeMap;
use std::collections::HashMap;

use crate::criteria::Join;
use crate::error::{AdapterError, Result};
use crate::schema::TableSchema;
use crate::value::{CastRow, Value};

/// One parent record with its association sequences.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedRecord {
    /// The parent's own columns, taken from the first row of its group.
    pub values: CastRow,

    /// Child records per association alias, in received-row order. Every
    /// join's alias is present, even when no child rows matched.
    pub children: BTreeMap<String, Vec<CastRow>>,
}

/// Group flat joined rows by the parent table's primary key.
///
/// Parents appear in first-seen order; each row contributes one child record
/// per join unless the join produced no match (all child columns NULL).
pub fn group_rows(
    rows: &[CastRow],
    parent: &TableSchema,
    joins: &[Join],
) -> Result<Vec<GroupedRecord>> {
    let pk = parent
        .primary_key_column()
        .ok_or_else(|| AdapterError::NoPrimaryKey(parent.name.clone()))?;

    let prefixes: Vec<(String, &Join)> = joins.iter().map(|j| (j.column_prefix(), j)).collect();

    let mut order: Vec<GroupedRecord> = Vec::new();
    let mut index_by_key: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let key = row
            .get(&pk.name)
            .map(value_key)
            .unwrap_or_else(|| value_key(&Value::Null));

        let record_index = match index_by_key.get(&key) {
            Some(&i) => i,
            None => {
                let mut values = CastRow::new();
                for (column, value) in row {
                    if !prefixes.iter().any(|(p, _)| column.starts_with(p.as_str())) {
                        values.insert(column.clone(), value.clone());
                    }
                }
                let mut children = BTreeMap::new();
                for (_, join) in &prefixes {
                    children.insert(join.alias.clone(), Vec::new());
                }
                order.push(GroupedRecord { values, children });
                index_by_key.insert(key, order.len() - 1);
                order.len() - 1
            }
        };

        for (prefix, join) in &prefixes {
            let mut child = CastRow::new();
            let mut any_present = false;
            for (column, value) in row {
                if let Some(name) = column.strip_prefix(prefix.as_str()) {
                    if !value.is_null() {
                        any_present = true;
                    }
                    child.insert(name.to_string(), value.clone());
                }
            }
            // A LEFT JOIN miss materializes as an all-NULL child; skip it so
            // the parent keeps an empty association sequence.
            if any_present {
                order[record_index]
                    .children
                    .get_mut(&join.alias)
                    .expect("alias seeded on first sight")
                    .push(child);
            }
        }
    }

    Ok(order)
}

/// Stable grouping key for a primary-key value.
fn value_key(value: &Value) -> String {
    format!("{:?}", value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDef, ColumnType};

    fn parent_schema() -> TableSchema {
        TableSchema::new(
            "customers",
            vec![
                ColumnDef::new("id", ColumnType::Serial)
                    .primary_key()
                    .auto_increment(),
                ColumnDef::new("name", ColumnType::Text),
            ],
        )
    }

    fn joined_row(id: i64, name: &str, amount: Option<i64>) -> CastRow {
        let mut row = CastRow::new();
        row.insert("id".into(), Value::Integer(id));
        row.insert("name".into(), Value::Text(name.into()));
        match amount {
            Some(a) => {
                row.insert("payments__id".into(), Value::Integer(a + 100));
                row.insert("payments__amount".into(), Value::Integer(a));
                row.insert("payments__customer".into(), Value::Integer(id));
            }
            None => {
                row.insert("payments__id".into(), Value::Null);
                row.insert("payments__amount".into(), Value::Null);
                row.insert("payments__customer".into(), Value::Null);
            }
        }
        row
    }

    #[test]
    fn test_two_parents_four_children_each() {
        let joins = vec![Join::new("payments", "id", "customer")];
        let mut rows = Vec::new();
        for amount in 0..4 {
            rows.push(joined_row(1, "hasMany find where", Some(amount)));
        }
        for amount in 4..8 {
            rows.push(joined_row(2, "hasMany find where", Some(amount)));
        }

        let grouped = group_rows(&rows, &parent_schema(), &joins).unwrap();
        assert_eq!(grouped.len(), 2);

        assert_eq!(grouped[0].values["id"], Value::Integer(1));
        let first_children = &grouped[0].children["payments"];
        assert_eq!(first_children.len(), 4);
        // Children keep received-row order
        for (i, child) in first_children.iter().enumerate() {
            assert_eq!(child["amount"], Value::Integer(i as i64));
        }

        assert_eq!(grouped[1].values["id"], Value::Integer(2));
        assert_eq!(grouped[1].children["payments"].len(), 4);
    }

    #[test]
    fn test_parent_without_children_keeps_empty_sequence() {
        let joins = vec![Join::new("payments", "id", "customer")];
        let rows = vec![
            joined_row(1, "a", Some(0)),
            joined_row(1, "a", Some(1)),
            joined_row(2, "b", None),
        ];

        let grouped = group_rows(&rows, &parent_schema(), &joins).unwrap();
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].children["payments"].len(), 2);

        // The empty association is present, not absent
        let childless = &grouped[1];
        assert!(childless.children.contains_key("payments"));
        assert!(childless.children["payments"].is_empty());
    }

    #[test]
    fn test_parents_keep_first_seen_order() {
        let joins = vec![Join::new("payments", "id", "customer")];
        let rows = vec![
            joined_row(5, "later-id-first", Some(1)),
            joined_row(2, "second", Some(2)),
            joined_row(5, "later-id-first", Some(3)),
        ];

        let grouped = group_rows(&rows, &parent_schema(), &joins).unwrap();
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].values["id"], Value::Integer(5));
        assert_eq!(grouped[1].values["id"], Value::Integer(2));
        assert_eq!(grouped[0].children["payments"].len(), 2);
    }

    #[test]
    fn test_parent_columns_come_from_first_row() {
        let joins = vec![Join::new("payments", "id", "customer")];
        let rows = vec![joined_row(1, "first", Some(0)), joined_row(1, "first", Some(1))];

        let grouped = group_rows(&rows, &parent_schema(), &joins).unwrap();
        assert_eq!(grouped[0].values["name"], Value::Text("first".into()));
        // Child columns never leak into the parent record
        assert!(!grouped[0].values.contains_key("payments__amount"));
    }

    #[test]
    fn test_missing_primary_key_is_an_error() {
        let schema = TableSchema::new("anon", vec![ColumnDef::new("name", ColumnType::Text)]);
        let joins = vec![Join::new("payments", "id", "customer")];
        assert!(matches!(
            group_rows(&[], &schema, &joins),
            Err(AdapterError::NoPrimaryKey(t)) if t == "anon"
        ));
    }
}
