//! Sequence reconciliation after explicit-value inserts.
//!
//! When an insert supplies an explicit value for an auto-increment column,
//! the backing sequence still points wherever it pointed before; the next
//! default-generated value could collide. The plan tracks the maximum
//! explicit value per column across a batch and issues exactly one reset per
//! affected column, setting the sequence so the next draw is `max + 1`.

use tracing::debug;

use crate::compiler::{quote_ident, CompiledStatement};
use crate::error::{AdapterError, Result};
use crate::executor::StatementExecutor;
use crate::schema::TableSchema;
use crate::value::Value;

/// One pending sequence reset.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceReset {
    /// The auto-increment column whose sequence is reset.
    pub column: String,

    /// The value the next default draw must produce.
    pub next_value: i64,

    /// The reset statement (no parameters; the value is a validated integer).
    pub statement: String,
}

/// Accumulated sequence resets for one insert or one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SequencePlan {
    resets: Vec<SequenceReset>,
}

impl SequencePlan {
    /// Plan resets for a single insert payload.
    pub fn for_insert(table: &str, schema: &TableSchema, payload: &[(String, Value)]) -> Self {
        Self::for_batch(table, schema, std::slice::from_ref(&payload))
    }

    /// Plan resets for a batch of insert payloads.
    ///
    /// One reset per auto-increment column that any payload supplied an
    /// explicit value for, using the maximum value observed across the whole
    /// batch.
    pub fn for_batch<P: AsRef<[(String, Value)]>>(
        table: &str,
        schema: &TableSchema,
        payloads: &[P],
    ) -> Self {
        let mut resets = Vec::new();

        for column in schema.auto_increment_columns() {
            let mut max: Option<i64> = None;
            for payload in payloads {
                for (name, value) in payload.as_ref() {
                    if name != &column.name {
                        continue;
                    }
                    if let Some(explicit) = integer_of(value) {
                        max = Some(max.map_or(explicit, |m| m.max(explicit)));
                    }
                }
            }

            if let Some(max) = max {
                let next_value = max + 1;
                resets.push(SequenceReset {
                    statement: reset_statement(table, &column.name, next_value),
                    column: column.name.clone(),
                    next_value,
                });
            }
        }

        Self { resets }
    }

    /// Whether any reset is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resets.is_empty()
    }

    /// The pending resets.
    #[must_use]
    pub fn resets(&self) -> &[SequenceReset] {
        &self.resets
    }

    /// Execute every pending reset through the given executor.
    ///
    /// The executor handle must be the same one that performed the insert,
    /// so the reset runs inside the same connection/transaction scope — the
    /// collaborator must not release it between the insert and this call.
    pub async fn apply<E: StatementExecutor + ?Sized>(&self, executor: &E) -> Result<()> {
        for reset in &self.resets {
            let statement = CompiledStatement {
                text: reset.statement.clone(),
                parameters: Vec::new(),
            };
            executor.execute(&statement).await.map_err(|e| {
                AdapterError::SequenceReconciliationFailed {
                    column: reset.column.clone(),
                    message: e.to_string(),
                }
            })?;
            debug!(
                column = %reset.column,
                next = reset.next_value,
                "reset sequence"
            );
        }
        Ok(())
    }
}

/// Reset the column's backing sequence so the next default draw returns
/// exactly `next_value`.
fn reset_statement(table: &str, column: &str, next_value: i64) -> String {
    format!(
        "SELECT setval(pg_get_serial_sequence('{}', '{}'), {}, false)",
        quote_ident(table),
        column,
        next_value
    )
}

fn integer_of(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(i) => Some(*i),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDef, ColumnType};

    fn schema() -> TableSchema {
        TableSchema::new(
            "users",
            vec![
                ColumnDef::new("id", ColumnType::Serial)
                    .primary_key()
                    .auto_increment(),
                ColumnDef::new("name", ColumnType::Text),
            ],
        )
    }

    fn payload(id: Option<i64>, name: &str) -> Vec<(String, Value)> {
        let mut p = Vec::new();
        if let Some(id) = id {
            p.push(("id".to_string(), Value::Integer(id)));
        }
        p.push(("name".to_string(), Value::Text(name.into())));
        p
    }

    #[test]
    fn test_single_insert_advances_past_explicit_value() {
        let plan = SequencePlan::for_insert("users", &schema(), &payload(Some(42), "a"));
        assert_eq!(plan.resets().len(), 1);
        assert_eq!(plan.resets()[0].column, "id");
        assert_eq!(plan.resets()[0].next_value, 43);
        assert_eq!(
            plan.resets()[0].statement,
            "SELECT setval(pg_get_serial_sequence('\"users\"', 'id'), 43, false)"
        );
    }

    #[test]
    fn test_no_explicit_value_means_no_reset() {
        let plan = SequencePlan::for_insert("users", &schema(), &payload(None, "a"));
        assert!(plan.is_empty());
    }

    #[test]
    fn test_batch_resets_once_per_column_to_max_plus_one() {
        let payloads = vec![
            payload(Some(3), "a"),
            payload(None, "b"),
            payload(Some(17), "c"),
            payload(Some(5), "d"),
        ];
        let plan = SequencePlan::for_batch("users", &schema(), &payloads);

        assert_eq!(plan.resets().len(), 1);
        assert_eq!(plan.resets()[0].next_value, 18);
        // Strictly greater than the maximum explicit value in the batch
        assert!(plan.resets()[0].next_value > 17);
    }

    #[test]
    fn test_multiple_sequence_columns_reset_independently() {
        let schema = TableSchema::new(
            "counters",
            vec![
                ColumnDef::new("id", ColumnType::Serial)
                    .primary_key()
                    .auto_increment(),
                ColumnDef::new("ticket", ColumnType::Serial).auto_increment(),
            ],
        );
        let payloads = vec![
            vec![
                ("id".to_string(), Value::Integer(10)),
                ("ticket".to_string(), Value::Integer(99)),
            ],
            vec![("id".to_string(), Value::Integer(12))],
        ];

        let plan = SequencePlan::for_batch("counters", &schema, &payloads);
        assert_eq!(plan.resets().len(), 2);
        let by_column: std::collections::HashMap<_, _> = plan
            .resets()
            .iter()
            .map(|r| (r.column.as_str(), r.next_value))
            .collect();
        assert_eq!(by_column["id"], 13);
        assert_eq!(by_column["ticket"], 100);
    }
}
