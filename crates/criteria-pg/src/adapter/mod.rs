//! Operation-level orchestration: compile, execute, cast, group.
//!
//! The adapter owns the control flow between the pure core and the
//! statement-executor collaborator. Each operation is strictly sequential:
//! compile the statement, hand it to the executor, cast the rows that come
//! back, and reshape them if the criteria requested joins.

use tracing::debug;

use crate::cast::{cast_joined_row, cast_row};
use crate::compiler::{
    compile_delete, compile_insert, compile_select, compile_update, CompiledStatement,
};
use crate::criteria::Criteria;
use crate::error::Result;
use crate::executor::StatementExecutor;
use crate::group::{group_rows, GroupedRecord};
use crate::schema::SchemaRegistry;
use crate::sequence::SequencePlan;
use crate::value::{CastRow, Value, WireRow};

/// Result of a find: flat rows, or grouped records when joins were requested.
#[derive(Debug, Clone, PartialEq)]
pub enum FindResult {
    Flat(Vec<CastRow>),
    Grouped(Vec<GroupedRecord>),
}

impl FindResult {
    /// Number of result records.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            FindResult::Flat(rows) => rows.len(),
            FindResult::Grouped(records) => records.len(),
        }
    }

    /// Whether the result is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The flat rows, if no grouping happened.
    #[must_use]
    pub fn as_flat(&self) -> Option<&[CastRow]> {
        match self {
            FindResult::Flat(rows) => Some(rows),
            FindResult::Grouped(_) => None,
        }
    }

    /// The grouped records, if joins were requested.
    #[must_use]
    pub fn as_grouped(&self) -> Option<&[GroupedRecord]> {
        match self {
            FindResult::Grouped(records) => Some(records),
            FindResult::Flat(_) => None,
        }
    }
}

/// Adapter over a statement executor and a schema registry.
pub struct Adapter<E> {
    executor: E,
    registry: SchemaRegistry,
}

impl<E: StatementExecutor> Adapter<E> {
    /// Create an adapter.
    pub fn new(executor: E, registry: SchemaRegistry) -> Self {
        Self { executor, registry }
    }

    /// The schema registry in use.
    #[must_use]
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Replace the registry after re-introspection.
    pub fn set_registry(&mut self, registry: SchemaRegistry) {
        self.registry = registry;
    }

    /// SELECT records matching the criteria.
    ///
    /// Rows are cast per the schema; if the criteria requested joins the
    /// flat rows are grouped into parent/child records.
    pub async fn find(&self, table: &str, criteria: &Criteria) -> Result<FindResult> {
        let statement = compile_select(table, &self.registry, criteria)?;
        let rows = self.executor.query(&statement).await?;
        debug!(table, rows = rows.len(), "find");

        let schema = self.registry.require(table)?;
        if criteria.has_joins() {
            let cast = rows
                .iter()
                .map(|row| cast_joined_row(row, schema, &self.registry, &criteria.joins))
                .collect::<Result<Vec<_>>>()?;
            let grouped = group_rows(&cast, schema, &criteria.joins)?;
            Ok(FindResult::Grouped(grouped))
        } else {
            let cast = rows
                .iter()
                .map(|row| cast_row(row, schema))
                .collect::<Result<Vec<_>>>()?;
            Ok(FindResult::Flat(cast))
        }
    }

    /// INSERT one record and return it as stored.
    ///
    /// If the payload supplies explicit values for auto-increment columns,
    /// the affected sequences are reconciled through the same executor
    /// handle before the call returns.
    pub async fn create(&self, table: &str, data: &[(String, Value)]) -> Result<CastRow> {
        let schema = self.registry.require(table)?;
        let plan = SequencePlan::for_insert(table, schema, data);

        let statement = compile_insert(table, &self.registry, data)?;
        let rows = self.executor.query(&statement).await?;
        let stored = match rows.first() {
            Some(row) => cast_row(row, schema)?,
            None => CastRow::new(),
        };

        plan.apply(&self.executor).await?;
        Ok(stored)
    }

    /// INSERT a batch of records and return them as stored.
    ///
    /// Sequence reconciliation happens once per affected column after all
    /// inserts succeed, using the maximum explicit value in the batch.
    pub async fn create_each(
        &self,
        table: &str,
        records: &[Vec<(String, Value)>],
    ) -> Result<Vec<CastRow>> {
        let schema = self.registry.require(table)?;
        let plan = SequencePlan::for_batch(table, schema, records);

        let mut stored = Vec::with_capacity(records.len());
        for data in records {
            let statement = compile_insert(table, &self.registry, data)?;
            let rows = self.executor.query(&statement).await?;
            if let Some(row) = rows.first() {
                stored.push(cast_row(row, schema)?);
            }
        }

        plan.apply(&self.executor).await?;
        Ok(stored)
    }

    /// UPDATE records matching the criteria and return them as stored.
    pub async fn update(
        &self,
        table: &str,
        criteria: &Criteria,
        data: &[(String, Value)],
    ) -> Result<Vec<CastRow>> {
        let statement = compile_update(table, &self.registry, criteria, data)?;
        let rows = self.executor.query(&statement).await?;
        let schema = self.registry.require(table)?;
        rows.iter().map(|row| cast_row(row, schema)).collect()
    }

    /// DELETE records matching the criteria and return what was removed.
    pub async fn destroy(&self, table: &str, criteria: &Criteria) -> Result<Vec<CastRow>> {
        let statement = compile_delete(table, &self.registry, criteria)?;
        let rows = self.executor.query(&statement).await?;
        let schema = self.registry.require(table)?;
        rows.iter().map(|row| cast_row(row, schema)).collect()
    }

    /// Run a raw statement against the store, bypassing compilation.
    pub async fn query(&self, text: &str, parameters: Vec<Value>) -> Result<Vec<WireRow>> {
        let statement = CompiledStatement {
            text: text.to_string(),
            parameters,
        };
        self.executor.query(&statement).await
    }
}
