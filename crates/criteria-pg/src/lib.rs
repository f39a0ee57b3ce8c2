//! # criteria-pg
//!
//! Criteria-to-SQL compilation and typed row handling for PostgreSQL-compatible
//! databases.
//!
//! This library turns declarative, structured query descriptions ("criteria")
//! into parameterized SQL, and turns the raw rows that come back into typed
//! application values:
//!
//! - **Criteria compiler**: recursive boolean-expression trees, sorting,
//!   pagination, aggregates, and left joins become `(text, parameters)` pairs
//!   with strictly ordered `$n` placeholders
//! - **Type casting**: schema-driven conversion of wire-level row values
//!   (text tokens, numeric strings, encoded arrays) into typed values
//! - **Result grouping**: flat join-denormalized rows become nested
//!   parent/child record graphs
//! - **Sequence reconciliation**: auto-increment counters are re-synchronized
//!   after inserts that supply explicit values for generated columns
//!
//! Statement execution is delegated to a [`StatementExecutor`] collaborator;
//! a thin [`driver::postgres`] implementation backed by a connection pool is
//! included.
//!
//! ## Example
//!
//! ```rust,no_run
//! use criteria_pg::{Adapter, ConnectionConfig, Criteria, PgExecutor, SchemaRegistry, Value, WhereNode};
//!
//! #[tokio::main]
//! async fn main() -> criteria_pg::Result<()> {
//!     let config = ConnectionConfig::load("config.yaml")?;
//!     let executor = PgExecutor::connect(&config).await?;
//!     let registry = SchemaRegistry::new();
//!     let adapter = Adapter::new(executor, registry);
//!
//!     let criteria = Criteria::builder()
//!         .filter(WhereNode::Equals("name".into(), Value::Text("Foo".into())))
//!         .limit(10)
//!         .build();
//!     let users = adapter.find("users", &criteria).await?;
//!     println!("{} users", users.len());
//!     Ok(())
//! }
//! ```

pub mod adapter;
pub mod cast;
pub mod compiler;
pub mod config;
pub mod criteria;
pub mod driver;
pub mod error;
pub mod executor;
pub mod group;
pub mod schema;
pub mod sequence;
pub mod value;

// Re-exports for convenient access
pub use adapter::{Adapter, FindResult};
pub use compiler::CompiledStatement;
pub use config::ConnectionConfig;
pub use criteria::{
    Aggregate, ComparisonOp, Criteria, CriteriaBuilder, Join, SortDirection, WhereNode,
};
pub use driver::postgres::PgExecutor;
pub use error::{AdapterError, Result};
pub use executor::StatementExecutor;
pub use group::GroupedRecord;
pub use schema::{ColumnDef, ColumnType, SchemaRegistry, TableSchema};
pub use value::{CastRow, Value, WireRow, WireValue};
