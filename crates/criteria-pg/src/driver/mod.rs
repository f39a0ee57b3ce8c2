//! Driver glue: concrete [`StatementExecutor`](crate::executor::StatementExecutor)
//! implementations.

pub mod postgres;
