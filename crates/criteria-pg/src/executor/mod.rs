//! The statement-executor collaborator contract.
//!
//! The core hands a [`CompiledStatement`] to an executor, suspends until
//! rows or an error arrive, and resumes sequentially. No further contract is
//! assumed: transport, pooling, cancellation, and retry all belong to the
//! implementation behind this trait.

use async_trait::async_trait;

use crate::compiler::CompiledStatement;
use crate::error::Result;
use crate::value::WireRow;

/// Executes compiled statements against the backing store.
///
/// Implementations must be safe to share across callers; the core itself
/// never spawns concurrent work against a single logical operation. For
/// insert-then-reseed units the adapter issues both statements through one
/// handle, and the implementation must not release the underlying
/// connection or transaction between them.
#[async_trait]
pub trait StatementExecutor: Send + Sync {
    /// Run a statement and return its rows in arrival order.
    async fn query(&self, statement: &CompiledStatement) -> Result<Vec<WireRow>>;

    /// Run a statement and return the affected-row count.
    async fn execute(&self, statement: &CompiledStatement) -> Result<u64>;
}
