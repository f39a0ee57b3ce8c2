//! Error types for criteria compilation, casting, and execution.

use thiserror::Error;

/// Main error type surfaced by the adapter core.
#[derive(Error, Debug)]
pub enum AdapterError {
    /// Criteria referenced a table absent from the schema registry.
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// Criteria referenced a column absent from the table schema.
    #[error("Unknown column \"{column}\" on table \"{table}\"")]
    UnknownColumn { table: String, column: String },

    /// groupBy was requested without any aggregate function.
    #[error("groupBy requires one of sum, average, min, or max")]
    InvalidAggregateRequest,

    /// An operator key outside the recognized set.
    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    /// A criteria shape that cannot be compiled into a single statement.
    #[error("Unsupported criteria: {0}")]
    UnsupportedCriteria(String),

    /// An array/json-typed stored value could not be parsed.
    #[error("Malformed array literal in column \"{column}\": {message}")]
    MalformedArrayLiteral { column: String, message: String },

    /// Grouping or reconciliation needs a primary key the table lacks.
    #[error("Table \"{0}\" has no primary key")]
    NoPrimaryKey(String),

    /// The sequence reset statement itself errored.
    #[error("Sequence reconciliation failed for column \"{column}\": {message}")]
    SequenceReconciliationFailed { column: String, message: String },

    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Error propagated from the statement executor collaborator.
    #[error("Executor error: {0}")]
    Executor(String),

    /// PostgreSQL driver error
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO error (config file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AdapterError {
    /// Create an UnknownColumn error.
    pub fn unknown_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        AdapterError::UnknownColumn {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Create a MalformedArrayLiteral error.
    pub fn malformed_array(column: impl Into<String>, message: impl Into<String>) -> Self {
        AdapterError::MalformedArrayLiteral {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a Pool error with context about where it occurred.
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        AdapterError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }
}

/// Result type alias for adapter operations.
pub type Result<T> = std::result::Result<T, AdapterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_column_message() {
        let err = AdapterError::unknown_column("users", "nmae");
        assert_eq!(
            err.to_string(),
            "Unknown column \"nmae\" on table \"users\""
        );
    }

    #[test]
    fn test_pool_error_context() {
        let err = AdapterError::pool("timed out", "getting connection");
        let text = err.to_string();
        assert!(text.contains("timed out"));
        assert!(text.contains("getting connection"));
    }
}
