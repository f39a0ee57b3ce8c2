//! Schema metadata: per-table column definitions and the registry that owns
//! them.
//!
//! The registry is built once from the output of an external introspection
//! routine and treated as immutable until the next introspection. The
//! compiler, caster, and grouper only ever read it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Closed taxonomy of column types the criteria layer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Text,
    Integer,
    Float,
    Boolean,
    Date,
    Binary,
    Array,
    Json,
    /// Auto-increment integer backed by a sequence.
    Serial,
}

impl ColumnType {
    /// Whether comparisons against this column fold case.
    ///
    /// Only plain text columns compare case-insensitively; every other type
    /// (including json) compares exactly.
    #[must_use]
    pub fn folds_case(&self) -> bool {
        matches!(self, ColumnType::Text)
    }

    /// Map a store-reported data type name onto the taxonomy.
    ///
    /// Unrecognized names fall back to `Text`, which is also how the backing
    /// store serializes types it has no richer wire representation for.
    pub fn from_data_type(data_type: &str) -> ColumnType {
        let lower = data_type.to_lowercase();
        match lower.as_str() {
            "text" | "varchar" | "char" | "character" | "character varying" | "string" => {
                ColumnType::Text
            }
            "int" | "integer" | "smallint" | "bigint" | "int2" | "int4" | "int8" => {
                ColumnType::Integer
            }
            "serial" | "bigserial" | "smallserial" => ColumnType::Serial,
            "float" | "real" | "double precision" | "numeric" | "decimal" | "float4" | "float8" => {
                ColumnType::Float
            }
            "bool" | "boolean" => ColumnType::Boolean,
            "date" | "datetime" | "time" => ColumnType::Date,
            "bytea" | "binary" | "varbinary" | "blob" => ColumnType::Binary,
            "array" => ColumnType::Array,
            "json" | "jsonb" => ColumnType::Json,
            _ if lower.starts_with("timestamp") => ColumnType::Date,
            _ if lower.ends_with("[]") => ColumnType::Array,
            _ => ColumnType::Text,
        }
    }
}

/// Column metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,

    /// Declared type, from the closed taxonomy.
    pub column_type: ColumnType,

    /// Whether the column allows NULL.
    #[serde(default = "default_true")]
    pub nullable: bool,

    /// Whether the column is (part of) the primary key.
    #[serde(default)]
    pub primary_key: bool,

    /// Whether the column draws default values from a sequence.
    #[serde(default)]
    pub auto_increment: bool,

    /// Whether a secondary index covers the column.
    #[serde(default)]
    pub indexed: bool,

    /// Default value expression as reported by the store, if any.
    #[serde(default)]
    pub default_value: Option<String>,
}

fn default_true() -> bool {
    true
}

impl ColumnDef {
    /// Create a plain nullable column of the given type.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            primary_key: false,
            auto_increment: false,
            indexed: false,
            default_value: None,
        }
    }

    /// Mark this column as the primary key.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    /// Mark this column as sequence-backed.
    #[must_use]
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Mark this column as indexed.
    #[must_use]
    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }
}

/// Per-table schema: ordered column definitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name.
    pub name: String,

    /// Column definitions in ordinal order.
    columns: Vec<ColumnDef>,
}

impl TableSchema {
    /// Create a schema from ordered column definitions.
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDef>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// All columns, in ordinal order.
    #[must_use]
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    /// Look up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Whether the table has a column of the given name.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// The first primary-key column, if any.
    #[must_use]
    pub fn primary_key_column(&self) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.primary_key)
    }

    /// Columns whose defaults are drawn from a sequence.
    pub fn auto_increment_columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter().filter(|c| c.auto_increment)
    }
}

/// Explicit registry of table schemas.
///
/// Passed to the compiler and adapter as a context object; there is no
/// process-wide schema state. The caller owns it and rebuilds it after
/// re-introspection.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    tables: HashMap<String, TableSchema>,
}

impl SchemaRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a table schema.
    pub fn insert(&mut self, schema: TableSchema) {
        self.tables.insert(schema.name.clone(), schema);
    }

    /// Look up a table schema.
    ///
    /// Absence of a table is a normal outcome at this boundary (a
    /// describe-style lookup), not an error.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(name)
    }

    /// Look up a table schema, failing fast when it is missing.
    pub fn require(&self, name: &str) -> crate::error::Result<&TableSchema> {
        self.tables
            .get(name)
            .ok_or_else(|| crate::error::AdapterError::UnknownTable(name.to_string()))
    }

    /// Number of registered tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// One column row as reported by the external introspection routine.
///
/// The introspection collaborator queries the store's information schema and
/// hands the core rows already flattened into this shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescribedColumn {
    /// Column name.
    pub name: String,

    /// Store-reported data type name (e.g. "character varying").
    pub data_type: String,

    /// Ordinal position (1-based).
    pub ordinal: i32,

    /// Whether the column allows NULL.
    pub nullable: bool,

    /// Whether a sequence backs the column's default.
    #[serde(default)]
    pub has_sequence: bool,

    /// Whether an index covers the column.
    #[serde(default)]
    pub indexed: bool,

    /// Whether the column participates in the primary-key constraint.
    #[serde(default)]
    pub primary_key: bool,

    /// Default value expression, if any.
    #[serde(default)]
    pub default_value: Option<String>,
}

/// Normalize introspected column rows into a [`TableSchema`].
///
/// Returns `None` for an empty row set: a table that does not exist is a
/// normal, expected outcome of a describe, not a malformed-input condition.
pub fn normalize_described_rows(table: &str, rows: &[DescribedColumn]) -> Option<TableSchema> {
    if rows.is_empty() {
        return None;
    }

    let mut ordered: Vec<&DescribedColumn> = rows.iter().collect();
    ordered.sort_by_key(|c| c.ordinal);

    let columns = ordered
        .into_iter()
        .map(|c| {
            let base = ColumnType::from_data_type(&c.data_type);
            let column_type = if c.has_sequence && base == ColumnType::Integer {
                ColumnType::Serial
            } else {
                base
            };
            ColumnDef {
                name: c.name.clone(),
                column_type,
                nullable: c.nullable,
                primary_key: c.primary_key,
                auto_increment: c.has_sequence,
                indexed: c.indexed,
                default_value: c.default_value.clone(),
            }
        })
        .collect();

    Some(TableSchema::new(table, columns))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn described(name: &str, data_type: &str, ordinal: i32) -> DescribedColumn {
        DescribedColumn {
            name: name.to_string(),
            data_type: data_type.to_string(),
            ordinal,
            nullable: true,
            has_sequence: false,
            indexed: false,
            primary_key: false,
            default_value: None,
        }
    }

    #[test]
    fn test_column_type_from_data_type() {
        assert_eq!(
            ColumnType::from_data_type("character varying"),
            ColumnType::Text
        );
        assert_eq!(ColumnType::from_data_type("bigint"), ColumnType::Integer);
        assert_eq!(
            ColumnType::from_data_type("timestamp without time zone"),
            ColumnType::Date
        );
        assert_eq!(ColumnType::from_data_type("jsonb"), ColumnType::Json);
        assert_eq!(ColumnType::from_data_type("integer[]"), ColumnType::Array);
        assert_eq!(ColumnType::from_data_type("BOOLEAN"), ColumnType::Boolean);
        // Unknown types fall back to text
        assert_eq!(ColumnType::from_data_type("tsvector"), ColumnType::Text);
    }

    #[test]
    fn test_only_text_folds_case() {
        assert!(ColumnType::Text.folds_case());
        assert!(!ColumnType::Integer.folds_case());
        assert!(!ColumnType::Json.folds_case());
        assert!(!ColumnType::Serial.folds_case());
    }

    #[test]
    fn test_table_schema_lookup() {
        let schema = TableSchema::new(
            "users",
            vec![
                ColumnDef::new("id", ColumnType::Serial)
                    .primary_key()
                    .auto_increment(),
                ColumnDef::new("name", ColumnType::Text),
            ],
        );

        assert!(schema.contains("name"));
        assert!(!schema.contains("email"));
        assert_eq!(schema.primary_key_column().unwrap().name, "id");
        assert_eq!(schema.auto_increment_columns().count(), 1);
    }

    #[test]
    fn test_registry_require() {
        let mut registry = SchemaRegistry::new();
        registry.insert(TableSchema::new(
            "users",
            vec![ColumnDef::new("id", ColumnType::Integer)],
        ));

        assert!(registry.require("users").is_ok());
        assert!(matches!(
            registry.require("missing"),
            Err(crate::error::AdapterError::UnknownTable(t)) if t == "missing"
        ));
        assert!(registry.table("missing").is_none());
    }

    #[test]
    fn test_normalize_orders_by_ordinal_and_detects_serial() {
        let mut id = described("id", "integer", 1);
        id.has_sequence = true;
        id.primary_key = true;
        let name = described("name", "text", 2);
        // Deliberately out of order
        let rows = vec![name, id];

        let schema = normalize_described_rows("users", &rows).unwrap();
        assert_eq!(schema.columns()[0].name, "id");
        assert_eq!(schema.columns()[0].column_type, ColumnType::Serial);
        assert!(schema.columns()[0].auto_increment);
        assert_eq!(schema.columns()[1].name, "name");
    }

    #[test]
    fn test_normalize_empty_is_none() {
        assert!(normalize_described_rows("ghost", &[]).is_none());
    }
}
