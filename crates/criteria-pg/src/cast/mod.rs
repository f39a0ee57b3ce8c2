//! Schema-driven casting of wire rows into typed rows.
//!
//! The backing store's wire representation is narrow: booleans arrive as
//! word tokens, arrays as encoded text, numbers sometimes as numeric
//! strings. `cast_row` decodes each column according to its declared type.
//! It is pure and order-preserving, and it never fails on NULL.

use chrono::{NaiveDate, NaiveDateTime};

use crate::criteria::Join;
use crate::error::{AdapterError, Result};
use crate::schema::{ColumnDef, ColumnType, SchemaRegistry, TableSchema};
use crate::value::{CastRow, Value, WireRow, WireValue};

/// Tokens the wire format uses for a true boolean.
const TRUTHY_TOKENS: [&str; 4] = ["t", "true", "y", "yes"];

/// Cast a raw row into typed values using the table's schema.
///
/// Columns the schema does not describe pass through with their wire
/// representation preserved.
pub fn cast_row(row: &WireRow, schema: &TableSchema) -> Result<CastRow> {
    let mut cast = CastRow::with_capacity(row.len());
    for (column, wire) in row {
        let value = match schema.column(column) {
            Some(def) => cast_value(wire, def)?,
            None => Value::from(wire.clone()),
        };
        cast.insert(column.clone(), value);
    }
    Ok(cast)
}

/// Cast a joined row: `alias__column` names resolve against the child
/// table's schema, everything else against the parent's.
pub fn cast_joined_row(
    row: &WireRow,
    parent: &TableSchema,
    registry: &SchemaRegistry,
    joins: &[Join],
) -> Result<CastRow> {
    let mut cast = CastRow::with_capacity(row.len());
    'columns: for (column, wire) in row {
        for join in joins {
            let prefix = join.column_prefix();
            if let Some(child_column) = column.strip_prefix(&prefix) {
                let value = match registry
                    .table(&join.child_table)
                    .and_then(|child| child.column(child_column))
                {
                    Some(def) => cast_value(wire, def)?,
                    None => Value::from(wire.clone()),
                };
                cast.insert(column.clone(), value);
                continue 'columns;
            }
        }
        let value = match parent.column(column) {
            Some(def) => cast_value(wire, def)?,
            None => Value::from(wire.clone()),
        };
        cast.insert(column.clone(), value);
    }
    Ok(cast)
}

/// Cast one wire value per its column definition. NULL always passes
/// through as NULL regardless of the declared type.
fn cast_value(wire: &WireValue, def: &ColumnDef) -> Result<Value> {
    if wire.is_null() {
        return Ok(Value::Null);
    }

    match def.column_type {
        ColumnType::Boolean => Ok(cast_boolean(wire)),
        ColumnType::Integer | ColumnType::Serial => Ok(cast_integer(wire)),
        ColumnType::Float => Ok(cast_float(wire)),
        ColumnType::Date => Ok(cast_date(wire)),
        ColumnType::Array => cast_array(wire, &def.name),
        ColumnType::Json => cast_json(wire, &def.name),
        ColumnType::Binary => Ok(cast_binary(wire)),
        ColumnType::Text => Ok(Value::from(wire.clone())),
    }
}

/// The driver surfaces booleans as opaque text tokens; a small fixed set of
/// tokens is truthy, everything else is false.
fn cast_boolean(wire: &WireValue) -> Value {
    match wire {
        WireValue::Bool(b) => Value::Bool(*b),
        WireValue::Integer(i) => Value::Bool(*i != 0),
        WireValue::Text(s) => {
            let token = s.trim().to_lowercase();
            Value::Bool(TRUTHY_TOKENS.contains(&token.as_str()))
        }
        WireValue::Number(n) => Value::Bool(*n != 0.0),
        WireValue::Null => Value::Null,
    }
}

fn cast_integer(wire: &WireValue) -> Value {
    match wire {
        WireValue::Integer(i) => Value::Integer(*i),
        WireValue::Number(n) if n.fract() == 0.0 => Value::Integer(*n as i64),
        WireValue::Number(n) => Value::Float(*n),
        WireValue::Text(s) => match s.trim().parse::<i64>() {
            Ok(i) => Value::Integer(i),
            // Not a numeric string; leave the representation alone
            Err(_) => Value::Text(s.clone()),
        },
        other => Value::from(other.clone()),
    }
}

fn cast_float(wire: &WireValue) -> Value {
    match wire {
        WireValue::Number(n) => Value::Float(*n),
        WireValue::Integer(i) => Value::Float(*i as f64),
        WireValue::Text(s) => match s.trim().parse::<f64>() {
            Ok(f) => Value::Float(f),
            Err(_) => Value::Text(s.clone()),
        },
        other => Value::from(other.clone()),
    }
}

/// Accepted timestamp layouts, tried in order. Strings that match none of
/// them keep their text representation.
fn cast_date(wire: &WireValue) -> Value {
    let text = match wire {
        WireValue::Text(s) => s.trim(),
        other => return Value::from(other.clone()),
    };

    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Value::Date(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f") {
        return Value::Date(dt);
    }
    if let Ok(d) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        if let Some(dt) = d.and_hms_opt(0, 0, 0) {
            return Value::Date(dt);
        }
    }
    Value::Text(text.to_string())
}

/// Array columns store a textual sequence encoding (e.g. `"[0,1,2,3]"`);
/// parse it into an ordered sequence of the same cardinality.
fn cast_array(wire: &WireValue, column: &str) -> Result<Value> {
    let text = match wire {
        WireValue::Text(s) => s,
        other => return Ok(Value::from(other.clone())),
    };

    let parsed: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| AdapterError::malformed_array(column, e.to_string()))?;

    match parsed {
        serde_json::Value::Array(items) => Ok(Value::Array(
            items.into_iter().map(json_to_value).collect(),
        )),
        _ => Err(AdapterError::malformed_array(
            column,
            "stored value is not a sequence",
        )),
    }
}

fn cast_json(wire: &WireValue, column: &str) -> Result<Value> {
    let text = match wire {
        WireValue::Text(s) => s,
        other => return Ok(Value::from(other.clone())),
    };

    let parsed: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| AdapterError::malformed_array(column, e.to_string()))?;
    Ok(Value::Json(parsed))
}

/// Binary columns arrive hex-encoded with a `\x` prefix.
fn cast_binary(wire: &WireValue) -> Value {
    let text = match wire {
        WireValue::Text(s) => s,
        other => return Value::from(other.clone()),
    };

    let hex = match text.strip_prefix("\\x") {
        Some(h) => h,
        None => return Value::Text(text.clone()),
    };

    if hex.len() % 2 != 0 {
        return Value::Text(text.clone());
    }
    let mut bytes = Vec::with_capacity(hex.len() / 2);
    for pair in hex.as_bytes().chunks(2) {
        let high = (pair[0] as char).to_digit(16);
        let low = (pair[1] as char).to_digit(16);
        match (high, low) {
            (Some(h), Some(l)) => bytes.push((h * 16 + l) as u8),
            _ => return Value::Text(text.clone()),
        }
    }
    Value::Bytes(bytes)
}

fn json_to_value(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else {
                Value::Float(n.as_f64().unwrap_or_default())
            }
        }
        serde_json::Value::String(s) => Value::Text(s),
        serde_json::Value::Array(items) => {
            Value::Array(items.into_iter().map(json_to_value).collect())
        }
        object => Value::Json(object),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnDef;

    fn schema_with(column: ColumnDef) -> TableSchema {
        TableSchema::new("test", vec![column])
    }

    fn row_with(column: &str, wire: WireValue) -> WireRow {
        let mut row = WireRow::new();
        row.insert(column.to_string(), wire);
        row
    }

    #[test]
    fn test_array_literal_round_trip() {
        let schema = schema_with(ColumnDef::new("list", ColumnType::Array));
        let row = row_with("list", WireValue::Text("[0,1,2,3]".into()));

        let cast = cast_row(&row, &schema).unwrap();
        assert_eq!(
            cast["list"],
            Value::Array(vec![
                Value::Integer(0),
                Value::Integer(1),
                Value::Integer(2),
                Value::Integer(3),
            ])
        );
    }

    #[test]
    fn test_malformed_array_literal_errors() {
        let schema = schema_with(ColumnDef::new("list", ColumnType::Array));
        let row = row_with("list", WireValue::Text("[0,1,".into()));

        assert!(matches!(
            cast_row(&row, &schema),
            Err(AdapterError::MalformedArrayLiteral { column, .. }) if column == "list"
        ));

        let scalar = row_with("list", WireValue::Text("42".into()));
        assert!(cast_row(&scalar, &schema).is_err());
    }

    #[test]
    fn test_boolean_tokens() {
        let schema = schema_with(ColumnDef::new("flag", ColumnType::Boolean));
        for token in ["t", "true", "y", "yes", "T", "TRUE", "Yes"] {
            let row = row_with("flag", WireValue::Text(token.into()));
            assert_eq!(
                cast_row(&row, &schema).unwrap()["flag"],
                Value::Bool(true),
                "token {token:?} should be truthy"
            );
        }
        for token in ["f", "false", "n", "no", "0", "anything"] {
            let row = row_with("flag", WireValue::Text(token.into()));
            assert_eq!(
                cast_row(&row, &schema).unwrap()["flag"],
                Value::Bool(false),
                "token {token:?} should be falsy"
            );
        }
    }

    #[test]
    fn test_null_passes_through_for_every_type() {
        for column_type in [
            ColumnType::Text,
            ColumnType::Integer,
            ColumnType::Float,
            ColumnType::Boolean,
            ColumnType::Date,
            ColumnType::Binary,
            ColumnType::Array,
            ColumnType::Json,
            ColumnType::Serial,
        ] {
            let schema = schema_with(ColumnDef::new("c", column_type));
            let row = row_with("c", WireValue::Null);
            assert_eq!(cast_row(&row, &schema).unwrap()["c"], Value::Null);
        }
    }

    #[test]
    fn test_numeric_strings_normalize() {
        let schema = TableSchema::new(
            "test",
            vec![
                ColumnDef::new("age", ColumnType::Integer),
                ColumnDef::new("score", ColumnType::Float),
            ],
        );
        let mut row = WireRow::new();
        row.insert("age".into(), WireValue::Text("27".into()));
        row.insert("score".into(), WireValue::Text("1.5".into()));

        let cast = cast_row(&row, &schema).unwrap();
        assert_eq!(cast["age"], Value::Integer(27));
        assert_eq!(cast["score"], Value::Float(1.5));
    }

    #[test]
    fn test_date_strings_normalize() {
        let schema = schema_with(ColumnDef::new("created", ColumnType::Date));
        let row = row_with("created", WireValue::Text("2014-03-01 12:30:45".into()));
        let cast = cast_row(&row, &schema).unwrap();
        assert!(matches!(cast["created"], Value::Date(_)));

        let date_only = row_with("created", WireValue::Text("2014-03-01".into()));
        let cast = cast_row(&date_only, &schema).unwrap();
        assert!(matches!(cast["created"], Value::Date(_)));

        // Unrecognized stays text rather than failing the row
        let odd = row_with("created", WireValue::Text("yesterday".into()));
        let cast = cast_row(&odd, &schema).unwrap();
        assert_eq!(cast["created"], Value::Text("yesterday".into()));
    }

    #[test]
    fn test_binary_hex_decodes() {
        let schema = schema_with(ColumnDef::new("data", ColumnType::Binary));
        let row = row_with("data", WireValue::Text("\\x48692100".into()));
        let cast = cast_row(&row, &schema).unwrap();
        assert_eq!(cast["data"], Value::Bytes(vec![0x48, 0x69, 0x21, 0x00]));
    }

    #[test]
    fn test_unknown_columns_pass_through() {
        let schema = schema_with(ColumnDef::new("known", ColumnType::Integer));
        let row = row_with("mystery", WireValue::Text("t".into()));
        let cast = cast_row(&row, &schema).unwrap();
        assert_eq!(cast["mystery"], Value::Text("t".into()));
    }

    #[test]
    fn test_joined_rows_cast_child_columns_with_child_schema() {
        let mut registry = SchemaRegistry::new();
        registry.insert(TableSchema::new(
            "payments",
            vec![ColumnDef::new("paid", ColumnType::Boolean)],
        ));
        let parent = TableSchema::new("customers", vec![ColumnDef::new("name", ColumnType::Text)]);
        let joins = vec![Join::new("payments", "id", "customer")];

        let mut row = WireRow::new();
        row.insert("name".into(), WireValue::Text("Foo".into()));
        row.insert("payments__paid".into(), WireValue::Text("t".into()));

        let cast = cast_joined_row(&row, &parent, &registry, &joins).unwrap();
        assert_eq!(cast["payments__paid"], Value::Bool(true));
        assert_eq!(cast["name"], Value::Text("Foo".into()));
    }
}
