//! PostgreSQL statement executor backed by a connection pool.
//!
//! Thin glue: compiled statements go out, wire rows come back. Column values
//! are normalized into the narrow wire shapes the casting engine decodes;
//! notably, booleans surface as their `t`/`f` wire tokens so decoding stays
//! in one place.

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::{Config as PgConfig, NoTls, Row};
use tracing::{debug, info, warn};

use crate::compiler::CompiledStatement;
use crate::config::ConnectionConfig;
use crate::error::{AdapterError, Result};
use crate::executor::StatementExecutor;
use crate::value::{Value, WireRow, WireValue};

/// Pooled PostgreSQL executor.
pub struct PgExecutor {
    pool: Pool,
}

impl PgExecutor {
    /// Create a pool from the configuration and verify connectivity.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        config.validate()?;

        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };
        let mgr = Manager::from_config(pg_config, NoTls, mgr_config);
        let pool = Pool::builder(mgr)
            .max_size(config.pool_size)
            .build()
            .map_err(|e| AdapterError::pool(e, "creating PostgreSQL pool"))?;

        // Test connection
        let client = pool
            .get()
            .await
            .map_err(|e| AdapterError::pool(e, "testing PostgreSQL connection"))?;
        client.simple_query("SELECT 1").await?;

        info!(
            "Connected to PostgreSQL: {}:{}/{}",
            config.host, config.port, config.database
        );

        Ok(Self { pool })
    }
}

#[async_trait]
impl StatementExecutor for PgExecutor {
    async fn query(&self, statement: &CompiledStatement) -> Result<Vec<WireRow>> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| AdapterError::pool(e, "getting PostgreSQL connection"))?;

        debug!(sql = %statement.text, params = statement.parameters.len(), "query");
        let params = bind_parameters(&statement.parameters);
        let refs: Vec<&(dyn ToSql + Sync)> = params
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect();
        let rows = client.query(statement.text.as_str(), &refs).await?;

        rows.iter().map(wire_row).collect()
    }

    async fn execute(&self, statement: &CompiledStatement) -> Result<u64> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| AdapterError::pool(e, "getting PostgreSQL connection"))?;

        debug!(sql = %statement.text, params = statement.parameters.len(), "execute");
        let params = bind_parameters(&statement.parameters);
        let refs: Vec<&(dyn ToSql + Sync)> = params
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect();
        Ok(client.execute(statement.text.as_str(), &refs).await?)
    }
}

/// Box each value as a `ToSql` parameter.
///
/// NULL binds as an untyped text NULL; statements this library compiles only
/// place NULL where the store can coerce it.
fn bind_parameters(values: &[Value]) -> Vec<Box<dyn ToSql + Sync + Send>> {
    values
        .iter()
        .map(|value| -> Box<dyn ToSql + Sync + Send> {
            match value {
                Value::Null => Box::new(Option::<String>::None),
                Value::Bool(b) => Box::new(*b),
                Value::Integer(i) => Box::new(*i),
                Value::Float(f) => Box::new(*f),
                Value::Text(s) => Box::new(s.clone()),
                Value::Date(d) => Box::new(*d),
                Value::Bytes(b) => Box::new(b.clone()),
                Value::Json(j) => Box::new(j.clone()),
                Value::Array(items) => Box::new(serde_json::Value::Array(
                    items.iter().map(json_of_value).collect(),
                )),
            }
        })
        .collect()
}

fn json_of_value(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Integer(i) => serde_json::Value::from(*i),
        Value::Float(f) => serde_json::Value::from(*f),
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::Date(d) => serde_json::Value::String(d.to_string()),
        Value::Bytes(b) => serde_json::Value::String(format!("\\x{}", hex(b))),
        Value::Json(j) => j.clone(),
        Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(json_of_value).collect())
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Normalize one driver row into the wire shapes the caster decodes.
fn wire_row(row: &Row) -> Result<WireRow> {
    let mut wire = WireRow::with_capacity(row.len());
    for (index, column) in row.columns().iter().enumerate() {
        let ty = column.type_();
        let value = if *ty == Type::BOOL {
            // Booleans surface as wire tokens; the casting engine owns
            // decoding them.
            match row.try_get::<_, Option<bool>>(index)? {
                Some(true) => WireValue::Text("t".into()),
                Some(false) => WireValue::Text("f".into()),
                None => WireValue::Null,
            }
        } else if *ty == Type::INT2 {
            option_wire(row.try_get::<_, Option<i16>>(index)?, |v| {
                WireValue::Integer(v as i64)
            })
        } else if *ty == Type::INT4 {
            option_wire(row.try_get::<_, Option<i32>>(index)?, |v| {
                WireValue::Integer(v as i64)
            })
        } else if *ty == Type::INT8 {
            option_wire(row.try_get::<_, Option<i64>>(index)?, WireValue::Integer)
        } else if *ty == Type::FLOAT4 {
            option_wire(row.try_get::<_, Option<f32>>(index)?, |v| {
                WireValue::Number(v as f64)
            })
        } else if *ty == Type::FLOAT8 {
            option_wire(row.try_get::<_, Option<f64>>(index)?, WireValue::Number)
        } else if *ty == Type::TIMESTAMP {
            option_wire(
                row.try_get::<_, Option<chrono::NaiveDateTime>>(index)?,
                |v| WireValue::Text(v.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
            )
        } else if *ty == Type::TIMESTAMPTZ {
            option_wire(
                row.try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(index)?,
                |v| WireValue::Text(v.naive_utc().format("%Y-%m-%d %H:%M:%S%.f").to_string()),
            )
        } else if *ty == Type::DATE {
            option_wire(row.try_get::<_, Option<chrono::NaiveDate>>(index)?, |v| {
                WireValue::Text(v.format("%Y-%m-%d").to_string())
            })
        } else if *ty == Type::JSON || *ty == Type::JSONB {
            option_wire(row.try_get::<_, Option<serde_json::Value>>(index)?, |v| {
                WireValue::Text(v.to_string())
            })
        } else if *ty == Type::BYTEA {
            option_wire(row.try_get::<_, Option<Vec<u8>>>(index)?, |v| {
                WireValue::Text(format!("\\x{}", hex(&v)))
            })
        } else {
            match row.try_get::<_, Option<String>>(index) {
                Ok(v) => option_wire(v, WireValue::Text),
                Err(e) => {
                    warn!(
                        column = column.name(),
                        kind = %ty,
                        "column type has no wire mapping: {}",
                        e
                    );
                    WireValue::Null
                }
            }
        };
        wire.insert(column.name().to_string(), value);
    }
    Ok(wire)
}

fn option_wire<T>(value: Option<T>, wrap: impl FnOnce(T) -> WireValue) -> WireValue {
    match value {
        Some(v) => wrap(v),
        None => WireValue::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_parameters_counts_match() {
        let params = bind_parameters(&[
            Value::Null,
            Value::Integer(1),
            Value::Text("x".into()),
            Value::Array(vec![Value::Integer(1), Value::Integer(2)]),
        ]);
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn test_json_of_value_array_preserves_order() {
        let json = json_of_value(&Value::Array(vec![
            Value::Integer(0),
            Value::Integer(1),
            Value::Integer(2),
        ]));
        assert_eq!(json, serde_json::json!([0, 1, 2]));
    }

    #[test]
    fn test_hex_encoding() {
        assert_eq!(hex(&[0x48, 0x69, 0x00]), "486900");
    }
}
