use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use log::{debug, info};
use serde_json::{json, Value};
use sqlx::mysql::{MySqlArguments, MySqlPoolOptions, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, MySql, Pool, Row as _, TypeInfo};

use crate::config::Args;
use crate::error::GatewayError;

/// One result record: an ordered tuple of column values of dynamic type.
pub type Row = Vec<Value>;

/// Validates that an identifier (table name) contains only alphanumeric characters or underscores.
/// This is crucial for preventing SQL injection in statements where parameters cannot be used (e.g. DESCRIBE).
pub fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// The seam between the gateway and the database. `Database` is the real
/// implementation; tests script their own.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Runs one statement to completion. `parameters` are bound positionally
    /// to `?` placeholders and must be scalar JSON values; the built-in tools
    /// all interpolate their statements and pass none.
    async fn execute(&self, statement: &str, parameters: &[Value]) -> Result<Vec<Row>, GatewayError>;
}

/// Owns the single connection to StarRocks. The only component that touches
/// the database.
pub struct Database {
    pool: Pool<MySql>,
}

impl Database {
    /// Opens the connection described by `args`. Fails immediately if the
    /// target is unreachable or credentials are rejected; the caller treats
    /// that as fatal.
    pub async fn connect(args: &Args) -> Result<Self, GatewayError> {
        info!("Connecting to StarRocks at {}", args.redacted_url());
        let pool = MySqlPoolOptions::new()
            // Requests are handled one at a time; a single connection suffices.
            .max_connections(1)
            .connect(&args.database_url())
            .await
            .map_err(GatewayError::Connection)?;
        info!("Successfully connected to StarRocks database");
        Ok(Database { pool })
    }
}

#[async_trait]
impl Executor for Database {
    async fn execute(&self, statement: &str, parameters: &[Value]) -> Result<Vec<Row>, GatewayError> {
        if statement.trim().is_empty() {
            return Err(GatewayError::Validation(
                "Statement must not be empty".to_string(),
            ));
        }

        debug!("Executing statement: {statement}");
        let query = bind_parameters(statement, parameters)?;

        // Statements without a result set (DDL, non-returning DML) come back
        // as an empty row list.
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(decode_row).collect())
    }
}

fn bind_parameters<'q>(
    statement: &'q str,
    parameters: &[Value],
) -> Result<Query<'q, MySql, MySqlArguments>, GatewayError> {
    let mut query = sqlx::query(statement);
    for parameter in parameters {
        query = match parameter {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(*b),
            Value::Number(n) if n.is_i64() => query.bind(n.as_i64()),
            Value::Number(n) => query.bind(n.as_f64()),
            Value::String(s) => query.bind(s.clone()),
            Value::Array(_) | Value::Object(_) => {
                return Err(GatewayError::Validation(
                    "Parameters must be null, boolean, number, or string values".to_string(),
                ));
            }
        };
    }
    Ok(query)
}

fn decode_row(row: &MySqlRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, column)| decode_column(row, i, column.type_info().name()))
        .collect()
}

/// How a column's values decode, keyed off the driver's type name. The
/// temporal kinds must go through chrono: under the binary protocol they do
/// not decode as strings, and falling through to the text branch would turn
/// valid values into nulls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Bool,
    Int,
    Uint,
    Float,
    Decimal,
    Date,
    Time,
    DateTime,
    Timestamp,
    Text,
}

fn column_kind(type_name: &str) -> ColumnKind {
    match type_name {
        "BOOLEAN" | "TINYINT" => ColumnKind::Bool,
        "SMALLINT" | "INT" | "INTEGER" | "MEDIUMINT" | "BIGINT" => ColumnKind::Int,
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "INT UNSIGNED" | "MEDIUMINT UNSIGNED"
        | "BIGINT UNSIGNED" => ColumnKind::Uint,
        "FLOAT" | "DOUBLE" | "REAL" => ColumnKind::Float,
        "DECIMAL" | "NUMERIC" => ColumnKind::Decimal,
        "DATE" => ColumnKind::Date,
        "TIME" => ColumnKind::Time,
        "DATETIME" => ColumnKind::DateTime,
        "TIMESTAMP" => ColumnKind::Timestamp,
        // Everything else (VARCHAR, TEXT, JSON, etc) decodes as a string.
        _ => ColumnKind::Text,
    }
}

fn decode_column(row: &MySqlRow, i: usize, type_name: &str) -> Value {
    match column_kind(type_name) {
        ColumnKind::Bool => {
            // Map tinyint(1) to bool if possible, else int
            if let Ok(v) = row.try_get::<Option<bool>, _>(i) {
                json!(v)
            } else {
                json!(row.try_get::<Option<i64>, _>(i).unwrap_or(None))
            }
        }
        ColumnKind::Int => {
            json!(row.try_get::<Option<i64>, _>(i).unwrap_or(None))
        }
        ColumnKind::Uint => {
            json!(row.try_get::<Option<u64>, _>(i).unwrap_or(None))
        }
        ColumnKind::Float => {
            json!(row.try_get::<Option<f64>, _>(i).unwrap_or(None))
        }
        ColumnKind::Decimal => {
            // Serialize BigDecimal as string to preserve precision
            if let Ok(v) = row.try_get::<Option<sqlx::types::BigDecimal>, _>(i) {
                json!(v.map(|d| d.to_string()))
            } else {
                Value::Null
            }
        }
        ColumnKind::Date => {
            json!(row
                .try_get::<Option<NaiveDate>, _>(i)
                .ok()
                .flatten()
                .map(|d| d.to_string()))
        }
        ColumnKind::Time => {
            json!(row
                .try_get::<Option<NaiveTime>, _>(i)
                .ok()
                .flatten()
                .map(|t| t.to_string()))
        }
        ColumnKind::DateTime => {
            json!(row
                .try_get::<Option<NaiveDateTime>, _>(i)
                .ok()
                .flatten()
                .map(|d| d.to_string()))
        }
        ColumnKind::Timestamp => {
            json!(row
                .try_get::<Option<DateTime<Utc>>, _>(i)
                .ok()
                .flatten()
                .map(|d| d.to_string()))
        }
        ColumnKind::Text => {
            json!(row.try_get::<Option<String>, _>(i).unwrap_or(None))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temporal_columns_decode_via_chrono() {
        assert_eq!(column_kind("DATE"), ColumnKind::Date);
        assert_eq!(column_kind("TIME"), ColumnKind::Time);
        assert_eq!(column_kind("DATETIME"), ColumnKind::DateTime);
        assert_eq!(column_kind("TIMESTAMP"), ColumnKind::Timestamp);
    }

    #[test]
    fn unknown_types_fall_back_to_text() {
        assert_eq!(column_kind("VARCHAR"), ColumnKind::Text);
        assert_eq!(column_kind("JSON"), ColumnKind::Text);
        assert_eq!(column_kind("BLOB"), ColumnKind::Text);
    }

    #[test]
    fn binds_scalar_parameters_only() {
        let scalars = [json!(null), json!(true), json!(7), json!(1.5), json!("x")];
        assert!(bind_parameters("SELECT ?, ?, ?, ?, ?", &scalars).is_ok());

        let err = bind_parameters("SELECT ?", &[json!([1, 2])]).err().unwrap();
        assert!(matches!(err, GatewayError::Validation(_)));
        let err = bind_parameters("SELECT ?", &[json!({"k": "v"})]).err().unwrap();
        assert!(matches!(err, GatewayError::Validation(_)));
    }

    #[test]
    fn test_is_valid_identifier() {
        assert!(is_valid_identifier("users"));
        assert!(is_valid_identifier("my_table_123"));
        assert!(is_valid_identifier("_hidden"));
        assert!(is_valid_identifier("CamelCase"));
        assert!(is_valid_identifier("123"));

        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("users; DROP TABLE users"));
        assert!(!is_valid_identifier("users--"));
        assert!(!is_valid_identifier("table with spaces"));
        assert!(!is_valid_identifier("table-with-dashes"));
        assert!(!is_valid_identifier("`users`"));
    }
}
