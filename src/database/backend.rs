//! Statement execution seam.
//!
//! A backend runs one parameterised statement on one pooled connection and
//! hands back plain records. The envelope above it owns timing, counting and
//! logging, so backends stay free of instrumentation.

use async_trait::async_trait;
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{Column, PgPool, Row, TypeInfo};
use std::collections::BTreeMap;
use thiserror::Error;

/// A bound statement parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryParam {
    Int(i64),
    Text(String),
}

impl From<i64> for QueryParam {
    fn from(value: i64) -> Self {
        QueryParam::Int(value)
    }
}

impl From<&str> for QueryParam {
    fn from(value: &str) -> Self {
        QueryParam::Text(value.to_string())
    }
}

impl From<String> for QueryParam {
    fn from(value: String) -> Self {
        QueryParam::Text(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ColumnValue {
    Int(i64),
    Text(String),
    Bool(bool),
    Null,
}

impl From<&QueryParam> for ColumnValue {
    fn from(param: &QueryParam) -> Self {
        match param {
            QueryParam::Int(v) => ColumnValue::Int(*v),
            QueryParam::Text(v) => ColumnValue::Text(v.clone()),
        }
    }
}

/// One result row keyed by column name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Record {
    columns: BTreeMap<String, ColumnValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, value: ColumnValue) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: ColumnValue) {
        self.columns.insert(column.into(), value);
    }

    pub fn get(&self, column: &str) -> Option<&ColumnValue> {
        self.columns.get(column)
    }

    pub fn int(&self, column: &str) -> Option<i64> {
        match self.columns.get(column) {
            Some(ColumnValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn text(&self, column: &str) -> Option<&str> {
        match self.columns.get(column) {
            Some(ColumnValue::Text(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

pub type RowSet = Vec<Record>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// No connection could be checked out of the pool
    #[error("connection acquisition failed: {0}")]
    Acquire(String),
    /// The database rejected or aborted the statement
    #[error("{0}")]
    Statement(String),
}

#[async_trait]
pub trait StatementBackend: Send + Sync + std::fmt::Debug {
    /// Run `statement` with positional `params` on one pooled connection.
    ///
    /// The connection is returned to the pool before this resolves,
    /// whatever the outcome.
    async fn run(&self, statement: &str, params: &[QueryParam]) -> Result<RowSet, BackendError>;
}

/// Postgres backend over a shared `sqlx` pool
#[derive(Debug, Clone)]
pub struct PgStatementBackend {
    pool: PgPool,
}

impl PgStatementBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl StatementBackend for PgStatementBackend {
    async fn run(&self, statement: &str, params: &[QueryParam]) -> Result<RowSet, BackendError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| BackendError::Acquire(e.to_string()))?;

        let mut query = sqlx::query(statement);
        for param in params {
            query = match param {
                QueryParam::Int(v) => query.bind(*v),
                QueryParam::Text(v) => query.bind(v.clone()),
            };
        }

        let rows = query
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| BackendError::Statement(e.to_string()))?;

        rows.iter().map(decode_row).collect()
    }
}

fn decode_row(row: &PgRow) -> Result<Record, BackendError> {
    let mut record = Record::new();

    for (index, column) in row.columns().iter().enumerate() {
        let value = match column.type_info().name() {
            "INT8" => row.try_get::<Option<i64>, _>(index).map(|v| v.map(ColumnValue::Int)),
            "INT4" => row
                .try_get::<Option<i32>, _>(index)
                .map(|v| v.map(|v| ColumnValue::Int(i64::from(v)))),
            "INT2" => row
                .try_get::<Option<i16>, _>(index)
                .map(|v| v.map(|v| ColumnValue::Int(i64::from(v)))),
            "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => row
                .try_get::<Option<String>, _>(index)
                .map(|v| v.map(ColumnValue::Text)),
            "BOOL" => row.try_get::<Option<bool>, _>(index).map(|v| v.map(ColumnValue::Bool)),
            other => {
                return Err(BackendError::Statement(format!(
                    "unsupported type {other} for column {}",
                    column.name()
                )))
            }
        }
        .map_err(|e| BackendError::Statement(e.to_string()))?;

        record.insert(column.name(), value.unwrap_or(ColumnValue::Null));
    }

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_accessors() {
        let record = Record::new()
            .with("id", ColumnValue::Int(7))
            .with("email", ColumnValue::Text("a@x.com".to_string()))
            .with("name", ColumnValue::Null);

        assert_eq!(record.int("id"), Some(7));
        assert_eq!(record.text("email"), Some("a@x.com"));
        assert_eq!(record.text("name"), None);
        assert_eq!(record.get("name"), Some(&ColumnValue::Null));
        assert_eq!(record.int("missing"), None);
        assert_eq!(record.len(), 3);
    }

    #[test]
    fn test_record_serializes_as_object() {
        let record = Record::new()
            .with("id", ColumnValue::Int(1))
            .with("task", ColumnValue::Text("write docs".to_string()));

        assert_eq!(
            serde_json::to_string(&record).unwrap(),
            r#"{"id":1,"task":"write docs"}"#
        );
    }

    #[test]
    fn test_params_from_values() {
        assert_eq!(QueryParam::from(3), QueryParam::Int(3));
        assert_eq!(QueryParam::from("x"), QueryParam::Text("x".to_string()));
        assert_eq!(ColumnValue::from(&QueryParam::Int(3)), ColumnValue::Int(3));
    }
}
