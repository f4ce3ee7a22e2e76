//! In-memory statement backend
//!
//! Emulates one table with an integer identity column well enough to run the
//! statements the repositories emit:
//!
//! - `SELECT <cols> FROM t ...` with no params (all rows, ordered by id) or
//!   one param (row by id); `SELECT 1` without a FROM clause
//! - `INSERT ... RETURNING <cols>` with one param per value column
//! - `UPDATE ... RETURNING <cols>` with the value columns, then the id
//! - `DELETE ... RETURNING <cols>` with the id
//!
//! Faults can be injected for connection acquisition and for the next
//! statement, and every checkout is counted on both acquire and release.

use crate::config::{TaskSchema, UserSchema};
use crate::database::{BackendError, ColumnValue, QueryParam, Record, RowSet, StatementBackend};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct Table {
    id_column: String,
    value_columns: Vec<String>,
    unique_column: Option<String>,
    rows: Mutex<BTreeMap<i64, Record>>,
    next_id: AtomicI64,
    fail_acquire: AtomicBool,
    fail_next: Mutex<Option<String>>,
    acquires: AtomicU64,
    releases: AtomicU64,
    statements: Mutex<Vec<String>>,
}

/// A checked-out connection; counts the release when dropped
struct Checkout<'a>(&'a Table);

impl Drop for Checkout<'_> {
    fn drop(&mut self) {
        self.0.releases.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
pub struct InMemoryBackend {
    table: Arc<Table>,
}

impl InMemoryBackend {
    pub fn new(id_column: &str, value_columns: &[&str]) -> Self {
        Self::build(id_column, value_columns, None)
    }

    /// Like [`new`](Self::new), rejecting duplicate values in `unique_column`
    pub fn with_unique(id_column: &str, value_columns: &[&str], unique_column: &str) -> Self {
        Self::build(id_column, value_columns, Some(unique_column))
    }

    fn build(id_column: &str, value_columns: &[&str], unique_column: Option<&str>) -> Self {
        Self {
            table: Arc::new(Table {
                id_column: id_column.to_string(),
                value_columns: value_columns.iter().map(|c| c.to_string()).collect(),
                unique_column: unique_column.map(str::to_string),
                rows: Mutex::new(BTreeMap::new()),
                next_id: AtomicI64::new(1),
                fail_acquire: AtomicBool::new(false),
                fail_next: Mutex::new(None),
                acquires: AtomicU64::new(0),
                releases: AtomicU64::new(0),
                statements: Mutex::new(Vec::new()),
            }),
        }
    }

    /// A users table with a unique email column
    pub fn for_users(schema: &UserSchema) -> Self {
        Self::with_unique(
            &schema.id_column,
            &[schema.email_column.as_str(), schema.name_column.as_str()],
            &schema.email_column,
        )
    }

    pub fn for_tasks(schema: &TaskSchema) -> Self {
        Self::new(&schema.id_column, &[schema.task_column.as_str()])
    }

    pub fn users() -> Self {
        Self::for_users(&UserSchema::default())
    }

    pub fn tasks() -> Self {
        Self::for_tasks(&TaskSchema::default())
    }

    /// Make every following acquisition fail until switched off
    pub fn fail_acquire(&self, fail: bool) {
        self.table.fail_acquire.store(fail, Ordering::SeqCst);
    }

    /// Fail the next statement with `message` after the connection is acquired
    pub fn fail_next_statement(&self, message: &str) {
        *self.table.fail_next.lock() = Some(message.to_string());
    }

    pub fn acquire_count(&self) -> u64 {
        self.table.acquires.load(Ordering::SeqCst)
    }

    pub fn release_count(&self) -> u64 {
        self.table.releases.load(Ordering::SeqCst)
    }

    /// Every statement that reached a connection, in order
    pub fn statements(&self) -> Vec<String> {
        self.table.statements.lock().clone()
    }

    pub fn row_count(&self) -> usize {
        self.table.rows.lock().len()
    }

    fn checkout(&self) -> Result<Checkout<'_>, BackendError> {
        if self.table.fail_acquire.load(Ordering::SeqCst) {
            return Err(BackendError::Acquire(
                "pool timed out while waiting for an open connection".to_string(),
            ));
        }
        self.table.acquires.fetch_add(1, Ordering::SeqCst);
        Ok(Checkout(&self.table))
    }
}

#[async_trait]
impl StatementBackend for InMemoryBackend {
    async fn run(&self, statement: &str, params: &[QueryParam]) -> Result<RowSet, BackendError> {
        let _conn = self.checkout()?;
        self.table.statements.lock().push(statement.to_string());

        if let Some(message) = self.table.fail_next.lock().take() {
            return Err(BackendError::Statement(message));
        }

        let verb = statement
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();

        match verb.as_str() {
            "SELECT" => self.table.select(statement, params),
            "INSERT" => self.table.insert(statement, params),
            "UPDATE" => self.table.update(statement, params),
            "DELETE" => self.table.delete(statement, params),
            _ => Err(BackendError::Statement(format!(
                "syntax error at or near \"{verb}\""
            ))),
        }
    }
}

impl Table {
    fn select(&self, statement: &str, params: &[QueryParam]) -> Result<RowSet, BackendError> {
        let upper = statement.to_ascii_uppercase();
        let Some(from) = upper.find(" FROM ") else {
            return Ok(vec![Record::new().with("?column?", ColumnValue::Int(1))]);
        };
        let columns = column_list(&statement["SELECT".len()..from]);
        let rows = self.rows.lock();

        match params {
            [] => Ok(rows.values().map(|row| project(row, &columns)).collect()),
            [id] => {
                let id = id_param(id)?;
                Ok(rows.get(&id).map(|row| project(row, &columns)).into_iter().collect())
            }
            _ => Err(arity_error("SELECT", params.len())),
        }
    }

    fn insert(&self, statement: &str, params: &[QueryParam]) -> Result<RowSet, BackendError> {
        if params.len() != self.value_columns.len() {
            return Err(arity_error("INSERT", params.len()));
        }

        let mut rows = self.rows.lock();
        let values = self.values(params);
        self.check_unique(&rows, &values, None)?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut row = Record::new().with(self.id_column.clone(), ColumnValue::Int(id));
        for (column, value) in values {
            row.insert(column, value);
        }

        let projected = project(&row, &returning(statement));
        rows.insert(id, row);
        Ok(vec![projected])
    }

    fn update(&self, statement: &str, params: &[QueryParam]) -> Result<RowSet, BackendError> {
        let Some((id, values)) = params.split_last() else {
            return Err(arity_error("UPDATE", 0));
        };
        if values.len() != self.value_columns.len() {
            return Err(arity_error("UPDATE", params.len()));
        }

        let id = id_param(id)?;
        let mut rows = self.rows.lock();
        if !rows.contains_key(&id) {
            return Ok(Vec::new());
        }

        let values = self.values(values);
        self.check_unique(&rows, &values, Some(id))?;

        let Some(row) = rows.get_mut(&id) else {
            return Ok(Vec::new());
        };
        for (column, value) in values {
            row.insert(column, value);
        }
        Ok(vec![project(row, &returning(statement))])
    }

    fn delete(&self, statement: &str, params: &[QueryParam]) -> Result<RowSet, BackendError> {
        let [id] = params else {
            return Err(arity_error("DELETE", params.len()));
        };
        let id = id_param(id)?;

        Ok(self
            .rows
            .lock()
            .remove(&id)
            .map(|row| project(&row, &returning(statement)))
            .into_iter()
            .collect())
    }

    fn values(&self, params: &[QueryParam]) -> Vec<(String, ColumnValue)> {
        self.value_columns
            .iter()
            .cloned()
            .zip(params.iter().map(ColumnValue::from))
            .collect()
    }

    fn check_unique(
        &self,
        rows: &BTreeMap<i64, Record>,
        values: &[(String, ColumnValue)],
        updating: Option<i64>,
    ) -> Result<(), BackendError> {
        let Some(unique) = &self.unique_column else {
            return Ok(());
        };
        let Some((_, candidate)) = values.iter().find(|(column, _)| column == unique) else {
            return Ok(());
        };

        let clash = rows
            .iter()
            .any(|(id, row)| Some(*id) != updating && row.get(unique) == Some(candidate));
        if clash {
            return Err(BackendError::Statement(format!(
                "duplicate key value violates unique constraint \"{unique}_key\""
            )));
        }
        Ok(())
    }
}

fn column_list(fragment: &str) -> Vec<String> {
    fragment
        .split(',')
        .map(|column| column.trim().to_string())
        .filter(|column| !column.is_empty())
        .collect()
}

fn returning(statement: &str) -> Vec<String> {
    let upper = statement.to_ascii_uppercase();
    match upper.find(" RETURNING ") {
        Some(at) => column_list(&statement[at + " RETURNING ".len()..]),
        None => Vec::new(),
    }
}

fn project(row: &Record, columns: &[String]) -> Record {
    columns.iter().fold(Record::new(), |record, column| {
        let value = row.get(column).cloned().unwrap_or(ColumnValue::Null);
        record.with(column.clone(), value)
    })
}

fn id_param(param: &QueryParam) -> Result<i64, BackendError> {
    match param {
        QueryParam::Int(id) => Ok(*id),
        QueryParam::Text(text) => text.trim().parse().map_err(|_| {
            BackendError::Statement(format!(
                "invalid input syntax for type integer: \"{text}\""
            ))
        }),
    }
}

fn arity_error(verb: &str, given: usize) -> BackendError {
    BackendError::Statement(format!("{verb} received unexpected parameter count {given}"))
}
