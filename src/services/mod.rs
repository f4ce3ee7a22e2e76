//! # Repositories
//!
//! Typed CRUD over the two resources. Statements are rendered once from the
//! validated schema; values only ever travel as bound parameters.

pub mod tasks;
pub mod users;

pub use tasks::{Task, TaskRepository, TaskStatements};
pub use users::{User, UserRepository, UserStatements};

use crate::database::{Operation, QueryFailure, QueryResult, Record};
use tracing::error;

/// Convert one record, turning a shape mismatch into a failure for `operation`
pub(crate) fn decode<T, O: Operation>(
    operation: O,
    record: &Record,
    convert: impl FnOnce(&Record) -> Result<T, String>,
) -> QueryResult<T> {
    convert(record).map_err(|detail| {
        error!(target: "postgresql", query = %operation.name(), error = %detail, "Unexpected row shape");
        QueryFailure::statement(operation.failure_message(), detail)
    })
}

pub(crate) fn require_int(record: &Record, column: &str) -> Result<i64, String> {
    record
        .int(column)
        .ok_or_else(|| format!("column \"{column}\" missing or not an integer"))
}

pub(crate) fn require_text(record: &Record, column: &str) -> Result<String, String> {
    record
        .text(column)
        .map(str::to_string)
        .ok_or_else(|| format!("column \"{column}\" missing or not text"))
}
