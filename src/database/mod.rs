//! # Database Access
//!
//! Instrumented execution of parameterised statements.
//!
//! - [`backend`]: the connection-per-call execution seam and its Postgres impl
//! - [`envelope`]: timing, outcome counting and logging around every call
//! - [`operation`]: operation names and the failure messages derived from them
//! - [`pool`]: pool construction and the connection gauge hooks

pub mod backend;
pub mod envelope;
pub mod failure;
pub mod operation;
pub mod pool;

pub use backend::{
    BackendError, ColumnValue, PgStatementBackend, QueryParam, Record, RowSet, StatementBackend,
};
pub use envelope::QueryEnvelope;
pub use failure::{FailureKind, QueryFailure, QueryResult};
pub use operation::{Operation, TaskOperation, UserOperation};
pub use pool::{build_pool, PoolLifecycleHooks, PoolMonitor};
