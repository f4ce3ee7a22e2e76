//! # Query Execution Envelope
//!
//! Every database call in the crate goes through [`QueryEnvelope::execute`].
//! Per call, in order:
//!
//! 1. one "Calling database" record
//! 2. one duration timer, started before the connection is acquired
//! 3. one acquire/release pair, inside the backend
//! 4. one histogram observation
//! 5. exactly one outcome counter increment, success or error
//!
//! Failures come back as a [`QueryFailure`]; nothing on this path panics.

use super::backend::{BackendError, QueryParam, RowSet, StatementBackend};
use super::failure::{QueryFailure, QueryResult};
use super::operation::Operation;
use crate::logging::{log_database_call, log_database_failure};
use crate::metrics::{DatabaseMetrics, OperationStatus};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct QueryEnvelope {
    backend: Arc<dyn StatementBackend>,
    metrics: Arc<DatabaseMetrics>,
}

impl QueryEnvelope {
    pub fn new(backend: Arc<dyn StatementBackend>, metrics: Arc<DatabaseMetrics>) -> Self {
        Self { backend, metrics }
    }

    pub fn backend(&self) -> &Arc<dyn StatementBackend> {
        &self.backend
    }

    pub fn metrics(&self) -> &Arc<DatabaseMetrics> {
        &self.metrics
    }

    pub async fn execute<O: Operation>(
        &self,
        operation: O,
        statement: &str,
        params: &[QueryParam],
    ) -> QueryResult<RowSet> {
        let name = operation.name();
        log_database_call(name);

        let timer = self.metrics.start_timer(name);
        let outcome = self.backend.run(statement, params).await;
        timer.observe_duration();

        match outcome {
            Ok(rows) => {
                self.metrics.record_outcome(name, OperationStatus::Success);
                debug!(target: "postgresql", query = %name, rows = rows.len(), "Database query succeeded");
                Ok(rows)
            }
            Err(BackendError::Acquire(detail)) => {
                self.metrics.record_outcome(name, OperationStatus::Error);
                log_database_failure(name, &detail);
                Err(QueryFailure::unavailable(detail))
            }
            Err(BackendError::Statement(detail)) => {
                self.metrics.record_outcome(name, OperationStatus::Error);
                log_database_failure(name, &detail);
                Err(QueryFailure::statement(operation.failure_message(), detail))
            }
        }
    }
}
