//! # Database Metrics
//!
//! Counters, duration histogram and connection gauge recorded by the query
//! envelope and the pool lifecycle hooks.

use crate::error::CrudResult;
use prometheus::{
    HistogramOpts, HistogramTimer, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
};

/// Operation duration buckets (seconds)
const DB_LATENCY_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0];

/// Terminal outcome label for a database operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    Success,
    Error,
}

impl OperationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationStatus::Success => "success",
            OperationStatus::Error => "error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseMetrics {
    /// Labels: operation, status
    operations_total: IntCounterVec,
    /// Labels: operation
    operation_duration: HistogramVec,
    connections_active: IntGauge,
}

impl DatabaseMetrics {
    pub fn new() -> CrudResult<Self> {
        Ok(Self {
            operations_total: IntCounterVec::new(
                Opts::new(
                    "database_operations_total",
                    "Total number of database operations",
                ),
                &["operation", "status"],
            )?,
            operation_duration: HistogramVec::new(
                HistogramOpts::new(
                    "database_operation_duration_seconds",
                    "Duration of database operations in seconds",
                )
                .buckets(DB_LATENCY_BUCKETS.to_vec()),
                &["operation"],
            )?,
            connections_active: IntGauge::new(
                "database_connections_active",
                "Number of active database connections",
            )?,
        })
    }

    pub(crate) fn register(&self, registry: &Registry) -> CrudResult<()> {
        registry.register(Box::new(self.operations_total.clone()))?;
        registry.register(Box::new(self.operation_duration.clone()))?;
        registry.register(Box::new(self.connections_active.clone()))?;
        Ok(())
    }

    /// Start the wall-clock timer for one operation.
    ///
    /// The observation is recorded when the timer is stopped or dropped, so
    /// every started timer yields exactly one observation.
    pub fn start_timer(&self, operation: &str) -> HistogramTimer {
        self.operation_duration
            .with_label_values(&[operation])
            .start_timer()
    }

    pub fn record_outcome(&self, operation: &str, status: OperationStatus) {
        self.operations_total
            .with_label_values(&[operation, status.as_str()])
            .inc();
    }

    pub fn operation_count(&self, operation: &str, status: OperationStatus) -> u64 {
        self.operations_total
            .with_label_values(&[operation, status.as_str()])
            .get()
    }

    pub fn observation_count(&self, operation: &str) -> u64 {
        self.operation_duration
            .with_label_values(&[operation])
            .get_sample_count()
    }

    /// Handle to the live-connection gauge, for the pool hooks
    pub fn connections_active(&self) -> IntGauge {
        self.connections_active.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcomes_are_counted_per_status() {
        let metrics = DatabaseMetrics::new().unwrap();

        metrics.record_outcome("SELECT_TASKS", OperationStatus::Success);
        metrics.record_outcome("SELECT_TASKS", OperationStatus::Success);
        metrics.record_outcome("SELECT_TASKS", OperationStatus::Error);

        assert_eq!(metrics.operation_count("SELECT_TASKS", OperationStatus::Success), 2);
        assert_eq!(metrics.operation_count("SELECT_TASKS", OperationStatus::Error), 1);
        assert_eq!(metrics.operation_count("INSERT_TASK", OperationStatus::Success), 0);
    }

    #[test]
    fn test_dropped_timer_still_observes() {
        let metrics = DatabaseMetrics::new().unwrap();

        {
            let _timer = metrics.start_timer("DELETE_TASK");
        }
        metrics.start_timer("DELETE_TASK").observe_duration();

        assert_eq!(metrics.observation_count("DELETE_TASK"), 2);
    }
}
