//! # Metrics Registry
//!
//! Prometheus instruments for the data-access core, owned by one
//! [`MetricsRegistry`] that is built at startup and handed to the components
//! that record into it. Nothing here touches the prometheus default registry,
//! so independent registries (one per test, for example) never collide.
//!
//! ## Instruments
//!
//! - `database_operations_total{operation,status}` (counter)
//! - `database_operation_duration_seconds{operation}` (histogram)
//! - `database_connections_active` (gauge)
//! - `http_requests_total{method,route,status_code}` (counter)
//! - `http_request_duration_seconds{method,route,status_code}` (histogram)
//! - `process_*` default process metrics (Linux only)

pub mod database;
pub mod http;

use crate::error::CrudResult;
use prometheus::core::Collector;
use prometheus::{Encoder, Registry, TextEncoder};
use std::sync::Arc;
use tracing::debug;

pub use database::{DatabaseMetrics, OperationStatus};
pub use http::{HttpMetrics, RouteNormalizer};

/// Process-wide metric instruments and their exposition
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    database: Arc<DatabaseMetrics>,
    http: Arc<HttpMetrics>,
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRegistry")
            .field("families", &self.registry.gather().len())
            .finish()
    }
}

impl MetricsRegistry {
    /// Build a registry with the database and HTTP instruments registered
    pub fn new() -> CrudResult<Self> {
        Self::with_normalizer(RouteNormalizer::for_services())
    }

    pub fn with_normalizer(normalizer: RouteNormalizer) -> CrudResult<Self> {
        let registry = Registry::new();

        let database = DatabaseMetrics::new()?;
        database.register(&registry)?;

        let http = HttpMetrics::new(normalizer)?;
        http.register(&registry)?;

        #[cfg(target_os = "linux")]
        registry.register(Box::new(prometheus::process_collector::ProcessCollector::for_self()))?;

        debug!("Metrics registry initialized");

        Ok(Self {
            registry,
            database: Arc::new(database),
            http: Arc::new(http),
        })
    }

    pub fn database(&self) -> Arc<DatabaseMetrics> {
        Arc::clone(&self.database)
    }

    pub fn http(&self) -> Arc<HttpMetrics> {
        Arc::clone(&self.http)
    }

    /// Register an additional collector; registering the same one twice fails
    pub fn register(&self, collector: Box<dyn Collector>) -> CrudResult<()> {
        self.registry.register(collector)?;
        Ok(())
    }

    /// Render every registered instrument in the text exposition format
    pub fn snapshot(&self) -> CrudResult<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| crate::error::CrudError::MetricsError(e.to_string()))
    }

    /// MIME type matching [`Self::snapshot`]
    pub fn content_type(&self) -> &'static str {
        prometheus::TEXT_FORMAT
    }

    /// Number of distinct label sets currently exported for a metric family
    pub fn series_count(&self, family: &str) -> usize {
        self.registry
            .gather()
            .iter()
            .find(|mf| mf.get_name() == family)
            .map(|mf| mf.get_metric().len())
            .unwrap_or(0)
    }
}
