//! Liveness, readiness and cache health reports.
//!
//! Reports serialise to the JSON bodies the services return from `/health`,
//! `/live`, `/ready` and `/health/redis`.

use crate::cache::CacheService;
use crate::config::FeatureFlags;
use crate::database::StatementBackend;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HealthStatus {
    #[serde(rename = "healthy")]
    Healthy,
    #[serde(rename = "alive")]
    Alive,
    #[serde(rename = "ready")]
    Ready,
    #[serde(rename = "not ready")]
    NotReady,
    #[serde(rename = "disabled")]
    Disabled,
    #[serde(rename = "unhealthy")]
    Unhealthy,
}

impl HealthStatus {
    /// False for states served with 503
    pub fn is_ok(self) -> bool {
        !matches!(self, HealthStatus::NotReady | HealthStatus::Unhealthy)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub service: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl HealthReport {
    fn new(status: HealthStatus, service: &str) -> Self {
        Self {
            status,
            service: service.to_string(),
            message: None,
            error: None,
            timestamp: Utc::now(),
        }
    }

    fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

pub fn health(service: &str) -> HealthReport {
    HealthReport::new(HealthStatus::Healthy, service)
}

pub fn liveness(service: &str) -> HealthReport {
    HealthReport::new(HealthStatus::Alive, service)
}

/// Readiness: one `SELECT 1` on a pooled connection
pub async fn check_database(service: &str, backend: &dyn StatementBackend) -> HealthReport {
    match backend.run("SELECT 1", &[]).await {
        Ok(_) => HealthReport::new(HealthStatus::Ready, service),
        Err(e) => {
            warn!(error = %e, "Readiness check failed");
            HealthReport::new(HealthStatus::NotReady, service).with_error(e.to_string())
        }
    }
}

/// Cache health, honouring the cache flag.
///
/// With the flag on, the NoOp store means the configured settings could not
/// describe a store, which is reported as unhealthy. A disconnected Redis
/// surfaces through its failing ping.
pub async fn check_cache<S: CacheService>(flags: &FeatureFlags, store: &S) -> HealthReport {
    const SERVICE: &str = "cache";

    if !flags.cache_enabled() {
        return HealthReport::new(HealthStatus::Disabled, SERVICE)
            .with_message("Caching is disabled via feature flag");
    }

    if store.provider_name() == "noop" {
        return HealthReport::new(HealthStatus::Unhealthy, SERVICE)
            .with_error("cache store unavailable, running without cache");
    }

    match store.health_check().await {
        Ok(true) => HealthReport::new(HealthStatus::Healthy, SERVICE)
            .with_message(store.provider_name()),
        Ok(false) => HealthReport::new(HealthStatus::Unhealthy, SERVICE)
            .with_error("unexpected health check reply"),
        Err(e) => HealthReport::new(HealthStatus::Unhealthy, SERVICE).with_error(e.to_string()),
    }
}
