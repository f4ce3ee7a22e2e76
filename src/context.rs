//! # Service Context
//!
//! Owns every process-wide handle (metrics, pool, cache, flags) and wires
//! them into the repositories. Built once at startup; nothing in the crate
//! reaches for global state.

use crate::cache::{CacheAside, CacheProvider, CacheService};
use crate::config::{FeatureFlagHandle, ServiceConfig};
use crate::database::pool::DEFAULT_RECONCILE_INTERVAL;
use crate::database::{
    build_pool, PgStatementBackend, PoolLifecycleHooks, PoolMonitor, QueryEnvelope,
    StatementBackend,
};
use crate::error::CrudResult;
use crate::health::{self, HealthReport};
use crate::metrics::MetricsRegistry;
use crate::services::{TaskRepository, UserRepository};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

#[derive(Debug)]
pub struct ServiceContext {
    config: Arc<ServiceConfig>,
    metrics: MetricsRegistry,
    flags: Arc<FeatureFlagHandle>,
    hooks: PoolLifecycleHooks,
    pool: PgPool,
    monitor: PoolMonitor,
    envelope: QueryEnvelope,
    cache: CacheProvider,
    users: UserRepository,
    tasks: TaskRepository,
}

impl ServiceContext {
    /// Wire every component. No network I/O happens here except the cache
    /// first cache connection attempt; a failed attempt is retried in the
    /// background.
    pub async fn bootstrap(config: ServiceConfig) -> CrudResult<Self> {
        let metrics = MetricsRegistry::new()?;

        let hooks = PoolLifecycleHooks::for_config(&config.database);
        hooks.attach(metrics.database().connections_active());
        let pool = build_pool(&config.database, hooks.clone());

        let backend: Arc<dyn StatementBackend> = Arc::new(PgStatementBackend::new(pool.clone()));
        let envelope = QueryEnvelope::new(backend, metrics.database());

        let flags = Arc::new(FeatureFlagHandle::new(config.features));
        let cache = CacheProvider::from_config_graceful(&config.cache, &config.features).await;
        let cache_aside = CacheAside::new(
            cache.clone(),
            Arc::clone(&flags),
            config.cache.default_ttl(),
            config.cache.operation_timeout(),
        );

        let users = UserRepository::new(envelope.clone(), cache_aside, config.schema.users.clone());
        let tasks = TaskRepository::new(
            envelope.clone(),
            Arc::clone(&flags),
            config.schema.tasks.clone(),
        );

        let monitor = PoolMonitor::spawn(pool.clone(), hooks.clone(), DEFAULT_RECONCILE_INTERVAL);

        info!(
            database = %config.database.name,
            cache_provider = cache.provider_name(),
            features = ?config.features,
            "Service context ready"
        );

        Ok(Self {
            config: Arc::new(config),
            metrics,
            flags,
            hooks,
            pool,
            monitor,
            envelope,
            cache,
            users,
            tasks,
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    pub fn flags(&self) -> &Arc<FeatureFlagHandle> {
        &self.flags
    }

    pub fn envelope(&self) -> &QueryEnvelope {
        &self.envelope
    }

    pub fn cache(&self) -> &CacheProvider {
        &self.cache
    }

    pub fn users(&self) -> &UserRepository {
        &self.users
    }

    pub fn tasks(&self) -> &TaskRepository {
        &self.tasks
    }

    pub async fn check_database(&self, service: &str) -> HealthReport {
        health::check_database(service, self.envelope.backend().as_ref()).await
    }

    pub async fn check_cache(&self) -> HealthReport {
        health::check_cache(&self.flags.snapshot(), &self.cache).await
    }

    /// Stop the monitor, close every pooled connection and zero the gauge
    pub async fn shutdown(self) {
        self.monitor.stop().await;
        self.pool.close().await;
        self.hooks.reconcile(self.pool.size());
        info!("Service context shut down");
    }
}
