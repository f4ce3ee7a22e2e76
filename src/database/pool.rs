//! # Connection Pool Lifecycle
//!
//! Builds the shared `sqlx` pool and keeps `database_connections_active` in
//! step with the physical connections it holds.
//!
//! `sqlx` only reports opens (`after_connect`). Lifetime expiry is therefore
//! enforced here in `after_release`, where the close can be observed; closes
//! the pool performs on its own (idle reaping, failed health checks) are
//! caught by [`PoolMonitor`], which periodically sets the gauge to
//! `pool.size()`.

use crate::config::DatabaseConfig;
use crate::logging::{log_pool_event, PoolEvent};
use prometheus::IntGauge;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Default interval between gauge reconciliations
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(15);

/// Connect/remove callbacks shared by every clone.
///
/// Events that arrive before [`attach`](Self::attach) are dropped; the pool
/// may well open its first connection before metrics are wired.
#[derive(Debug, Clone)]
pub struct PoolLifecycleHooks {
    gauge: Arc<OnceLock<IntGauge>>,
    host: Arc<str>,
    database: Arc<str>,
}

impl PoolLifecycleHooks {
    pub fn new(host: &str, database: &str) -> Self {
        Self {
            gauge: Arc::new(OnceLock::new()),
            host: Arc::from(host),
            database: Arc::from(database),
        }
    }

    pub fn for_config(config: &DatabaseConfig) -> Self {
        Self::new(&config.host, &config.name)
    }

    /// Wire the gauge. Returns false if one was already attached.
    pub fn attach(&self, gauge: IntGauge) -> bool {
        self.gauge.set(gauge).is_ok()
    }

    pub fn is_attached(&self) -> bool {
        self.gauge.get().is_some()
    }

    pub fn on_connect(&self) {
        if let Some(gauge) = self.gauge.get() {
            gauge.inc();
        }
        log_pool_event(PoolEvent::Connected, &self.host, &self.database);
    }

    pub fn on_remove(&self) {
        if let Some(gauge) = self.gauge.get() {
            gauge.dec();
        }
        log_pool_event(PoolEvent::Removed, &self.host, &self.database);
    }

    /// Overwrite the gauge with the pool's own count of open connections
    pub fn reconcile(&self, open_connections: u32) {
        if let Some(gauge) = self.gauge.get() {
            let observed = i64::from(open_connections);
            if gauge.get() != observed {
                debug!(
                    gauge = gauge.get(),
                    observed = observed,
                    "Reconciling database connection gauge"
                );
                gauge.set(observed);
            }
        }
    }

    /// Current gauge value, `None` before attach
    pub fn value(&self) -> Option<i64> {
        self.gauge.get().map(IntGauge::get)
    }
}

/// Build the shared pool. No connection is opened until first use.
pub fn build_pool(config: &DatabaseConfig, hooks: PoolLifecycleHooks) -> PgPool {
    let options = PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user)
        .password(&config.password)
        .database(&config.name);

    let max_lifetime = config.pool.max_lifetime();
    let connect_hooks = hooks.clone();
    let release_hooks = hooks;

    info!(
        host = %config.host,
        database = %config.name,
        max_connections = config.pool.max_connections,
        acquire_timeout_seconds = config.pool.acquire_timeout_seconds,
        "Building database connection pool"
    );

    PgPoolOptions::new()
        .max_connections(config.pool.max_connections)
        .acquire_timeout(config.pool.acquire_timeout())
        .max_lifetime(None)
        .after_connect(move |_conn, _meta| {
            let hooks = connect_hooks.clone();
            Box::pin(async move {
                hooks.on_connect();
                Ok(())
            })
        })
        .after_release(move |_conn, meta| {
            let hooks = release_hooks.clone();
            Box::pin(async move {
                if meta.age >= max_lifetime {
                    hooks.on_remove();
                    Ok(false)
                } else {
                    Ok(true)
                }
            })
        })
        .connect_lazy_with(options)
}

/// Background task that reconciles the connection gauge until stopped.
///
/// Dropping the monitor without [`PoolMonitor::stop`] aborts the task.
#[derive(Debug)]
pub struct PoolMonitor {
    shutdown: Arc<Notify>,
    handle: Option<JoinHandle<()>>,
}

impl PoolMonitor {
    pub fn spawn(pool: PgPool, hooks: PoolLifecycleHooks, interval: Duration) -> Self {
        let shutdown = Arc::new(Notify::new());
        let shutdown_signal = Arc::clone(&shutdown);

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        hooks.reconcile(pool.size());
                    }
                    _ = shutdown_signal.notified() => {
                        debug!("Pool monitor shutting down");
                        break;
                    }
                }
            }
        });

        Self {
            shutdown,
            handle: Some(handle),
        }
    }

    pub async fn stop(mut self) {
        self.shutdown.notify_one();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                debug!(error = %e, "Pool monitor task ended abnormally");
            }
        }
    }
}

impl Drop for PoolMonitor {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.shutdown.notify_one();
            handle.abort();
        }
    }
}
