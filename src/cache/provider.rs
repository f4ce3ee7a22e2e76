//! Cache provider
//!
//! Enum dispatch over the concrete stores so the rest of the crate holds one
//! concrete, cloneable type. Construction never fails. NoOp is reserved for a
//! disabled flag or settings that cannot describe a store; an unreachable
//! Redis keeps its provider, which reconnects in the background while every
//! command reports a cache error.

use super::errors::CacheResult;
use super::providers::{InMemoryCacheService, NoOpCacheService};
use super::traits::CacheService;
use crate::config::{CacheBackendKind, CacheConfig, FeatureFlags};
use std::time::Duration;
use tracing::{info, warn};

#[cfg(feature = "cache-redis")]
use super::providers::RedisCacheService;

#[derive(Debug, Clone)]
enum CacheBackend {
    /// Boxed to keep the enum small
    #[cfg(feature = "cache-redis")]
    Redis(Box<RedisCacheService>),
    Memory(InMemoryCacheService),
    NoOp(NoOpCacheService),
}

/// The cache store selected at startup
#[derive(Debug, Clone)]
pub struct CacheProvider {
    backend: CacheBackend,
}

impl CacheProvider {
    /// Build the configured store. Never fails; NoOp stands in when the flag
    /// is off or the settings cannot describe a store.
    ///
    /// The store is only contacted when `flags` has the cache enabled.
    pub async fn from_config_graceful(config: &CacheConfig, flags: &FeatureFlags) -> Self {
        if !flags.cache_enabled() {
            info!("Cache disabled by FEATURE_REDIS_CACHE");
            return Self::noop();
        }

        let backend = match config.backend {
            CacheBackendKind::Redis => Self::create_redis_backend(config).await,
            CacheBackendKind::Memory => {
                info!(
                    backend = "memory",
                    ttl_seconds = config.default_ttl_seconds,
                    max_entries = config.max_entries,
                    "In-memory cache provider initialized"
                );
                CacheBackend::Memory(InMemoryCacheService::with_capacity(config.max_entries))
            }
        };

        Self { backend }
    }

    #[cfg(feature = "cache-redis")]
    async fn create_redis_backend(config: &CacheConfig) -> CacheBackend {
        let service = match RedisCacheService::from_config(config) {
            Ok(service) => service,
            Err(e) => {
                warn!(error = %e, "Unusable Redis settings, falling back to NoOp cache");
                return CacheBackend::NoOp(NoOpCacheService::new());
            }
        };

        if service.connect_now().await {
            info!(
                backend = "redis",
                endpoint = %config.endpoint(),
                "Redis cache provider initialized"
            );
        } else {
            warn!(
                backend = "redis",
                endpoint = %config.endpoint(),
                "Redis unreachable at startup, reads go to the database until it reconnects"
            );
        }
        CacheBackend::Redis(Box::new(service))
    }

    #[cfg(not(feature = "cache-redis"))]
    async fn create_redis_backend(_config: &CacheConfig) -> CacheBackend {
        warn!("Redis cache backend requested but 'cache-redis' feature not enabled, using NoOp");
        CacheBackend::NoOp(NoOpCacheService::new())
    }

    pub fn noop() -> Self {
        Self {
            backend: CacheBackend::NoOp(NoOpCacheService::new()),
        }
    }

    pub fn memory(service: InMemoryCacheService) -> Self {
        Self {
            backend: CacheBackend::Memory(service),
        }
    }

    /// False when the NoOp store stands in
    pub fn is_enabled(&self) -> bool {
        !matches!(self.backend, CacheBackend::NoOp(_))
    }
}

impl CacheService for CacheProvider {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        match &self.backend {
            #[cfg(feature = "cache-redis")]
            CacheBackend::Redis(s) => s.get(key).await,
            CacheBackend::Memory(s) => s.get(key).await,
            CacheBackend::NoOp(s) => s.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        match &self.backend {
            #[cfg(feature = "cache-redis")]
            CacheBackend::Redis(s) => s.set(key, value, ttl).await,
            CacheBackend::Memory(s) => s.set(key, value, ttl).await,
            CacheBackend::NoOp(s) => s.set(key, value, ttl).await,
        }
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        match &self.backend {
            #[cfg(feature = "cache-redis")]
            CacheBackend::Redis(s) => s.delete(key).await,
            CacheBackend::Memory(s) => s.delete(key).await,
            CacheBackend::NoOp(s) => s.delete(key).await,
        }
    }

    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64> {
        match &self.backend {
            #[cfg(feature = "cache-redis")]
            CacheBackend::Redis(s) => s.delete_pattern(pattern).await,
            CacheBackend::Memory(s) => s.delete_pattern(pattern).await,
            CacheBackend::NoOp(s) => s.delete_pattern(pattern).await,
        }
    }

    async fn health_check(&self) -> CacheResult<bool> {
        match &self.backend {
            #[cfg(feature = "cache-redis")]
            CacheBackend::Redis(s) => s.health_check().await,
            CacheBackend::Memory(s) => s.health_check().await,
            CacheBackend::NoOp(s) => s.health_check().await,
        }
    }

    fn provider_name(&self) -> &'static str {
        match &self.backend {
            #[cfg(feature = "cache-redis")]
            CacheBackend::Redis(s) => s.provider_name(),
            CacheBackend::Memory(s) => s.provider_name(),
            CacheBackend::NoOp(s) => s.provider_name(),
        }
    }
}
