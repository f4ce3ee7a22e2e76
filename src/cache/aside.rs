//! Cache-aside reads and pattern invalidation.
//!
//! The cache is an optimisation only. Every store failure, timeout or
//! undecodable payload is logged at debug level and handled as a miss, so a
//! caller sees exactly what its loader would have produced.

use super::errors::{CacheError, CacheResult};
use super::provider::CacheProvider;
use super::traits::CacheService;
use crate::config::FeatureFlagHandle;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A value together with where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLookup<T> {
    pub value: T,
    /// True only when the value was served from the store
    pub cached: bool,
}

impl<T> CacheLookup<T> {
    pub fn loaded(value: T) -> Self {
        Self {
            value,
            cached: false,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CacheLookup<U> {
        CacheLookup {
            value: f(self.value),
            cached: self.cached,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheAside<S = CacheProvider> {
    store: S,
    flags: Arc<FeatureFlagHandle>,
    default_ttl: Duration,
    operation_timeout: Duration,
}

impl<S: CacheService> CacheAside<S> {
    pub fn new(
        store: S,
        flags: Arc<FeatureFlagHandle>,
        default_ttl: Duration,
        operation_timeout: Duration,
    ) -> Self {
        Self {
            store,
            flags,
            default_ttl,
            operation_timeout,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Serve `key` from the store, or run `loader` and store its value.
    ///
    /// Loader errors are returned unchanged and nothing is stored for them.
    /// A value that serialises to JSON `null` is returned but not stored.
    pub async fn get_or_load<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        loader: F,
    ) -> Result<CacheLookup<T>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.flags.snapshot().cache_enabled() {
            return loader().await.map(CacheLookup::loaded);
        }

        match self.lookup::<T>(key).await {
            Ok(Some(value)) => {
                debug!(key = key, provider = self.store.provider_name(), "Cache HIT");
                return Ok(CacheLookup {
                    value,
                    cached: true,
                });
            }
            Ok(None) => {
                debug!(key = key, provider = self.store.provider_name(), "Cache MISS");
            }
            Err(e) => {
                debug!(key = key, error = %e, "Cache read failed, loading from database");
            }
        }

        let value = loader().await?;

        if let Err(e) = self.store_value(key, &value, ttl).await {
            debug!(key = key, error = %e, "Cache write skipped");
        }

        Ok(CacheLookup::loaded(value))
    }

    /// Delete every key matching `pattern`. Failures are logged, never returned.
    ///
    /// Runs regardless of the flag so a flag flipped at runtime cannot leave
    /// stale entries behind.
    pub async fn invalidate(&self, pattern: &str) -> u64 {
        match self
            .bounded("delete_pattern", self.store.delete_pattern(pattern))
            .await
        {
            Ok(deleted) => {
                debug!(pattern = pattern, deleted = deleted, "Cache invalidated");
                deleted
            }
            Err(e) => {
                debug!(pattern = pattern, error = %e, "Cache invalidation failed");
                0
            }
        }
    }

    async fn lookup<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        let Some(text) = self.bounded("get", self.store.get(key)).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&text)?))
    }

    async fn store_value<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> CacheResult<()> {
        let text = serde_json::to_string(value)?;
        if text == "null" {
            return Ok(());
        }
        self.bounded("set", self.store.set(key, &text, ttl)).await
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = CacheResult<T>>,
    ) -> CacheResult<T> {
        match tokio::time::timeout(self.operation_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout(format!(
                "{operation} exceeded {:?}",
                self.operation_timeout
            ))),
        }
    }
}
