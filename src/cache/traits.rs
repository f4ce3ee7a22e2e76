//! Cache store trait

use super::errors::CacheResult;
use std::time::Duration;

/// Key-value operations the cache-aside layer needs from a store.
///
/// Keys are UTF-8 strings and values are JSON text. Implementations must be
/// safe to share across concurrent requests.
pub trait CacheService: Send + Sync {
    /// `Ok(Some(value))` on hit, `Ok(None)` on miss or expiry
    fn get(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = CacheResult<Option<String>>> + Send;

    /// Store `value` under `key`, expiring after `ttl` (whole seconds, at least one)
    fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> impl std::future::Future<Output = CacheResult<()>> + Send;

    /// Deleting an absent key succeeds
    fn delete(&self, key: &str) -> impl std::future::Future<Output = CacheResult<()>> + Send;

    /// Delete every key matching a glob pattern, returning how many were removed
    fn delete_pattern(
        &self,
        pattern: &str,
    ) -> impl std::future::Future<Output = CacheResult<u64>> + Send;

    fn health_check(&self) -> impl std::future::Future<Output = CacheResult<bool>> + Send;

    fn provider_name(&self) -> &'static str;
}
