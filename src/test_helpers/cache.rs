//! Cache store that fails every call, standing in for an unreachable server

use crate::cache::{CacheError, CacheResult, CacheService};
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default)]
pub struct UnreachableCacheService;

impl UnreachableCacheService {
    fn refused<T>() -> CacheResult<T> {
        Err(CacheError::ConnectionError("Connection refused (os error 111)".to_string()))
    }
}

impl CacheService for UnreachableCacheService {
    async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
        Self::refused()
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> CacheResult<()> {
        Self::refused()
    }

    async fn delete(&self, _key: &str) -> CacheResult<()> {
        Self::refused()
    }

    async fn delete_pattern(&self, _pattern: &str) -> CacheResult<u64> {
        Self::refused()
    }

    async fn health_check(&self) -> CacheResult<bool> {
        Self::refused()
    }

    fn provider_name(&self) -> &'static str {
        "unreachable"
    }
}
