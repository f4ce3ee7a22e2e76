//! In-process cache provider
//!
//! Backed by a bounded `moka` cache with per-entry TTL. Expired entries and
//! entries beyond `max_capacity` are evicted by moka's housekeeping, not only
//! when read. Suitable for single-instance deployments and tests;
//! invalidations do not propagate between processes.

use crate::cache::errors::CacheResult;
use crate::cache::traits::CacheService;
use moka::future::Cache;
use moka::Expiry;
use std::time::{Duration, Instant};
use tracing::debug;

/// Entry limit when none is configured
pub const DEFAULT_MAX_CAPACITY: u64 = 10_000;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    ttl: Duration,
}

/// Expires every entry after its own TTL; overwriting restarts the clock
struct EntryExpiry;

impl Expiry<String, Entry> for EntryExpiry {
    fn expire_after_create(&self, _key: &String, entry: &Entry, _created_at: Instant) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

#[derive(Clone)]
pub struct InMemoryCacheService {
    cache: Cache<String, Entry>,
}

impl std::fmt::Debug for InMemoryCacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryCacheService")
            .field("max_capacity", &self.cache.policy().max_capacity())
            .field("entry_count", &self.cache.entry_count())
            .finish()
    }
}

impl Default for InMemoryCacheService {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCacheService {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_CAPACITY)
    }

    pub fn with_capacity(max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(EntryExpiry)
            .build();

        debug!(max_capacity, "In-memory cache service created");

        Self { cache }
    }

    /// Number of live entries, after pending evictions have run
    pub async fn len(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.cache.contains_key(key)
    }
}

impl CacheService for InMemoryCacheService {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        Ok(self.cache.get(key).await.map(|entry| entry.value))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let entry = Entry {
            value: value.to_string(),
            ttl: Duration::from_secs(ttl.as_secs().max(1)),
        };
        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64> {
        let matching: Vec<String> = self
            .cache
            .iter()
            .filter(|(key, _)| glob_match(pattern, key))
            .map(|(key, _)| String::clone(&key))
            .collect();

        let mut deleted = 0u64;
        for key in matching {
            if self.cache.remove(&key).await.is_some() {
                deleted += 1;
            }
        }

        Ok(deleted)
    }

    async fn health_check(&self) -> CacheResult<bool> {
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }
}

/// Redis-style glob: `*` matches any run of characters, `?` exactly one
pub(crate) fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0usize, 0usize);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some('?') => {
                p += 1;
                t += 1;
            }
            Some(c) if *c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((star_p, star_t)) => {
                    p = star_p + 1;
                    t = star_t + 1;
                    backtrack = Some((star_p, star_t + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_match() {
        assert!(glob_match("users:*", "users:all"));
        assert!(glob_match("users:*", "users:42"));
        assert!(glob_match("users:*", "users:"));
        assert!(!glob_match("users:*", "tasks:42"));
        assert!(!glob_match("users:*", "users"));
        assert!(glob_match("users:?", "users:7"));
        assert!(!glob_match("users:?", "users:77"));
        assert!(glob_match("*:all", "users:all"));
        assert!(glob_match("u*s:*1", "users:21"));
        assert!(glob_match("*", ""));
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let svc = InMemoryCacheService::new();

        svc.set("users:1", "{\"id\":1}", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(svc.get("users:1").await.unwrap().as_deref(), Some("{\"id\":1}"));

        svc.delete("users:1").await.unwrap();
        assert_eq!(svc.get("users:1").await.unwrap(), None);

        // Deleting again is a no-op
        svc.delete("users:1").await.unwrap();
    }

    #[tokio::test]
    async fn test_pattern_delete_leaves_other_families() {
        let svc = InMemoryCacheService::new();
        let ttl = Duration::from_secs(60);

        svc.set("users:all", "[]", ttl).await.unwrap();
        svc.set("users:1", "{}", ttl).await.unwrap();
        svc.set("users:2", "{}", ttl).await.unwrap();
        svc.set("tasks:all", "[]", ttl).await.unwrap();

        assert_eq!(svc.delete_pattern("users:*").await.unwrap(), 3);
        assert_eq!(svc.delete_pattern("users:*").await.unwrap(), 0);
        assert!(svc.contains_key("tasks:all"));
        assert_eq!(svc.len().await, 1);
    }

    #[tokio::test]
    async fn test_expired_entries_are_evicted_without_reads() {
        let svc = InMemoryCacheService::new();

        for id in 0..500 {
            svc.set(&format!("users:{id}"), "{}", Duration::from_secs(1))
                .await
                .unwrap();
        }
        assert_eq!(svc.len().await, 500);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        svc.set("users:all", "[]", Duration::from_secs(60)).await.unwrap();

        assert_eq!(svc.len().await, 1);
        assert!(svc.contains_key("users:all"));
        assert!(!svc.contains_key("users:0"));
    }

    #[tokio::test]
    async fn test_overwrite_restarts_ttl() {
        let svc = InMemoryCacheService::new();

        svc.set("users:1", "old", Duration::from_secs(1)).await.unwrap();
        svc.set("users:1", "new", Duration::from_secs(60)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert_eq!(svc.get("users:1").await.unwrap().as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn test_capacity_is_bounded() {
        let svc = InMemoryCacheService::with_capacity(10);

        for id in 0..200 {
            svc.set(&format!("users:{id}"), "{}", Duration::from_secs(60))
                .await
                .unwrap();
        }

        assert!(svc.len().await <= 10);
        assert!(format!("{svc:?}").contains("max_capacity: Some(10)"));
    }

    #[tokio::test]
    async fn test_provider_name() {
        assert_eq!(InMemoryCacheService::new().provider_name(), "memory");
    }
}
