//! Redis cache provider
//!
//! The client is built from structured connection info (host, port, password)
//! so no credential is ever rendered into a URL. The connection itself is
//! established lazily: a failed attempt leaves the service in place, every
//! command fails fast as a cache error, and a new attempt is started in the
//! background once `retry_interval` has passed. Once connected,
//! `ConnectionManager` handles reconnection on its own. Requires the
//! `cache-redis` feature flag.

use crate::cache::errors::{CacheError, CacheResult};
use crate::cache::traits::CacheService;
use crate::config::CacheConfig;
use parking_lot::{Mutex, RwLock};
use redis::aio::ConnectionManager;
use redis::{Cmd, ConnectionAddr, ConnectionInfo, FromRedisValue, RedisConnectionInfo};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Upper bound on one connection attempt
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Minimum spacing between background connection attempts
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Keys fetched per SCAN round-trip during pattern deletion
const SCAN_BATCH: u64 = 100;

struct Shared {
    client: redis::Client,
    endpoint: String,
    manager: RwLock<Option<ConnectionManager>>,
    connecting: AtomicBool,
    next_attempt: Mutex<Instant>,
    connect_timeout: Duration,
    retry_interval: Duration,
    command_timeout: Duration,
}

/// Redis-backed cache service
///
/// Works against any server speaking the Redis protocol (Dragonfly, KeyDB).
/// Pattern deletion walks the keyspace with SCAN rather than KEYS so a large
/// keyspace never blocks the server.
#[derive(Clone)]
pub struct RedisCacheService {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for RedisCacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCacheService")
            .field("endpoint", &self.shared.endpoint)
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Structured connection settings; the password travels verbatim
pub fn connection_info(config: &CacheConfig) -> ConnectionInfo {
    ConnectionInfo {
        addr: ConnectionAddr::Tcp(config.host.clone(), config.port),
        redis: RedisConnectionInfo {
            password: config.password.clone(),
            ..RedisConnectionInfo::default()
        },
    }
}

impl RedisCacheService {
    /// Build the client without connecting
    pub fn from_config(config: &CacheConfig) -> CacheResult<Self> {
        Self::with_timing(config, DEFAULT_CONNECT_TIMEOUT, DEFAULT_RETRY_INTERVAL)
    }

    pub fn with_timing(
        config: &CacheConfig,
        connect_timeout: Duration,
        retry_interval: Duration,
    ) -> CacheResult<Self> {
        let client = redis::Client::open(connection_info(config)).map_err(|e| {
            CacheError::ConnectionError(format!("Invalid Redis client settings: {e}"))
        })?;

        Ok(Self {
            shared: Arc::new(Shared {
                client,
                endpoint: config.endpoint(),
                manager: RwLock::new(None),
                connecting: AtomicBool::new(false),
                next_attempt: Mutex::new(Instant::now()),
                connect_timeout,
                retry_interval,
                command_timeout: config.operation_timeout(),
            }),
        })
    }

    pub fn is_connected(&self) -> bool {
        self.shared.manager.read().is_some()
    }

    /// Make one bounded connection attempt; true once connected
    pub async fn connect_now(&self) -> bool {
        if self.is_connected() {
            return true;
        }

        let shared = &self.shared;
        let attempt = tokio::time::timeout(
            shared.connect_timeout,
            ConnectionManager::new(shared.client.clone()),
        )
        .await;

        match attempt {
            Ok(Ok(manager)) => {
                *shared.manager.write() = Some(manager);
                info!(endpoint = %shared.endpoint, "Redis connection established");
                true
            }
            Ok(Err(e)) => {
                warn!(endpoint = %shared.endpoint, error = %e, "Redis connection failed");
                false
            }
            Err(_) => {
                warn!(
                    endpoint = %shared.endpoint,
                    timeout_ms = shared.connect_timeout.as_millis() as u64,
                    "Redis connection attempt timed out"
                );
                false
            }
        }
    }

    /// Start a background attempt unless one is running or the last one is
    /// too recent
    fn schedule_reconnect(&self) {
        {
            let mut next_attempt = self.shared.next_attempt.lock();
            let now = Instant::now();
            if now < *next_attempt || self.shared.connecting.swap(true, Ordering::SeqCst) {
                return;
            }
            *next_attempt = now + self.shared.retry_interval;
        }

        debug!(endpoint = %self.shared.endpoint, "Scheduling Redis reconnect");
        let service = self.clone();
        tokio::spawn(async move {
            service.connect_now().await;
            service.shared.connecting.store(false, Ordering::SeqCst);
        });
    }

    fn connection(&self) -> CacheResult<ConnectionManager> {
        if let Some(manager) = self.shared.manager.read().clone() {
            return Ok(manager);
        }

        self.schedule_reconnect();
        Err(CacheError::ConnectionError(format!(
            "Redis at {} is not connected",
            self.shared.endpoint
        )))
    }

    async fn query<T: FromRedisValue>(&self, command: &Cmd, name: &str) -> CacheResult<T> {
        let mut connection = self.connection()?;
        let timeout = self.shared.command_timeout;

        match tokio::time::timeout(timeout, command.query_async::<T>(&mut connection)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(CacheError::BackendError(format!("Redis {name} failed: {e}"))),
            Err(_) => Err(CacheError::Timeout(format!(
                "Redis {name} exceeded {}ms",
                timeout.as_millis()
            ))),
        }
    }
}

impl CacheService for RedisCacheService {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.query(&Cmd::get(key), "GET").await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let command = Cmd::set_ex(key, value, ttl.as_secs().max(1));
        self.query(&command, "SETEX").await
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.query::<u64>(&Cmd::del(key), "DEL").await.map(|_| ())
    }

    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64> {
        let mut deleted = 0u64;
        let mut cursor = 0u64;

        loop {
            let mut scan = redis::cmd("SCAN");
            scan.arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH);
            let (next_cursor, keys): (u64, Vec<String>) = self.query(&scan, "SCAN").await?;

            if !keys.is_empty() {
                deleted += self.query::<u64>(&Cmd::del(&keys), "DEL").await?;
            }

            if next_cursor == 0 {
                return Ok(deleted);
            }
            cursor = next_cursor;
        }
    }

    async fn health_check(&self) -> CacheResult<bool> {
        let pong: String = self.query(&redis::cmd("PING"), "PING").await?;
        Ok(pong == "PONG")
    }

    fn provider_name(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::FakeRedisServer;

    fn config(port: u16, password: Option<&str>) -> CacheConfig {
        CacheConfig {
            host: "127.0.0.1".to_string(),
            port,
            password: password.map(str::to_string),
            operation_timeout_ms: 500,
            ..CacheConfig::default()
        }
    }

    #[test]
    fn test_passwords_with_url_delimiters_are_kept_verbatim() {
        for password in ["p@ssw0rd", "a/b#c", "x:y@z/w#q"] {
            let info = connection_info(&config(6379, Some(password)));
            assert_eq!(info.redis.password.as_deref(), Some(password));

            let service = RedisCacheService::from_config(&config(6379, Some(password))).unwrap();
            let debug = format!("{service:?}");
            assert!(debug.contains("127.0.0.1:6379"));
            assert!(!debug.contains(password));
        }
    }

    #[tokio::test]
    async fn test_commands_fail_fast_while_disconnected() {
        let service = RedisCacheService::with_timing(
            &config(1, None),
            Duration::from_millis(300),
            Duration::from_secs(60),
        )
        .unwrap();

        assert!(!service.connect_now().await);
        assert!(!service.is_connected());
        assert!(matches!(
            service.get("users:all").await,
            Err(CacheError::ConnectionError(_))
        ));
        assert!(service.health_check().await.is_err());
    }

    #[tokio::test]
    async fn test_reconnects_once_server_is_available() {
        let port = FakeRedisServer::unused_port().await.unwrap();
        let service = RedisCacheService::with_timing(
            &config(port, Some("p@ss/w#rd")),
            Duration::from_millis(500),
            Duration::from_millis(50),
        )
        .unwrap();

        assert!(!service.connect_now().await);
        assert!(service.get("users:all").await.is_err());

        let _server = FakeRedisServer::start_on(port).await.unwrap();

        let mut healthy = false;
        for _ in 0..60 {
            if service.health_check().await.unwrap_or(false) {
                healthy = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(healthy, "service never reconnected");

        service
            .set("users:1", "{\"id\":1}", Duration::from_secs(60))
            .await
            .unwrap();
        service.set("users:all", "[]", Duration::from_secs(60)).await.unwrap();
        service.set("tasks:all", "[]", Duration::from_secs(60)).await.unwrap();
        assert_eq!(
            service.get("users:1").await.unwrap().as_deref(),
            Some("{\"id\":1}")
        );

        assert_eq!(service.delete_pattern("users:*").await.unwrap(), 2);
        assert_eq!(service.get("users:1").await.unwrap(), None);
        assert_eq!(service.get("tasks:all").await.unwrap().as_deref(), Some("[]"));
    }
}
