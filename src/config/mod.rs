//! # Service Configuration
//!
//! Configuration is resolved once at startup from the process environment
//! (optionally layered over a TOML file) and then shared as an immutable
//! [`ServiceConfig`]. Feature flags are the only part that may be swapped at
//! runtime, through [`FeatureFlagHandle`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use crud_core::config::ConfigLoader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::new().load()?;
//! println!("cache enabled: {}", config.features.cache_enabled());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod flags;
pub mod loader;
pub mod schema;

use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use flags::{FeatureFlagHandle, FeatureFlags, WriteGuard};
pub use loader::ConfigLoader;
pub use schema::{SchemaConfig, TaskSchema, UserSchema};

/// Root configuration for one service process
#[derive(Debug, Clone, Serialize)]
pub struct ServiceConfig {
    pub database: DatabaseConfig,
    pub schema: SchemaConfig,
    pub cache: CacheConfig,
    pub features: FeatureFlags,
    pub logging: LoggingConfig,
}

/// Postgres connection settings
#[derive(Clone, Serialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub name: String,
    pub pool: PoolConfig,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("name", &self.name)
            .field("pool", &self.pool)
            .finish()
    }
}

/// Connection pool sizing and timeouts
#[derive(Debug, Clone, Serialize)]
pub struct PoolConfig {
    pub max_connections: u32,
    /// Upper bound on waiting for a pooled connection
    pub acquire_timeout_seconds: u64,
    /// Connections older than this are closed when returned to the pool
    pub max_lifetime_seconds: u64,
}

impl PoolConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_seconds)
    }

    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_seconds)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout_seconds: 10,
            max_lifetime_seconds: 1800,
        }
    }
}

/// Which cache store backs the cache-aside layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    Redis,
    Memory,
}

impl std::str::FromStr for CacheBackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "redis" | "dragonfly" => Ok(Self::Redis),
            "memory" | "in-memory" => Ok(Self::Memory),
            other => Err(format!("unknown cache backend '{other}'")),
        }
    }
}

/// Cache store settings
#[derive(Clone, Serialize)]
pub struct CacheConfig {
    pub backend: CacheBackendKind,
    pub host: String,
    pub port: u16,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub default_ttl_seconds: u64,
    /// Budget for a single cache round-trip before it is treated as a miss
    pub operation_timeout_ms: u64,
    /// Entry limit for the in-memory store
    pub max_entries: u64,
}

impl std::fmt::Debug for CacheConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheConfig")
            .field("backend", &self.backend)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("default_ttl_seconds", &self.default_ttl_seconds)
            .field("operation_timeout_ms", &self.operation_timeout_ms)
            .field("max_entries", &self.max_entries)
            .finish()
    }
}

impl CacheConfig {
    /// `host:port`, safe to log
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_seconds)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::Redis,
            host: "localhost".to_string(),
            port: 6379,
            password: None,
            default_ttl_seconds: 60,
            operation_timeout_ms: 250,
            max_entries: 10_000,
        }
    }
}

/// Logging sink settings
#[derive(Debug, Clone, Serialize)]
pub struct LoggingConfig {
    pub environment: String,
    pub log_dir: PathBuf,
    /// Explicit filter directive; falls back to an environment-based level
    pub filter: Option<String>,
}

impl LoggingConfig {
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            log_dir: PathBuf::from("./logs"),
            filter: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_never_carries_the_password() {
        let cache = CacheConfig {
            password: Some("p@ss/w#rd".to_string()),
            ..CacheConfig::default()
        };
        assert_eq!(cache.endpoint(), "localhost:6379");
    }

    #[test]
    fn test_debug_redacts_passwords() {
        let cache = CacheConfig {
            password: Some("hunter2".to_string()),
            ..CacheConfig::default()
        };
        assert!(!format!("{cache:?}").contains("hunter2"));

        let database = DatabaseConfig {
            host: "db".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: "hunter2".to_string(),
            name: "postgres".to_string(),
            pool: PoolConfig::default(),
        };
        assert!(!format!("{database:?}").contains("hunter2"));
        assert!(!serde_json::to_string(&database).unwrap().contains("hunter2"));
    }

    #[test]
    fn test_cache_backend_aliases() {
        assert_eq!("redis".parse(), Ok(CacheBackendKind::Redis));
        assert_eq!("Dragonfly".parse(), Ok(CacheBackendKind::Redis));
        assert_eq!("in-memory".parse(), Ok(CacheBackendKind::Memory));
        assert!("memcached".parse::<CacheBackendKind>().is_err());
    }

    #[test]
    fn test_reference_pool_timeout() {
        assert_eq!(PoolConfig::default().acquire_timeout(), Duration::from_secs(10));
    }
}
