//! Configuration Loader
//!
//! Layers an optional TOML file under the process environment with the
//! `config` crate, then resolves the flat key space the services have always
//! used (`DB_HOST`, `FEATURE_REDIS_CACHE`, ...) into a validated
//! [`ServiceConfig`].

use super::error::{ConfigResult, ConfigurationError};
use super::flags::FeatureFlags;
use super::schema::{SchemaConfig, TaskSchema, UserSchema};
use super::{
    CacheBackendKind, CacheConfig, DatabaseConfig, LoggingConfig, PoolConfig, ServiceConfig,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

/// Flat view of every recognised key, lowercased by the environment source
#[derive(Debug, Deserialize)]
#[serde(default)]
struct FlatSettings {
    db_host: String,
    db_port: u16,
    db_user: String,
    db_password: String,
    db_name: String,
    db_max_connections: u32,
    db_acquire_timeout_seconds: u64,
    db_max_lifetime_seconds: u64,

    db_users_table: String,
    db_users_column_id: String,
    db_users_column_email: String,
    db_users_column_name: String,
    db_table: String,
    db_column_id: String,
    db_column_task: String,

    cache_backend: String,
    redis_host: String,
    redis_port: u16,
    redis_password: Option<String>,
    redis_ttl: u64,
    cache_operation_timeout_ms: u64,
    cache_max_entries: u64,

    feature_redis_cache: Option<String>,
    feature_edit_task: Option<String>,
    feature_delete_task: Option<String>,

    app_env: Option<String>,
    node_env: Option<String>,
    log_dir: Option<String>,
    rust_log: Option<String>,
}

impl Default for FlatSettings {
    fn default() -> Self {
        let pool = PoolConfig::default();
        let cache = CacheConfig::default();
        let users = UserSchema::default();
        let tasks = TaskSchema::default();

        Self {
            db_host: "localhost".to_string(),
            db_port: 5432,
            db_user: "postgres".to_string(),
            db_password: String::new(),
            db_name: "postgres".to_string(),
            db_max_connections: pool.max_connections,
            db_acquire_timeout_seconds: pool.acquire_timeout_seconds,
            db_max_lifetime_seconds: pool.max_lifetime_seconds,

            db_users_table: users.table,
            db_users_column_id: users.id_column,
            db_users_column_email: users.email_column,
            db_users_column_name: users.name_column,
            db_table: tasks.table,
            db_column_id: tasks.id_column,
            db_column_task: tasks.task_column,

            cache_backend: "redis".to_string(),
            redis_host: cache.host,
            redis_port: cache.port,
            redis_password: None,
            redis_ttl: cache.default_ttl_seconds,
            cache_operation_timeout_ms: cache.operation_timeout_ms,
            cache_max_entries: cache.max_entries,

            feature_redis_cache: None,
            feature_edit_task: None,
            feature_delete_task: None,

            app_env: None,
            node_env: None,
            log_dir: None,
            rust_log: None,
        }
    }
}

/// Builder for a [`ServiceConfig`]
#[derive(Debug, Default, Clone)]
pub struct ConfigLoader {
    file: Option<PathBuf>,
    overrides: Option<HashMap<String, String>>,
}

impl ConfigLoader {
    /// Read from the process environment only
    pub fn new() -> Self {
        Self::default()
    }

    /// Layer a TOML file underneath the environment
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Replace the process environment with an explicit map.
    ///
    /// Keys use the same spelling as environment variables. Useful for tests
    /// that must not depend on, or mutate, the real environment.
    pub fn with_vars<K, V>(mut self, vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.overrides = Some(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    pub fn load(&self) -> ConfigResult<ServiceConfig> {
        let mut builder = config::Config::builder();

        if let Some(path) = &self.file {
            debug!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(config::File::from(path.as_path()).required(true));
        }

        let environment = match &self.overrides {
            Some(vars) => config::Environment::default()
                .source(Some(vars.clone().into_iter().collect())),
            None => config::Environment::default(),
        };
        builder = builder.add_source(environment);

        let flat: FlatSettings = builder.build()?.try_deserialize()?;
        let config = resolve(flat)?;

        debug!(
            database_host = %config.database.host,
            database_name = %config.database.name,
            cache_backend = ?config.cache.backend,
            features = ?config.features,
            "Configuration resolved"
        );

        Ok(config)
    }
}

fn resolve(flat: FlatSettings) -> ConfigResult<ServiceConfig> {
    let mut errors = Vec::new();

    let backend = flat
        .cache_backend
        .parse::<CacheBackendKind>()
        .unwrap_or_else(|e| {
            errors.push(format!("CACHE_BACKEND: {e}"));
            CacheBackendKind::Redis
        });

    let environment = flat
        .app_env
        .or(flat.node_env)
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| "development".to_string());

    let log_dir = flat.log_dir.map(PathBuf::from).unwrap_or_else(|| {
        if environment == "production" {
            PathBuf::from("/app/logs")
        } else {
            PathBuf::from("./logs")
        }
    });

    let config = ServiceConfig {
        database: DatabaseConfig {
            host: flat.db_host,
            port: flat.db_port,
            user: flat.db_user,
            password: flat.db_password,
            name: flat.db_name,
            pool: PoolConfig {
                max_connections: flat.db_max_connections,
                acquire_timeout_seconds: flat.db_acquire_timeout_seconds,
                max_lifetime_seconds: flat.db_max_lifetime_seconds,
            },
        },
        schema: SchemaConfig {
            users: UserSchema {
                table: flat.db_users_table,
                id_column: flat.db_users_column_id,
                email_column: flat.db_users_column_email,
                name_column: flat.db_users_column_name,
            },
            tasks: TaskSchema {
                table: flat.db_table,
                id_column: flat.db_column_id,
                task_column: flat.db_column_task,
            },
        },
        cache: CacheConfig {
            backend,
            host: flat.redis_host,
            port: flat.redis_port,
            password: flat.redis_password.filter(|p| !p.is_empty()),
            default_ttl_seconds: flat.redis_ttl,
            operation_timeout_ms: flat.cache_operation_timeout_ms,
            max_entries: flat.cache_max_entries,
        },
        features: FeatureFlags {
            cache: FeatureFlags::parse_flag(flat.feature_redis_cache.as_deref()),
            edit_task: FeatureFlags::parse_flag(flat.feature_edit_task.as_deref()),
            delete_task: FeatureFlags::parse_flag(flat.feature_delete_task.as_deref()),
        },
        logging: LoggingConfig {
            environment,
            log_dir,
            filter: flat.rust_log.filter(|f| !f.is_empty()),
        },
    };

    validate(&config, &mut errors);

    if errors.is_empty() {
        Ok(config)
    } else {
        Err(ConfigurationError::Validation(errors))
    }
}

fn validate(config: &ServiceConfig, errors: &mut Vec<String>) {
    config.schema.validate(errors);

    if config.database.host.is_empty() {
        errors.push("DB_HOST must not be empty".to_string());
    }
    if config.database.pool.max_connections == 0 {
        errors.push("DB_MAX_CONNECTIONS must be at least 1".to_string());
    }
    if config.database.pool.acquire_timeout_seconds == 0 {
        errors.push("DB_ACQUIRE_TIMEOUT_SECONDS must be at least 1".to_string());
    }
    if config.database.pool.max_lifetime_seconds == 0 {
        errors.push("DB_MAX_LIFETIME_SECONDS must be at least 1".to_string());
    }
    if config.cache.default_ttl_seconds == 0 {
        errors.push("REDIS_TTL must be at least 1 second".to_string());
    }
    if config.cache.operation_timeout_ms == 0 {
        errors.push("CACHE_OPERATION_TIMEOUT_MS must be at least 1".to_string());
    }
    if config.cache.max_entries == 0 {
        errors.push("CACHE_MAX_ENTRIES must be at least 1".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn load(vars: &[(&str, &str)]) -> ConfigResult<ServiceConfig> {
        ConfigLoader::new().with_vars(vars.iter().copied()).load()
    }

    #[test]
    fn test_defaults_match_reference_services() {
        let config = load(&[]).unwrap();

        assert_eq!(config.database.host, "localhost");
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.database.user, "postgres");
        assert_eq!(config.database.name, "postgres");
        assert_eq!(config.database.pool.acquire_timeout_seconds, 10);
        assert_eq!(config.schema.users.table, "users");
        assert_eq!(config.schema.tasks.table, "main_table");
        assert_eq!(config.cache.default_ttl_seconds, 60);
        assert_eq!(config.cache.backend, CacheBackendKind::Redis);
        assert_eq!(config.features, FeatureFlags::default());
        assert_eq!(config.logging.environment, "development");
        assert_eq!(config.logging.log_dir, PathBuf::from("./logs"));
    }

    #[test]
    fn test_environment_keys_are_applied() {
        let config = load(&[
            ("DB_HOST", "db.internal"),
            ("DB_PORT", "6543"),
            ("DB_USERS_TABLE", "accounts"),
            ("DB_COLUMN_TASK", "title"),
            ("REDIS_TTL", "120"),
            ("REDIS_PASSWORD", "pw"),
            ("FEATURE_REDIS_CACHE", "true"),
            ("FEATURE_EDIT_TASK", "false"),
            ("FEATURE_DELETE_TASK", "TRUE"),
        ])
        .unwrap();

        assert_eq!(config.database.host, "db.internal");
        assert_eq!(config.database.port, 6543);
        assert_eq!(config.schema.users.table, "accounts");
        assert_eq!(config.schema.tasks.task_column, "title");
        assert_eq!(config.cache.default_ttl_seconds, 120);
        assert_eq!(config.cache.password.as_deref(), Some("pw"));
        assert!(config.features.cache);
        assert!(!config.features.edit_task);
        assert!(config.features.delete_task);
    }

    #[test]
    fn test_redis_password_and_entry_limit() {
        let config = load(&[
            ("REDIS_PASSWORD", "p@ss/w#rd"),
            ("CACHE_MAX_ENTRIES", "500"),
        ])
        .unwrap();
        assert_eq!(config.cache.password.as_deref(), Some("p@ss/w#rd"));
        assert_eq!(config.cache.max_entries, 500);
        assert_eq!(config.cache.endpoint(), "localhost:6379");

        let err = load(&[("CACHE_MAX_ENTRIES", "0")]).unwrap_err();
        match err {
            ConfigurationError::Validation(errors) => {
                assert_eq!(errors.len(), 1);
                assert!(errors[0].contains("CACHE_MAX_ENTRIES"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_production_log_dir() {
        let config = load(&[("NODE_ENV", "production")]).unwrap();
        assert!(config.logging.is_production());
        assert_eq!(config.logging.log_dir, PathBuf::from("/app/logs"));
    }

    #[test]
    fn test_unsafe_identifier_is_rejected() {
        let err = load(&[("DB_USERS_TABLE", "users; DROP TABLE users")]).unwrap_err();
        match err {
            ConfigurationError::Validation(errors) => {
                assert_eq!(errors.len(), 1);
                assert!(errors[0].contains("DB_USERS_TABLE"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_validation_errors_are_collected() {
        let err = load(&[
            ("REDIS_TTL", "0"),
            ("DB_MAX_CONNECTIONS", "0"),
            ("CACHE_BACKEND", "memcached"),
        ])
        .unwrap_err();

        match err {
            ConfigurationError::Validation(errors) => assert_eq!(errors.len(), 3),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_unparseable_number_is_a_load_error() {
        let err = load(&[("DB_PORT", "not-a-port")]).unwrap_err();
        assert!(matches!(err, ConfigurationError::Load(_)));
    }

    #[test]
    fn test_file_layer_is_overridden_by_environment() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "db_host = \"from-file\"\ndb_name = \"crud\"").unwrap();

        let config = ConfigLoader::new()
            .with_file(file.path())
            .with_vars([("DB_HOST", "from-env")])
            .load()
            .unwrap();

        assert_eq!(config.database.host, "from-env");
        assert_eq!(config.database.name, "crud");
    }
}
