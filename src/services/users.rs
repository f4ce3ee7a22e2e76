//! User repository with cache-aside reads.
//!
//! Reads go through the cache under `users:all` and `users:<id>`. Every write
//! that changes a row clears `users:*`, which also evicts unrelated item keys.

use super::{decode, require_int, require_text};
use crate::cache::{CacheAside, CacheKeys, CacheLookup, CacheProvider, CacheService};
use crate::config::UserSchema;
use crate::database::{
    Operation, QueryEnvelope, QueryFailure, QueryParam, QueryResult, Record, UserOperation,
};
use serde::{Deserialize, Serialize};

pub const USER_KEYS: CacheKeys = CacheKeys::new("users");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
}

impl User {
    pub fn from_record(record: &Record, schema: &UserSchema) -> Result<Self, String> {
        Ok(Self {
            id: require_int(record, &schema.id_column)?,
            email: require_text(record, &schema.email_column)?,
            name: require_text(record, &schema.name_column)?,
        })
    }
}

/// Statement text for the configured users table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserStatements {
    pub list: String,
    pub by_id: String,
    pub insert: String,
    pub update: String,
    pub delete: String,
}

impl UserStatements {
    pub fn render(schema: &UserSchema) -> Self {
        let UserSchema {
            table,
            id_column: id,
            email_column: email,
            name_column: name,
        } = schema;

        Self {
            list: format!("SELECT {id}, {email}, {name} FROM {table} ORDER BY {id} ASC"),
            by_id: format!("SELECT {id}, {email}, {name} FROM {table} WHERE {id} = $1"),
            insert: format!(
                "INSERT INTO {table}({email}, {name}) VALUES($1, $2) RETURNING {id}, {email}, {name}"
            ),
            update: format!(
                "UPDATE {table} SET {email} = $1, {name} = $2 WHERE {id} = $3 RETURNING {id}, {email}, {name}"
            ),
            delete: format!("DELETE FROM {table} WHERE {id} = $1 RETURNING {id}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserRepository<S = CacheProvider> {
    envelope: QueryEnvelope,
    cache: CacheAside<S>,
    schema: UserSchema,
    statements: UserStatements,
}

impl<S: CacheService> UserRepository<S> {
    pub fn new(envelope: QueryEnvelope, cache: CacheAside<S>, schema: UserSchema) -> Self {
        let statements = UserStatements::render(&schema);
        Self {
            envelope,
            cache,
            schema,
            statements,
        }
    }

    pub fn statements(&self) -> &UserStatements {
        &self.statements
    }

    pub async fn list_users(&self) -> QueryResult<CacheLookup<Vec<User>>> {
        self.cache
            .get_or_load(&USER_KEYS.collection(), self.cache.default_ttl(), || async move {
                self.load_users().await
            })
            .await
    }

    /// `value` is `None` when no user has this id
    pub async fn get_user(&self, id: i64) -> QueryResult<CacheLookup<Option<User>>> {
        self.cache
            .get_or_load(&USER_KEYS.item(id), self.cache.default_ttl(), || async move {
                self.load_user(id).await
            })
            .await
    }

    pub async fn create_user(&self, email: &str, name: &str) -> QueryResult<User> {
        let op = UserOperation::InsertUser;
        let rows = self
            .envelope
            .execute(op, &self.statements.insert, &[email.into(), name.into()])
            .await?;

        let record = rows
            .first()
            .ok_or_else(|| QueryFailure::statement(op.failure_message(), "INSERT returned no row"))?;
        let user = decode(op, record, |r| User::from_record(r, &self.schema))?;

        self.cache.invalidate(&USER_KEYS.pattern()).await;
        Ok(user)
    }

    /// `Ok(None)` when no user has this id
    pub async fn update_user(&self, id: i64, email: &str, name: &str) -> QueryResult<Option<User>> {
        let op = UserOperation::UpdateUser;
        let rows = self
            .envelope
            .execute(
                op,
                &self.statements.update,
                &[email.into(), name.into(), QueryParam::Int(id)],
            )
            .await?;

        let Some(record) = rows.first() else {
            return Ok(None);
        };
        let user = decode(op, record, |r| User::from_record(r, &self.schema))?;

        self.cache.invalidate(&USER_KEYS.pattern()).await;
        Ok(Some(user))
    }

    /// Returns the deleted id, or `Ok(None)` when no user has this id
    pub async fn delete_user(&self, id: i64) -> QueryResult<Option<i64>> {
        let op = UserOperation::DeleteUser;
        let rows = self
            .envelope
            .execute(op, &self.statements.delete, &[QueryParam::Int(id)])
            .await?;

        let Some(record) = rows.first() else {
            return Ok(None);
        };
        let deleted = decode(op, record, |r| require_int(r, &self.schema.id_column))?;

        self.cache.invalidate(&USER_KEYS.pattern()).await;
        Ok(Some(deleted))
    }

    async fn load_users(&self) -> QueryResult<Vec<User>> {
        let op = UserOperation::SelectUsers;
        let rows = self.envelope.execute(op, &self.statements.list, &[]).await?;

        rows.iter()
            .map(|record| decode(op, record, |r| User::from_record(r, &self.schema)))
            .collect()
    }

    async fn load_user(&self, id: i64) -> QueryResult<Option<User>> {
        let op = UserOperation::SelectUserById;
        let rows = self
            .envelope
            .execute(op, &self.statements.by_id, &[QueryParam::Int(id)])
            .await?;

        rows.first()
            .map(|record| decode(op, record, |r| User::from_record(r, &self.schema)))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCacheService;
    use crate::config::{FeatureFlagHandle, FeatureFlags};
    use crate::database::{ColumnValue, FailureKind};
    use crate::metrics::{DatabaseMetrics, OperationStatus};
    use crate::test_helpers::InMemoryBackend;
    use std::sync::Arc;
    use std::time::Duration;

    struct Fixture {
        backend: InMemoryBackend,
        store: InMemoryCacheService,
        metrics: Arc<DatabaseMetrics>,
        repo: UserRepository<InMemoryCacheService>,
    }

    fn fixture(cache_enabled: bool) -> Fixture {
        let backend = InMemoryBackend::users();
        let store = InMemoryCacheService::new();
        let metrics = Arc::new(DatabaseMetrics::new().unwrap());
        let flags = Arc::new(FeatureFlagHandle::new(FeatureFlags {
            cache: cache_enabled,
            ..FeatureFlags::default()
        }));

        let repo = UserRepository::new(
            QueryEnvelope::new(Arc::new(backend.clone()), Arc::clone(&metrics)),
            CacheAside::new(
                store.clone(),
                flags,
                Duration::from_secs(60),
                Duration::from_millis(250),
            ),
            UserSchema::default(),
        );

        Fixture {
            backend,
            store,
            metrics,
            repo,
        }
    }

    #[test]
    fn test_statements_use_configured_identifiers() {
        let schema = UserSchema {
            table: "accounts".to_string(),
            id_column: "account_id".to_string(),
            email_column: "mail".to_string(),
            name_column: "display_name".to_string(),
        };
        let statements = UserStatements::render(&schema);

        assert_eq!(
            statements.list,
            "SELECT account_id, mail, display_name FROM accounts ORDER BY account_id ASC"
        );
        assert_eq!(
            statements.update,
            "UPDATE accounts SET mail = $1, display_name = $2 WHERE account_id = $3 RETURNING account_id, mail, display_name"
        );
        assert_eq!(
            statements.delete,
            "DELETE FROM accounts WHERE account_id = $1 RETURNING account_id"
        );
    }

    #[test]
    fn test_from_record_reports_missing_column() {
        let record = Record::new()
            .with("id", ColumnValue::Int(1))
            .with("email", ColumnValue::Text("a@x.com".to_string()));

        let err = User::from_record(&record, &UserSchema::default()).unwrap_err();
        assert!(err.contains("\"name\""));
    }

    #[tokio::test]
    async fn test_list_is_cached_until_write() {
        let f = fixture(true);
        f.repo.create_user("a@x.com", "A").await.unwrap();

        assert!(!f.repo.list_users().await.unwrap().cached);
        let cached = f.repo.list_users().await.unwrap();
        assert!(cached.cached);
        assert_eq!(cached.value.len(), 1);

        f.repo.create_user("b@x.com", "B").await.unwrap();

        let fresh = f.repo.list_users().await.unwrap();
        assert!(!fresh.cached);
        assert_eq!(fresh.value.len(), 2);
        assert_eq!(f.metrics.operation_count("SELECT_USERS", OperationStatus::Success), 2);
    }

    #[tokio::test]
    async fn test_missing_user_is_not_cached() {
        let f = fixture(true);

        let first = f.repo.get_user(404).await.unwrap();
        let second = f.repo.get_user(404).await.unwrap();

        assert_eq!(first.value, None);
        assert!(!second.cached);
        assert!(!f.store.contains_key("users:404"));
    }

    #[tokio::test]
    async fn test_zero_row_writes_return_none() {
        let f = fixture(true);

        assert_eq!(f.repo.update_user(9, "x@x.com", "X").await.unwrap(), None);
        assert_eq!(f.repo.delete_user(9).await.unwrap(), None);
        assert_eq!(f.metrics.operation_count("UPDATE_USER", OperationStatus::Success), 1);
        assert_eq!(f.metrics.operation_count("DELETE_USER", OperationStatus::Success), 1);
    }

    #[tokio::test]
    async fn test_failed_write_keeps_cache() {
        let f = fixture(true);
        let user = f.repo.create_user("a@x.com", "A").await.unwrap();
        f.repo.get_user(user.id).await.unwrap();
        assert!(f.store.contains_key("users:1"));

        f.backend.fail_next_statement("deadlock detected");
        let failure = f.repo.update_user(user.id, "a@x.com", "B").await.unwrap_err();

        assert_eq!(failure.kind, FailureKind::Statement);
        assert_eq!(failure.message, "Failed to edit user");
        assert!(f.store.contains_key("users:1"));
        assert!(f.repo.get_user(user.id).await.unwrap().cached);
    }

    #[tokio::test]
    async fn test_disabled_cache_reads_database_every_time() {
        let f = fixture(false);
        let user = f.repo.create_user("a@x.com", "A").await.unwrap();

        for _ in 0..3 {
            let lookup = f.repo.get_user(user.id).await.unwrap();
            assert!(!lookup.cached);
            assert_eq!(lookup.value.as_ref(), Some(&user));
        }

        assert_eq!(f.metrics.operation_count("SELECT_USER_BY_ID", OperationStatus::Success), 3);
        assert!(f.store.is_empty().await);
    }
}
