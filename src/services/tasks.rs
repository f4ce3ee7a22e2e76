//! Task repository. No cache; edit and delete are behind feature flags.

use super::{decode, require_int, require_text};
use crate::config::{FeatureFlagHandle, TaskSchema, WriteGuard};
use crate::database::{
    Operation, QueryEnvelope, QueryFailure, QueryParam, QueryResult, Record, TaskOperation,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub task: String,
}

impl Task {
    pub fn from_record(record: &Record, schema: &TaskSchema) -> Result<Self, String> {
        Ok(Self {
            id: require_int(record, &schema.id_column)?,
            task: require_text(record, &schema.task_column)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskStatements {
    pub list: String,
    pub by_id: String,
    pub insert: String,
    pub update: String,
    pub delete: String,
}

impl TaskStatements {
    pub fn render(schema: &TaskSchema) -> Self {
        let TaskSchema {
            table,
            id_column: id,
            task_column: task,
        } = schema;

        Self {
            list: format!("SELECT {id}, {task} FROM {table} ORDER BY {id} ASC"),
            by_id: format!("SELECT {id}, {task} FROM {table} WHERE {id} = $1"),
            insert: format!("INSERT INTO {table}({task}) VALUES($1) RETURNING {id}, {task}"),
            update: format!(
                "UPDATE {table} SET {task} = $1 WHERE {id} = $2 RETURNING {id}, {task}"
            ),
            delete: format!("DELETE FROM {table} WHERE {id} = $1 RETURNING {id}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TaskRepository {
    envelope: QueryEnvelope,
    flags: Arc<FeatureFlagHandle>,
    schema: TaskSchema,
    statements: TaskStatements,
}

impl TaskRepository {
    pub fn new(envelope: QueryEnvelope, flags: Arc<FeatureFlagHandle>, schema: TaskSchema) -> Self {
        let statements = TaskStatements::render(&schema);
        Self {
            envelope,
            flags,
            schema,
            statements,
        }
    }

    pub fn statements(&self) -> &TaskStatements {
        &self.statements
    }

    pub async fn list_tasks(&self) -> QueryResult<Vec<Task>> {
        let op = TaskOperation::SelectTasks;
        let rows = self.envelope.execute(op, &self.statements.list, &[]).await?;

        rows.iter()
            .map(|record| decode(op, record, |r| Task::from_record(r, &self.schema)))
            .collect()
    }

    pub async fn get_task(&self, id: i64) -> QueryResult<Option<Task>> {
        let op = TaskOperation::SelectTaskById;
        let rows = self
            .envelope
            .execute(op, &self.statements.by_id, &[QueryParam::Int(id)])
            .await?;

        rows.first()
            .map(|record| decode(op, record, |r| Task::from_record(r, &self.schema)))
            .transpose()
    }

    pub async fn create_task(&self, task: &str) -> QueryResult<Task> {
        let op = TaskOperation::InsertTask;
        let rows = self
            .envelope
            .execute(op, &self.statements.insert, &[task.into()])
            .await?;

        let record = rows
            .first()
            .ok_or_else(|| QueryFailure::statement(op.failure_message(), "INSERT returned no row"))?;
        decode(op, record, |r| Task::from_record(r, &self.schema))
    }

    /// Rejected with `FeatureDisabled` unless `FEATURE_EDIT_TASK` is on
    pub async fn update_task(&self, id: i64, task: &str) -> QueryResult<Option<Task>> {
        self.check(WriteGuard::EditTask)?;

        let op = TaskOperation::UpdateTask;
        let rows = self
            .envelope
            .execute(op, &self.statements.update, &[task.into(), QueryParam::Int(id)])
            .await?;

        rows.first()
            .map(|record| decode(op, record, |r| Task::from_record(r, &self.schema)))
            .transpose()
    }

    /// Rejected with `FeatureDisabled` unless `FEATURE_DELETE_TASK` is on
    pub async fn delete_task(&self, id: i64) -> QueryResult<Option<i64>> {
        self.check(WriteGuard::DeleteTask)?;

        let op = TaskOperation::DeleteTask;
        let rows = self
            .envelope
            .execute(op, &self.statements.delete, &[QueryParam::Int(id)])
            .await?;

        rows.first()
            .map(|record| decode(op, record, |r| require_int(r, &self.schema.id_column)))
            .transpose()
    }

    fn check(&self, guard: WriteGuard) -> QueryResult<()> {
        self.flags.snapshot().guard(guard).inspect_err(|failure| {
            warn!(guard = ?guard, "{}", failure.message);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeatureFlags;
    use crate::database::FailureKind;
    use crate::metrics::{DatabaseMetrics, OperationStatus};
    use crate::test_helpers::InMemoryBackend;

    fn repository(flags: FeatureFlags) -> (InMemoryBackend, Arc<DatabaseMetrics>, TaskRepository) {
        let backend = InMemoryBackend::tasks();
        let metrics = Arc::new(DatabaseMetrics::new().unwrap());
        let repo = TaskRepository::new(
            QueryEnvelope::new(Arc::new(backend.clone()), Arc::clone(&metrics)),
            Arc::new(FeatureFlagHandle::new(flags)),
            TaskSchema::default(),
        );
        (backend, metrics, repo)
    }

    fn all_writes() -> FeatureFlags {
        FeatureFlags {
            edit_task: true,
            delete_task: true,
            ..FeatureFlags::default()
        }
    }

    #[test]
    fn test_statements_match_reference_shape() {
        let statements = TaskStatements::render(&TaskSchema::default());
        assert_eq!(statements.list, "SELECT id, task FROM main_table ORDER BY id ASC");
        assert_eq!(
            statements.insert,
            "INSERT INTO main_table(task) VALUES($1) RETURNING id, task"
        );
        assert_eq!(
            statements.update,
            "UPDATE main_table SET task = $1 WHERE id = $2 RETURNING id, task"
        );
    }

    #[tokio::test]
    async fn test_task_lifecycle() {
        let (_backend, _metrics, repo) = repository(all_writes());

        let created = repo.create_task("write docs").await.unwrap();
        assert_eq!(repo.get_task(created.id).await.unwrap(), Some(created.clone()));

        let updated = repo.update_task(created.id, "ship docs").await.unwrap().unwrap();
        assert_eq!(updated.task, "ship docs");
        assert_eq!(repo.list_tasks().await.unwrap(), vec![updated]);

        assert_eq!(repo.delete_task(created.id).await.unwrap(), Some(created.id));
        assert_eq!(repo.get_task(created.id).await.unwrap(), None);
        assert_eq!(repo.delete_task(created.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_disabled_writes_never_reach_database() {
        let (backend, metrics, repo) = repository(FeatureFlags::default());
        let task = repo.create_task("keep me").await.unwrap();

        let edit = repo.update_task(task.id, "changed").await.unwrap_err();
        let delete = repo.delete_task(task.id).await.unwrap_err();

        assert_eq!(edit.kind, FailureKind::FeatureDisabled);
        assert_eq!(edit.message, "Edit task feature is disabled");
        assert_eq!(delete.message, "Delete task feature is disabled");
        assert_eq!(backend.acquire_count(), 1);
        assert_eq!(metrics.observation_count("UPDATE_TASK"), 0);
        assert_eq!(metrics.observation_count("DELETE_TASK"), 0);
        assert_eq!(repo.get_task(task.id).await.unwrap().unwrap().task, "keep me");
    }

    #[tokio::test]
    async fn test_unavailable_database() {
        let (backend, metrics, repo) = repository(all_writes());
        backend.fail_acquire(true);

        let failure = repo.list_tasks().await.unwrap_err();

        assert_eq!(failure.kind, FailureKind::Unavailable);
        assert_eq!(failure.message, "database unavailable");
        assert_eq!(metrics.operation_count("SELECT_TASKS", OperationStatus::Error), 1);
    }

    #[tokio::test]
    async fn test_statement_failure_on_read() {
        let (backend, _metrics, repo) = repository(all_writes());
        backend.fail_next_statement("relation \"main_table\" does not exist");

        let failure = repo.get_task(1).await.unwrap_err();
        assert_eq!(failure.message, "Failed to fetch task");
        assert_eq!(failure.to_string(), "Failed to fetch task");
    }
}
