//! Task resource scenarios around the edit/delete feature flags.

use crud_core::config::{FeatureFlagHandle, FeatureFlags, TaskSchema};
use crud_core::database::{FailureKind, QueryEnvelope};
use crud_core::metrics::{MetricsRegistry, OperationStatus};
use crud_core::services::TaskRepository;
use crud_core::test_helpers::InMemoryBackend;
use std::sync::Arc;

fn repository(
    flags: FeatureFlags,
) -> (InMemoryBackend, MetricsRegistry, Arc<FeatureFlagHandle>, TaskRepository) {
    let backend = InMemoryBackend::tasks();
    let metrics = MetricsRegistry::new().unwrap();
    let handle = Arc::new(FeatureFlagHandle::new(flags));
    let tasks = TaskRepository::new(
        QueryEnvelope::new(Arc::new(backend.clone()), metrics.database()),
        Arc::clone(&handle),
        TaskSchema::default(),
    );
    (backend, metrics, handle, tasks)
}

#[tokio::test]
async fn test_disabled_writes_never_reach_the_database() {
    let (backend, metrics, _flags, tasks) = repository(FeatureFlags::default());
    let task = tasks.create_task("write docs").await.unwrap();
    let statements_before = backend.statements().len();

    let edit = tasks.update_task(task.id, "write more docs").await.unwrap_err();
    assert_eq!(edit.kind, FailureKind::FeatureDisabled);
    assert_eq!(edit.message, "Edit task feature is disabled");

    let delete = tasks.delete_task(task.id).await.unwrap_err();
    assert_eq!(delete.kind, FailureKind::FeatureDisabled);
    assert_eq!(delete.message, "Delete task feature is disabled");

    assert_eq!(backend.statements().len(), statements_before);
    let db = metrics.database();
    assert_eq!(db.operation_count("UPDATE_TASK", OperationStatus::Error), 0);
    assert_eq!(db.operation_count("DELETE_TASK", OperationStatus::Error), 0);
}

#[tokio::test]
async fn test_reloaded_flags_apply_to_the_next_call() {
    let (_backend, _metrics, flags, tasks) = repository(FeatureFlags::default());
    let task = tasks.create_task("ship it").await.unwrap();

    assert!(tasks.delete_task(task.id).await.is_err());

    flags.reload(FeatureFlags {
        delete_task: true,
        ..FeatureFlags::default()
    });

    assert_eq!(tasks.delete_task(task.id).await.unwrap(), Some(task.id));
    assert!(tasks.get_task(task.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_enabled_edit_updates_the_row() {
    let (_backend, metrics, _flags, tasks) = repository(FeatureFlags {
        edit_task: true,
        ..FeatureFlags::default()
    });
    let task = tasks.create_task("draft").await.unwrap();

    let updated = tasks.update_task(task.id, "final").await.unwrap().unwrap();
    assert_eq!(updated.task, "final");
    assert_eq!(tasks.update_task(999, "none").await.unwrap(), None);

    assert_eq!(
        metrics
            .database()
            .operation_count("UPDATE_TASK", OperationStatus::Success),
        2
    );
    assert_eq!(tasks.list_tasks().await.unwrap().len(), 1);
}
