//! Named database operations.
//!
//! The operation name is the metric label and the log field for a call, and
//! the user-facing failure message is derived from it.

use std::fmt;

/// A named, labelled database operation
pub trait Operation: Copy + fmt::Debug + Send + Sync + 'static {
    /// Stable upper-snake-case label, e.g. `SELECT_USER_BY_ID`
    fn name(&self) -> &'static str;

    /// Message safe to show to an API client when the statement fails
    fn failure_message(&self) -> String {
        derive_failure_message(self.name())
    }
}

/// What a statement does, read off its operation name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationVerb {
    /// `many` is true for collection reads
    Fetch { many: bool },
    Edit,
    Delete,
    Add,
}

impl OperationVerb {
    pub fn from_name(name: &str) -> Self {
        if name.starts_with("SELECT") {
            OperationVerb::Fetch {
                many: !name.contains("_BY_"),
            }
        } else if name.starts_with("UPDATE") {
            OperationVerb::Edit
        } else if name.starts_with("DELETE") {
            OperationVerb::Delete
        } else {
            OperationVerb::Add
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            OperationVerb::Fetch { .. } => "fetch",
            OperationVerb::Edit => "edit",
            OperationVerb::Delete => "delete",
            OperationVerb::Add => "add",
        }
    }
}

/// `SELECT_USERS` -> "Failed to fetch users", `INSERT_USER` -> "Failed to add user"
pub fn derive_failure_message(name: &str) -> String {
    let verb = OperationVerb::from_name(name);

    let subject = name.split_once('_').map(|(_, rest)| rest).unwrap_or(name);
    let subject = subject.split("_BY_").next().unwrap_or(subject);
    let mut resource = subject.to_ascii_lowercase().replace('_', " ");

    if verb == (OperationVerb::Fetch { many: true }) && !resource.ends_with('s') {
        resource.push('s');
    }

    format!("Failed to {} {}", verb.as_str(), resource)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserOperation {
    SelectUsers,
    SelectUserById,
    InsertUser,
    UpdateUser,
    DeleteUser,
}

impl Operation for UserOperation {
    fn name(&self) -> &'static str {
        match self {
            UserOperation::SelectUsers => "SELECT_USERS",
            UserOperation::SelectUserById => "SELECT_USER_BY_ID",
            UserOperation::InsertUser => "INSERT_USER",
            UserOperation::UpdateUser => "UPDATE_USER",
            UserOperation::DeleteUser => "DELETE_USER",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskOperation {
    SelectTasks,
    SelectTaskById,
    InsertTask,
    UpdateTask,
    DeleteTask,
}

impl Operation for TaskOperation {
    fn name(&self) -> &'static str {
        match self {
            TaskOperation::SelectTasks => "SELECT_TASKS",
            TaskOperation::SelectTaskById => "SELECT_TASK_BY_ID",
            TaskOperation::InsertTask => "INSERT_TASK",
            TaskOperation::UpdateTask => "UPDATE_TASK",
            TaskOperation::DeleteTask => "DELETE_TASK",
        }
    }
}

impl fmt::Display for UserOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for TaskOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_failure_messages() {
        assert_eq!(UserOperation::SelectUsers.failure_message(), "Failed to fetch users");
        assert_eq!(UserOperation::SelectUserById.failure_message(), "Failed to fetch user");
        assert_eq!(UserOperation::InsertUser.failure_message(), "Failed to add user");
        assert_eq!(UserOperation::UpdateUser.failure_message(), "Failed to edit user");
        assert_eq!(UserOperation::DeleteUser.failure_message(), "Failed to delete user");
    }

    #[test]
    fn test_task_failure_messages() {
        assert_eq!(TaskOperation::SelectTasks.failure_message(), "Failed to fetch tasks");
        assert_eq!(TaskOperation::SelectTaskById.failure_message(), "Failed to fetch task");
        assert_eq!(TaskOperation::InsertTask.failure_message(), "Failed to add task");
        assert_eq!(TaskOperation::UpdateTask.failure_message(), "Failed to edit task");
        assert_eq!(TaskOperation::DeleteTask.failure_message(), "Failed to delete task");
    }

    #[test]
    fn test_unrecognised_verbs_read_as_add() {
        assert_eq!(derive_failure_message("UPSERT_ORDER"), "Failed to add order");
        assert_eq!(OperationVerb::from_name("SELECT_ORDER_ITEMS"), OperationVerb::Fetch { many: true });
        assert_eq!(derive_failure_message("SELECT_ORDER_ITEMS"), "Failed to fetch order items");
        assert_eq!(derive_failure_message("SELECT_ARCHIVE"), "Failed to fetch archives");
    }

    #[test]
    fn test_display_is_the_label() {
        assert_eq!(UserOperation::InsertUser.to_string(), "INSERT_USER");
        assert_eq!(TaskOperation::SelectTaskById.to_string(), "SELECT_TASK_BY_ID");
    }
}
