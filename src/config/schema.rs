//! Table and column names for the two resources.
//!
//! These are the only values ever formatted into statement text, so each one
//! is checked to be a plain SQL identifier before the service starts.

use serde::Serialize;

/// Postgres truncates identifiers beyond this length
const MAX_IDENTIFIER_LEN: usize = 63;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSchema {
    pub table: String,
    pub id_column: String,
    pub email_column: String,
    pub name_column: String,
}

impl Default for UserSchema {
    fn default() -> Self {
        Self {
            table: "users".to_string(),
            id_column: "id".to_string(),
            email_column: "email".to_string(),
            name_column: "name".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSchema {
    pub table: String,
    pub id_column: String,
    pub task_column: String,
}

impl Default for TaskSchema {
    fn default() -> Self {
        Self {
            table: "main_table".to_string(),
            id_column: "id".to_string(),
            task_column: "task".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaConfig {
    pub users: UserSchema,
    pub tasks: TaskSchema,
}

impl SchemaConfig {
    /// Append one message per invalid identifier to `errors`
    pub fn validate(&self, errors: &mut Vec<String>) {
        let identifiers = [
            ("DB_USERS_TABLE", &self.users.table),
            ("DB_USERS_COLUMN_ID", &self.users.id_column),
            ("DB_USERS_COLUMN_EMAIL", &self.users.email_column),
            ("DB_USERS_COLUMN_NAME", &self.users.name_column),
            ("DB_TABLE", &self.tasks.table),
            ("DB_COLUMN_ID", &self.tasks.id_column),
            ("DB_COLUMN_TASK", &self.tasks.task_column),
        ];

        for (key, value) in identifiers {
            if !is_sql_identifier(value) {
                errors.push(format!("{key} must be a plain SQL identifier, got '{value}'"));
            }
        }
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`, bounded by the Postgres identifier length
pub fn is_sql_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return false;
    };

    value.len() <= MAX_IDENTIFIER_LEN
        && (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
