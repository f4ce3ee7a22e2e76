//! Typed outcome of an enveloped database call

use crate::config::WriteGuard;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No connection could be acquired within the pool timeout
    Unavailable,
    /// The statement reached the database and failed there
    Statement,
    /// A write guarded by a feature flag was rejected before execution
    FeatureDisabled,
}

/// Failure arm of [`QueryResult`].
///
/// `message` is safe for API clients. `detail` carries the raw database
/// error and is meant for logs only; `Display` never includes it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct QueryFailure {
    pub kind: FailureKind,
    pub message: String,
    pub detail: Option<String>,
}

pub type QueryResult<T> = Result<T, QueryFailure>;

impl QueryFailure {
    pub const UNAVAILABLE_MESSAGE: &'static str = "database unavailable";

    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Unavailable,
            message: Self::UNAVAILABLE_MESSAGE.to_string(),
            detail: Some(detail.into()),
        }
    }

    pub fn statement(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Statement,
            message: message.into(),
            detail: Some(detail.into()),
        }
    }

    pub fn feature_disabled(guard: WriteGuard) -> Self {
        Self {
            kind: FailureKind::FeatureDisabled,
            message: guard.disabled_message().to_string(),
            detail: None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        self.kind == FailureKind::Unavailable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_hides_detail() {
        let failure = QueryFailure::statement(
            "Failed to add user",
            "duplicate key value violates unique constraint \"users_email_key\"",
        );

        assert_eq!(failure.to_string(), "Failed to add user");
        assert!(failure.detail.unwrap().contains("users_email_key"));
    }

    #[test]
    fn test_unavailable_message() {
        let failure = QueryFailure::unavailable("pool timed out while waiting for an open connection");
        assert!(failure.is_unavailable());
        assert_eq!(failure.to_string(), "database unavailable");
    }

    #[test]
    fn test_serialized_kind() {
        assert_eq!(
            serde_json::to_string(&FailureKind::FeatureDisabled).unwrap(),
            "\"feature_disabled\""
        );
    }
}
