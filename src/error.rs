//! Error types for the data-access core.
//!
//! Query failures that a caller is expected to handle are not errors in this
//! sense; they travel as [`crate::database::QueryFailure`]. `CrudError` covers
//! startup and infrastructure problems.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CrudError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Metrics error: {0}")]
    MetricsError(String),
    #[error("Cache error: {0}")]
    CacheError(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for CrudError {
    fn from(err: sqlx::Error) -> Self {
        CrudError::DatabaseError(err.to_string())
    }
}

impl From<prometheus::Error> for CrudError {
    fn from(err: prometheus::Error) -> Self {
        CrudError::MetricsError(err.to_string())
    }
}

impl From<serde_json::Error> for CrudError {
    fn from(err: serde_json::Error) -> Self {
        CrudError::Internal(format!("JSON serialization error: {err}"))
    }
}

impl From<crate::config::ConfigurationError> for CrudError {
    fn from(err: crate::config::ConfigurationError) -> Self {
        CrudError::ConfigurationError(err.to_string())
    }
}

impl From<crate::cache::CacheError> for CrudError {
    fn from(err: crate::cache::CacheError) -> Self {
        CrudError::CacheError(err.to_string())
    }
}

pub type CrudResult<T> = std::result::Result<T, CrudError>;
