//! Configuration error types

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    /// A source could not be read or a value could not be parsed
    #[error("Failed to load configuration: {0}")]
    Load(String),

    /// Values parsed but failed semantic checks
    #[error("Invalid configuration: {}", .0.join("; "))]
    Validation(Vec<String>),
}

impl From<config::ConfigError> for ConfigurationError {
    fn from(err: config::ConfigError) -> Self {
        ConfigurationError::Load(err.to_string())
    }
}

pub type ConfigResult<T> = Result<T, ConfigurationError>;
