//! # Structured Logging Module
//!
//! Console logging everywhere, plus JSON log files in production: a combined
//! file with every record at the configured level and an error-only file.

use crate::config::LoggingConfig;
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Keeps the non-blocking file writers alive.
///
/// Drop it during graceful shutdown to flush buffered records.
#[derive(Default)]
pub struct LoggingGuard {
    _guards: Vec<WorkerGuard>,
}

impl std::fmt::Debug for LoggingGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggingGuard")
            .field("file_writers", &self._guards.len())
            .finish()
    }
}

/// Initialize structured logging. Later calls are no-ops.
pub fn init_structured_logging(config: &LoggingConfig) -> LoggingGuard {
    let mut guard = LoggingGuard::default();

    LOGGER_INITIALIZED.get_or_init(|| {
        let level = log_filter(config);

        let console = fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_filter(EnvFilter::new(&level));

        let file_layers = if config.is_production() {
            match std::fs::create_dir_all(&config.log_dir) {
                Ok(()) => {
                    let combined = tracing_appender::rolling::never(&config.log_dir, "combined.log");
                    let errors = tracing_appender::rolling::never(&config.log_dir, "error.log");
                    let (combined_writer, combined_guard) = tracing_appender::non_blocking(combined);
                    let (error_writer, error_guard) = tracing_appender::non_blocking(errors);
                    guard._guards.push(combined_guard);
                    guard._guards.push(error_guard);

                    Some(
                        fmt::layer()
                            .json()
                            .with_writer(combined_writer)
                            .with_ansi(false)
                            .with_filter(EnvFilter::new(&level))
                            .and_then(
                                fmt::layer()
                                    .json()
                                    .with_writer(error_writer)
                                    .with_ansi(false)
                                    .with_filter(EnvFilter::new("error")),
                            ),
                    )
                }
                Err(e) => {
                    eprintln!(
                        "failed to create log directory {}: {e}; logging to console only",
                        config.log_dir.display()
                    );
                    None
                }
            }
        } else {
            None
        };

        let subscriber = tracing_subscriber::registry().with(console).with(file_layers);

        if subscriber.try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            environment = %config.environment,
            level = %level,
            file_output = config.is_production(),
            "Structured logging initialized"
        );
    });

    guard
}

fn log_filter(config: &LoggingConfig) -> String {
    if let Some(filter) = &config.filter {
        return filter.clone();
    }

    match config.environment.as_str() {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// One record per database call, emitted before connection acquisition
pub fn log_database_call(operation: &str) {
    tracing::info!(target: "postgresql", query = %operation, "Calling database");
}

/// Terminal record for a failed database call
pub fn log_database_failure(operation: &str, error: &str) {
    tracing::error!(target: "postgresql", query = %operation, error = %error, "Database query failed");
}

/// Pool connect/remove events
pub fn log_pool_event(event: PoolEvent, host: &str, database: &str) {
    match event {
        PoolEvent::Connected => tracing::info!(
            target: "postgresql",
            host = %host,
            database = %database,
            "Database connection established"
        ),
        PoolEvent::Removed => tracing::info!(
            target: "postgresql",
            host = %host,
            database = %database,
            "Database connection removed"
        ),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolEvent {
    Connected,
    Removed,
}
