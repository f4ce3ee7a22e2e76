#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # CRUD Core
//!
//! Instrumented data-access core shared by the user and task services.
//!
//! ## Overview
//!
//! Every statement the services send to PostgreSQL passes through one
//! [`database::QueryEnvelope`], which logs the call, times it, counts its
//! outcome and turns driver errors into a [`database::QueryFailure`] the
//! service can answer with. Reads of the user resource go through a
//! cache-aside layer that degrades to direct database reads whenever the
//! cache store is disabled or unreachable.
//!
//! ## Module Organization
//!
//! - [`config`] - Environment-driven configuration and feature flags
//! - [`metrics`] - Prometheus registry, database and HTTP instruments
//! - [`database`] - Statement backend, query envelope and pool lifecycle
//! - [`cache`] - Cache stores and the cache-aside layer
//! - [`services`] - User and task repositories
//! - [`health`] - Liveness, readiness and cache health reports
//! - [`context`] - Startup wiring of all of the above
//! - [`logging`] - Structured console and file logging
//! - [`error`] - Startup and infrastructure errors
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use crud_core::config::ConfigLoader;
//! use crud_core::context::ServiceContext;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::new().load()?;
//! let context = ServiceContext::bootstrap(config).await?;
//!
//! let users = context.users().list_users().await?;
//! println!("{} users (cached: {})", users.value.len(), users.cached);
//!
//! context.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! Unit tests live next to the code. Scenario tests under `tests/` run the
//! repositories against [`test_helpers::InMemoryBackend`], so no database or
//! cache server is needed:
//!
//! ```bash
//! cargo test
//! ```

pub mod cache;
pub mod config;
pub mod context;
pub mod database;
pub mod error;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod services;
pub mod test_helpers;

pub use cache::{CacheAside, CacheLookup, CacheProvider};
pub use config::{ConfigLoader, FeatureFlagHandle, FeatureFlags, ServiceConfig};
pub use context::ServiceContext;
pub use database::{FailureKind, QueryEnvelope, QueryFailure, QueryResult};
pub use error::{CrudError, CrudResult};
pub use health::{HealthReport, HealthStatus};
pub use metrics::MetricsRegistry;
pub use services::{Task, TaskRepository, User, UserRepository};
