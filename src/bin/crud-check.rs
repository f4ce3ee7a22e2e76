//! # CRUD Service Checker
//!
//! Resolves the service configuration the same way the services do, prints
//! it with secrets redacted and, with `--connect`, connects to Postgres and the
//! cache store and reports their health.

use anyhow::{bail, Context};
use clap::Parser;
use crud_core::config::ConfigLoader;
use crud_core::context::ServiceContext;
use crud_core::logging::init_structured_logging;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "crud-check")]
#[command(about = "Check CRUD service configuration and dependencies")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// TOML file layered underneath the environment
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Connect to the database and cache store and report their health
    #[arg(long)]
    connect: bool,

    /// Service name used in health reports
    #[arg(long, default_value = "crud-check")]
    service: String,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_file(path);
    }
    let mut config = loader.load().context("failed to load configuration")?;

    config.logging.filter = Some(
        match cli.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
        .to_string(),
    );
    let _logging = init_structured_logging(&config.logging);

    println!("{}", serde_json::to_string_pretty(&config)?);

    if !cli.connect {
        return Ok(());
    }

    let context = ServiceContext::bootstrap(config)
        .await
        .context("failed to build service context")?;

    let database = context.check_database(&cli.service).await;
    let cache = context.check_cache().await;
    println!("{}", serde_json::to_string_pretty(&database)?);
    println!("{}", serde_json::to_string_pretty(&cache)?);
    println!("{}", context.metrics().snapshot()?);

    context.shutdown().await;

    if !database.status.is_ok() || !cache.status.is_ok() {
        bail!("dependency checks failed");
    }

    info!("All dependency checks passed");
    Ok(())
}
