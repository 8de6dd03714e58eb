//! Backfill binary for the SCD2 snapshot tables.
//!
//! Loads the present-day state of accounts, identities and app instances,
//! synthesizes a version history over the configured trailing window,
//! audits it, and replaces the snapshot tables with it.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `BACKFILL_CONFIG` or `backfill-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Connect to `PostgreSQL` and run migrations
//! 4. Execute the run (load, synthesize, audit, persist, record)
//! 5. Log the result

mod error;
mod run;

use std::path::PathBuf;

use backfill_core::config::{BackfillConfig, LoggingConfig};
use backfill_db::{PostgresConfig, PostgresPool};
use chrono::Utc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Config file read when `BACKFILL_CONFIG` is unset.
const DEFAULT_CONFIG_PATH: &str = "backfill-config.yaml";

/// Application entry point for the backfill.
///
/// # Errors
///
/// Returns an error if configuration, the database, or synthesis fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration. Logging depends on it, so it comes first.
    let config = load_config()?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!("backfill-engine starting");
    info!(
        days = config.window.days,
        end_date = ?config.window.end_date,
        seed = ?config.mutation.seed,
        daily_facts = config.output.daily_facts,
        calendar = config.output.calendar,
        "Configuration loaded"
    );

    // 3. Connect and migrate.
    let pg_config = PostgresConfig::from_infrastructure(&config.infrastructure);
    let pool = PostgresPool::connect(&pg_config).await?;
    pool.run_migrations().await?;

    // 4. Run.
    let outcome = run::execute(&config, &pool, Utc::now().date_naive()).await;
    pool.close().await;
    let summary = outcome?;

    // 5. Report.
    info!(
        run_id = %summary.run_id,
        start = %summary.window.start(),
        end = %summary.window.end(),
        versions = ?summary.versions,
        daily_rows = summary.daily_rows,
        calendar_days = summary.calendar_days,
        "Backfill complete"
    );
    Ok(())
}

/// Install the fmt subscriber. `RUST_LOG` wins over `logging.level`.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

/// Load configuration from the resolved path, or defaults if it is absent.
///
/// Defaults still honour `DATABASE_URL`.
fn load_config() -> Result<BackfillConfig, EngineError> {
    let path = config_path(std::env::var("BACKFILL_CONFIG").ok());
    if path.exists() {
        Ok(BackfillConfig::from_file(&path)?)
    } else {
        // Logging is not up yet.
        eprintln!("config file {} not found, using defaults", path.display());
        Ok(BackfillConfig::parse("")?)
    }
}

fn config_path(from_env: Option<String>) -> PathBuf {
    from_env
        .filter(|p| !p.trim().is_empty())
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
}
