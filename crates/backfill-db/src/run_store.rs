//! The `synthesis_runs` ledger.
//!
//! Every run, successful or failed, leaves one row describing its window,
//! seed, per-class version counts and mutation settings, so any snapshot
//! table can be traced back to the run that wrote it via `run_id`.

use backfill_types::{RunId, RunStatus};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DbError;

/// What a finished run reports to the ledger.
#[derive(Debug, Clone)]
pub struct RunRecord {
    /// Run identifier, also stamped on every snapshot row.
    pub run_id: RunId,
    /// Outcome.
    pub status: RunStatus,
    /// First window day.
    pub window_start: NaiveDate,
    /// Last window day.
    pub window_end: NaiveDate,
    /// Random seed, if the run was reproducible.
    pub seed: Option<u64>,
    /// Versions written per class, e.g. `{"account": 120}`.
    pub version_counts: serde_json::Value,
    /// Mutation settings in effect.
    pub config: serde_json::Value,
    /// Failure description for failed runs.
    pub error: Option<String>,
    /// When the run began.
    pub started_at: DateTime<Utc>,
}

/// Operations on the `synthesis_runs` table.
pub struct RunStore<'a> {
    pool: &'a PgPool,
}

impl<'a> RunStore<'a> {
    /// Create a run store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert the ledger row for a run.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails, including when
    /// the run id was already recorded.
    pub async fn record_run(&self, run: &RunRecord) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO synthesis_runs
              (run_id, status, window_start, window_end, seed, version_counts, config, error, started_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(run.run_id.into_inner())
        .bind(run.status.as_str())
        .bind(run.window_start)
        .bind(run.window_end)
        .bind(run.seed.map(|seed| seed.to_string()))
        .bind(&run.version_counts)
        .bind(&run.config)
        .bind(run.error.as_deref())
        .bind(run.started_at)
        .execute(self.pool)
        .await?;

        tracing::info!(
            run_id = %run.run_id,
            status = %run.status,
            "Recorded synthesis run"
        );
        Ok(())
    }

    /// Load a ledger row by run id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn get_run(&self, run_id: RunId) -> Result<Option<RunRow>, DbError> {
        let row = sqlx::query_as::<_, RunRow>(
            r"SELECT run_id, status, window_start, window_end, seed, version_counts, config, error, started_at, finished_at
              FROM synthesis_runs
              WHERE run_id = $1",
        )
        .bind(run_id.into_inner())
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }
}

/// A row from the `synthesis_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RunRow {
    /// Run identifier.
    pub run_id: Uuid,
    /// `completed` or `failed`.
    pub status: String,
    /// First window day.
    pub window_start: NaiveDate,
    /// Last window day.
    pub window_end: NaiveDate,
    /// Seed as decimal text.
    pub seed: Option<String>,
    /// Versions written per class.
    pub version_counts: serde_json::Value,
    /// Mutation settings in effect.
    pub config: serde_json::Value,
    /// Failure description.
    pub error: Option<String>,
    /// When the run began.
    pub started_at: DateTime<Utc>,
    /// When the ledger row was written.
    pub finished_at: DateTime<Utc>,
}

impl RunRow {
    /// Parse the stored status.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::UnknownStatus`] for text outside the run domain.
    pub fn run_status(&self) -> Result<RunStatus, DbError> {
        Ok(self.status.parse()?)
    }

    /// Parse the stored seed.
    pub fn seed(&self) -> Option<u64> {
        self.seed.as_deref().and_then(|s| s.parse().ok())
    }
}
