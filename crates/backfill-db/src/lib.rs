//! `PostgreSQL` data layer for the SCD2 snapshot backfill.
//!
//! Reads the present-day source tables and writes the synthesized history.
//! Everything here is async; the synthesis in between is not.
//!
//! ```text
//! fct_accounts / dim_identities / dim_domain_applications
//!     |
//!     +-- CurrentStateLoader --> CurrentSnapshot --> backfill-core
//!                                                        |
//!     +-- SnapshotSink  <-- SynthesisOutput <------------+
//!     |     |-- dim_*_snapshots   (versioned, replaced per run)
//!     |     +-- fact_*_snapshots  (optional daily grain)
//!     +-- CalendarStore --> dim_dates
//!     +-- RunStore      --> synthesis_runs
//! ```
//!
//! # Modules
//!
//! - [`postgres`] -- Connection pool and migrations
//! - [`loader`] -- Source table reads
//! - [`snapshot_sink`] -- Versioned and daily table writes, as-of reads
//! - [`calendar`] -- The `dim_dates` dimension
//! - [`run_store`] -- The run ledger
//! - [`error`] -- Shared error types

pub mod calendar;
pub mod error;
pub mod loader;
pub mod postgres;
pub mod run_store;
pub mod snapshot_sink;

// Re-export primary types for convenience.
pub use calendar::{CalendarDay, CalendarStore};
pub use error::DbError;
pub use loader::CurrentStateLoader;
pub use postgres::{PostgresConfig, PostgresPool};
pub use run_store::{RunRecord, RunRow, RunStore};
pub use snapshot_sink::{SnapshotRow, SnapshotSink, SnapshotTables, WrittenRows, snapshot_tables};
