//! Error types for the data layer.
//!
//! All errors are propagated via [`DbError`], which wraps the underlying
//! [`sqlx`] errors and adds the load-time failures that abort a run before
//! synthesis starts.

use backfill_core::inputs::InputError;
use backfill_types::UnknownStatus;

/// `PostgreSQL` SQLSTATE for `undefined_table`.
const UNDEFINED_TABLE: &str = "42P01";

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A `PostgreSQL` migration failed.
    #[error("PostgreSQL migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A source table the loader reads does not exist.
    #[error("Source table {table} does not exist")]
    MissingSource {
        /// Name of the absent table.
        table: &'static str,
    },

    /// A source row carries a status outside its domain.
    #[error("Invalid source row: {0}")]
    UnknownStatus(#[from] UnknownStatus),

    /// The loaded rows are not referentially consistent.
    #[error("Inconsistent source data: {0}")]
    Input(#[from] InputError),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DbError {
    /// Attribute an error raised while reading `table`, turning a missing
    /// relation into [`DbError::MissingSource`].
    pub(crate) fn reading(table: &'static str, err: sqlx::Error) -> Self {
        let undefined = err
            .as_database_error()
            .and_then(|db| db.code())
            .is_some_and(|code| code == UNDEFINED_TABLE);
        if undefined {
            Self::MissingSource { table }
        } else {
            Self::Postgres(err)
        }
    }
}
