//! Error types for the backfill binary.
//!
//! [`EngineError`] wraps every failure mode of a run so `main` and the
//! run ledger see a single type.

/// Top-level error for the backfill binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading or window construction failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: backfill_core::config::ConfigError,
    },

    /// Loading, persisting or the run ledger failed.
    #[error("database error: {source}")]
    Db {
        /// The underlying data-layer error.
        #[from]
        source: backfill_db::DbError,
    },

    /// Synthesis hit an integrity violation.
    #[error("synthesis error: {source}")]
    Synthesis {
        /// The underlying synthesis error.
        #[from]
        source: backfill_core::SynthesisError,
    },

    /// Building a ledger payload failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },
}
