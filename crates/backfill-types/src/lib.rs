//! Shared type definitions for the SCD2 snapshot backfill.
//!
//! This crate is the single source of truth for entity keys, status domains
//! and state records used across the workspace. Types flow downstream to
//! `TypeScript` via `ts-rs` for the query builder.
//!
//! # Modules
//!
//! - [`ids`] -- Newtype keys for source rows plus the run identifier
//! - [`enums`] -- Entity classes, versioned attributes, status domains, run outcomes
//! - [`structs`] -- Present-day state records per entity class

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{
    AccountStatus, AppInstanceStatus, Attribute, EntityClass, IdentityStatus, RunStatus,
    UnknownStatus,
};
pub use ids::{AccountId, AppId, AppInstanceId, IdentityId, RunId};
pub use structs::{AccountState, AppInstanceState, IdentityState};
