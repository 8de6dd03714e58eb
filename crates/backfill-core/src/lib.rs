//! Core synthesis logic for the SCD2 snapshot backfill.
//!
//! Given the present-day state of accounts, identities and app instances,
//! this crate fabricates a plausible version history over a trailing
//! window. It is synchronous and performs no I/O; loading and persisting
//! live in `backfill-db`.
//!
//! # Modules
//!
//! - [`window`] -- The synthesis window and backward day iteration
//! - [`config`] -- YAML configuration and validation
//! - [`mutation`] -- Pluggable random / scripted mutation decisions
//! - [`entity`] -- Per-class attribute rolls via the [`entity::Versioned`] trait
//! - [`store`] -- In-memory versioned store and interval repair
//! - [`seeder`] -- One current version per entity
//! - [`walker`] -- The backward mutation walk
//! - [`invariants`] -- Post-walk history audit
//! - [`inputs`] -- Loaded snapshot and referential checks
//! - [`synth`] -- Per-class and whole-run orchestration

pub mod config;
pub mod entity;
pub mod inputs;
pub mod invariants;
pub mod mutation;
pub mod seeder;
pub mod store;
pub mod synth;
pub mod walker;
pub mod window;

pub use config::BackfillConfig;
pub use inputs::CurrentSnapshot;
pub use mutation::{MutationSource, RandomMutationSource, ScriptedMutationSource};
pub use store::{SnapshotStore, SnapshotVersion};
pub use synth::{SynthesisError, SynthesisOutput, Synthesized, synthesize, synthesize_all};
pub use window::{SynthesisWindow, open_ended};
