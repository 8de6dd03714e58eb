//! The in-memory versioned snapshot store and the interval repair primitive.
//!
//! Each entity owns an [`EntityHistory`]: its versions kept newest-first,
//! so the earliest version is always the last element. That last slot is
//! the per-entity "earliest version handle" the backward walk repairs
//! against, and [`SnapshotStore::repair`] re-checks on every call that it
//! is the one and only version starting on the window start.
//!
//! Rows are never removed. A repair only moves one `effective_from`
//! forward and pushes one new closed version behind it.

use std::collections::BTreeMap;

use backfill_types::EntityClass;
use chrono::NaiveDate;

use crate::entity::Versioned;
use crate::window::{SynthesisWindow, open_ended};

/// Errors raised by store operations. All of them are integrity violations
/// that abort the run.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The entity was already seeded.
    #[error("{class} {entity} is already seeded")]
    DuplicateEntity {
        /// Entity class.
        class: EntityClass,
        /// Entity key.
        entity: String,
    },

    /// A repair targeted an entity the store has never seen.
    #[error("{class} {entity} has no versions to repair")]
    UnknownEntity {
        /// Entity class.
        class: EntityClass,
        /// Entity key.
        entity: String,
    },

    /// The single-earliest-version precondition does not hold.
    #[error("{class} {entity} has {matching} versions starting on the window start, expected exactly 1")]
    EarliestNotUnique {
        /// Entity class.
        class: EntityClass,
        /// Entity key.
        entity: String,
        /// How many versions start on the window start.
        matching: usize,
    },

    /// The boundary would leave a zero-length interval on either side.
    #[error(
        "{class} {entity}: boundary {boundary} does not split earliest version [{from}, {to})"
    )]
    BoundaryOutOfRange {
        /// Entity class.
        class: EntityClass,
        /// Entity key.
        entity: String,
        /// Requested boundary.
        boundary: NaiveDate,
        /// Current start of the earliest version.
        from: NaiveDate,
        /// Current end of the earliest version.
        to: NaiveDate,
    },

    /// The surrogate version counter is exhausted.
    #[error("version id space exhausted")]
    VersionIdOverflow,
}

/// Surrogate key of one version, unique within a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionId(pub u64);

impl core::fmt::Display for VersionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// One SCD2 row: a state and the half-open interval it was in effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotVersion<S> {
    /// Surrogate key.
    pub version_id: VersionId,
    /// Entity state in effect during the interval.
    pub state: S,
    /// First day the state is in effect.
    pub effective_from: NaiveDate,
    /// First day the state is no longer in effect; [`open_ended`] when current.
    pub effective_to: NaiveDate,
    /// Whether this is the entity's present-day version.
    pub is_current: bool,
}

impl<S> SnapshotVersion<S> {
    /// Whether `date` lies in `[effective_from, effective_to)`.
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.effective_from <= date && date < self.effective_to
    }
}

/// All versions of one entity, newest first.
#[derive(Debug, Clone)]
pub struct EntityHistory<S> {
    versions: Vec<SnapshotVersion<S>>,
}

impl<S> EntityHistory<S> {
    /// Versions in chronological order (earliest first).
    pub fn chronological(&self) -> impl DoubleEndedIterator<Item = &SnapshotVersion<S>> {
        self.versions.iter().rev()
    }

    /// The earliest version.
    pub fn earliest(&self) -> Option<&SnapshotVersion<S>> {
        self.versions.last()
    }

    /// The version flagged current.
    pub fn current(&self) -> Option<&SnapshotVersion<S>> {
        self.versions.iter().find(|v| v.is_current)
    }

    /// Number of versions.
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    /// Whether the history holds no versions.
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

/// Versioned snapshot store for one entity class.
#[derive(Debug, Clone)]
pub struct SnapshotStore<S: Versioned> {
    window: SynthesisWindow,
    histories: BTreeMap<S::Id, EntityHistory<S>>,
    next_version: u64,
}

impl<S: Versioned> SnapshotStore<S> {
    /// Create an empty store for `window`.
    pub const fn new(window: SynthesisWindow) -> Self {
        Self {
            window,
            histories: BTreeMap::new(),
            next_version: 1,
        }
    }

    /// The window this store covers.
    pub const fn window(&self) -> SynthesisWindow {
        self.window
    }

    /// Insert the current version of an entity, spanning the whole window.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateEntity`] if the entity already has
    /// versions.
    pub fn seed(&mut self, state: S) -> Result<VersionId, StoreError> {
        let id = state.entity_id();
        if self.histories.contains_key(&id) {
            return Err(StoreError::DuplicateEntity {
                class: S::CLASS,
                entity: id.to_string(),
            });
        }
        let version_id = self.allocate()?;
        self.histories.insert(
            id,
            EntityHistory {
                versions: vec![SnapshotVersion {
                    version_id,
                    state,
                    effective_from: self.window.start(),
                    effective_to: open_ended(),
                    is_current: true,
                }],
            },
        );
        Ok(version_id)
    }

    /// Split the entity's earliest version at `boundary`.
    ///
    /// The earliest version is truncated to start at `boundary`, and
    /// `earlier` is inserted as the closed version
    /// `[window.start, boundary)` in front of it.
    ///
    /// # Errors
    ///
    /// - [`StoreError::UnknownEntity`] if the entity was never seeded.
    /// - [`StoreError::EarliestNotUnique`] unless exactly one version starts
    ///   on the window start and it is the tracked earliest version.
    /// - [`StoreError::BoundaryOutOfRange`] unless
    ///   `window.start < boundary < earliest.effective_to`.
    pub fn repair(
        &mut self,
        id: S::Id,
        earlier: S,
        boundary: NaiveDate,
    ) -> Result<VersionId, StoreError> {
        let start = self.window.start();
        let history = self
            .histories
            .get_mut(&id)
            .ok_or_else(|| StoreError::UnknownEntity {
                class: S::CLASS,
                entity: id.to_string(),
            })?;

        let matching = history
            .versions
            .iter()
            .filter(|v| v.effective_from == start)
            .count();
        let earliest = history
            .versions
            .last_mut()
            .filter(|v| matching == 1 && v.effective_from == start)
            .ok_or_else(|| StoreError::EarliestNotUnique {
                class: S::CLASS,
                entity: id.to_string(),
                matching,
            })?;

        if boundary <= start || boundary >= earliest.effective_to {
            return Err(StoreError::BoundaryOutOfRange {
                class: S::CLASS,
                entity: id.to_string(),
                boundary,
                from: earliest.effective_from,
                to: earliest.effective_to,
            });
        }

        let version_id = VersionId(self.next_version);
        self.next_version = self
            .next_version
            .checked_add(1)
            .ok_or(StoreError::VersionIdOverflow)?;

        earliest.effective_from = boundary;
        history.versions.push(SnapshotVersion {
            version_id,
            state: earlier,
            effective_from: start,
            effective_to: boundary,
            is_current: false,
        });

        tracing::trace!(
            class = %S::CLASS,
            entity = %id,
            %boundary,
            %version_id,
            "Split earliest version"
        );
        Ok(version_id)
    }

    /// The full history of one entity.
    pub fn history(&self, id: &S::Id) -> Option<&EntityHistory<S>> {
        self.histories.get(id)
    }

    /// The earliest version of one entity.
    pub fn earliest(&self, id: &S::Id) -> Option<&SnapshotVersion<S>> {
        self.histories.get(id).and_then(EntityHistory::earliest)
    }

    /// The current version of one entity.
    pub fn current(&self, id: &S::Id) -> Option<&SnapshotVersion<S>> {
        self.histories.get(id).and_then(EntityHistory::current)
    }

    /// Every entity and its history, ordered by entity key.
    pub fn histories(&self) -> impl Iterator<Item = (&S::Id, &EntityHistory<S>)> {
        self.histories.iter()
    }

    /// Every version, grouped by entity and chronological within an entity.
    pub fn versions(&self) -> impl Iterator<Item = &SnapshotVersion<S>> {
        self.histories.values().flat_map(EntityHistory::chronological)
    }

    /// The version of each entity in effect on `date`.
    pub fn as_of(&self, date: NaiveDate) -> impl Iterator<Item = &SnapshotVersion<S>> {
        self.versions().filter(move |v| v.covers(date))
    }

    /// Expand versions to one `(day, version)` pair per window day.
    ///
    /// This is the daily grain the reporting layer derives by joining the
    /// versioned tables to the calendar.
    pub fn daily(&self) -> impl Iterator<Item = (NaiveDate, &SnapshotVersion<S>)> {
        let window = self.window;
        self.versions().flat_map(move |version| {
            window
                .dates()
                .filter(move |day| version.covers(*day))
                .map(move |day| (day, version))
        })
    }

    /// Number of seeded entities.
    pub fn entity_count(&self) -> usize {
        self.histories.len()
    }

    /// Total number of versions across all entities.
    pub fn version_count(&self) -> usize {
        self.histories.values().map(EntityHistory::len).sum()
    }

    fn allocate(&mut self) -> Result<VersionId, StoreError> {
        let id = VersionId(self.next_version);
        self.next_version = self
            .next_version
            .checked_add(1)
            .ok_or(StoreError::VersionIdOverflow)?;
        Ok(id)
    }
}
