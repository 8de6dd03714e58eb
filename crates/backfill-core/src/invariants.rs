//! Post-walk invariant audit.
//!
//! Runs over a finished store before anything is persisted. Any violation
//! means the repair logic or its inputs are broken, so the run aborts.

use backfill_types::EntityClass;
use chrono::NaiveDate;

use crate::entity::Versioned;
use crate::store::{EntityHistory, SnapshotStore, SnapshotVersion};
use crate::window::open_ended;

/// A broken invariant on one entity's history.
#[derive(Debug, thiserror::Error)]
#[error("{class} {entity}: {violation}")]
pub struct InvariantError {
    /// Entity class.
    pub class: EntityClass,
    /// Entity key.
    pub entity: String,
    /// What was broken.
    pub violation: Violation,
}

/// The specific invariant an entity history breaks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Violation {
    /// The entity has no versions at all.
    #[error("history is empty")]
    EmptyHistory,

    /// The earliest version does not start on the window start.
    #[error("earliest version starts {found}, expected {expected}")]
    EarliestStart {
        /// Window start.
        expected: NaiveDate,
        /// Actual start.
        found: NaiveDate,
    },

    /// Consecutive versions leave a gap or overlap.
    #[error("version ending {previous_to} is followed by one starting {next_from}")]
    NotContiguous {
        /// End of the earlier version.
        previous_to: NaiveDate,
        /// Start of the later version.
        next_from: NaiveDate,
    },

    /// A version has `effective_from >= effective_to`.
    #[error("zero-length or inverted interval [{from}, {to})")]
    EmptyInterval {
        /// Interval start.
        from: NaiveDate,
        /// Interval end.
        to: NaiveDate,
    },

    /// The latest version is not open-ended.
    #[error("latest version ends {found} instead of the open-ended sentinel")]
    NotOpenEnded {
        /// Actual end.
        found: NaiveDate,
    },

    /// The entity does not have exactly one current version.
    #[error("{count} current versions, expected 1")]
    CurrentCount {
        /// Number of versions flagged current.
        count: usize,
    },

    /// The current flag sits on a version other than the latest.
    #[error("current flag is not on the latest version")]
    CurrentNotLatest,

    /// An invariant attribute differs between versions.
    #[error("invariant attributes changed at {at}")]
    InvariantAttributeChanged {
        /// Boundary where the change appears.
        at: NaiveDate,
    },

    /// Two adjacent versions carry identical versioned values.
    #[error("boundary at {at} changes nothing")]
    RedundantBoundary {
        /// The boundary date.
        at: NaiveDate,
    },
}

/// Check every entity history in `store`.
///
/// Verified per entity: the intervals partition `[start, sentinel)`
/// without gaps, overlaps or zero-length rows; exactly one version is
/// current and it is the latest; invariant attributes never change; and
/// every boundary changes at least one versioned attribute.
///
/// # Errors
///
/// Returns the first [`InvariantError`] found, in entity key order.
pub fn audit<S: Versioned>(store: &SnapshotStore<S>) -> Result<(), InvariantError> {
    let start = store.window().start();
    for (id, history) in store.histories() {
        check_history(history, start).map_err(|violation| InvariantError {
            class: S::CLASS,
            entity: id.to_string(),
            violation,
        })?;
    }
    tracing::debug!(
        class = %S::CLASS,
        entities = store.entity_count(),
        versions = store.version_count(),
        "Invariant audit passed"
    );
    Ok(())
}

fn check_history<S: Versioned>(
    history: &EntityHistory<S>,
    start: NaiveDate,
) -> Result<(), Violation> {
    let first = history.earliest().ok_or(Violation::EmptyHistory)?;
    if first.effective_from != start {
        return Err(Violation::EarliestStart {
            expected: start,
            found: first.effective_from,
        });
    }

    let current_count = history.chronological().filter(|v| v.is_current).count();
    if current_count != 1 {
        return Err(Violation::CurrentCount {
            count: current_count,
        });
    }

    let mut previous: Option<&SnapshotVersion<S>> = None;
    for version in history.chronological() {
        if version.effective_from >= version.effective_to {
            return Err(Violation::EmptyInterval {
                from: version.effective_from,
                to: version.effective_to,
            });
        }
        if let Some(prev) = previous {
            if prev.effective_to != version.effective_from {
                return Err(Violation::NotContiguous {
                    previous_to: prev.effective_to,
                    next_from: version.effective_from,
                });
            }
            if !prev.state.same_invariants(&version.state) {
                return Err(Violation::InvariantAttributeChanged {
                    at: version.effective_from,
                });
            }
            if prev.state.changed_attributes(&version.state).is_empty() {
                return Err(Violation::RedundantBoundary {
                    at: version.effective_from,
                });
            }
        }
        previous = Some(version);
    }

    // `previous` is the latest version here; `first` proved it exists.
    if let Some(latest) = previous {
        if latest.effective_to != open_ended() {
            return Err(Violation::NotOpenEnded {
                found: latest.effective_to,
            });
        }
        if !latest.is_current {
            return Err(Violation::CurrentNotLatest);
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use backfill_types::{IdentityId, IdentityState, IdentityStatus};

    use super::*;
    use crate::seeder::seed_current_versions;
    use crate::window::SynthesisWindow;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, d).unwrap()
    }

    fn identity(id: i64, status: IdentityStatus) -> IdentityState {
        IdentityState {
            identity_id: IdentityId(id),
            status,
            created: NaiveDate::from_ymd_opt(2020, 1, 1),
        }
    }

    fn seeded() -> SnapshotStore<IdentityState> {
        let window = SynthesisWindow::new(date(1), date(10)).unwrap();
        seed_current_versions([identity(1, IdentityStatus::Active)], window).unwrap()
    }

    #[test]
    fn seeded_store_passes() {
        assert!(audit(&seeded()).is_ok());
    }

    #[test]
    fn repaired_store_passes() {
        let mut store = seeded();
        store
            .repair(IdentityId(1), identity(1, IdentityStatus::OnLeave), date(6))
            .unwrap();
        store
            .repair(IdentityId(1), identity(1, IdentityStatus::Active), date(3))
            .unwrap();
        assert!(audit(&store).is_ok());
    }

    #[test]
    fn redundant_boundary_is_flagged() {
        let mut store = seeded();
        store
            .repair(IdentityId(1), identity(1, IdentityStatus::Active), date(6))
            .unwrap();
        let err = audit(&store).unwrap_err();
        assert_eq!(err.violation, Violation::RedundantBoundary { at: date(6) });
    }

    #[test]
    fn changed_invariant_is_flagged() {
        let mut store = seeded();
        let mut earlier = identity(1, IdentityStatus::Terminated);
        earlier.created = NaiveDate::from_ymd_opt(2021, 1, 1);
        store.repair(IdentityId(1), earlier, date(4)).unwrap();
        let err = audit(&store).unwrap_err();
        assert_eq!(
            err.violation,
            Violation::InvariantAttributeChanged { at: date(4) }
        );
        assert_eq!(err.class, EntityClass::Identity);
        assert_eq!(err.entity, "1");
    }
}
