//! The backward mutation walk.
//!
//! Starting from the seeded present, the walker steps one day at a time
//! towards the window start. On each day every entity rolls its versioned
//! attributes against its running state (the state of its earliest version
//! so far). A day that changes anything becomes a version boundary: the
//! store splits the earliest version there and the mutated state becomes
//! the new running state.

use std::collections::BTreeMap;

use backfill_types::{Attribute, EntityClass};

use crate::entity::Versioned;
use crate::mutation::MutationSource;
use crate::store::{SnapshotStore, StoreError};

/// Summary of one class's walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkReport {
    /// Entity class walked.
    pub class: EntityClass,
    /// Days visited, including the skipped window-start day.
    pub days_walked: u64,
    /// Versions inserted by repair.
    pub versions_inserted: u64,
    /// How many boundaries changed each attribute.
    pub mutations: BTreeMap<Attribute, u64>,
}

impl WalkReport {
    fn new(class: EntityClass) -> Self {
        Self {
            class,
            days_walked: 0,
            versions_inserted: 0,
            mutations: BTreeMap::new(),
        }
    }

    /// Boundaries at which `attribute` changed.
    pub fn mutations_of(&self, attribute: Attribute) -> u64 {
        self.mutations.get(&attribute).copied().unwrap_or(0)
    }
}

/// Walk the store's window backward and synthesize historical versions.
///
/// Days run from `end - 1` down to `start`. Entities are visited in key
/// order within a day, so a deterministic source yields a deterministic
/// history.
///
/// # Errors
///
/// Propagates any [`StoreError`] from repair. The store must not be used
/// after an error; the run is expected to abort.
pub fn walk_backward<S: Versioned>(
    store: &mut SnapshotStore<S>,
    rates: &S::Rates,
    source: &mut dyn MutationSource,
) -> Result<WalkReport, StoreError> {
    let window = store.window();
    let start = window.start();
    let mut report = WalkReport::new(S::CLASS);

    let mut running: BTreeMap<S::Id, S> = store
        .histories()
        .filter_map(|(id, history)| history.earliest().map(|v| (*id, v.state.clone())))
        .collect();

    for day in window.walk_days() {
        report.days_walked = report.days_walked.saturating_add(1);
        // [start, start) would be empty.
        if day == start {
            continue;
        }

        for (id, state) in &mut running {
            let Some(mutated) = state.roll_mutations(day, rates, source) else {
                continue;
            };
            store.repair(*id, mutated.state.clone(), day)?;
            report.versions_inserted = report.versions_inserted.saturating_add(1);
            for attribute in &mutated.changed {
                let count = report.mutations.entry(*attribute).or_insert(0);
                *count = count.saturating_add(1);
            }
            *state = mutated.state;
        }
    }

    tracing::info!(
        class = %S::CLASS,
        entities = running.len(),
        days = report.days_walked,
        versions_inserted = report.versions_inserted,
        "Backward walk complete"
    );
    Ok(report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use backfill_types::{AccountId, AccountState, AccountStatus, AppInstanceId, IdentityId};
    use chrono::NaiveDate;

    use super::*;
    use crate::config::AccountRates;
    use crate::mutation::ScriptedMutationSource;
    use crate::seeder::seed_current_versions;
    use crate::window::{SynthesisWindow, open_ended};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, d).unwrap()
    }

    fn account(id: i64) -> AccountState {
        AccountState {
            account_id: AccountId(id),
            user_id: IdentityId(1),
            app_instance_id: AppInstanceId(1),
            status: AccountStatus::Active,
            last_activity: Some(date(5)),
            is_matched: false,
            is_admin: false,
        }
    }

    #[test]
    fn quiet_walk_moves_nothing() {
        let window = SynthesisWindow::new(date(1), date(5)).unwrap();
        let mut store = seed_current_versions([account(1), account(2)], window).unwrap();
        let mut source = ScriptedMutationSource::quiet();
        let report = walk_backward(&mut store, &AccountRates::default(), &mut source).unwrap();

        assert_eq!(report.days_walked, 4);
        assert_eq!(report.versions_inserted, 0);
        assert_eq!(store.version_count(), 2);
        assert!(store.versions().all(|v| v.effective_to == open_ended()));
    }

    #[test]
    fn start_day_consumes_no_rolls() {
        // Window of two days: the walk visits only the start day.
        let window = SynthesisWindow::new(date(1), date(2)).unwrap();
        let mut store = seed_current_versions([account(1)], window).unwrap();
        let mut source = ScriptedMutationSource::new([true, true, true, true], [0]);
        let report = walk_backward(&mut store, &AccountRates::default(), &mut source).unwrap();

        assert_eq!(report.days_walked, 1);
        assert_eq!(report.versions_inserted, 0);
        assert_eq!(source.remaining_rolls(), 4);
    }

    #[test]
    fn entities_are_rolled_in_key_order() {
        // Day 3: account 1 rolls [status: yes, activity/matched/admin: no],
        // account 2 rolls all four "no". Day 2: all quiet.
        let window = SynthesisWindow::new(date(1), date(4)).unwrap();
        let mut store = seed_current_versions([account(2), account(1)], window).unwrap();
        let mut source = ScriptedMutationSource::new(
            [true, false, false, false, false, false, false, false],
            [0],
        );
        let report = walk_backward(&mut store, &AccountRates::default(), &mut source).unwrap();

        assert_eq!(report.versions_inserted, 1);
        assert_eq!(report.mutations_of(Attribute::Status), 1);
        let first = store.earliest(&AccountId(1)).unwrap();
        assert_eq!(first.effective_to, date(3));
        assert_eq!(first.state.status, AccountStatus::Suspended);
        assert_eq!(store.history(&AccountId(2)).unwrap().len(), 1);
    }
}
