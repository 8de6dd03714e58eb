//! Per-class mutation rules.
//!
//! [`Versioned`] is the seam between the generic store/walker machinery
//! and the three entity classes. Each class decides which attributes it
//! versions, in what order they are rolled, and how a rolled attribute
//! obtains its earlier value. Invariant attributes (owning identity,
//! catalogue app, creation dates) are never touched here.

use core::fmt;

use backfill_types::{
    AccountState, AccountStatus, AppInstanceState, AppInstanceStatus, Attribute, EntityClass,
    IdentityState, IdentityStatus,
};
use chrono::{Days, NaiveDate};

use crate::config::{AccountRates, AppInstanceRates, IdentityRates};
use crate::mutation::{MutationSource, pick_other};

/// The outcome of a day's rolls that changed at least one attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutated<S> {
    /// The state in effect before the boundary day.
    pub state: S,
    /// Attributes whose values differ from the later version.
    pub changed: Vec<Attribute>,
}

/// An entity state that can be versioned and mutated backward in time.
pub trait Versioned: Clone + fmt::Debug + PartialEq {
    /// Stable entity key.
    type Id: Copy + Ord + fmt::Debug + fmt::Display;

    /// Per-attribute mutation probabilities for this class.
    type Rates;

    /// Which class this is.
    const CLASS: EntityClass;

    /// The entity key of this state.
    fn entity_id(&self) -> Self::Id;

    /// Roll each versioned attribute for `day` and build the earlier state.
    ///
    /// Returns `None` when no attribute changed, in which case the later
    /// version simply extends back over this day.
    fn roll_mutations(
        &self,
        day: NaiveDate,
        rates: &Self::Rates,
        source: &mut dyn MutationSource,
    ) -> Option<Mutated<Self>>;

    /// Versioned attributes whose values differ between `self` and `other`.
    fn changed_attributes(&self, other: &Self) -> Vec<Attribute>;

    /// Whether the invariant attributes of `self` and `other` agree.
    fn same_invariants(&self, other: &Self) -> bool;
}

impl Versioned for AccountState {
    type Id = backfill_types::AccountId;
    type Rates = AccountRates;

    const CLASS: EntityClass = EntityClass::Account;

    fn entity_id(&self) -> Self::Id {
        self.account_id
    }

    /// Rolls, in order: status, last activity, matched flag, admin flag.
    fn roll_mutations(
        &self,
        day: NaiveDate,
        rates: &Self::Rates,
        source: &mut dyn MutationSource,
    ) -> Option<Mutated<Self>> {
        let mut earlier = self.clone();

        if source.chance(rates.status) {
            if let Some(status) = pick_other(&AccountStatus::ALL, self.status, source) {
                earlier.status = status;
            }
        }
        if source.chance(rates.last_activity) {
            let window = usize::try_from(rates.activity_lookback_days)
                .unwrap_or(usize::MAX)
                .saturating_add(1);
            let back = u64::try_from(source.pick(window)).unwrap_or(0);
            if let Some(activity) = day.checked_sub_days(Days::new(back)) {
                earlier.last_activity = Some(activity);
            }
        }
        if source.chance(rates.matched) {
            earlier.is_matched = !self.is_matched;
        }
        if source.chance(rates.admin) {
            earlier.is_admin = !self.is_admin;
        }

        finish(self, earlier)
    }

    fn changed_attributes(&self, other: &Self) -> Vec<Attribute> {
        let mut changed = Vec::new();
        if self.status != other.status {
            changed.push(Attribute::Status);
        }
        if self.last_activity != other.last_activity {
            changed.push(Attribute::LastActivity);
        }
        if self.is_matched != other.is_matched {
            changed.push(Attribute::Matched);
        }
        if self.is_admin != other.is_admin {
            changed.push(Attribute::Admin);
        }
        changed
    }

    fn same_invariants(&self, other: &Self) -> bool {
        self.account_id == other.account_id
            && self.user_id == other.user_id
            && self.app_instance_id == other.app_instance_id
    }
}

impl Versioned for IdentityState {
    type Id = backfill_types::IdentityId;
    type Rates = IdentityRates;

    const CLASS: EntityClass = EntityClass::Identity;

    fn entity_id(&self) -> Self::Id {
        self.identity_id
    }

    fn roll_mutations(
        &self,
        _day: NaiveDate,
        rates: &Self::Rates,
        source: &mut dyn MutationSource,
    ) -> Option<Mutated<Self>> {
        let mut earlier = self.clone();
        if source.chance(rates.status) {
            if let Some(status) = pick_other(&IdentityStatus::ALL, self.status, source) {
                earlier.status = status;
            }
        }
        finish(self, earlier)
    }

    fn changed_attributes(&self, other: &Self) -> Vec<Attribute> {
        if self.status == other.status {
            Vec::new()
        } else {
            vec![Attribute::Status]
        }
    }

    fn same_invariants(&self, other: &Self) -> bool {
        self.identity_id == other.identity_id && self.created == other.created
    }
}

impl Versioned for AppInstanceState {
    type Id = backfill_types::AppInstanceId;
    type Rates = AppInstanceRates;

    const CLASS: EntityClass = EntityClass::AppInstance;

    fn entity_id(&self) -> Self::Id {
        self.instance_id
    }

    /// Rolls, in order: status, shadow-IT flag.
    fn roll_mutations(
        &self,
        _day: NaiveDate,
        rates: &Self::Rates,
        source: &mut dyn MutationSource,
    ) -> Option<Mutated<Self>> {
        let mut earlier = self.clone();
        if source.chance(rates.status) {
            if let Some(status) = pick_other(&AppInstanceStatus::ALL, self.status, source) {
                earlier.status = status;
            }
        }
        if source.chance(rates.shadow_it) {
            earlier.is_shadow_it = !self.is_shadow_it;
        }
        finish(self, earlier)
    }

    fn changed_attributes(&self, other: &Self) -> Vec<Attribute> {
        let mut changed = Vec::new();
        if self.status != other.status {
            changed.push(Attribute::Status);
        }
        if self.is_shadow_it != other.is_shadow_it {
            changed.push(Attribute::ShadowIt);
        }
        changed
    }

    fn same_invariants(&self, other: &Self) -> bool {
        self.instance_id == other.instance_id
            && self.app_id == other.app_id
            && self.created == other.created
    }
}

/// Keep the earlier state only if some rolled attribute actually differs.
///
/// A roll can land on the value already in effect (an activity date drawn
/// equal to the current one); such a day produces no version.
fn finish<S: Versioned>(later: &S, earlier: S) -> Option<Mutated<S>> {
    let changed = later.changed_attributes(&earlier);
    if changed.is_empty() {
        None
    } else {
        Some(Mutated {
            state: earlier,
            changed,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use backfill_types::{AccountId, AppId, AppInstanceId, IdentityId};

    use super::*;
    use crate::mutation::ScriptedMutationSource;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, 20).unwrap()
    }

    fn account() -> AccountState {
        AccountState {
            account_id: AccountId(1),
            user_id: IdentityId(10),
            app_instance_id: AppInstanceId(100),
            status: AccountStatus::Active,
            last_activity: NaiveDate::from_ymd_opt(2025, 4, 25),
            is_matched: true,
            is_admin: false,
        }
    }

    #[test]
    fn quiet_rolls_produce_no_version() {
        let mut source = ScriptedMutationSource::quiet();
        let outcome = account().roll_mutations(day(), &AccountRates::default(), &mut source);
        assert!(outcome.is_none());
    }

    #[test]
    fn account_rolls_follow_documented_order() {
        // status: no, last_activity: yes (3 days back), matched: yes, admin: no
        let mut source = ScriptedMutationSource::new([false, true, true, false], [3]);
        let outcome = account()
            .roll_mutations(day(), &AccountRates::default(), &mut source)
            .unwrap();
        assert_eq!(
            outcome.changed,
            vec![Attribute::LastActivity, Attribute::Matched]
        );
        assert_eq!(outcome.state.last_activity, NaiveDate::from_ymd_opt(2025, 4, 17));
        assert!(!outcome.state.is_matched);
        assert_eq!(outcome.state.status, AccountStatus::Active);
        assert!(outcome.state.same_invariants(&account()));
    }

    #[test]
    fn status_roll_always_changes_the_value() {
        let mut source = ScriptedMutationSource::new([true], [0]);
        let outcome = account()
            .roll_mutations(day(), &AccountRates::default(), &mut source)
            .unwrap();
        assert_eq!(outcome.state.status, AccountStatus::Suspended);
        assert_eq!(outcome.changed, vec![Attribute::Status]);
    }

    #[test]
    fn identity_status_picks_from_alternatives() {
        let identity = IdentityState {
            identity_id: IdentityId(3),
            status: IdentityStatus::Active,
            created: None,
        };
        let mut source = ScriptedMutationSource::new([true], [1]);
        let outcome = identity
            .roll_mutations(day(), &IdentityRates::default(), &mut source)
            .unwrap();
        assert_eq!(outcome.state.status, IdentityStatus::OnLeave);
    }

    #[test]
    fn app_instance_flag_flip_is_reported() {
        let instance = AppInstanceState {
            instance_id: AppInstanceId(9),
            app_id: AppId(2),
            status: AppInstanceStatus::Approved,
            created: NaiveDate::from_ymd_opt(2024, 1, 1),
            is_shadow_it: false,
        };
        let mut source = ScriptedMutationSource::new([false, true], Vec::<usize>::new());
        let outcome = instance
            .roll_mutations(day(), &AppInstanceRates::default(), &mut source)
            .unwrap();
        assert!(outcome.state.is_shadow_it);
        assert_eq!(outcome.changed, vec![Attribute::ShadowIt]);
        assert!(outcome.state.same_invariants(&instance));
    }
}
