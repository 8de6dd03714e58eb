//! Synthesis orchestration: seed, walk and audit each entity class.

use backfill_types::{AccountState, AppInstanceState, IdentityState};

use crate::config::MutationConfig;
use crate::entity::Versioned;
use crate::inputs::{CurrentSnapshot, InputError};
use crate::invariants::{InvariantError, audit};
use crate::mutation::MutationSource;
use crate::seeder::seed_current_versions;
use crate::store::{SnapshotStore, StoreError};
use crate::walker::{WalkReport, walk_backward};
use crate::window::SynthesisWindow;

/// Anything that aborts a synthesis run before persistence.
#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    /// The loaded snapshot is inconsistent.
    #[error("input error: {0}")]
    Input(#[from] InputError),

    /// Seeding or repair hit an integrity violation.
    #[error("integrity violation: {0}")]
    Store(#[from] StoreError),

    /// The finished history failed the audit.
    #[error("invariant audit failed: {0}")]
    Invariant(#[from] InvariantError),
}

/// A finished, audited store for one class together with its walk report.
#[derive(Debug, Clone)]
pub struct Synthesized<S: Versioned> {
    /// The versioned history.
    pub store: SnapshotStore<S>,
    /// What the walk did.
    pub report: WalkReport,
}

/// Seed, walk and audit one entity class.
///
/// # Errors
///
/// Returns [`SynthesisError::Store`] on duplicate keys or a failed repair,
/// and [`SynthesisError::Invariant`] if the result breaks an invariant.
pub fn synthesize<S, I>(
    states: I,
    window: SynthesisWindow,
    rates: &S::Rates,
    source: &mut dyn MutationSource,
) -> Result<Synthesized<S>, SynthesisError>
where
    S: Versioned,
    I: IntoIterator<Item = S>,
{
    let mut store = seed_current_versions(states, window)?;
    let report = walk_backward(&mut store, rates, source)?;
    audit(&store)?;
    Ok(Synthesized { store, report })
}

/// Histories for every entity class over one window.
#[derive(Debug, Clone)]
pub struct SynthesisOutput {
    /// The window all three classes share.
    pub window: SynthesisWindow,
    /// Identity history.
    pub identities: Synthesized<IdentityState>,
    /// App instance history.
    pub app_instances: Synthesized<AppInstanceState>,
    /// Account history.
    pub accounts: Synthesized<AccountState>,
}

impl SynthesisOutput {
    /// Walk reports in synthesis order.
    pub const fn reports(&self) -> [&WalkReport; 3] {
        [
            &self.identities.report,
            &self.app_instances.report,
            &self.accounts.report,
        ]
    }

    /// Total versions across all classes.
    pub fn version_count(&self) -> usize {
        self.identities
            .store
            .version_count()
            .saturating_add(self.app_instances.store.version_count())
            .saturating_add(self.accounts.store.version_count())
    }
}

/// Verify the snapshot, then synthesize identities, app instances and
/// accounts in that order from a single mutation source.
///
/// # Errors
///
/// Returns [`SynthesisError::Input`] for dangling or duplicate keys, or
/// the first store or audit failure of any class.
pub fn synthesize_all(
    snapshot: CurrentSnapshot,
    window: SynthesisWindow,
    config: &MutationConfig,
    source: &mut dyn MutationSource,
) -> Result<SynthesisOutput, SynthesisError> {
    snapshot.verify_references()?;
    tracing::info!(
        entities = snapshot.entity_count(),
        start = %window.start(),
        end = %window.end(),
        "Starting synthesis"
    );

    let CurrentSnapshot {
        accounts,
        identities,
        app_instances,
    } = snapshot;

    let identities = synthesize(identities, window, &config.identity, source)?;
    let app_instances = synthesize(app_instances, window, &config.app_instance, source)?;
    let accounts = synthesize(accounts, window, &config.account, source)?;

    let output = SynthesisOutput {
        window,
        identities,
        app_instances,
        accounts,
    };
    tracing::info!(versions = output.version_count(), "Synthesis complete");
    Ok(output)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use backfill_types::{
        AccountId, AccountStatus, AppId, AppInstanceId, AppInstanceStatus, IdentityId,
        IdentityStatus,
    };
    use chrono::NaiveDate;

    use super::*;
    use crate::mutation::{RandomMutationSource, ScriptedMutationSource};

    fn window() -> SynthesisWindow {
        SynthesisWindow::ending_at(NaiveDate::from_ymd_opt(2025, 9, 30).unwrap(), 30).unwrap()
    }

    fn snapshot() -> CurrentSnapshot {
        CurrentSnapshot {
            identities: (1..=3)
                .map(|i| IdentityState {
                    identity_id: IdentityId(i),
                    status: IdentityStatus::Active,
                    created: None,
                })
                .collect(),
            app_instances: vec![AppInstanceState {
                instance_id: AppInstanceId(1),
                app_id: AppId(1),
                status: AppInstanceStatus::Approved,
                created: None,
                is_shadow_it: false,
            }],
            accounts: (1..=3)
                .map(|i| AccountState {
                    account_id: AccountId(i),
                    user_id: IdentityId(i),
                    app_instance_id: AppInstanceId(1),
                    status: AccountStatus::Active,
                    last_activity: NaiveDate::from_ymd_opt(2025, 9, 29),
                    is_matched: true,
                    is_admin: false,
                })
                .collect(),
        }
    }

    #[test]
    fn quiet_run_keeps_one_version_per_entity() {
        let mut source = ScriptedMutationSource::quiet();
        let output = synthesize_all(
            snapshot(),
            window(),
            &MutationConfig::default(),
            &mut source,
        )
        .unwrap();
        assert_eq!(output.version_count(), 7);
        assert!(output.reports().iter().all(|r| r.versions_inserted == 0));
    }

    #[test]
    fn random_run_passes_audit() {
        let mut source = RandomMutationSource::seeded(42);
        let output = synthesize_all(
            snapshot(),
            window(),
            &MutationConfig::default(),
            &mut source,
        )
        .unwrap();
        let inserted: u64 = output.reports().iter().map(|r| r.versions_inserted).sum();
        assert_eq!(u64::try_from(output.version_count()).unwrap(), inserted + 7);
    }

    #[test]
    fn dangling_reference_aborts_before_walking() {
        let mut snap = snapshot();
        snap.identities.truncate(1);
        let mut source = ScriptedMutationSource::new([true; 8], [0]);
        let result = synthesize_all(snap, window(), &MutationConfig::default(), &mut source);
        assert!(matches!(result, Err(SynthesisError::Input(_))));
        assert_eq!(source.remaining_rolls(), 8);
    }
}
