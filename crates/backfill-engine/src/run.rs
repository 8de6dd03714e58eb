//! One backfill run: load, synthesize, persist, record.

use std::collections::BTreeMap;

use backfill_core::config::BackfillConfig;
use backfill_core::{RandomMutationSource, SynthesisOutput, SynthesisWindow, synthesize_all};
use backfill_db::{
    CalendarStore, CurrentStateLoader, PostgresPool, RunRecord, RunStore, SnapshotSink,
};
use backfill_types::{Attribute, EntityClass, RunId, RunStatus};
use chrono::{NaiveDate, Utc};
use tracing::{info, warn};

use crate::error::EngineError;

/// What a completed run wrote.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Ledger id of the run.
    pub run_id: RunId,
    /// The synthesized window.
    pub window: SynthesisWindow,
    /// Versioned rows written per class.
    pub versions: BTreeMap<EntityClass, usize>,
    /// Daily fact rows written across all classes.
    pub daily_rows: u64,
    /// Calendar days written.
    pub calendar_days: u64,
}

/// Execute a full run and record it in the ledger, whether it succeeds
/// or fails.
///
/// `today` is the window end when `window.end_date` is not configured.
///
/// # Errors
///
/// Returns the first failure of any step. A failed run still attempts to
/// write its ledger row; if that also fails, the ledger error is logged
/// and the original error returned.
pub async fn execute(
    config: &BackfillConfig,
    pool: &PostgresPool,
    today: NaiveDate,
) -> Result<RunSummary, EngineError> {
    let run_id = RunId::new();
    let started_at = Utc::now();
    let window = config.synthesis_window(today)?;
    info!(
        run_id = %run_id,
        start = %window.start(),
        end = %window.end(),
        seeded = config.mutation.seed.is_some(),
        "Backfill run starting"
    );

    let outcome = synthesize_and_persist(config, pool, window, run_id).await;

    let mut record = RunRecord {
        run_id,
        status: RunStatus::Completed,
        window_start: window.start(),
        window_end: window.end(),
        seed: config.mutation.seed,
        version_counts: serde_json::json!({}),
        config: serde_json::to_value(&config.mutation)?,
        error: None,
        started_at,
    };
    let runs = RunStore::new(pool.pool());

    match outcome {
        Ok(summary) => {
            record.version_counts = serde_json::to_value(&summary.versions)?;
            runs.record_run(&record).await?;
            Ok(summary)
        }
        Err(err) => {
            record.status = RunStatus::Failed;
            record.error = Some(err.to_string());
            if let Err(ledger_err) = runs.record_run(&record).await {
                warn!(run_id = %run_id, error = %ledger_err, "Failed to record failed run");
            }
            Err(err)
        }
    }
}

async fn synthesize_and_persist(
    config: &BackfillConfig,
    pool: &PostgresPool,
    window: SynthesisWindow,
    run_id: RunId,
) -> Result<RunSummary, EngineError> {
    let snapshot = CurrentStateLoader::new(pool.pool()).load_all().await?;

    let mut source = match config.mutation.seed {
        Some(seed) => RandomMutationSource::seeded(seed),
        None => RandomMutationSource::from_os(),
    };
    let output = synthesize_all(snapshot, window, &config.mutation, &mut source)?;
    log_reports(&output);

    // All three classes, and their daily facts, commit together.
    let written = SnapshotSink::new(pool.pool())
        .with_batch_size(config.output.batch_size)
        .replace_all(&output, run_id, config.output.daily_facts)
        .await?;

    let calendar_days = if config.output.calendar {
        CalendarStore::new(pool.pool()).replace_window(window).await?
    } else {
        0
    };

    Ok(RunSummary {
        run_id,
        window,
        versions: version_counts(&output),
        daily_rows: written.daily,
        calendar_days,
    })
}

/// Versioned rows per class, keyed for the ledger's `version_counts`.
fn version_counts(output: &SynthesisOutput) -> BTreeMap<EntityClass, usize> {
    BTreeMap::from([
        (EntityClass::Identity, output.identities.store.version_count()),
        (EntityClass::AppInstance, output.app_instances.store.version_count()),
        (EntityClass::Account, output.accounts.store.version_count()),
    ])
}

fn log_reports(output: &SynthesisOutput) {
    for report in output.reports() {
        info!(
            class = %report.class,
            days = report.days_walked,
            versions_inserted = report.versions_inserted,
            status = report.mutations_of(Attribute::Status),
            last_activity = report.mutations_of(Attribute::LastActivity),
            matched = report.mutations_of(Attribute::Matched),
            admin = report.mutations_of(Attribute::Admin),
            shadow_it = report.mutations_of(Attribute::ShadowIt),
            "Class synthesized"
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use backfill_core::config::MutationConfig;
    use backfill_core::{CurrentSnapshot, ScriptedMutationSource};
    use backfill_types::{IdentityId, IdentityState, IdentityStatus};

    use super::*;

    #[test]
    fn version_counts_serialize_with_class_names() {
        let snapshot = CurrentSnapshot {
            identities: vec![IdentityState {
                identity_id: IdentityId(1),
                status: IdentityStatus::Active,
                created: None,
            }],
            ..CurrentSnapshot::default()
        };
        let window =
            SynthesisWindow::ending_at(NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(), 5).unwrap();
        let mut source = ScriptedMutationSource::new([true], [0]);
        let output =
            synthesize_all(snapshot, window, &MutationConfig::default(), &mut source).unwrap();

        let json = serde_json::to_value(version_counts(&output)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"account": 0, "identity": 2, "app_instance": 0})
        );
    }
}
