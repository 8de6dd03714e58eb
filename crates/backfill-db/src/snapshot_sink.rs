//! Persistence of synthesized histories.
//!
//! [`SnapshotSink::replace_all`] rewrites every output table inside one
//! transaction: the previous run's rows are deleted and the new versions
//! inserted in UNNEST batches. Readers therefore see either the old run or
//! the new one, never a mix of classes from different runs. The per-class
//! `replace_*` and `insert_daily_*` methods do the same for a single table.
//!
//! Column names follow the reporting cubes, which select `id`,
//! `identity_status`, `instance_id`, `instance_status` and `created_dt`.

use backfill_core::SynthesisOutput;
use backfill_core::entity::Versioned;
use backfill_core::store::{SnapshotStore, SnapshotVersion};
use backfill_types::{AccountState, AppInstanceState, EntityClass, IdentityState, RunId};
use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::DbError;

/// Default number of rows per UNNEST insert.
const DEFAULT_BATCH_SIZE: usize = 500;

/// Output table names and key columns of one entity class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotTables {
    /// The versioned (SCD2) table.
    pub versions: &'static str,
    /// The per-day fact table.
    pub daily: &'static str,
    /// Column holding the entity key.
    pub entity_column: &'static str,
    /// Column holding the status.
    pub status_column: &'static str,
}

/// Output tables for `class`.
pub const fn snapshot_tables(class: EntityClass) -> SnapshotTables {
    match class {
        EntityClass::Account => SnapshotTables {
            versions: "dim_account_snapshots",
            daily: "fact_account_snapshots",
            entity_column: "account_id",
            status_column: "account_status",
        },
        EntityClass::Identity => SnapshotTables {
            versions: "dim_identity_snapshots",
            daily: "fact_identity_snapshots",
            entity_column: "identity_id",
            status_column: "identity_status",
        },
        EntityClass::AppInstance => SnapshotTables {
            versions: "dim_app_instance_snapshots",
            daily: "fact_app_instance_snapshots",
            entity_column: "instance_id",
            status_column: "instance_status",
        },
    }
}

/// Rows written by [`SnapshotSink::replace_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WrittenRows {
    /// Versioned rows across the three classes.
    pub versions: u64,
    /// Daily fact rows across the three classes.
    pub daily: u64,
}

/// Writes and reads the snapshot output tables.
pub struct SnapshotSink<'a> {
    pool: &'a PgPool,
    batch_size: usize,
}

impl<'a> SnapshotSink<'a> {
    /// Create a sink bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            pool,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Set the number of rows per insert statement.
    #[must_use]
    pub const fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Replace every versioned table, and the daily fact tables, with one
    /// run's output in a single transaction.
    ///
    /// With `daily_facts` off the fact tables are emptied, so no output
    /// table keeps rows from an earlier run.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if any statement fails; every table is
    /// then left as it was.
    pub async fn replace_all(
        &self,
        output: &SynthesisOutput,
        run_id: RunId,
        daily_facts: bool,
    ) -> Result<WrittenRows, DbError> {
        let mut tx = self.pool.begin().await?;

        let versions = [
            self.write_versions(&mut *tx, &output.identities.store, run_id).await?,
            self.write_versions(&mut *tx, &output.app_instances.store, run_id).await?,
            self.write_versions(&mut *tx, &output.accounts.store, run_id).await?,
        ];

        let daily = if daily_facts {
            [
                self.write_daily(&mut *tx, &output.identities.store, run_id).await?,
                self.write_daily(&mut *tx, &output.app_instances.store, run_id).await?,
                self.write_daily(&mut *tx, &output.accounts.store, run_id).await?,
            ]
        } else {
            for class in EntityClass::ALL {
                clear(&mut *tx, snapshot_tables(class).daily).await?;
            }
            [0; 3]
        };

        tx.commit().await?;

        let written = WrittenRows {
            versions: versions.into_iter().fold(0, u64::saturating_add),
            daily: daily.into_iter().fold(0, u64::saturating_add),
        };
        tracing::info!(
            run_id = %run_id,
            versions = written.versions,
            daily = written.daily,
            "Replaced snapshot tables"
        );
        Ok(written)
    }

    /// Replace `dim_identity_snapshots` with the versions in `store`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if any statement fails; the table is
    /// then left as it was.
    pub async fn replace_identities(
        &self,
        store: &SnapshotStore<IdentityState>,
        run_id: RunId,
    ) -> Result<u64, DbError> {
        self.replace(store, run_id).await
    }

    /// Replace `dim_app_instance_snapshots` with the versions in `store`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if any statement fails; the table is
    /// then left as it was.
    pub async fn replace_app_instances(
        &self,
        store: &SnapshotStore<AppInstanceState>,
        run_id: RunId,
    ) -> Result<u64, DbError> {
        self.replace(store, run_id).await
    }

    /// Replace `dim_account_snapshots` with the versions in `store`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if any statement fails; the table is
    /// then left as it was.
    pub async fn replace_accounts(
        &self,
        store: &SnapshotStore<AccountState>,
        run_id: RunId,
    ) -> Result<u64, DbError> {
        self.replace(store, run_id).await
    }

    /// Replace `fact_identity_snapshots` with one row per identity per day.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if any statement fails.
    pub async fn insert_daily_identities(
        &self,
        store: &SnapshotStore<IdentityState>,
        run_id: RunId,
    ) -> Result<u64, DbError> {
        self.replace_daily(store, run_id).await
    }

    /// Replace `fact_app_instance_snapshots` with one row per instance per day.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if any statement fails.
    pub async fn insert_daily_app_instances(
        &self,
        store: &SnapshotStore<AppInstanceState>,
        run_id: RunId,
    ) -> Result<u64, DbError> {
        self.replace_daily(store, run_id).await
    }

    /// Replace `fact_account_snapshots` with one row per account per day.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if any statement fails.
    pub async fn insert_daily_accounts(
        &self,
        store: &SnapshotStore<AccountState>,
        run_id: RunId,
    ) -> Result<u64, DbError> {
        self.replace_daily(store, run_id).await
    }

    /// Versions of `class` in effect on `as_of`, ordered by entity key.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn versions_as_of(
        &self,
        class: EntityClass,
        as_of: NaiveDate,
    ) -> Result<Vec<SnapshotRow>, DbError> {
        let tables = snapshot_tables(class);
        let sql = format!(
            "SELECT id, {entity} AS entity_id, {status} AS status,
                    effective_from, effective_to, is_current
             FROM {table}
             WHERE effective_from <= $1 AND $1 < effective_to
             ORDER BY {entity}",
            entity = tables.entity_column,
            status = tables.status_column,
            table = tables.versions,
        );
        let rows = sqlx::query_as::<_, SnapshotRow>(&sql)
            .bind(as_of)
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    /// Number of rows flagged current in the versioned table of `class`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn count_current(&self, class: EntityClass) -> Result<i64, DbError> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE is_current",
            snapshot_tables(class).versions
        );
        let row: (i64,) = sqlx::query_as(&sql).fetch_one(self.pool).await?;
        Ok(row.0)
    }

    async fn replace<S: SnapshotRows>(
        &self,
        store: &SnapshotStore<S>,
        run_id: RunId,
    ) -> Result<u64, DbError> {
        let mut tx = self.pool.begin().await?;
        let written = self.write_versions(&mut *tx, store, run_id).await?;
        tx.commit().await?;
        Ok(written)
    }

    async fn replace_daily<S: SnapshotRows>(
        &self,
        store: &SnapshotStore<S>,
        run_id: RunId,
    ) -> Result<u64, DbError> {
        let mut tx = self.pool.begin().await?;
        let written = self.write_daily(&mut *tx, store, run_id).await?;
        tx.commit().await?;
        Ok(written)
    }

    async fn write_versions<S: SnapshotRows>(
        &self,
        conn: &mut PgConnection,
        store: &SnapshotStore<S>,
        run_id: RunId,
    ) -> Result<u64, DbError> {
        let table = snapshot_tables(S::CLASS).versions;
        let versions: Vec<&SnapshotVersion<S>> = store.versions().collect();

        clear(conn, table).await?;
        for chunk in versions.chunks(self.batch_size.max(1)) {
            S::insert_versions(conn, chunk, run_id.into_inner()).await?;
        }

        let written = u64::try_from(versions.len()).unwrap_or(u64::MAX);
        tracing::debug!(table, rows = written, run_id = %run_id, "Wrote snapshot table");
        Ok(written)
    }

    async fn write_daily<S: SnapshotRows>(
        &self,
        conn: &mut PgConnection,
        store: &SnapshotStore<S>,
        run_id: RunId,
    ) -> Result<u64, DbError> {
        let table = snapshot_tables(S::CLASS).daily;
        let days: Vec<(NaiveDate, &SnapshotVersion<S>)> = store.daily().collect();

        clear(conn, table).await?;
        for chunk in days.chunks(self.batch_size.max(1)) {
            S::insert_daily(conn, chunk, run_id.into_inner()).await?;
        }

        let written = u64::try_from(days.len()).unwrap_or(u64::MAX);
        tracing::debug!(table, rows = written, run_id = %run_id, "Wrote daily fact table");
        Ok(written)
    }
}

async fn clear(conn: &mut PgConnection, table: &str) -> Result<(), DbError> {
    sqlx::query(&format!("DELETE FROM {table}"))
        .execute(conn)
        .await?;
    Ok(())
}

/// A versioned row as read back, with class-specific columns dropped.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct SnapshotRow {
    /// Surrogate key.
    pub id: i64,
    /// Entity key.
    pub entity_id: i64,
    /// Status text.
    pub status: String,
    /// First day in effect.
    pub effective_from: NaiveDate,
    /// First day no longer in effect.
    pub effective_to: NaiveDate,
    /// Whether this is the present-day version.
    pub is_current: bool,
}

/// Column layout of one class's output rows.
trait SnapshotRows: Versioned {
    async fn insert_versions(
        conn: &mut PgConnection,
        chunk: &[&SnapshotVersion<Self>],
        run_id: Uuid,
    ) -> Result<(), DbError>;

    async fn insert_daily(
        conn: &mut PgConnection,
        chunk: &[(NaiveDate, &SnapshotVersion<Self>)],
        run_id: Uuid,
    ) -> Result<(), DbError>;
}

/// Shared interval columns of a versioned chunk.
struct IntervalColumns {
    ids: Vec<i64>,
    effective_from: Vec<NaiveDate>,
    effective_to: Vec<NaiveDate>,
    is_current: Vec<bool>,
}

impl IntervalColumns {
    fn collect<S>(chunk: &[&SnapshotVersion<S>]) -> Self {
        Self {
            ids: chunk
                .iter()
                .map(|v| i64::try_from(v.version_id.0).unwrap_or(i64::MAX))
                .collect(),
            effective_from: chunk.iter().map(|v| v.effective_from).collect(),
            effective_to: chunk.iter().map(|v| v.effective_to).collect(),
            is_current: chunk.iter().map(|v| v.is_current).collect(),
        }
    }
}

impl SnapshotRows for IdentityState {
    async fn insert_versions(
        conn: &mut PgConnection,
        chunk: &[&SnapshotVersion<Self>],
        run_id: Uuid,
    ) -> Result<(), DbError> {
        let interval = IntervalColumns::collect(chunk);
        let identity_ids: Vec<i64> = chunk
            .iter()
            .map(|v| v.state.identity_id.into_inner())
            .collect();
        let statuses: Vec<String> = chunk
            .iter()
            .map(|v| v.state.status.as_str().to_owned())
            .collect();
        let created: Vec<Option<NaiveDate>> = chunk.iter().map(|v| v.state.created).collect();

        sqlx::query(
            r"INSERT INTO dim_identity_snapshots
              (id, identity_id, identity_status, created_dt, effective_from, effective_to, is_current, run_id)
              SELECT *, $8::UUID FROM UNNEST($1::BIGINT[], $2::BIGINT[], $3::TEXT[], $4::DATE[], $5::DATE[], $6::DATE[], $7::BOOLEAN[])",
        )
        .bind(&interval.ids)
        .bind(&identity_ids)
        .bind(&statuses)
        .bind(&created)
        .bind(&interval.effective_from)
        .bind(&interval.effective_to)
        .bind(&interval.is_current)
        .bind(run_id)
        .execute(conn)
        .await?;
        Ok(())
    }

    async fn insert_daily(
        conn: &mut PgConnection,
        chunk: &[(NaiveDate, &SnapshotVersion<Self>)],
        run_id: Uuid,
    ) -> Result<(), DbError> {
        let days: Vec<NaiveDate> = chunk.iter().map(|(day, _)| *day).collect();
        let identity_ids: Vec<i64> = chunk
            .iter()
            .map(|(_, v)| v.state.identity_id.into_inner())
            .collect();
        let statuses: Vec<String> = chunk
            .iter()
            .map(|(_, v)| v.state.status.as_str().to_owned())
            .collect();
        let created: Vec<Option<NaiveDate>> = chunk.iter().map(|(_, v)| v.state.created).collect();

        sqlx::query(
            r"INSERT INTO fact_identity_snapshots
              (snapshot_date, identity_id, identity_status, created_dt, run_id)
              SELECT *, $5::UUID FROM UNNEST($1::DATE[], $2::BIGINT[], $3::TEXT[], $4::DATE[])",
        )
        .bind(&days)
        .bind(&identity_ids)
        .bind(&statuses)
        .bind(&created)
        .bind(run_id)
        .execute(conn)
        .await?;
        Ok(())
    }
}

impl SnapshotRows for AppInstanceState {
    async fn insert_versions(
        conn: &mut PgConnection,
        chunk: &[&SnapshotVersion<Self>],
        run_id: Uuid,
    ) -> Result<(), DbError> {
        let interval = IntervalColumns::collect(chunk);
        let instance_ids: Vec<i64> = chunk
            .iter()
            .map(|v| v.state.instance_id.into_inner())
            .collect();
        let app_ids: Vec<i64> = chunk.iter().map(|v| v.state.app_id.into_inner()).collect();
        let statuses: Vec<String> = chunk
            .iter()
            .map(|v| v.state.status.as_str().to_owned())
            .collect();
        let created: Vec<Option<NaiveDate>> = chunk.iter().map(|v| v.state.created).collect();
        let shadow_it: Vec<bool> = chunk.iter().map(|v| v.state.is_shadow_it).collect();

        sqlx::query(
            r"INSERT INTO dim_app_instance_snapshots
              (id, instance_id, app_id, instance_status, created_dt, is_shadow_it, effective_from, effective_to, is_current, run_id)
              SELECT *, $10::UUID FROM UNNEST($1::BIGINT[], $2::BIGINT[], $3::BIGINT[], $4::TEXT[], $5::DATE[], $6::BOOLEAN[], $7::DATE[], $8::DATE[], $9::BOOLEAN[])",
        )
        .bind(&interval.ids)
        .bind(&instance_ids)
        .bind(&app_ids)
        .bind(&statuses)
        .bind(&created)
        .bind(&shadow_it)
        .bind(&interval.effective_from)
        .bind(&interval.effective_to)
        .bind(&interval.is_current)
        .bind(run_id)
        .execute(conn)
        .await?;
        Ok(())
    }

    async fn insert_daily(
        conn: &mut PgConnection,
        chunk: &[(NaiveDate, &SnapshotVersion<Self>)],
        run_id: Uuid,
    ) -> Result<(), DbError> {
        let days: Vec<NaiveDate> = chunk.iter().map(|(day, _)| *day).collect();
        let instance_ids: Vec<i64> = chunk
            .iter()
            .map(|(_, v)| v.state.instance_id.into_inner())
            .collect();
        let app_ids: Vec<i64> = chunk.iter().map(|(_, v)| v.state.app_id.into_inner()).collect();
        let statuses: Vec<String> = chunk
            .iter()
            .map(|(_, v)| v.state.status.as_str().to_owned())
            .collect();
        let created: Vec<Option<NaiveDate>> = chunk.iter().map(|(_, v)| v.state.created).collect();
        let shadow_it: Vec<bool> = chunk.iter().map(|(_, v)| v.state.is_shadow_it).collect();

        sqlx::query(
            r"INSERT INTO fact_app_instance_snapshots
              (snapshot_date, instance_id, app_id, instance_status, created_dt, is_shadow_it, run_id)
              SELECT *, $7::UUID FROM UNNEST($1::DATE[], $2::BIGINT[], $3::BIGINT[], $4::TEXT[], $5::DATE[], $6::BOOLEAN[])",
        )
        .bind(&days)
        .bind(&instance_ids)
        .bind(&app_ids)
        .bind(&statuses)
        .bind(&created)
        .bind(&shadow_it)
        .bind(run_id)
        .execute(conn)
        .await?;
        Ok(())
    }
}

impl SnapshotRows for AccountState {
    async fn insert_versions(
        conn: &mut PgConnection,
        chunk: &[&SnapshotVersion<Self>],
        run_id: Uuid,
    ) -> Result<(), DbError> {
        let interval = IntervalColumns::collect(chunk);
        let account_ids: Vec<i64> = chunk.iter().map(|v| v.state.account_id.into_inner()).collect();
        let user_ids: Vec<i64> = chunk.iter().map(|v| v.state.user_id.into_inner()).collect();
        let instance_ids: Vec<i64> = chunk
            .iter()
            .map(|v| v.state.app_instance_id.into_inner())
            .collect();
        let statuses: Vec<String> = chunk
            .iter()
            .map(|v| v.state.status.as_str().to_owned())
            .collect();
        let activity: Vec<Option<NaiveDate>> = chunk
            .iter()
            .map(|v| v.state.last_activity)
            .collect();
        let matched: Vec<bool> = chunk.iter().map(|v| v.state.is_matched).collect();
        let admin: Vec<bool> = chunk.iter().map(|v| v.state.is_admin).collect();

        sqlx::query(
            r"INSERT INTO dim_account_snapshots
              (id, account_id, user_id, app_instance_id, account_status, last_activity_dt, is_matched, is_admin, effective_from, effective_to, is_current, run_id)
              SELECT *, $12::UUID FROM UNNEST($1::BIGINT[], $2::BIGINT[], $3::BIGINT[], $4::BIGINT[], $5::TEXT[], $6::DATE[], $7::BOOLEAN[], $8::BOOLEAN[], $9::DATE[], $10::DATE[], $11::BOOLEAN[])",
        )
        .bind(&interval.ids)
        .bind(&account_ids)
        .bind(&user_ids)
        .bind(&instance_ids)
        .bind(&statuses)
        .bind(&activity)
        .bind(&matched)
        .bind(&admin)
        .bind(&interval.effective_from)
        .bind(&interval.effective_to)
        .bind(&interval.is_current)
        .bind(run_id)
        .execute(conn)
        .await?;
        Ok(())
    }

    async fn insert_daily(
        conn: &mut PgConnection,
        chunk: &[(NaiveDate, &SnapshotVersion<Self>)],
        run_id: Uuid,
    ) -> Result<(), DbError> {
        let days: Vec<NaiveDate> = chunk.iter().map(|(day, _)| *day).collect();
        let account_ids: Vec<i64> = chunk
            .iter()
            .map(|(_, v)| v.state.account_id.into_inner())
            .collect();
        let user_ids: Vec<i64> = chunk.iter().map(|(_, v)| v.state.user_id.into_inner()).collect();
        let instance_ids: Vec<i64> = chunk
            .iter()
            .map(|(_, v)| v.state.app_instance_id.into_inner())
            .collect();
        let statuses: Vec<String> = chunk
            .iter()
            .map(|(_, v)| v.state.status.as_str().to_owned())
            .collect();
        let activity: Vec<Option<NaiveDate>> = chunk
            .iter()
            .map(|(_, v)| v.state.last_activity)
            .collect();
        let matched: Vec<bool> = chunk.iter().map(|(_, v)| v.state.is_matched).collect();
        let admin: Vec<bool> = chunk.iter().map(|(_, v)| v.state.is_admin).collect();

        sqlx::query(
            r"INSERT INTO fact_account_snapshots
              (snapshot_date, account_id, user_id, app_instance_id, account_status, last_activity_dt, is_matched, is_admin, run_id)
              SELECT *, $9::UUID FROM UNNEST($1::DATE[], $2::BIGINT[], $3::BIGINT[], $4::BIGINT[], $5::TEXT[], $6::DATE[], $7::BOOLEAN[], $8::BOOLEAN[])",
        )
        .bind(&days)
        .bind(&account_ids)
        .bind(&user_ids)
        .bind(&instance_ids)
        .bind(&statuses)
        .bind(&activity)
        .bind(&matched)
        .bind(&admin)
        .bind(run_id)
        .execute(conn)
        .await?;
        Ok(())
    }
}
