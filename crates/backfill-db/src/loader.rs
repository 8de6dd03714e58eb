//! Present-day state loading from the source tables.
//!
//! The source tables are owned by the ingestion pipeline and are only read
//! here. Date-like columns are cast to `DATE` in SQL so timestamp-typed
//! sources load the same way as date-typed ones. Nullable flags read as
//! `false`.

use std::str::FromStr;

use backfill_core::CurrentSnapshot;
use backfill_types::{
    AccountId, AccountState, AccountStatus, AppId, AppInstanceId, AppInstanceState,
    AppInstanceStatus, IdentityId, IdentityState, IdentityStatus,
};
use chrono::NaiveDate;
use sqlx::PgPool;

use crate::error::DbError;

/// Source table for accounts.
pub const ACCOUNTS_TABLE: &str = "fct_accounts";
/// Source table for identities.
pub const IDENTITIES_TABLE: &str = "dim_identities";
/// Source table for app instances.
pub const APP_INSTANCES_TABLE: &str = "dim_domain_applications";

/// Read-only access to the present-day source tables.
pub struct CurrentStateLoader<'a> {
    pool: &'a PgPool,
}

impl<'a> CurrentStateLoader<'a> {
    /// Create a loader bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Load every row of `fct_accounts`, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::MissingSource`] if the table is absent, or
    /// [`DbError::UnknownStatus`] for a status outside the account domain.
    pub async fn load_accounts(&self) -> Result<Vec<AccountState>, DbError> {
        let rows = sqlx::query_as::<_, AccountSourceRow>(
            r"SELECT id::BIGINT AS id,
                     user_id::BIGINT AS user_id,
                     app_instance_id::BIGINT AS app_instance_id,
                     account_status::TEXT AS account_status,
                     last_activity_dt::DATE AS last_activity,
                     COALESCE(is_matched, FALSE) AS is_matched,
                     COALESCE(is_admin, FALSE) AS is_admin
              FROM fct_accounts
              ORDER BY id",
        )
        .fetch_all(self.pool)
        .await
        .map_err(|e| DbError::reading(ACCOUNTS_TABLE, e))?;

        let accounts = rows
            .into_iter()
            .map(AccountSourceRow::into_state)
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(count = accounts.len(), table = ACCOUNTS_TABLE, "Loaded accounts");
        Ok(accounts)
    }

    /// Load every row of `dim_identities`, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::MissingSource`] if the table is absent, or
    /// [`DbError::UnknownStatus`] for a status outside the identity domain.
    pub async fn load_identities(&self) -> Result<Vec<IdentityState>, DbError> {
        let rows = sqlx::query_as::<_, IdentitySourceRow>(
            r"SELECT id::BIGINT AS id,
                     status::TEXT AS status,
                     start_date::DATE AS created
              FROM dim_identities
              ORDER BY id",
        )
        .fetch_all(self.pool)
        .await
        .map_err(|e| DbError::reading(IDENTITIES_TABLE, e))?;

        let identities = rows
            .into_iter()
            .map(IdentitySourceRow::into_state)
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(
            count = identities.len(),
            table = IDENTITIES_TABLE,
            "Loaded identities"
        );
        Ok(identities)
    }

    /// Load every row of `dim_domain_applications`, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::MissingSource`] if the table is absent, or
    /// [`DbError::UnknownStatus`] for a status outside the app domain.
    pub async fn load_app_instances(&self) -> Result<Vec<AppInstanceState>, DbError> {
        let rows = sqlx::query_as::<_, AppInstanceSourceRow>(
            r"SELECT id::BIGINT AS id,
                     app_id::BIGINT AS app_id,
                     domain_app_status::TEXT AS domain_app_status,
                     discovered_at::DATE AS created,
                     COALESCE(is_shadow_it, FALSE) AS is_shadow_it
              FROM dim_domain_applications
              ORDER BY id",
        )
        .fetch_all(self.pool)
        .await
        .map_err(|e| DbError::reading(APP_INSTANCES_TABLE, e))?;

        let instances = rows
            .into_iter()
            .map(AppInstanceSourceRow::into_state)
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(
            count = instances.len(),
            table = APP_INSTANCES_TABLE,
            "Loaded app instances"
        );
        Ok(instances)
    }

    /// Load all three classes and check their references.
    ///
    /// # Errors
    ///
    /// Any error of the per-class loaders, or [`DbError::Input`] for a
    /// duplicate key or an account whose `user_id` / `app_instance_id`
    /// has no matching row.
    pub async fn load_all(&self) -> Result<CurrentSnapshot, DbError> {
        let snapshot = CurrentSnapshot {
            identities: self.load_identities().await?,
            app_instances: self.load_app_instances().await?,
            accounts: self.load_accounts().await?,
        };
        snapshot.verify_references()?;
        tracing::info!(
            identities = snapshot.identities.len(),
            app_instances = snapshot.app_instances.len(),
            accounts = snapshot.accounts.len(),
            "Loaded current state"
        );
        Ok(snapshot)
    }
}

/// A row of `fct_accounts` as read.
#[derive(Debug, Clone, sqlx::FromRow)]
struct AccountSourceRow {
    id: i64,
    user_id: i64,
    app_instance_id: i64,
    account_status: String,
    last_activity: Option<NaiveDate>,
    is_matched: bool,
    is_admin: bool,
}

impl AccountSourceRow {
    fn into_state(self) -> Result<AccountState, DbError> {
        Ok(AccountState {
            account_id: AccountId(self.id),
            user_id: IdentityId(self.user_id),
            app_instance_id: AppInstanceId(self.app_instance_id),
            status: AccountStatus::from_str(&self.account_status)?,
            last_activity: self.last_activity,
            is_matched: self.is_matched,
            is_admin: self.is_admin,
        })
    }
}

/// A row of `dim_identities` as read.
#[derive(Debug, Clone, sqlx::FromRow)]
struct IdentitySourceRow {
    id: i64,
    status: String,
    created: Option<NaiveDate>,
}

impl IdentitySourceRow {
    fn into_state(self) -> Result<IdentityState, DbError> {
        Ok(IdentityState {
            identity_id: IdentityId(self.id),
            status: IdentityStatus::from_str(&self.status)?,
            created: self.created,
        })
    }
}

/// A row of `dim_domain_applications` as read.
#[derive(Debug, Clone, sqlx::FromRow)]
struct AppInstanceSourceRow {
    id: i64,
    app_id: i64,
    domain_app_status: String,
    created: Option<NaiveDate>,
    is_shadow_it: bool,
}

impl AppInstanceSourceRow {
    fn into_state(self) -> Result<AppInstanceState, DbError> {
        Ok(AppInstanceState {
            instance_id: AppInstanceId(self.id),
            app_id: AppId(self.app_id),
            status: AppInstanceStatus::from_str(&self.domain_app_status)?,
            created: self.created,
            is_shadow_it: self.is_shadow_it,
        })
    }
}
