//! Present-day state records for each tracked entity class.
//!
//! A state record is the payload of one snapshot version: the entity key,
//! its invariant foreign keys and the versioned attribute values. The
//! loader produces one record per source row; the backward walk clones
//! and mutates them to fabricate earlier versions.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{AccountStatus, AppInstanceStatus, IdentityStatus};
use crate::ids::{AccountId, AppId, AppInstanceId, IdentityId};

/// State of an account: one identity's presence inside one app instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AccountState {
    /// Account key.
    pub account_id: AccountId,
    /// Owning identity. Invariant across versions.
    pub user_id: IdentityId,
    /// Instance the account lives in. Invariant across versions.
    pub app_instance_id: AppInstanceId,
    /// Lifecycle status.
    pub status: AccountStatus,
    /// Most recent activity date, if any activity was ever seen.
    pub last_activity: Option<NaiveDate>,
    /// Whether the account has been matched to its identity.
    pub is_matched: bool,
    /// Whether the account holds admin rights.
    pub is_admin: bool,
}

/// State of an identity (person record).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct IdentityState {
    /// Identity key.
    pub identity_id: IdentityId,
    /// Employment status.
    pub status: IdentityStatus,
    /// Start date of the identity. Invariant across versions.
    pub created: Option<NaiveDate>,
}

/// State of a deployed application instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AppInstanceState {
    /// Instance key.
    pub instance_id: AppInstanceId,
    /// Catalogue application. Invariant across versions.
    pub app_id: AppId,
    /// Governance status.
    pub status: AppInstanceStatus,
    /// Discovery date. Invariant across versions.
    pub created: Option<NaiveDate>,
    /// Whether the instance is unsanctioned shadow IT.
    pub is_shadow_it: bool,
}
