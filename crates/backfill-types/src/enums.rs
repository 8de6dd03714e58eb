//! Enumeration types for tracked entities.
//!
//! Status values travel to and from the database as upper-case text
//! (`ACTIVE`, `ON_LEAVE`, ...). Each status enum exposes its full domain as
//! `ALL` so mutation rolls can draw replacement values from it.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A status string that does not belong to the expected domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus {
    /// Which status domain was being parsed.
    pub domain: &'static str,
    /// The rejected text.
    pub value: String,
}

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} status: {:?}", self.domain, self.value)
    }
}

impl std::error::Error for UnknownStatus {}

// ---------------------------------------------------------------------------
// Entity classes and attributes
// ---------------------------------------------------------------------------

/// The three classes of entity that receive synthesized history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum EntityClass {
    /// An identity's account inside one application instance.
    Account,
    /// A person record.
    Identity,
    /// A deployed or discovered application instance.
    AppInstance,
}

impl EntityClass {
    /// Every entity class, in synthesis order.
    pub const ALL: [Self; 3] = [Self::Identity, Self::AppInstance, Self::Account];

    /// Lower-case name used in logs and the run ledger.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Account => "account",
            Self::Identity => "identity",
            Self::AppInstance => "app_instance",
        }
    }
}

impl fmt::Display for EntityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A versioned attribute that a mutation roll can change.
///
/// Not every class carries every attribute: identities only version their
/// status, app instances add the shadow-IT flag, and accounts carry the
/// activity date and the matched/admin flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Attribute {
    /// The class-specific lifecycle status.
    Status,
    /// Date of the most recent observed activity (accounts).
    LastActivity,
    /// Whether the account is matched to an identity.
    Matched,
    /// Whether the account holds admin rights.
    Admin,
    /// Whether the app instance is unsanctioned shadow IT.
    ShadowIt,
}

impl Attribute {
    /// Lower-case name used in logs and reports.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::LastActivity => "last_activity",
            Self::Matched => "matched",
            Self::Admin => "admin",
            Self::ShadowIt => "shadow_it",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Status domains
// ---------------------------------------------------------------------------

/// Lifecycle status of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum AccountStatus {
    /// The account can be used.
    Active,
    /// Access is temporarily revoked.
    Suspended,
    /// The account exists but is not in use.
    Inactive,
}

impl AccountStatus {
    /// The full status domain.
    pub const ALL: [Self; 3] = [Self::Active, Self::Suspended, Self::Inactive];

    /// Database representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Suspended => "SUSPENDED",
            Self::Inactive => "INACTIVE",
        }
    }
}

impl FromStr for AccountStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownStatus {
                domain: "account",
                value: s.to_owned(),
            })
    }
}

/// Employment status of an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum IdentityStatus {
    /// Currently employed.
    Active,
    /// Left the organisation.
    Terminated,
    /// Temporarily away.
    OnLeave,
}

impl IdentityStatus {
    /// The full status domain.
    pub const ALL: [Self; 3] = [Self::Active, Self::Terminated, Self::OnLeave];

    /// Database representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Terminated => "TERMINATED",
            Self::OnLeave => "ON_LEAVE",
        }
    }
}

impl FromStr for IdentityStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownStatus {
                domain: "identity",
                value: s.to_owned(),
            })
    }
}

/// Governance status of an application instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum AppInstanceStatus {
    /// Sanctioned for use.
    Approved,
    /// Awaiting a governance decision.
    NeedsReview,
    /// Seen by a discovery source, not yet triaged.
    Discovered,
    /// Scheduled for retirement.
    Deprecated,
    /// Forbidden.
    Blocklisted,
}

impl AppInstanceStatus {
    /// The full status domain.
    pub const ALL: [Self; 5] = [
        Self::Approved,
        Self::NeedsReview,
        Self::Discovered,
        Self::Deprecated,
        Self::Blocklisted,
    ];

    /// Database representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approved => "APPROVED",
            Self::NeedsReview => "NEEDS_REVIEW",
            Self::Discovered => "DISCOVERED",
            Self::Deprecated => "DEPRECATED",
            Self::Blocklisted => "BLOCKLISTED",
        }
    }
}

impl FromStr for AppInstanceStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownStatus {
                domain: "app instance",
                value: s.to_owned(),
            })
    }
}

// ---------------------------------------------------------------------------
// Run ledger
// ---------------------------------------------------------------------------

/// Outcome of a synthesis run as recorded in the run ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum RunStatus {
    /// Every class was synthesized, audited and written.
    Completed,
    /// The run aborted; no snapshot table was left half-written.
    Failed,
}

impl RunStatus {
    /// Lower-case text stored in `synthesis_runs.status`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(UnknownStatus {
                domain: "run",
                value: other.to_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_text_roundtrips_through_as_str() {
        for status in IdentityStatus::ALL {
            assert_eq!(status.as_str().parse::<IdentityStatus>().ok(), Some(status));
        }
        for status in AppInstanceStatus::ALL {
            assert_eq!(
                status.as_str().parse::<AppInstanceStatus>().ok(),
                Some(status)
            );
        }
    }

    #[test]
    fn status_parse_ignores_case_and_padding() {
        assert_eq!(
            " suspended ".parse::<AccountStatus>().ok(),
            Some(AccountStatus::Suspended)
        );
    }

    #[test]
    fn unknown_status_names_its_domain() {
        let err = "RETIRED".parse::<IdentityStatus>().err();
        assert_eq!(
            err.map(|e| e.to_string()).as_deref(),
            Some("unknown identity status: \"RETIRED\"")
        );
    }

    #[test]
    fn serde_matches_database_text() {
        let json = serde_json::to_string(&IdentityStatus::OnLeave).ok();
        assert_eq!(json.as_deref(), Some("\"ON_LEAVE\""));
        let json = serde_json::to_string(&EntityClass::AppInstance).ok();
        assert_eq!(json.as_deref(), Some("\"app_instance\""));
    }
}
