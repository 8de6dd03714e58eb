//! Type-safe identifier wrappers.
//!
//! Source tables key their rows by `BIGINT` surrogate ids. Wrapping each in
//! its own newtype stops an account id from being passed where an identity
//! id is expected, which matters because accounts carry both as invariant
//! foreign keys.
//!
//! Synthesis runs are the exception: they are minted by this workspace and
//! use UUID v7 (time-ordered) so the run ledger sorts by start time.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Generates a newtype wrapper around an `i64` source-table key.
macro_rules! define_key {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub i64);

        impl $name {
            /// Return the raw database key.
            pub const fn into_inner(self) -> i64 {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(key: i64) -> Self {
                Self(key)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_key! {
    /// Key of an account row (`fct_accounts.id`).
    AccountId
}

define_key! {
    /// Key of an identity row (`dim_identities.id`).
    IdentityId
}

define_key! {
    /// Key of a deployed application instance (`dim_domain_applications.id`).
    AppInstanceId
}

define_key! {
    /// Key of the catalogue application an instance was deployed from.
    AppId
}

/// Unique identifier for one synthesis run in the run ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RunId(pub Uuid);

impl RunId {
    /// Mint a new run id using UUID v7.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Return the inner [`Uuid`] value.
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for RunId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}
