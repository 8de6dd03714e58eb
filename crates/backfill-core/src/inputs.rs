//! The loaded present-day snapshot and its referential checks.

use std::collections::BTreeSet;

use backfill_types::{
    AccountId, AccountState, AppInstanceId, AppInstanceState, EntityClass, IdentityId,
    IdentityState,
};

/// Problems with the loaded present-day data.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    /// Two source rows share a key.
    #[error("duplicate {class} key {entity}")]
    DuplicateId {
        /// Entity class.
        class: EntityClass,
        /// Repeated key.
        entity: String,
    },

    /// An account points at an identity or app instance that does not exist.
    #[error("account {account} references missing {target} {key} via {column}")]
    DanglingReference {
        /// Referencing account.
        account: AccountId,
        /// Source column holding the reference.
        column: &'static str,
        /// Class of the missing row.
        target: EntityClass,
        /// Missing key.
        key: String,
    },
}

/// Present-day state of every entity, as read from the source tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CurrentSnapshot {
    /// Rows of `fct_accounts`.
    pub accounts: Vec<AccountState>,
    /// Rows of `dim_identities`.
    pub identities: Vec<IdentityState>,
    /// Rows of `dim_domain_applications`.
    pub app_instances: Vec<AppInstanceState>,
}

impl CurrentSnapshot {
    /// Total number of entities across all classes.
    pub fn entity_count(&self) -> usize {
        self.accounts
            .len()
            .saturating_add(self.identities.len())
            .saturating_add(self.app_instances.len())
    }

    /// Check key uniqueness per class and every account foreign key.
    ///
    /// # Errors
    ///
    /// Returns the first [`InputError`] found. Identities are checked
    /// first, then app instances, then accounts.
    pub fn verify_references(&self) -> Result<(), InputError> {
        let identities = unique_keys(
            EntityClass::Identity,
            self.identities.iter().map(|i| i.identity_id),
        )?;
        let instances = unique_keys(
            EntityClass::AppInstance,
            self.app_instances.iter().map(|a| a.instance_id),
        )?;
        unique_keys(
            EntityClass::Account,
            self.accounts.iter().map(|a| a.account_id),
        )?;

        for account in &self.accounts {
            check_reference::<IdentityId>(
                &identities,
                account.account_id,
                "user_id",
                EntityClass::Identity,
                account.user_id,
            )?;
            check_reference::<AppInstanceId>(
                &instances,
                account.account_id,
                "app_instance_id",
                EntityClass::AppInstance,
                account.app_instance_id,
            )?;
        }
        Ok(())
    }
}

fn unique_keys<K>(
    class: EntityClass,
    keys: impl Iterator<Item = K>,
) -> Result<BTreeSet<K>, InputError>
where
    K: Ord + core::fmt::Display + Copy,
{
    let mut seen = BTreeSet::new();
    for key in keys {
        if !seen.insert(key) {
            return Err(InputError::DuplicateId {
                class,
                entity: key.to_string(),
            });
        }
    }
    Ok(seen)
}

fn check_reference<K>(
    known: &BTreeSet<K>,
    account: AccountId,
    column: &'static str,
    target: EntityClass,
    key: K,
) -> Result<(), InputError>
where
    K: Ord + core::fmt::Display,
{
    if known.contains(&key) {
        Ok(())
    } else {
        Err(InputError::DanglingReference {
            account,
            column,
            target,
            key: key.to_string(),
        })
    }
}
