//! Seeding: one current version per entity spanning the whole window.

use crate::entity::Versioned;
use crate::store::{SnapshotStore, StoreError};
use crate::window::SynthesisWindow;

/// Build a store holding exactly one current version per input state.
///
/// Every version starts on `window.start()` and runs to the open-ended
/// sentinel. The walker then carves history out of these rows.
///
/// # Errors
///
/// Returns [`StoreError::DuplicateEntity`] if two input states share a key.
pub fn seed_current_versions<S, I>(
    states: I,
    window: SynthesisWindow,
) -> Result<SnapshotStore<S>, StoreError>
where
    S: Versioned,
    I: IntoIterator<Item = S>,
{
    let mut store = SnapshotStore::new(window);
    for state in states {
        store.seed(state)?;
    }
    tracing::debug!(
        class = %S::CLASS,
        entities = store.entity_count(),
        start = %window.start(),
        "Seeded current versions"
    );
    Ok(store)
}
