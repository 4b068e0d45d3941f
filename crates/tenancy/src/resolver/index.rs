//! Reverse index from storefront ID to the cache keys holding it.

use std::collections::{BTreeSet, HashMap};

use parking_lot::Mutex;
use shopgrid_core::StorefrontId;

/// Lets ID-based invalidation find `storefront:<slug>`, `domain:<host>` and
/// `id:<uuid>` entries for the same storefront.
#[derive(Default)]
pub(crate) struct KeyIndex {
    keys: Mutex<HashMap<StorefrontId, BTreeSet<String>>>,
}

impl KeyIndex {
    pub(crate) fn record(&self, id: StorefrontId, key: &str) {
        self.keys.lock().entry(id).or_default().insert(key.to_owned());
    }

    /// Remove and return every key recorded for `id`.
    pub(crate) fn take(&self, id: StorefrontId) -> BTreeSet<String> {
        self.keys.lock().remove(&id).unwrap_or_default()
    }

    /// The storefront a key was recorded under, if any.
    pub(crate) fn owner_of(&self, key: &str) -> Option<StorefrontId> {
        self.keys
            .lock()
            .iter()
            .find(|(_, keys)| keys.contains(key))
            .map(|(id, _)| *id)
    }

    /// Drop keys for which `live` is false, and IDs left with no keys.
    pub(crate) fn prune(&self, live: impl Fn(&str) -> bool) -> usize {
        let mut keys = self.keys.lock();
        let mut dropped = 0;
        keys.retain(|_, set| {
            let before = set.len();
            set.retain(|key| live(key));
            dropped += before - set.len();
            !set.is_empty()
        });
        dropped
    }

    pub(crate) fn len(&self) -> usize {
        self.keys.lock().len()
    }
}
