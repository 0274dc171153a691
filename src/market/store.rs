use std::collections::HashMap;

use crate::market::types::{MarketSnapshot, SnapshotKey};

/// Latest snapshot per tracked key, one generation deep.
///
/// Owned by the market data service and mutated only inside the single
/// active scan, so no locking discipline is needed. Keys persist for the
/// process lifetime; the universe is fixed by configuration, so the table
/// is bounded.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    inner: HashMap<SnapshotKey, MarketSnapshot>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &SnapshotKey) -> Option<&MarketSnapshot> {
        self.inner.get(key)
    }

    /// Unconditional overwrite; the previous generation is discarded.
    pub fn put(&mut self, snapshot: MarketSnapshot) {
        self.inner.insert(snapshot.key.clone(), snapshot);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
