//! Key-index engine
//!
//! A key index is an automatic secondary index on one property key for one
//! element type. Its declaration row `("ki", kind, key)` is the only source of
//! truth for whether the key is indexed; each graph handle mirrors the
//! declarations in a `KeyIndexCache` so property writes can decide whether to
//! maintain `"kid"` rows without reading the store.

use super::ledger::{IndexRef, ReverseIndexLedger};
use crate::codec::{KeyPart, KeySpace};
use crate::graph::property::PropertyValue;
use crate::graph::store::GraphResult;
use crate::graph::types::ElementKind;
use crate::persistence::{KvTransaction, StoreResult};
use std::collections::BTreeSet;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Property keys currently indexed, per element type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyIndexCache {
    vertex: BTreeSet<String>,
    edge: BTreeSet<String>,
}

impl KeyIndexCache {
    pub fn keys(&self, kind: ElementKind) -> &BTreeSet<String> {
        match kind {
            ElementKind::Vertex => &self.vertex,
            ElementKind::Edge => &self.edge,
        }
    }

    fn keys_mut(&mut self, kind: ElementKind) -> &mut BTreeSet<String> {
        match kind {
            ElementKind::Vertex => &mut self.vertex,
            ElementKind::Edge => &mut self.edge,
        }
    }
}

/// Key-index rows and the per-handle cache that mirrors their declarations
#[derive(Debug)]
pub struct KeyIndexManager {
    keys: KeySpace,
    cache: RwLock<KeyIndexCache>,
}

impl KeyIndexManager {
    /// Build the cache from the declaration rows visible to `txn`
    pub fn load(txn: &mut dyn KvTransaction, keys: &KeySpace) -> GraphResult<Self> {
        let mut cache = KeyIndexCache::default();
        for kind in [ElementKind::Vertex, ElementKind::Edge] {
            for (row, _) in txn.scan_prefix(&keys.key_index_declarations(kind))? {
                // ("ki", kind, key)
                let tuple = keys.decode(&row)?;
                cache.keys_mut(kind).insert(tuple.get_str(2)?.to_string());
            }
        }
        debug!(
            "Loaded key indices for graph {}: vertex={:?} edge={:?}",
            keys.name(),
            cache.vertex,
            cache.edge
        );
        Ok(Self {
            keys: keys.clone(),
            cache: RwLock::new(cache),
        })
    }

    // The cache is rebuilt from store rows on every open, so a poisoned lock
    // still holds usable data.
    fn read(&self) -> RwLockReadGuard<'_, KeyIndexCache> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, KeyIndexCache> {
        self.cache.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn contains(&self, kind: ElementKind, key: &str) -> bool {
        self.read().keys(kind).contains(key)
    }

    /// Snapshot of the indexed keys for one element type
    pub fn indexed_keys(&self, kind: ElementKind) -> BTreeSet<String> {
        self.read().keys(kind).clone()
    }

    pub fn snapshot(&self) -> KeyIndexCache {
        self.read().clone()
    }

    /// Record a committed declaration
    pub(crate) fn mark(&self, kind: ElementKind, key: &str) {
        self.write().keys_mut(kind).insert(key.to_string());
    }

    /// Record a committed drop
    pub(crate) fn unmark(&self, kind: ElementKind, key: &str) {
        self.write().keys_mut(kind).remove(key);
    }

    /// Forget everything after the namespace was purged
    pub(crate) fn reset(&self) {
        *self.write() = KeyIndexCache::default();
    }

    fn ledger(&self) -> ReverseIndexLedger<'_> {
        ReverseIndexLedger::new(&self.keys)
    }

    /// Whether a declaration row exists, regardless of this handle's cache
    pub(crate) fn is_declared(
        &self,
        txn: &mut dyn KvTransaction,
        kind: ElementKind,
        key: &str,
    ) -> StoreResult<bool> {
        Ok(txn.get(&self.keys.key_index_declaration(kind, key))?.is_some())
    }

    pub(crate) fn declare(
        &self,
        txn: &mut dyn KvTransaction,
        kind: ElementKind,
        key: &str,
    ) -> StoreResult<()> {
        txn.set(&self.keys.key_index_declaration(kind, key), &[])
    }

    /// Write a `"kid"` row and its ledger row
    pub(crate) fn insert_entry(
        &self,
        txn: &mut dyn KvTransaction,
        kind: ElementKind,
        key: &str,
        value: &PropertyValue,
        id: &str,
    ) -> StoreResult<()> {
        let part = value.encode_for_index();
        txn.set(&self.keys.key_index_entry(kind, key, &part, id), &[])?;
        self.ledger().record(
            txn,
            kind,
            id,
            &IndexRef::Key {
                key: key.to_string(),
            },
            &part,
        )
    }

    /// Remove a `"kid"` row and its ledger row; absent rows are ignored
    pub(crate) fn remove_entry(
        &self,
        txn: &mut dyn KvTransaction,
        kind: ElementKind,
        key: &str,
        value: &PropertyValue,
        id: &str,
    ) -> StoreResult<()> {
        let part = value.encode_for_index();
        self.clear_forward(txn, kind, key, &part, id)?;
        self.ledger().erase(
            txn,
            kind,
            id,
            &IndexRef::Key {
                key: key.to_string(),
            },
            &part,
        )
    }

    /// Remove only the forward row; used while replaying an element's ledger
    pub(crate) fn clear_forward(
        &self,
        txn: &mut dyn KvTransaction,
        kind: ElementKind,
        key: &str,
        value: &KeyPart,
        id: &str,
    ) -> StoreResult<()> {
        txn.clear(&self.keys.key_index_entry(kind, key, value, id))
    }

    pub(crate) fn has_forward(
        &self,
        txn: &mut dyn KvTransaction,
        kind: ElementKind,
        key: &str,
        value: &KeyPart,
        id: &str,
    ) -> StoreResult<bool> {
        Ok(txn
            .get(&self.keys.key_index_entry(kind, key, value, id))?
            .is_some())
    }

    /// Ids filed under `value`, in key order
    pub(crate) fn lookup(
        &self,
        txn: &mut dyn KvTransaction,
        kind: ElementKind,
        key: &str,
        value: &PropertyValue,
    ) -> GraphResult<Vec<String>> {
        let prefix = self
            .keys
            .key_index_value(kind, key, &value.encode_for_index());
        let rows = txn.scan_prefix(&prefix)?;
        let mut ids = Vec::with_capacity(rows.len());
        for (row, _) in rows {
            // ("kid", kind, key, value, id)
            ids.push(self.keys.decode(&row)?.get_str(4)?.to_string());
        }
        Ok(ids)
    }

    /// Clear the declaration, every entry, and the ledger rows of those entries.
    /// Returns the number of entries removed.
    pub(crate) fn undeclare(
        &self,
        txn: &mut dyn KvTransaction,
        kind: ElementKind,
        key: &str,
    ) -> GraphResult<usize> {
        let prefix = self.keys.key_index_entries(kind, key);
        let rows = txn.scan_prefix(&prefix)?;
        let index = IndexRef::Key {
            key: key.to_string(),
        };
        for (row, _) in &rows {
            let tuple = self.keys.decode(row)?;
            let value = tuple.get_part(3)?;
            let id = tuple.get_str(4)?;
            self.ledger().erase(txn, kind, id, &index, &value)?;
        }
        txn.clear_prefix(&prefix)?;
        txn.clear(&self.keys.key_index_declaration(kind, key))?;
        Ok(rows.len())
    }
}
