//! Reverse-index ledger
//!
//! Every forward index row (named index entry or key-index entry) has a
//! companion row keyed by the element it points at. Deleting an element walks
//! its ledger rows to find the forward rows to remove, instead of scanning
//! every index.

use crate::codec::schema::{INDEX, KEY_INDEX_DATA};
use crate::codec::{KeyPart, KeySpace};
use crate::graph::store::GraphResult;
use crate::graph::types::ElementKind;
use crate::persistence::{KvTransaction, StoreResult};

/// Which forward index a ledger row points into
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexRef {
    /// Entry `(name, key, value, id)` of a named index
    Named { name: String, key: String },
    /// Entry `(kind, key, value, id)` of the key index on `key`
    Key { key: String },
}

/// One ledger row: the index and the encoded value the element is filed under
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub index: IndexRef,
    pub value: KeyPart,
}

/// Ledger operations scoped to one graph's key space
#[derive(Debug, Clone, Copy)]
pub struct ReverseIndexLedger<'a> {
    keys: &'a KeySpace,
}

impl<'a> ReverseIndexLedger<'a> {
    pub fn new(keys: &'a KeySpace) -> Self {
        Self { keys }
    }

    fn row_key(&self, kind: ElementKind, id: &str, index: &IndexRef, value: &KeyPart) -> Vec<u8> {
        match index {
            IndexRef::Named { name, key } => self.keys.reverse_named(kind, id, name, key, value),
            IndexRef::Key { key } => self.keys.reverse_key(kind, id, key, value),
        }
    }

    /// Write the reverse pointer for a forward entry
    pub fn record(
        &self,
        txn: &mut dyn KvTransaction,
        kind: ElementKind,
        id: &str,
        index: &IndexRef,
        value: &KeyPart,
    ) -> StoreResult<()> {
        txn.set(&self.row_key(kind, id, index, value), &[])
    }

    /// Drop the reverse pointer for a forward entry; absent rows are ignored
    pub fn erase(
        &self,
        txn: &mut dyn KvTransaction,
        kind: ElementKind,
        id: &str,
        index: &IndexRef,
        value: &KeyPart,
    ) -> StoreResult<()> {
        txn.clear(&self.row_key(kind, id, index, value))
    }

    /// Every forward entry that references the element
    pub fn for_element(
        &self,
        txn: &mut dyn KvTransaction,
        kind: ElementKind,
        id: &str,
    ) -> GraphResult<Vec<LedgerEntry>> {
        let rows = txn.scan_prefix(&self.keys.reverse_entries(kind, id))?;
        let mut entries = Vec::with_capacity(rows.len());
        for (key, _) in rows {
            // ("ri", kind, id, source, ...)
            let tuple = self.keys.decode(&key)?;
            let entry = match tuple.get_str(3)? {
                INDEX => LedgerEntry {
                    index: IndexRef::Named {
                        name: tuple.get_str(4)?.to_string(),
                        key: tuple.get_str(5)?.to_string(),
                    },
                    value: tuple.get_part(6)?,
                },
                KEY_INDEX_DATA => LedgerEntry {
                    index: IndexRef::Key {
                        key: tuple.get_str(4)?.to_string(),
                    },
                    value: tuple.get_part(5)?,
                },
                _ => continue,
            };
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Remove every ledger row of the element
    pub fn clear_element(
        &self,
        txn: &mut dyn KvTransaction,
        kind: ElementKind,
        id: &str,
    ) -> StoreResult<()> {
        txn.clear_prefix(&self.keys.reverse_entries(kind, id))
    }
}
