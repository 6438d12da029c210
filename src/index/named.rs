//! Named indices
//!
//! An explicitly managed `(key, value) -> element` index. Its declaration row
//! `("i", name)` records the element type it holds; entries live directly
//! under the declaration as `("i", name, key, value, id)`, so dropping the
//! index is one prefix clear.

use super::ledger::{IndexRef, ReverseIndexLedger};
use crate::codec::{KeyPart, KeySpace};
use crate::graph::property::PropertyValue;
use crate::graph::store::{Graph, GraphError, GraphResult};
use crate::graph::types::{ElementId, ElementKind};
use crate::graph::vertex::Element;
use crate::persistence::{KvTransaction, StoreResult};
use std::fmt;
use tracing::debug;

/// Handle to a declared named index
///
/// The handle borrows the graph; every call runs in its own transaction.
#[derive(Clone)]
pub struct Index<'g> {
    graph: &'g Graph,
    name: String,
    kind: ElementKind,
}

impl<'g> Index<'g> {
    pub(crate) fn new(graph: &'g Graph, name: impl Into<String>, kind: ElementKind) -> Self {
        Self {
            graph,
            name: name.into(),
            kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Element type the index holds
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    fn check_kind(&self, kind: ElementKind) -> GraphResult<()> {
        if kind != self.kind {
            return Err(GraphError::IndexTypeMismatch {
                name: self.name.clone(),
                expected: self.kind,
                actual: kind,
            });
        }
        Ok(())
    }

    fn ensure_declared(&self, txn: &mut dyn KvTransaction) -> GraphResult<()> {
        match declared_kind(txn, self.graph.keys(), &self.name)? {
            Some(kind) if kind == self.kind => Ok(()),
            _ => Err(GraphError::IndexNotFound(self.name.clone())),
        }
    }

    /// File `element` under `(key, value)`
    pub fn put<E: Element>(
        &self,
        key: &str,
        value: impl Into<PropertyValue>,
        element: &E,
    ) -> GraphResult<()> {
        self.check_kind(E::KIND)?;
        let part = value.into().encode_for_index();
        let keys = self.graph.keys();
        self.graph.transact(|txn| {
            self.ensure_declared(txn)?;
            let id = element.element_id();
            txn.set(&keys.index_entry(&self.name, key, &part, id), &[])?;
            ReverseIndexLedger::new(keys).record(
                txn,
                self.kind,
                id,
                &IndexRef::Named {
                    name: self.name.clone(),
                    key: key.to_string(),
                },
                &part,
            )?;
            Ok(())
        })?;
        debug!("Indexed {} under {}[{}={}]", element.element_id(), self.name, key, part);
        Ok(())
    }

    /// Elements filed under `(key, value)`, in id order
    pub fn get(&self, key: &str, value: impl Into<PropertyValue>) -> GraphResult<Vec<ElementId>> {
        let part = value.into().encode_for_index();
        let keys = self.graph.keys();
        self.graph.transact(|txn| {
            let rows = txn.scan_prefix(&keys.index_entries(&self.name, key, &part))?;
            let mut hits = Vec::with_capacity(rows.len());
            for (row, _) in rows {
                // ("i", name, key, value, id)
                let id = keys.decode(&row)?.get_str(4)?.to_string();
                hits.push(ElementId::new(self.kind, id));
            }
            Ok(hits)
        })
    }

    pub fn count(&self, key: &str, value: impl Into<PropertyValue>) -> GraphResult<usize> {
        Ok(self.get(key, value)?.len())
    }

    /// Unfile `element` from `(key, value)`; removing an absent entry is a no-op
    pub fn remove<E: Element>(
        &self,
        key: &str,
        value: impl Into<PropertyValue>,
        element: &E,
    ) -> GraphResult<()> {
        self.check_kind(E::KIND)?;
        let part = value.into().encode_for_index();
        let keys = self.graph.keys();
        self.graph.transact(|txn| {
            let id = element.element_id();
            clear_entry(txn, keys, &self.name, key, &part, id)?;
            ReverseIndexLedger::new(keys).erase(
                txn,
                self.kind,
                id,
                &IndexRef::Named {
                    name: self.name.clone(),
                    key: key.to_string(),
                },
                &part,
            )?;
            Ok(())
        })
    }
}

impl fmt::Debug for Index<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Index")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

impl PartialEq for Index<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.kind == other.kind
    }
}

/// Element type recorded in the declaration row, if the index exists
pub(crate) fn declared_kind(
    txn: &mut dyn KvTransaction,
    keys: &KeySpace,
    name: &str,
) -> StoreResult<Option<ElementKind>> {
    Ok(txn
        .get(&keys.index_declaration(name))?
        .and_then(|value| ElementKind::from_type_name(&value)))
}

pub(crate) fn declare(
    txn: &mut dyn KvTransaction,
    keys: &KeySpace,
    name: &str,
    kind: ElementKind,
) -> GraphResult<()> {
    if txn.get(&keys.index_declaration(name))?.is_some() {
        return Err(GraphError::IndexAlreadyExists(name.to_string()));
    }
    txn.set(&keys.index_declaration(name), kind.type_name().as_bytes())?;
    Ok(())
}

/// Every declared index as `(name, kind)`, in name order
pub(crate) fn declarations(
    txn: &mut dyn KvTransaction,
    keys: &KeySpace,
) -> GraphResult<Vec<(String, ElementKind)>> {
    let mut found = Vec::new();
    for (row, value) in txn.scan_prefix(&keys.index_declarations())? {
        let tuple = keys.decode(&row)?;
        // Declarations are ("i", name); longer tuples are entries.
        if tuple.len() != 2 {
            continue;
        }
        if let Some(kind) = ElementKind::from_type_name(&value) {
            found.push((tuple.get_str(1)?.to_string(), kind));
        }
    }
    Ok(found)
}

/// Clear the declaration and every entry. Ledger rows that point at the
/// dropped entries are left in place and tolerated on element removal.
pub(crate) fn drop_all(txn: &mut dyn KvTransaction, keys: &KeySpace, name: &str) -> StoreResult<()> {
    txn.clear_prefix(&keys.index_declaration(name))
}

pub(crate) fn has_entry(
    txn: &mut dyn KvTransaction,
    keys: &KeySpace,
    name: &str,
    key: &str,
    value: &KeyPart,
    id: &str,
) -> StoreResult<bool> {
    Ok(txn.get(&keys.index_entry(name, key, value, id))?.is_some())
}

pub(crate) fn clear_entry(
    txn: &mut dyn KvTransaction,
    keys: &KeySpace,
    name: &str,
    key: &str,
    value: &KeyPart,
    id: &str,
) -> StoreResult<()> {
    txn.clear(&keys.index_entry(name, key, value, id))
}
