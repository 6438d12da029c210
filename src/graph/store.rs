//! Property graph over an ordered transactional key-value store
//!
//! `Graph` is the entity store: vertices, edges, adjacency, properties, and
//! the bookkeeping that keeps named indices, key indices and the reverse-index
//! ledger consistent with them. Every public call opens one transaction and
//! commits it before returning; conflicts are surfaced, never retried.

use super::config::GraphConfig;
use super::edge::Edge;
use super::property::PropertyValue;
use super::types::{Direction, EdgeId, ElementKind, VertexId};
use super::vertex::{Element, Vertex};
use crate::codec::{CodecError, KeySpace};
use crate::index::ledger::{IndexRef, ReverseIndexLedger};
use crate::index::manager::KeyIndexManager;
use crate::index::named::{self, Index};
use crate::persistence::{KvStore, KvTransaction, StoreError};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that can occur during graph operations
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Vertex {0} not found")]
    VertexNotFound(VertexId),

    #[error("Edge {0} not found")]
    EdgeNotFound(EdgeId),

    #[error("Vertex {0} already exists")]
    VertexAlreadyExists(VertexId),

    #[error("Edge {0} already exists")]
    EdgeAlreadyExists(EdgeId),

    #[error("Element id must not be empty")]
    MissingId,

    #[error("Edge label must not be empty")]
    MissingLabel,

    #[error("Property key {0:?} is reserved or empty")]
    InvalidPropertyKey(String),

    #[error("Index {0} already exists")]
    IndexAlreadyExists(String),

    #[error("Index {0} not found")]
    IndexNotFound(String),

    #[error("Key index on {kind} property {key} already exists")]
    KeyIndexAlreadyExists { key: String, kind: ElementKind },

    #[error("Index {name} holds {expected} elements, not {actual}")]
    IndexTypeMismatch {
        name: String,
        expected: ElementKind,
        actual: ElementKind,
    },

    #[error("Direction {0:?} does not name a single endpoint")]
    InvalidDirection(Direction),

    #[error("Edge {0} is missing an endpoint row")]
    MissingEndpoint(EdgeId),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Key decoding error: {0}")]
    Codec(#[from] CodecError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

/// Coarse failure classes callers act on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input or state; retrying the same call fails the same way
    InvalidArgument,
    /// The store failed the transaction (conflict, I/O)
    Store,
    /// Stored rows could not be decoded
    Corruption,
}

impl GraphError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GraphError::Store(_) => ErrorKind::Store,
            GraphError::Codec(_) | GraphError::Serialization(_) | GraphError::MissingEndpoint(_) => {
                ErrorKind::Corruption
            }
            _ => ErrorKind::InvalidArgument,
        }
    }

    /// Whether the caller may retry the operation
    pub fn is_conflict(&self) -> bool {
        matches!(self, GraphError::Store(e) if e.is_conflict())
    }
}

pub type GraphResult<T> = Result<T, GraphError>;

/// Static description of what the graph supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Features {
    pub supports_self_loops: bool,
    pub supports_duplicate_edges: bool,
    pub supports_key_indices: bool,
    pub supports_named_indices: bool,
    pub supports_user_ids: bool,
    pub supports_transactions: bool,
}

fn utf8(bytes: Vec<u8>) -> GraphResult<String> {
    String::from_utf8(bytes)
        .map_err(|e| GraphError::Codec(CodecError::InvalidUtf8(e.utf8_error().valid_up_to())))
}

/// Handle to one named graph inside a shared store
///
/// Several handles, for the same or different graphs, may share one store.
/// Each handle carries its own key-index cache, loaded on open.
pub struct Graph {
    store: Arc<dyn KvStore>,
    keys: KeySpace,
    config: GraphConfig,
    key_indices: KeyIndexManager,
}

impl Graph {
    /// Open the graph named by `config`, loading its key-index declarations
    pub fn open(store: Arc<dyn KvStore>, config: GraphConfig) -> GraphResult<Self> {
        let keys = KeySpace::new(config.name.as_str());
        let key_indices = {
            let mut txn = store.begin()?;
            KeyIndexManager::load(txn.as_mut(), &keys)?
        };
        info!("Opened graph {}", config.name);
        Ok(Self {
            store,
            keys,
            config,
            key_indices,
        })
    }

    pub fn open_named(store: Arc<dyn KvStore>, name: impl Into<String>) -> GraphResult<Self> {
        Self::open(store, GraphConfig::new(name))
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Key builder for this graph's namespace
    pub fn keys(&self) -> &KeySpace {
        &self.keys
    }

    /// Run `f` in a fresh transaction and commit it
    pub(crate) fn transact<T>(
        &self,
        f: impl FnOnce(&mut dyn KvTransaction) -> GraphResult<T>,
    ) -> GraphResult<T> {
        let mut txn = self.store.begin()?;
        let value = f(txn.as_mut())?;
        txn.commit()?;
        Ok(value)
    }

    pub fn features(&self) -> Features {
        Features {
            supports_self_loops: true,
            supports_duplicate_edges: true,
            supports_key_indices: true,
            supports_named_indices: true,
            supports_user_ids: true,
            supports_transactions: false,
        }
    }

    // Vertices

    pub fn add_vertex(&self, id: Option<&str>) -> GraphResult<Vertex> {
        let id = match id {
            Some("") => return Err(GraphError::MissingId),
            Some(id) => VertexId::new(id),
            None => VertexId::generate(),
        };
        self.transact(|txn| {
            let row = self.keys.vertex(id.as_str());
            if txn.get(&row)?.is_some() {
                return Err(GraphError::VertexAlreadyExists(id.clone()));
            }
            txn.set(&row, id.as_str().as_bytes())?;
            Ok(())
        })?;
        debug!("Added vertex {}", id);
        Ok(Vertex::new(id))
    }

    /// `Ok(None)` when no such vertex exists
    pub fn get_vertex(&self, id: &str) -> GraphResult<Option<Vertex>> {
        if id.is_empty() {
            return Err(GraphError::MissingId);
        }
        self.transact(|txn| {
            Ok(txn
                .get(&self.keys.vertex(id))?
                .map(|_| Vertex::new(id)))
        })
    }

    pub fn get_vertices(&self) -> GraphResult<Vec<Vertex>> {
        self.transact(|txn| {
            Ok(self
                .element_ids(txn, ElementKind::Vertex)?
                .into_iter()
                .map(Vertex::new)
                .collect())
        })
    }

    /// Vertices whose property `key` equals `value`
    ///
    /// Served from the key index when `key` is indexed for vertices,
    /// otherwise by scanning every vertex.
    pub fn get_vertices_by_property(
        &self,
        key: &str,
        value: impl Into<PropertyValue>,
    ) -> GraphResult<Vec<Vertex>> {
        let value = value.into();
        self.transact(|txn| {
            Ok(self
                .ids_by_property(txn, ElementKind::Vertex, key, &value)?
                .into_iter()
                .map(Vertex::new)
                .collect())
        })
    }

    /// Remove a vertex, its incident edges, properties and index entries
    ///
    /// By default each incident edge is removed in its own transaction before
    /// the vertex rows are cleared, so a failure part way leaves the vertex
    /// with fewer edges. With `atomic_vertex_removal` the whole removal is one
    /// transaction.
    pub fn remove_vertex(&self, vertex: &Vertex) -> GraphResult<()> {
        let id = vertex.id.as_str();
        if self.config.atomic_vertex_removal {
            return self.transact(|txn| self.remove_vertex_in(txn, id));
        }

        let edge_ids = self.transact(|txn| {
            self.ensure_exists(txn, ElementKind::Vertex, id)?;
            self.incident_edge_ids(txn, id)
        })?;
        for edge_id in &edge_ids {
            match self.transact(|txn| self.remove_edge_in(txn, edge_id)) {
                // Removed concurrently
                Err(GraphError::EdgeNotFound(_)) => {}
                other => other?,
            }
        }
        self.transact(|txn| self.remove_vertex_in(txn, id))
    }

    fn remove_vertex_in(&self, txn: &mut dyn KvTransaction, id: &str) -> GraphResult<()> {
        self.ensure_exists(txn, ElementKind::Vertex, id)?;
        // Edges added after the cascade started
        for edge_id in self.incident_edge_ids(txn, id)? {
            self.remove_edge_in(txn, &edge_id)?;
        }
        txn.clear(&self.keys.vertex(id))?;
        txn.clear_prefix(&self.keys.properties(ElementKind::Vertex, id))?;
        self.clear_index_entries(txn, ElementKind::Vertex, id)?;
        debug!("Removed vertex {}", id);
        Ok(())
    }

    /// Ids of edges incident to the vertex; a self-loop is listed once
    fn incident_edge_ids(&self, txn: &mut dyn KvTransaction, vertex_id: &str) -> GraphResult<Vec<String>> {
        let mut seen = FxHashSet::default();
        let mut ids = Vec::new();
        for direction in Direction::Both.expand() {
            for (row, _) in txn.scan_prefix(&self.keys.adjacencies(*direction, vertex_id))? {
                // (dir, "v", vid, eid)
                let edge_id = self.keys.decode(&row)?.get_str(3)?.to_string();
                if seen.insert(edge_id.clone()) {
                    ids.push(edge_id);
                }
            }
        }
        Ok(ids)
    }

    // Edges

    pub fn add_edge(
        &self,
        id: Option<&str>,
        out_vertex: &Vertex,
        in_vertex: &Vertex,
        label: &str,
    ) -> GraphResult<Edge> {
        if label.is_empty() {
            return Err(GraphError::MissingLabel);
        }
        let id = match id {
            Some("") => return Err(GraphError::MissingId),
            Some(id) => EdgeId::new(id),
            None => EdgeId::generate(),
        };
        let edge = Edge::new(id, out_vertex.id.clone(), in_vertex.id.clone(), label);
        let eid = edge.id.as_str();

        self.transact(|txn| {
            if txn.get(&self.keys.edge(eid))?.is_some() {
                return Err(GraphError::EdgeAlreadyExists(edge.id.clone()));
            }
            self.claim(txn, ElementKind::Vertex, edge.out_vertex.as_str())?;
            self.claim(txn, ElementKind::Vertex, edge.in_vertex.as_str())?;

            txn.set(&self.keys.edge(eid), label.as_bytes())?;
            txn.set(
                &self.keys.endpoint(Direction::Out, eid),
                edge.out_vertex.as_str().as_bytes(),
            )?;
            txn.set(
                &self.keys.endpoint(Direction::In, eid),
                edge.in_vertex.as_str().as_bytes(),
            )?;
            txn.set(
                &self.keys.adjacency(Direction::Out, edge.out_vertex.as_str(), eid),
                &[],
            )?;
            txn.set(
                &self.keys.adjacency(Direction::In, edge.in_vertex.as_str(), eid),
                &[],
            )?;
            Ok(())
        })?;

        debug!(
            "Added edge {} ({})-[{}]->({})",
            edge.id, edge.out_vertex, edge.label, edge.in_vertex
        );
        Ok(edge)
    }

    /// `Ok(None)` when no such edge exists
    pub fn get_edge(&self, id: &str) -> GraphResult<Option<Edge>> {
        if id.is_empty() {
            return Err(GraphError::MissingId);
        }
        self.transact(|txn| self.read_edge(txn, id))
    }

    pub fn get_edges(&self) -> GraphResult<Vec<Edge>> {
        self.transact(|txn| {
            let mut out_ends: FxHashMap<String, String> = FxHashMap::default();
            let mut in_ends: FxHashMap<String, String> = FxHashMap::default();
            for (direction, ends) in [(Direction::Out, &mut out_ends), (Direction::In, &mut in_ends)] {
                for (row, value) in txn.scan_prefix(&self.keys.endpoints(direction))? {
                    // (dir, "e", eid)
                    let edge_id = self.keys.decode(&row)?.get_str(2)?.to_string();
                    ends.insert(edge_id, utf8(value)?);
                }
            }

            let rows = txn.scan_prefix(&self.keys.edges())?;
            let mut edges = Vec::with_capacity(rows.len());
            for (row, label) in rows {
                let id = self.keys.decode(&row)?.get_str(1)?.to_string();
                let (out_vertex, in_vertex) = match (out_ends.remove(&id), in_ends.remove(&id)) {
                    (Some(out_vertex), Some(in_vertex)) => (out_vertex, in_vertex),
                    _ => return Err(GraphError::MissingEndpoint(EdgeId::new(id))),
                };
                edges.push(Edge::new(id, out_vertex, in_vertex, utf8(label)?));
            }
            Ok(edges)
        })
    }

    /// Edges whose property `key` equals `value`
    pub fn get_edges_by_property(
        &self,
        key: &str,
        value: impl Into<PropertyValue>,
    ) -> GraphResult<Vec<Edge>> {
        let value = value.into();
        self.transact(|txn| {
            let mut edges = Vec::new();
            for id in self.ids_by_property(txn, ElementKind::Edge, key, &value)? {
                match self.read_edge(txn, &id)? {
                    Some(edge) => edges.push(edge),
                    None => warn!("Key index on edge property {} references missing edge {}", key, id),
                }
            }
            Ok(edges)
        })
    }

    pub fn remove_edge(&self, edge: &Edge) -> GraphResult<()> {
        self.transact(|txn| self.remove_edge_in(txn, edge.id.as_str()))
    }

    fn remove_edge_in(&self, txn: &mut dyn KvTransaction, id: &str) -> GraphResult<()> {
        // Endpoints come from the store, not from the caller's handle
        let edge = self
            .read_edge(txn, id)?
            .ok_or_else(|| GraphError::EdgeNotFound(EdgeId::new(id)))?;

        txn.clear(&self.keys.edge(id))?;
        txn.clear(&self.keys.endpoint(Direction::Out, id))?;
        txn.clear(&self.keys.endpoint(Direction::In, id))?;
        txn.clear(&self.keys.adjacency(Direction::Out, edge.out_vertex.as_str(), id))?;
        txn.clear(&self.keys.adjacency(Direction::In, edge.in_vertex.as_str(), id))?;
        txn.clear_prefix(&self.keys.properties(ElementKind::Edge, id))?;
        self.clear_index_entries(txn, ElementKind::Edge, id)?;
        debug!("Removed edge {}", id);
        Ok(())
    }

    fn read_edge(&self, txn: &mut dyn KvTransaction, id: &str) -> GraphResult<Option<Edge>> {
        let label = match txn.get(&self.keys.edge(id))? {
            Some(label) => utf8(label)?,
            None => return Ok(None),
        };
        let missing = || GraphError::MissingEndpoint(EdgeId::new(id));
        let out_vertex = txn
            .get(&self.keys.endpoint(Direction::Out, id))?
            .ok_or_else(missing)?;
        let in_vertex = txn
            .get(&self.keys.endpoint(Direction::In, id))?
            .ok_or_else(missing)?;
        Ok(Some(Edge::new(id, utf8(out_vertex)?, utf8(in_vertex)?, label)))
    }

    // Adjacency

    /// Edges incident to `vertex` in `direction`, optionally restricted to
    /// `labels`. With `Direction::Both` a self-loop is returned twice, once
    /// per direction.
    pub fn vertex_edges(
        &self,
        vertex: &Vertex,
        direction: Direction,
        labels: &[&str],
    ) -> GraphResult<Vec<Edge>> {
        self.transact(|txn| {
            let mut edges = Vec::new();
            for dir in direction.expand() {
                edges.extend(self.edges_in(txn, vertex.id.as_str(), *dir, labels)?);
            }
            Ok(edges)
        })
    }

    /// Vertices at the far end of each edge `vertex_edges` would return
    pub fn adjacent_vertices(
        &self,
        vertex: &Vertex,
        direction: Direction,
        labels: &[&str],
    ) -> GraphResult<Vec<Vertex>> {
        self.transact(|txn| {
            let mut vertices = Vec::new();
            for dir in direction.expand() {
                for edge in self.edges_in(txn, vertex.id.as_str(), *dir, labels)? {
                    vertices.push(Vertex::new(edge.far_end(*dir).clone()));
                }
            }
            Ok(vertices)
        })
    }

    fn edges_in(
        &self,
        txn: &mut dyn KvTransaction,
        vertex_id: &str,
        direction: Direction,
        labels: &[&str],
    ) -> GraphResult<Vec<Edge>> {
        let mut edges = Vec::new();
        for (row, _) in txn.scan_prefix(&self.keys.adjacencies(direction, vertex_id))? {
            let edge_id = self.keys.decode(&row)?.get_str(3)?.to_string();
            let edge = self
                .read_edge(txn, &edge_id)?
                .ok_or_else(|| GraphError::MissingEndpoint(EdgeId::new(edge_id.as_str())))?;
            if labels.is_empty() || labels.contains(&edge.label.as_str()) {
                edges.push(edge);
            }
        }
        Ok(edges)
    }

    // Properties

    fn validate_key(kind: ElementKind, key: &str) -> GraphResult<()> {
        let reserved = key.is_empty() || key == "id" || (kind == ElementKind::Edge && key == "label");
        if reserved {
            return Err(GraphError::InvalidPropertyKey(key.to_string()));
        }
        Ok(())
    }

    fn element_row(&self, kind: ElementKind, id: &str) -> Vec<u8> {
        match kind {
            ElementKind::Vertex => self.keys.vertex(id),
            ElementKind::Edge => self.keys.edge(id),
        }
    }

    fn not_found(kind: ElementKind, id: &str) -> GraphError {
        match kind {
            ElementKind::Vertex => GraphError::VertexNotFound(VertexId::new(id)),
            ElementKind::Edge => GraphError::EdgeNotFound(EdgeId::new(id)),
        }
    }

    fn ensure_exists(&self, txn: &mut dyn KvTransaction, kind: ElementKind, id: &str) -> GraphResult<()> {
        if txn.get(&self.element_row(kind, id))?.is_none() {
            return Err(Self::not_found(kind, id));
        }
        Ok(())
    }

    /// Check the element exists and rewrite its row unchanged.
    ///
    /// Used before attaching rows to an element. A concurrent removal reads
    /// the same row, so the two transactions conflict instead of leaving the
    /// attached rows behind a removed element.
    fn claim(&self, txn: &mut dyn KvTransaction, kind: ElementKind, id: &str) -> GraphResult<()> {
        let row = self.element_row(kind, id);
        match txn.get(&row)? {
            Some(value) => {
                txn.set(&row, &value)?;
                Ok(())
            }
            None => Err(Self::not_found(kind, id)),
        }
    }

    fn read_property(
        &self,
        txn: &mut dyn KvTransaction,
        kind: ElementKind,
        id: &str,
        key: &str,
    ) -> GraphResult<Option<PropertyValue>> {
        match txn.get(&self.keys.property(kind, id, key))? {
            Some(bytes) => Ok(Some(PropertyValue::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn get_property<E: Element>(&self, element: &E, key: &str) -> GraphResult<Option<PropertyValue>> {
        self.transact(|txn| self.read_property(txn, E::KIND, element.element_id(), key))
    }

    pub fn properties<E: Element>(&self, element: &E) -> GraphResult<BTreeMap<String, PropertyValue>> {
        self.transact(|txn| {
            let mut properties = BTreeMap::new();
            for (row, value) in txn.scan_prefix(&self.keys.properties(E::KIND, element.element_id()))? {
                // ("p", kind, id, key)
                let key = self.keys.decode(&row)?.get_str(3)?.to_string();
                properties.insert(key, PropertyValue::from_bytes(&value)?);
            }
            Ok(properties)
        })
    }

    pub fn property_keys<E: Element>(&self, element: &E) -> GraphResult<BTreeSet<String>> {
        Ok(self.properties(element)?.into_keys().collect())
    }

    /// Set a property, keeping the key index on `key` current
    pub fn set_property<E: Element>(
        &self,
        element: &E,
        key: &str,
        value: impl Into<PropertyValue>,
    ) -> GraphResult<()> {
        Self::validate_key(E::KIND, key)?;
        let value = value.into();
        let id = element.element_id();
        self.transact(|txn| {
            self.claim(txn, E::KIND, id)?;
            let previous = self.read_property(txn, E::KIND, id, key)?;
            txn.set(&self.keys.property(E::KIND, id, key), &value.to_bytes()?)?;
            if self.key_indices.contains(E::KIND, key) {
                if let Some(previous) = &previous {
                    self.key_indices.remove_entry(txn, E::KIND, key, previous, id)?;
                }
                self.key_indices.insert_entry(txn, E::KIND, key, &value, id)?;
            }
            Ok(())
        })?;
        debug!("Set {} {}.{} = {}", E::KIND, id, key, value);
        Ok(())
    }

    /// Remove a property, returning its previous value
    pub fn remove_property<E: Element>(&self, element: &E, key: &str) -> GraphResult<Option<PropertyValue>> {
        Self::validate_key(E::KIND, key)?;
        let id = element.element_id();
        self.transact(|txn| {
            self.ensure_exists(txn, E::KIND, id)?;
            let previous = self.read_property(txn, E::KIND, id, key)?;
            if let Some(previous) = &previous {
                txn.clear(&self.keys.property(E::KIND, id, key))?;
                if self.key_indices.contains(E::KIND, key) {
                    self.key_indices.remove_entry(txn, E::KIND, key, previous, id)?;
                }
            }
            Ok(previous)
        })
    }

    /// Ids of every element of `kind`, in id order
    fn element_ids(&self, txn: &mut dyn KvTransaction, kind: ElementKind) -> GraphResult<Vec<String>> {
        let prefix = match kind {
            ElementKind::Vertex => self.keys.vertices(),
            ElementKind::Edge => self.keys.edges(),
        };
        let rows = txn.scan_prefix(&prefix)?;
        let mut ids = Vec::with_capacity(rows.len());
        for (row, _) in rows {
            // ("v"|"e", id)
            ids.push(self.keys.decode(&row)?.get_str(1)?.to_string());
        }
        Ok(ids)
    }

    fn ids_by_property(
        &self,
        txn: &mut dyn KvTransaction,
        kind: ElementKind,
        key: &str,
        value: &PropertyValue,
    ) -> GraphResult<Vec<String>> {
        if self.key_indices.contains(kind, key) {
            return self.key_indices.lookup(txn, kind, key, value);
        }
        let mut ids = Vec::new();
        for id in self.element_ids(txn, kind)? {
            if let Some(found) = self.read_property(txn, kind, &id, key)? {
                if found.matches(value) {
                    ids.push(id);
                }
            }
        }
        Ok(ids)
    }

    /// Replay the element's ledger against the forward indices, then drop it
    fn clear_index_entries(&self, txn: &mut dyn KvTransaction, kind: ElementKind, id: &str) -> GraphResult<()> {
        let ledger = ReverseIndexLedger::new(&self.keys);
        for entry in ledger.for_element(txn, kind, id)? {
            match &entry.index {
                IndexRef::Named { name, key } => {
                    if !named::has_entry(txn, &self.keys, name, key, &entry.value, id)? {
                        warn!(
                            "Stale ledger row: {} {} not in index {}[{}={}]",
                            kind, id, name, key, entry.value
                        );
                    }
                    named::clear_entry(txn, &self.keys, name, key, &entry.value, id)?;
                }
                IndexRef::Key { key } => {
                    if !self.key_indices.has_forward(txn, kind, key, &entry.value, id)? {
                        warn!(
                            "Stale ledger row: {} {} not in key index {}={}",
                            kind, id, key, entry.value
                        );
                    }
                    self.key_indices.clear_forward(txn, kind, key, &entry.value, id)?;
                }
            }
        }
        ledger.clear_element(txn, kind, id)?;
        Ok(())
    }

    // Named indices

    pub fn create_index(&self, name: &str, kind: ElementKind) -> GraphResult<Index<'_>> {
        self.transact(|txn| named::declare(txn, &self.keys, name, kind))?;
        info!("Created {} index {} on graph {}", kind, name, self.name());
        Ok(Index::new(self, name, kind))
    }

    /// `Ok(None)` unless an index of that name holds elements of `kind`
    pub fn get_index(&self, name: &str, kind: ElementKind) -> GraphResult<Option<Index<'_>>> {
        let declared = self.transact(|txn| Ok(named::declared_kind(txn, &self.keys, name)?))?;
        Ok(declared
            .filter(|declared| *declared == kind)
            .map(|kind| Index::new(self, name, kind)))
    }

    pub fn has_index(&self, name: &str) -> GraphResult<bool> {
        let declared = self.transact(|txn| Ok(named::declared_kind(txn, &self.keys, name)?))?;
        Ok(declared.is_some())
    }

    pub fn get_indices(&self) -> GraphResult<Vec<Index<'_>>> {
        let declared = self.transact(|txn| named::declarations(txn, &self.keys))?;
        Ok(declared
            .into_iter()
            .map(|(name, kind)| Index::new(self, name, kind))
            .collect())
    }

    /// Drop the index and its entries; dropping an absent index is a no-op.
    /// Ledger rows of still-indexed elements are left behind and skipped when
    /// those elements are removed.
    pub fn drop_index(&self, name: &str) -> GraphResult<()> {
        self.transact(|txn| Ok(named::drop_all(txn, &self.keys, name)?))?;
        info!("Dropped index {} on graph {}", name, self.name());
        Ok(())
    }

    // Key indices

    /// Index property `key` for every element of `kind`, back-filling entries
    /// for elements that already carry it
    pub fn create_key_index(&self, key: &str, kind: ElementKind) -> GraphResult<()> {
        Self::validate_key(kind, key)?;
        let exists = || GraphError::KeyIndexAlreadyExists {
            key: key.to_string(),
            kind,
        };
        if self.key_indices.contains(kind, key) {
            return Err(exists());
        }

        let backfilled = self.transact(|txn| {
            if self.key_indices.is_declared(txn, kind, key)? {
                return Err(exists());
            }
            self.key_indices.declare(txn, kind, key)?;
            let mut count = 0;
            for id in self.element_ids(txn, kind)? {
                if let Some(value) = self.read_property(txn, kind, &id, key)? {
                    self.key_indices.insert_entry(txn, kind, key, &value, &id)?;
                    count += 1;
                }
            }
            Ok(count)
        })?;

        // Only after the back-fill is durable
        self.key_indices.mark(kind, key);
        info!(
            "Created key index on {} property {} ({} entries back-filled)",
            kind, key, backfilled
        );
        Ok(())
    }

    /// Drop the key index on `key`; dropping an absent key index is a no-op
    pub fn drop_key_index(&self, key: &str, kind: ElementKind) -> GraphResult<()> {
        let removed = self.transact(|txn| {
            if !self.key_indices.is_declared(txn, kind, key)? {
                return Ok(None);
            }
            Ok(Some(self.key_indices.undeclare(txn, kind, key)?))
        })?;

        match removed {
            Some(count) => {
                self.key_indices.unmark(kind, key);
                info!("Dropped key index on {} property {} ({} entries)", kind, key, count);
            }
            None => debug!("No key index on {} property {} to drop", kind, key),
        }
        Ok(())
    }

    /// Keys indexed for `kind`, from this handle's cache
    pub fn get_indexed_keys(&self, kind: ElementKind) -> BTreeSet<String> {
        self.key_indices.indexed_keys(kind)
    }

    pub fn has_key_index(&self, key: &str, kind: ElementKind) -> bool {
        self.key_indices.contains(kind, key)
    }

    /// Delete every row of this graph, including index declarations
    pub fn purge(&self) -> GraphResult<()> {
        self.transact(|txn| Ok(txn.clear_prefix(self.keys.namespace())?))?;
        self.key_indices.reset();
        info!("Purged graph {}", self.name());
        Ok(())
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "kvgraph[name={}]", self.name())
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("config", &self.config)
            .field("key_indices", &self.key_indices.snapshot())
            .finish()
    }
}
