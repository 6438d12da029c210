//! kvgraph
//!
//! A property graph stored in an ordered, transactional key-value store.
//!
//! Every vertex, edge, property and index entry is a row whose key is an
//! order-preserving tuple under the graph's namespace `(0, name)`, so several
//! graphs can share one store and every traversal is a prefix range scan.
//!
//! # Layers
//!
//! - `codec`: tuple encoding and the key schema
//! - `persistence`: the store contract, an in-memory store and a RocksDB store
//! - `graph`: vertices, edges, properties and the `Graph` handle
//! - `index`: named indices, key indices and the reverse-index ledger
//!
//! ## Example Usage
//!
//! ```rust
//! use kvgraph::{ElementKind, Graph, GraphConfig, MemoryStore};
//! use std::sync::Arc;
//!
//! let graph = Graph::open(Arc::new(MemoryStore::new()), GraphConfig::new("social")).unwrap();
//!
//! let alice = graph.add_vertex(Some("alice")).unwrap();
//! let bob = graph.add_vertex(Some("bob")).unwrap();
//! graph.add_edge(None, &alice, &bob, "knows").unwrap();
//!
//! graph.create_key_index("age", ElementKind::Vertex).unwrap();
//! graph.set_property(&alice, "age", 30).unwrap();
//!
//! let thirty = graph.get_vertices_by_property("age", 30).unwrap();
//! assert_eq!(thirty, vec![alice]);
//! ```

#![warn(clippy::all)]

pub mod codec;
pub mod graph;
pub mod index;
pub mod persistence;

// Re-export main types for convenience
pub use graph::{
    Direction, Edge, EdgeId, Element, ElementId, ElementKind, ErrorKind, Features, Graph,
    GraphConfig, GraphError, GraphResult, PropertyValue, Vertex, VertexId,
};
pub use index::{Index, IndexRef};
pub use persistence::{
    KvStore, KvTransaction, MemoryStore, PersistentStorage, StorageConfig, StoreError, StoreResult,
};
