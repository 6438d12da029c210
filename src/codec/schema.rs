//! Key schema for one graph namespace
//!
//! Every row lives under `(0, graph name)`. The table below is the whole
//! entity model; every other module reads and writes rows only through these
//! builders.
//!
//! | Row                 | Key suffix after the namespace                  | Value          |
//! |---------------------|-------------------------------------------------|----------------|
//! | vertex              | `("v", vid)`                                    | vid            |
//! | edge                | `("e", eid)`                                    | label          |
//! | edge endpoint       | `("in"\|"out", "e", eid)`                       | vid            |
//! | adjacency           | `("in"\|"out", "v", vid, eid)`                  | empty          |
//! | property            | `("p", "v"\|"e", id, key)`                      | bincode value  |
//! | named index decl    | `("i", name)`                                   | element type   |
//! | named index entry   | `("i", name, key, value, id)`                   | empty          |
//! | key index decl      | `("ki", "v"\|"e", key)`                         | empty          |
//! | key index entry     | `("kid", "v"\|"e", key, value, id)`             | empty          |
//! | reverse (named)     | `("ri", "v"\|"e", id, "i", name, key, value)`   | empty          |
//! | reverse (key index) | `("ri", "v"\|"e", id, "kid", key, value)`       | empty          |

use super::tuple::{covers, CodecError, CodecResult, KeyPart, Tuple};
use crate::graph::types::{Direction, ElementKind};

pub(crate) const VERTEX: &str = "v";
pub(crate) const EDGE: &str = "e";
pub(crate) const IN: &str = "in";
pub(crate) const OUT: &str = "out";
pub(crate) const PROPERTY: &str = "p";
pub(crate) const INDEX: &str = "i";
pub(crate) const KEY_INDEX: &str = "ki";
pub(crate) const KEY_INDEX_DATA: &str = "kid";
pub(crate) const REVERSE_INDEX: &str = "ri";

/// Namespace tag that leads every graph prefix
const GRAPH_TAG: i64 = 0;

/// Key builder bound to a single graph name
#[derive(Debug, Clone)]
pub struct KeySpace {
    name: String,
    prefix: Vec<u8>,
}

impl KeySpace {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let prefix = Tuple::new().add(GRAPH_TAG).add(name.as_str()).pack();
        Self { name, prefix }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Prefix of every row belonging to this graph
    pub fn namespace(&self) -> &[u8] {
        &self.prefix
    }

    fn key(&self, suffix: Tuple) -> Vec<u8> {
        let mut key = self.prefix.clone();
        key.extend_from_slice(&suffix.pack());
        key
    }

    /// Decode the tuple that follows the namespace prefix
    pub fn decode(&self, key: &[u8]) -> CodecResult<Tuple> {
        if !covers(&self.prefix, key) {
            return Err(CodecError::ForeignKey(self.name.clone()));
        }
        Tuple::unpack(&key[self.prefix.len()..])
    }

    // Entity rows

    pub fn vertex(&self, id: &str) -> Vec<u8> {
        self.key(Tuple::new().add(VERTEX).add(id))
    }

    pub fn vertices(&self) -> Vec<u8> {
        self.key(Tuple::new().add(VERTEX))
    }

    pub fn edge(&self, id: &str) -> Vec<u8> {
        self.key(Tuple::new().add(EDGE).add(id))
    }

    pub fn edges(&self) -> Vec<u8> {
        self.key(Tuple::new().add(EDGE))
    }

    /// Endpoint row of an edge; `Direction::Both` has no row and maps to `Out`
    pub fn endpoint(&self, direction: Direction, edge_id: &str) -> Vec<u8> {
        self.key(Tuple::new().add(direction_tag(direction)).add(EDGE).add(edge_id))
    }

    pub fn endpoints(&self, direction: Direction) -> Vec<u8> {
        self.key(Tuple::new().add(direction_tag(direction)).add(EDGE))
    }

    pub fn adjacency(&self, direction: Direction, vertex_id: &str, edge_id: &str) -> Vec<u8> {
        self.key(
            Tuple::new()
                .add(direction_tag(direction))
                .add(VERTEX)
                .add(vertex_id)
                .add(edge_id),
        )
    }

    pub fn adjacencies(&self, direction: Direction, vertex_id: &str) -> Vec<u8> {
        self.key(
            Tuple::new()
                .add(direction_tag(direction))
                .add(VERTEX)
                .add(vertex_id),
        )
    }

    pub fn property(&self, kind: ElementKind, id: &str, key: &str) -> Vec<u8> {
        self.key(Tuple::new().add(PROPERTY).add(kind.tag()).add(id).add(key))
    }

    pub fn properties(&self, kind: ElementKind, id: &str) -> Vec<u8> {
        self.key(Tuple::new().add(PROPERTY).add(kind.tag()).add(id))
    }

    // Named indices

    pub fn index_declaration(&self, name: &str) -> Vec<u8> {
        self.key(Tuple::new().add(INDEX).add(name))
    }

    /// Covers every declaration row and every entry row of every named index
    pub fn index_declarations(&self) -> Vec<u8> {
        self.key(Tuple::new().add(INDEX))
    }

    pub fn index_entry(&self, name: &str, key: &str, value: &KeyPart, id: &str) -> Vec<u8> {
        self.key(
            Tuple::new()
                .add(INDEX)
                .add(name)
                .add(key)
                .add(value.clone())
                .add(id),
        )
    }

    pub fn index_entries(&self, name: &str, key: &str, value: &KeyPart) -> Vec<u8> {
        self.key(Tuple::new().add(INDEX).add(name).add(key).add(value.clone()))
    }

    // Key indices

    pub fn key_index_declaration(&self, kind: ElementKind, key: &str) -> Vec<u8> {
        self.key(Tuple::new().add(KEY_INDEX).add(kind.tag()).add(key))
    }

    pub fn key_index_declarations(&self, kind: ElementKind) -> Vec<u8> {
        self.key(Tuple::new().add(KEY_INDEX).add(kind.tag()))
    }

    pub fn key_index_entry(&self, kind: ElementKind, key: &str, value: &KeyPart, id: &str) -> Vec<u8> {
        self.key(
            Tuple::new()
                .add(KEY_INDEX_DATA)
                .add(kind.tag())
                .add(key)
                .add(value.clone())
                .add(id),
        )
    }

    pub fn key_index_value(&self, kind: ElementKind, key: &str, value: &KeyPart) -> Vec<u8> {
        self.key(
            Tuple::new()
                .add(KEY_INDEX_DATA)
                .add(kind.tag())
                .add(key)
                .add(value.clone()),
        )
    }

    pub fn key_index_entries(&self, kind: ElementKind, key: &str) -> Vec<u8> {
        self.key(Tuple::new().add(KEY_INDEX_DATA).add(kind.tag()).add(key))
    }

    // Reverse-index ledger

    pub fn reverse_named(
        &self,
        kind: ElementKind,
        id: &str,
        name: &str,
        key: &str,
        value: &KeyPart,
    ) -> Vec<u8> {
        self.key(
            Tuple::new()
                .add(REVERSE_INDEX)
                .add(kind.tag())
                .add(id)
                .add(INDEX)
                .add(name)
                .add(key)
                .add(value.clone()),
        )
    }

    pub fn reverse_key(&self, kind: ElementKind, id: &str, key: &str, value: &KeyPart) -> Vec<u8> {
        self.key(
            Tuple::new()
                .add(REVERSE_INDEX)
                .add(kind.tag())
                .add(id)
                .add(KEY_INDEX_DATA)
                .add(key)
                .add(value.clone()),
        )
    }

    pub fn reverse_entries(&self, kind: ElementKind, id: &str) -> Vec<u8> {
        self.key(Tuple::new().add(REVERSE_INDEX).add(kind.tag()).add(id))
    }
}

fn direction_tag(direction: Direction) -> &'static str {
    match direction {
        Direction::In => IN,
        Direction::Out | Direction::Both => OUT,
    }
}
