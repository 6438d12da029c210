//! Core type definitions for the graph layer

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a vertex
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct VertexId(String);

impl VertexId {
    pub fn new(id: impl Into<String>) -> Self {
        VertexId(id.into())
    }

    /// Fresh random identifier
    pub fn generate() -> Self {
        VertexId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VertexId {
    fn from(id: String) -> Self {
        VertexId(id)
    }
}

impl From<&str> for VertexId {
    fn from(id: &str) -> Self {
        VertexId(id.to_string())
    }
}

/// Unique identifier for an edge
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct EdgeId(String);

impl EdgeId {
    pub fn new(id: impl Into<String>) -> Self {
        EdgeId(id.into())
    }

    /// Fresh random identifier
    pub fn generate() -> Self {
        EdgeId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for EdgeId {
    fn from(id: String) -> Self {
        EdgeId(id)
    }
}

impl From<&str> for EdgeId {
    fn from(id: &str) -> Self {
        EdgeId(id.to_string())
    }
}

/// The two element types every index is scoped to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub enum ElementKind {
    Vertex,
    Edge,
}

impl ElementKind {
    /// Short tag used inside keys
    pub fn tag(&self) -> &'static str {
        match self {
            ElementKind::Vertex => "v",
            ElementKind::Edge => "e",
        }
    }

    /// Type name recorded in named-index declaration rows
    pub fn type_name(&self) -> &'static str {
        match self {
            ElementKind::Vertex => "Vertex",
            ElementKind::Edge => "Edge",
        }
    }

    pub fn from_type_name(name: &[u8]) -> Option<Self> {
        match name {
            b"Vertex" => Some(ElementKind::Vertex),
            b"Edge" => Some(ElementKind::Edge),
            _ => None,
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Identifier of either element type, as returned by index lookups
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementId {
    Vertex(VertexId),
    Edge(EdgeId),
}

impl ElementId {
    pub(crate) fn new(kind: ElementKind, id: impl Into<String>) -> Self {
        match kind {
            ElementKind::Vertex => ElementId::Vertex(VertexId::new(id)),
            ElementKind::Edge => ElementId::Edge(EdgeId::new(id)),
        }
    }

    pub fn kind(&self) -> ElementKind {
        match self {
            ElementId::Vertex(_) => ElementKind::Vertex,
            ElementId::Edge(_) => ElementKind::Edge,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ElementId::Vertex(id) => id.as_str(),
            ElementId::Edge(id) => id.as_str(),
        }
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind(), self.as_str())
    }
}

/// Edge direction relative to a vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Edges leaving the vertex
    Out,
    /// Edges arriving at the vertex
    In,
    Both,
}

impl Direction {
    /// The concrete directions to scan
    pub fn expand(&self) -> &'static [Direction] {
        match self {
            Direction::Out => &[Direction::Out],
            Direction::In => &[Direction::In],
            Direction::Both => &[Direction::Out, Direction::In],
        }
    }
}
