//! Edge handle for the property graph

use super::store::{GraphError, GraphResult};
use super::types::{Direction, EdgeId, ElementKind, VertexId};
use super::vertex::{Element, Vertex};
use serde::{Deserialize, Serialize};

/// A directed, labelled edge
///
/// Edges have:
/// - A unique ID
/// - An out vertex (the edge leaves it) and an in vertex (the edge arrives at it)
/// - A label fixed at creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    /// Unique identifier for this edge
    pub id: EdgeId,

    /// Relationship label (e.g., "knows")
    pub label: String,

    /// Vertex the edge goes FROM
    pub out_vertex: VertexId,

    /// Vertex the edge goes TO
    pub in_vertex: VertexId,
}

impl Edge {
    pub fn new(
        id: impl Into<EdgeId>,
        out_vertex: impl Into<VertexId>,
        in_vertex: impl Into<VertexId>,
        label: impl Into<String>,
    ) -> Self {
        Edge {
            id: id.into(),
            label: label.into(),
            out_vertex: out_vertex.into(),
            in_vertex: in_vertex.into(),
        }
    }

    pub fn id(&self) -> &EdgeId {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Endpoint in the given direction; `Both` has no single answer
    pub fn vertex(&self, direction: Direction) -> GraphResult<Vertex> {
        match direction {
            Direction::Out => Ok(Vertex::new(self.out_vertex.clone())),
            Direction::In => Ok(Vertex::new(self.in_vertex.clone())),
            Direction::Both => Err(GraphError::InvalidDirection(direction)),
        }
    }

    pub fn is_self_loop(&self) -> bool {
        self.out_vertex == self.in_vertex
    }

    /// Vertex reached by following this edge in `direction`
    pub(crate) fn far_end(&self, direction: Direction) -> &VertexId {
        match direction {
            Direction::In => &self.out_vertex,
            Direction::Out | Direction::Both => &self.in_vertex,
        }
    }
}

impl PartialEq for Edge {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Edge {}

impl std::hash::Hash for Edge {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Element for Edge {
    const KIND: ElementKind = ElementKind::Edge;

    fn element_id(&self) -> &str {
        self.id.as_str()
    }
}
