//! Vertex handle and the element abstraction shared with edges

use super::types::{ElementId, ElementKind, VertexId};
use serde::{Deserialize, Serialize};

/// Anything that can carry properties and be indexed
///
/// The associated `KIND` selects the key family (`"v"` or `"e"`) for every
/// property, key-index and reverse-index row of the element.
pub trait Element {
    const KIND: ElementKind;

    /// Raw identifier used inside keys
    fn element_id(&self) -> &str;

    fn to_element_id(&self) -> ElementId {
        ElementId::new(Self::KIND, self.element_id())
    }
}

/// A vertex in the property graph
///
/// The handle holds only the identifier; properties and adjacency are read
/// from the store through the owning `Graph`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Vertex {
    /// Unique identifier for this vertex
    pub id: VertexId,
}

impl Vertex {
    pub fn new(id: impl Into<VertexId>) -> Self {
        Vertex { id: id.into() }
    }

    pub fn id(&self) -> &VertexId {
        &self.id
    }
}

impl Element for Vertex {
    const KIND: ElementKind = ElementKind::Vertex;

    fn element_id(&self) -> &str {
        self.id.as_str()
    }
}
