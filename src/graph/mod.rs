//! Property graph layer
//!
//! This module implements the property graph data model on top of an
//! ordered transactional key-value store:
//! - Vertices and directed, labelled edges with user or generated ids
//! - Scalar properties on both element types
//! - Adjacency scans in either direction, filtered by label

pub mod config;
pub mod edge;
pub mod property;
pub mod store;
pub mod types;
pub mod vertex;

// Re-export main types
pub use config::GraphConfig;
pub use edge::Edge;
pub use property::PropertyValue;
pub use store::{ErrorKind, Features, Graph, GraphError, GraphResult};
pub use types::{Direction, EdgeId, ElementId, ElementKind, VertexId};
pub use vertex::{Element, Vertex};
