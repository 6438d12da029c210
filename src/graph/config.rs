//! Graph handle configuration

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Configuration for one open graph handle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Graph name; every key of the graph lives under `(0, name)`
    pub name: String,
    /// Remove a vertex and all of its incident edges in a single transaction.
    /// When false, each incident edge is removed in its own transaction
    /// before the vertex rows are cleared.
    pub atomic_vertex_removal: bool,
}

impl GraphConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_atomic_vertex_removal(mut self, atomic: bool) -> Self {
        self.atomic_vertex_removal = atomic;
        self
    }

    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            name: Uuid::new_v4().to_string(),
            atomic_vertex_removal: false,
        }
    }
}
