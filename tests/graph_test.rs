//! Integration tests for the entity store
//!
//! Verifies vertex/edge lifecycle, adjacency, and that removal leaves no rows
//! behind that mention the removed element.

use kvgraph::codec::KeyPart;
use kvgraph::{
    Direction, ElementKind, Graph, GraphConfig, GraphError, KvStore, MemoryStore, PropertyValue,
    Vertex,
};
use std::collections::BTreeSet;
use std::sync::Arc;

fn open(store: &Arc<MemoryStore>, config: GraphConfig) -> Graph {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    Graph::open(store.clone(), config).unwrap()
}

/// Rows of the graph whose key tuple contains `id` anywhere
fn rows_mentioning(store: &MemoryStore, graph: &Graph, id: &str) -> usize {
    let mut txn = store.begin().unwrap();
    txn.scan_prefix(graph.keys().namespace())
        .unwrap()
        .into_iter()
        .filter(|(key, _)| {
            let tuple = graph.keys().decode(key).unwrap();
            tuple.parts().contains(&KeyPart::from(id))
        })
        .count()
}

fn edge_ids(edges: &[kvgraph::Edge]) -> Vec<&str> {
    edges.iter().map(|e| e.id.as_str()).collect()
}

#[test]
fn test_knows_scenario() {
    let store = Arc::new(MemoryStore::new());
    let graph = open(&store, GraphConfig::new("G"));

    let v1 = graph.add_vertex(Some("a")).unwrap();
    let v2 = graph.add_vertex(Some("b")).unwrap();
    let e1 = graph.add_edge(None, &v1, &v2, "knows").unwrap();

    assert_eq!(graph.get_edges().unwrap(), vec![e1.clone()]);
    assert_eq!(
        edge_ids(&graph.vertex_edges(&v1, Direction::Out, &[]).unwrap()),
        vec![e1.id.as_str()]
    );
    assert_eq!(
        edge_ids(&graph.vertex_edges(&v2, Direction::In, &[]).unwrap()),
        vec![e1.id.as_str()]
    );
    assert!(graph.vertex_edges(&v1, Direction::In, &[]).unwrap().is_empty());

    graph.remove_vertex(&v1).unwrap();
    assert!(graph.get_edges().unwrap().is_empty());
    assert_eq!(graph.get_vertex("a").unwrap(), None);
    assert!(graph.vertex_edges(&v2, Direction::In, &[]).unwrap().is_empty());
    assert_eq!(graph.get_vertices().unwrap(), vec![v2]);
}

#[test]
fn test_edge_endpoints_and_adjacency() {
    let store = Arc::new(MemoryStore::new());
    let graph = open(&store, GraphConfig::new("g"));

    let a = graph.add_vertex(Some("a")).unwrap();
    let b = graph.add_vertex(Some("b")).unwrap();
    let c = graph.add_vertex(Some("c")).unwrap();
    let ab = graph.add_edge(Some("ab"), &a, &b, "knows").unwrap();
    let ac = graph.add_edge(Some("ac"), &a, &c, "likes").unwrap();
    // Parallel edge with the same label
    let ab2 = graph.add_edge(Some("ab2"), &a, &b, "knows").unwrap();

    assert_eq!(ab.out_vertex, a.id);
    assert_eq!(ab.in_vertex, b.id);
    assert_eq!(ab.vertex(Direction::In).unwrap(), b);

    let out = graph.vertex_edges(&a, Direction::Out, &[]).unwrap();
    assert_eq!(edge_ids(&out), vec!["ab", "ab2", "ac"]);

    let knows = graph.vertex_edges(&a, Direction::Out, &["knows"]).unwrap();
    assert_eq!(edge_ids(&knows), vec!["ab", "ab2"]);

    let neighbours = graph.adjacent_vertices(&a, Direction::Out, &["likes"]).unwrap();
    assert_eq!(neighbours, vec![c.clone()]);

    let back = graph.adjacent_vertices(&b, Direction::In, &[]).unwrap();
    assert_eq!(back, vec![a.clone(), a.clone()]);

    graph.remove_edge(&ab2).unwrap();
    assert_eq!(graph.get_edges().unwrap(), vec![ab, ac]);
    assert!(matches!(
        graph.remove_edge(&ab2),
        Err(GraphError::EdgeNotFound(_))
    ));
}

#[test]
fn test_self_loop_listed_once_per_direction() {
    let store = Arc::new(MemoryStore::new());
    let graph = open(&store, GraphConfig::new("g"));

    let a = graph.add_vertex(Some("a")).unwrap();
    let e = graph.add_edge(Some("loop"), &a, &a, "self").unwrap();
    assert!(e.is_self_loop());

    assert_eq!(graph.vertex_edges(&a, Direction::Out, &[]).unwrap().len(), 1);
    assert_eq!(graph.vertex_edges(&a, Direction::In, &[]).unwrap().len(), 1);
    assert_eq!(graph.vertex_edges(&a, Direction::Both, &[]).unwrap().len(), 2);

    graph.remove_vertex(&a).unwrap();
    assert!(store.is_empty());
}

#[test]
fn test_vertex_removal_leaves_no_rows() {
    let store = Arc::new(MemoryStore::new());
    let graph = open(&store, GraphConfig::new("g"));

    graph.create_key_index("name", ElementKind::Vertex).unwrap();
    graph.create_key_index("weight", ElementKind::Edge).unwrap();
    let by_city = graph.create_index("byCity", ElementKind::Vertex).unwrap();

    let a = graph.add_vertex(Some("a")).unwrap();
    let b = graph.add_vertex(Some("b")).unwrap();
    graph.set_property(&a, "name", "alice").unwrap();
    graph.set_property(&a, "age", 30).unwrap();
    by_city.put("city", "paris", &a).unwrap();

    let ab = graph.add_edge(Some("ab"), &a, &b, "knows").unwrap();
    let ba = graph.add_edge(Some("ba"), &b, &a, "knows").unwrap();
    graph.set_property(&ab, "weight", 0.5).unwrap();
    graph.set_property(&ba, "weight", 0.7).unwrap();

    assert!(rows_mentioning(&store, &graph, "a") > 0);
    graph.remove_vertex(&a).unwrap();

    assert_eq!(rows_mentioning(&store, &graph, "a"), 0);
    assert_eq!(rows_mentioning(&store, &graph, "ab"), 0);
    assert_eq!(rows_mentioning(&store, &graph, "ba"), 0);
    assert_eq!(by_city.count("city", "paris").unwrap(), 0);
    assert!(graph.get_vertices_by_property("name", "alice").unwrap().is_empty());
    assert!(graph.get_edges_by_property("weight", 0.5).unwrap().is_empty());
    assert_eq!(graph.get_vertex("b").unwrap(), Some(b));
}

#[test]
fn test_ids_sharing_bytes_stay_separate() {
    let store = Arc::new(MemoryStore::new());
    let graph = open(&store, GraphConfig::new("g"));

    let a = graph.add_vertex(Some("a")).unwrap();
    let nested = graph.add_vertex(Some("a\0b")).unwrap();
    let c = graph.add_vertex(Some("c")).unwrap();
    graph.add_edge(Some("e1"), &nested, &c, "knows").unwrap();
    graph.set_property(&nested, "name", "x").unwrap();

    assert!(graph.vertex_edges(&a, Direction::Both, &[]).unwrap().is_empty());
    assert!(graph.properties(&a).unwrap().is_empty());

    graph.remove_vertex(&a).unwrap();
    assert_eq!(graph.get_vertices().unwrap(), vec![nested.clone(), c]);
    assert_eq!(
        edge_ids(&graph.vertex_edges(&nested, Direction::Out, &[]).unwrap()),
        vec!["e1"]
    );
    assert_eq!(
        graph.get_property(&nested, "name").unwrap(),
        Some(PropertyValue::from("x"))
    );
}

#[test]
fn test_add_edge_conflicts_with_concurrent_removal() {
    let store = Arc::new(MemoryStore::new());
    let graph = open(&store, GraphConfig::new("g"));
    let a = graph.add_vertex(Some("a")).unwrap();
    let b = graph.add_vertex(Some("b")).unwrap();

    // A removal that has read the vertex row but not yet committed
    let mut removal = store.begin().unwrap();
    assert!(removal.get(&graph.keys().vertex("a")).unwrap().is_some());
    removal.clear(&graph.keys().vertex("a")).unwrap();

    graph.add_edge(Some("ab"), &a, &b, "knows").unwrap();

    assert!(removal.commit().unwrap_err().is_conflict());
    assert_eq!(graph.get_vertex("a").unwrap(), Some(a));
}

#[test]
fn test_atomic_vertex_removal() {
    let store = Arc::new(MemoryStore::new());
    let graph = open(
        &store,
        GraphConfig::new("g").with_atomic_vertex_removal(true),
    );

    let hub = graph.add_vertex(Some("hub")).unwrap();
    for i in 0..5 {
        let spoke = graph.add_vertex(Some(format!("s{}", i).as_str())).unwrap();
        graph.add_edge(None, &hub, &spoke, "link").unwrap();
        graph.add_edge(None, &spoke, &hub, "link").unwrap();
    }
    assert_eq!(graph.get_edges().unwrap().len(), 10);

    graph.remove_vertex(&hub).unwrap();
    assert!(graph.get_edges().unwrap().is_empty());
    assert_eq!(graph.get_vertices().unwrap().len(), 5);
    assert_eq!(rows_mentioning(&store, &graph, "hub"), 0);
}

#[test]
fn test_remove_missing_vertex_fails() {
    let store = Arc::new(MemoryStore::new());
    let graph = open(&store, GraphConfig::new("g"));

    let err = graph.remove_vertex(&Vertex::new("ghost")).unwrap_err();
    assert!(matches!(err, GraphError::VertexNotFound(_)));
    assert_eq!(err.kind(), kvgraph::ErrorKind::InvalidArgument);
}

#[test]
fn test_graphs_share_a_store() {
    let store = Arc::new(MemoryStore::new());
    let left = open(&store, GraphConfig::new("left"));
    let right = open(&store, GraphConfig::new("left2"));

    let a = left.add_vertex(Some("a")).unwrap();
    right.add_vertex(Some("a")).unwrap();
    right.add_vertex(Some("b")).unwrap();
    left.set_property(&a, "name", "alice").unwrap();
    right.create_key_index("name", ElementKind::Vertex).unwrap();

    assert_eq!(left.get_vertices().unwrap().len(), 1);
    assert_eq!(right.get_vertices().unwrap().len(), 2);
    assert!(left.get_indexed_keys(ElementKind::Vertex).is_empty());
    assert_eq!(right.get_property(&a, "name").unwrap(), None);

    left.purge().unwrap();
    assert!(left.get_vertices().unwrap().is_empty());
    assert_eq!(right.get_vertices().unwrap().len(), 2);
    assert!(right.has_key_index("name", ElementKind::Vertex));
}

#[test]
fn test_purge_resets_key_index_cache() {
    let store = Arc::new(MemoryStore::new());
    let graph = open(&store, GraphConfig::new("g"));

    graph.create_key_index("age", ElementKind::Vertex).unwrap();
    let a = graph.add_vertex(Some("a")).unwrap();
    graph.set_property(&a, "age", 1).unwrap();

    graph.purge().unwrap();
    assert!(store.is_empty());
    assert_eq!(graph.get_indexed_keys(ElementKind::Vertex), BTreeSet::new());

    // The index can be declared again after a purge
    graph.create_key_index("age", ElementKind::Vertex).unwrap();
}

#[test]
fn test_config_from_json() {
    let store = Arc::new(MemoryStore::new());
    let config = GraphConfig::from_json(r#"{"name": "social"}"#).unwrap();
    let graph = open(&store, config);
    assert_eq!(graph.to_string(), "kvgraph[name=social]");
    assert!(!graph.config().atomic_vertex_removal);
    assert!(graph.features().supports_self_loops);
}
