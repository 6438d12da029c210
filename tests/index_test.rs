//! Integration tests for named indices and key indices

use kvgraph::{
    ElementId, ElementKind, Graph, GraphConfig, GraphError, MemoryStore, PropertyValue, Vertex,
};
use std::collections::BTreeSet;
use std::sync::Arc;

fn graph() -> (Arc<MemoryStore>, Graph) {
    let store = Arc::new(MemoryStore::new());
    let graph = Graph::open(store.clone(), GraphConfig::new("idx")).unwrap();
    (store, graph)
}

fn ids(vertices: &[Vertex]) -> BTreeSet<String> {
    vertices.iter().map(|v| v.id.as_str().to_string()).collect()
}

#[test]
fn test_named_index_round_trip() {
    let (_store, graph) = graph();
    let v1 = graph.add_vertex(Some("v1")).unwrap();

    let by_name = graph.create_index("byName", ElementKind::Vertex).unwrap();
    by_name.put("name", "alice", &v1).unwrap();
    assert_eq!(
        by_name.get("name", "alice").unwrap(),
        vec![ElementId::Vertex(v1.id.clone())]
    );
    assert!(by_name.get("name", "bob").unwrap().is_empty());

    by_name.remove("name", "alice", &v1).unwrap();
    assert!(by_name.get("name", "alice").unwrap().is_empty());
    // Removing again is a no-op
    by_name.remove("name", "alice", &v1).unwrap();
}

#[test]
fn test_named_index_declarations() {
    let (_store, graph) = graph();

    graph.create_index("byName", ElementKind::Vertex).unwrap();
    graph.create_index("byWeight", ElementKind::Edge).unwrap();

    let err = graph.create_index("byName", ElementKind::Edge).unwrap_err();
    assert!(matches!(err, GraphError::IndexAlreadyExists(_)));
    assert_eq!(err.kind(), kvgraph::ErrorKind::InvalidArgument);

    assert!(graph.has_index("byName").unwrap());
    assert!(graph.get_index("byName", ElementKind::Vertex).unwrap().is_some());
    assert!(graph.get_index("byName", ElementKind::Edge).unwrap().is_none());
    assert!(graph.get_index("missing", ElementKind::Vertex).unwrap().is_none());

    let indices = graph.get_indices().unwrap();
    let names: Vec<(&str, ElementKind)> = indices.iter().map(|i| (i.name(), i.kind())).collect();
    assert_eq!(
        names,
        vec![("byName", ElementKind::Vertex), ("byWeight", ElementKind::Edge)]
    );
}

#[test]
fn test_named_index_type_checks() {
    let (_store, graph) = graph();
    let a = graph.add_vertex(Some("a")).unwrap();
    let b = graph.add_vertex(Some("b")).unwrap();
    let e = graph.add_edge(Some("e"), &a, &b, "knows").unwrap();

    let by_name = graph.create_index("byName", ElementKind::Vertex).unwrap();
    assert!(matches!(
        by_name.put("name", "x", &e),
        Err(GraphError::IndexTypeMismatch { .. })
    ));

    let by_weight = graph.create_index("byWeight", ElementKind::Edge).unwrap();
    by_weight.put("weight", 1.5, &e).unwrap();
    assert_eq!(by_weight.count("weight", 1.5).unwrap(), 1);
}

#[test]
fn test_put_into_dropped_index_fails() {
    let (_store, graph) = graph();
    let a = graph.add_vertex(Some("a")).unwrap();

    let idx = graph.create_index("tmp", ElementKind::Vertex).unwrap();
    graph.drop_index("tmp").unwrap();
    assert!(matches!(
        idx.put("k", "v", &a),
        Err(GraphError::IndexNotFound(_))
    ));
}

#[test]
fn test_drop_index_leaves_stale_ledger_tolerated() {
    let (store, graph) = graph();
    let a = graph.add_vertex(Some("a")).unwrap();

    let idx = graph.create_index("byName", ElementKind::Vertex).unwrap();
    idx.put("name", "alice", &a).unwrap();
    graph.drop_index("byName").unwrap();
    assert!(!graph.has_index("byName").unwrap());

    // The ledger still points at the dropped entry; removal skips it
    graph.remove_vertex(&a).unwrap();
    assert!(store.is_empty());

    // A recreated index of the same name starts empty
    let idx = graph.create_index("byName", ElementKind::Vertex).unwrap();
    assert_eq!(idx.count("name", "alice").unwrap(), 0);
}

#[test]
fn test_indexed_and_scan_lookups_agree() {
    let (_store, graph) = graph();
    let values: Vec<PropertyValue> = vec![
        "red".into(),
        42i64.into(),
        (-7i64).into(),
        2.5f64.into(),
        true.into(),
    ];

    for i in 0..20 {
        let v = graph.add_vertex(Some(format!("v{:02}", i).as_str())).unwrap();
        graph
            .set_property(&v, "attr", values[i % values.len()].clone())
            .unwrap();
    }

    let scanned: Vec<BTreeSet<String>> = values
        .iter()
        .map(|value| ids(&graph.get_vertices_by_property("attr", value.clone()).unwrap()))
        .collect();

    graph.create_key_index("attr", ElementKind::Vertex).unwrap();
    for (value, expected) in values.iter().zip(&scanned) {
        let indexed = ids(&graph.get_vertices_by_property("attr", value.clone()).unwrap());
        assert_eq!(&indexed, expected, "lookup of {}", value);
        assert_eq!(indexed.len(), 4);
    }

    // Integer and float values with the same magnitude stay distinct
    assert!(graph.get_vertices_by_property("attr", 42.0).unwrap().is_empty());
}

#[test]
fn test_values_sharing_bytes_stay_separate() {
    let (_store, graph) = graph();
    let short = graph.add_vertex(Some("short")).unwrap();
    let long = graph.add_vertex(Some("long")).unwrap();
    graph.set_property(&short, "name", "x").unwrap();
    graph.set_property(&long, "name", "x\0y").unwrap();

    let scanned = graph.get_vertices_by_property("name", "x").unwrap();
    assert_eq!(scanned, vec![short.clone()]);

    graph.create_key_index("name", ElementKind::Vertex).unwrap();
    assert_eq!(graph.get_vertices_by_property("name", "x").unwrap(), scanned);
    assert_eq!(
        graph.get_vertices_by_property("name", "x\0y").unwrap(),
        vec![long.clone()]
    );

    let by_name = graph.create_index("byName", ElementKind::Vertex).unwrap();
    by_name.put("name", "x", &short).unwrap();
    by_name.put("name", "x\0y", &long).unwrap();
    assert_eq!(by_name.count("name", "x").unwrap(), 1);

    // Removing one element leaves the other's entries in place
    graph.remove_vertex(&short).unwrap();
    assert_eq!(by_name.count("name", "x\0y").unwrap(), 1);
    assert_eq!(
        graph.get_vertices_by_property("name", "x\0y").unwrap(),
        vec![long]
    );
}

#[test]
fn test_key_index_backfill() {
    let (_store, graph) = graph();
    let a = graph.add_vertex(Some("a")).unwrap();
    let b = graph.add_vertex(Some("b")).unwrap();
    graph.add_vertex(Some("c")).unwrap();
    graph.set_property(&a, "age", 30).unwrap();
    graph.set_property(&b, "age", 30).unwrap();

    graph.create_key_index("age", ElementKind::Vertex).unwrap();
    assert!(graph.has_key_index("age", ElementKind::Vertex));
    assert!(!graph.has_key_index("age", ElementKind::Edge));

    let found = graph.get_vertices_by_property("age", 30).unwrap();
    assert_eq!(found, vec![a, b]);
}

#[test]
fn test_key_index_follows_property_writes() {
    let (_store, graph) = graph();
    graph.create_key_index("age", ElementKind::Vertex).unwrap();
    let a = graph.add_vertex(Some("a")).unwrap();

    graph.set_property(&a, "age", 30).unwrap();
    assert_eq!(graph.get_vertices_by_property("age", 30).unwrap().len(), 1);

    graph.set_property(&a, "age", 31).unwrap();
    assert!(graph.get_vertices_by_property("age", 30).unwrap().is_empty());
    assert_eq!(graph.get_vertices_by_property("age", 31).unwrap(), vec![a.clone()]);

    graph.remove_property(&a, "age").unwrap();
    assert!(graph.get_vertices_by_property("age", 31).unwrap().is_empty());
}

#[test]
fn test_edge_key_index() {
    let (_store, graph) = graph();
    let a = graph.add_vertex(Some("a")).unwrap();
    let b = graph.add_vertex(Some("b")).unwrap();
    let heavy = graph.add_edge(Some("heavy"), &a, &b, "road").unwrap();
    let light = graph.add_edge(Some("light"), &a, &b, "road").unwrap();
    graph.set_property(&heavy, "weight", 10).unwrap();
    graph.set_property(&light, "weight", 1).unwrap();

    graph.create_key_index("weight", ElementKind::Edge).unwrap();
    assert_eq!(graph.get_edges_by_property("weight", 10).unwrap(), vec![heavy.clone()]);

    graph.remove_edge(&heavy).unwrap();
    assert!(graph.get_edges_by_property("weight", 10).unwrap().is_empty());
    assert_eq!(graph.get_edges_by_property("weight", 1).unwrap(), vec![light]);
}

#[test]
fn test_create_key_index_twice_fails() {
    let (_store, graph) = graph();
    graph.create_key_index("age", ElementKind::Vertex).unwrap();

    let err = graph.create_key_index("age", ElementKind::Vertex).unwrap_err();
    assert!(matches!(err, GraphError::KeyIndexAlreadyExists { .. }));
    assert_eq!(err.kind(), kvgraph::ErrorKind::InvalidArgument);

    // The same key on the other element type is independent
    graph.create_key_index("age", ElementKind::Edge).unwrap();
}

#[test]
fn test_create_key_index_declared_by_another_handle() {
    let store = Arc::new(MemoryStore::new());
    let first = Graph::open(store.clone(), GraphConfig::new("shared")).unwrap();
    let second = Graph::open(store.clone(), GraphConfig::new("shared")).unwrap();

    first.create_key_index("age", ElementKind::Vertex).unwrap();
    // The second handle's cache is stale but the declaration row decides
    assert!(!second.has_key_index("age", ElementKind::Vertex));
    assert!(second.create_key_index("age", ElementKind::Vertex).is_err());

    // A fresh handle loads the declaration on open
    let third = Graph::open(store, GraphConfig::new("shared")).unwrap();
    assert!(third.has_key_index("age", ElementKind::Vertex));
}

#[test]
fn test_drop_key_index() {
    let (store, graph) = graph();
    let a = graph.add_vertex(Some("a")).unwrap();
    graph.set_property(&a, "age", 30).unwrap();
    let rows_before = store.len();

    graph.create_key_index("age", ElementKind::Vertex).unwrap();
    assert!(store.len() > rows_before);

    graph.drop_key_index("age", ElementKind::Vertex).unwrap();
    assert!(graph.get_indexed_keys(ElementKind::Vertex).is_empty());
    // Declaration, entry and ledger rows are gone
    assert_eq!(store.len(), rows_before);
    // Lookups fall back to a scan
    assert_eq!(graph.get_vertices_by_property("age", 30).unwrap(), vec![a]);
}

#[test]
fn test_drop_never_created_key_index_is_noop() {
    let (_store, graph) = graph();
    graph.create_key_index("name", ElementKind::Vertex).unwrap();

    graph.drop_key_index("missing", ElementKind::Vertex).unwrap();
    graph.drop_key_index("name", ElementKind::Edge).unwrap();

    let expected: BTreeSet<String> = ["name".to_string()].into_iter().collect();
    assert_eq!(graph.get_indexed_keys(ElementKind::Vertex), expected);
    assert!(graph.get_indexed_keys(ElementKind::Edge).is_empty());
}

#[test]
fn test_drop_of_undeclared_key_leaves_cache_untouched() {
    let store = Arc::new(MemoryStore::new());
    let first = Graph::open(store.clone(), GraphConfig::new("shared")).unwrap();
    first.create_key_index("age", ElementKind::Vertex).unwrap();
    let second = Graph::open(store, GraphConfig::new("shared")).unwrap();

    first.drop_key_index("age", ElementKind::Vertex).unwrap();
    // Nothing is declared any more, so the second handle's drop changes nothing
    second.drop_key_index("age", ElementKind::Vertex).unwrap();
    assert!(second.has_key_index("age", ElementKind::Vertex));
    assert!(!first.has_key_index("age", ElementKind::Vertex));
}

#[test]
fn test_reserved_key_cannot_be_indexed() {
    let (_store, graph) = graph();
    assert!(matches!(
        graph.create_key_index("id", ElementKind::Vertex),
        Err(GraphError::InvalidPropertyKey(_))
    ));
    assert!(matches!(
        graph.create_key_index("label", ElementKind::Edge),
        Err(GraphError::InvalidPropertyKey(_))
    ));
}
