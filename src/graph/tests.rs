use super::*;

fn p(name: &str) -> PathBuf {
    PathBuf::from(format!("/proj/{}.js", name))
}

fn chain() -> DependencyGraph {
    // A -> B -> C
    let mut graph = DependencyGraph::new();
    graph.add_dependency(&p("a"), &p("b"));
    graph.add_dependency(&p("b"), &p("c"));
    graph
}

fn set(names: &[&str]) -> BTreeSet<PathBuf> {
    names.iter().map(|n| p(n)).collect()
}

#[test]
fn test_reverse_reachability() {
    let graph = chain();
    assert_eq!(graph.reverse_reachable(&p("c")), set(&["a", "b"]));
    assert_eq!(graph.reverse_reachable(&p("b")), set(&["a"]));
    assert_eq!(graph.reverse_reachable(&p("a")), set(&[]));
}

#[test]
fn test_forward_reachability() {
    let graph = chain();
    assert_eq!(graph.forward_reachable(&p("a")), set(&["b", "c"]));
    assert_eq!(graph.forward_reachable(&p("c")), set(&[]));
}

#[test]
fn test_reachability_survives_cycles() {
    let mut graph = chain();
    graph.add_dependency(&p("c"), &p("a"));
    assert_eq!(graph.reverse_reachable(&p("c")), set(&["a", "b"]));
    assert_eq!(graph.reverse_reachable(&p("a")), set(&["b", "c"]));
}

#[test]
fn test_no_duplicate_edges_or_self_loops() {
    let mut graph = DependencyGraph::new();
    assert!(graph.add_dependency(&p("a"), &p("b")));
    assert!(!graph.add_dependency(&p("a"), &p("b")));
    assert!(!graph.add_dependency(&p("a"), &p("a")));
    assert_eq!(graph.dependency_count(), 1);

    graph.set_dependencies(&p("c"), vec![p("c"), p("a"), p("a")]);
    assert_eq!(graph.dependencies(&p("c")), set(&["a"]));
    assert_eq!(graph.dependency_count(), 2);
}

#[test]
fn test_set_dependencies_isolated_to_one_file() {
    // A -> B, C -> A, D -> B
    let mut graph = DependencyGraph::new();
    graph.add_dependency(&p("a"), &p("b"));
    graph.add_dependency(&p("c"), &p("a"));
    graph.add_dependency(&p("d"), &p("b"));

    let changed = graph.set_dependencies(&p("a"), vec![p("d")]);
    assert!(changed);

    assert_eq!(graph.dependencies(&p("a")), set(&["d"]));
    assert_eq!(graph.dependencies(&p("c")), set(&["a"]));
    assert_eq!(graph.dependencies(&p("d")), set(&["b"]));
    // inbound edge into A preserved
    assert_eq!(graph.dependents(&p("a")), set(&["c"]));
    assert_eq!(graph.dependents(&p("b")), set(&["d"]));
    assert_eq!(graph.dependents(&p("d")), set(&["a"]));
}

#[test]
fn test_set_dependencies_unchanged() {
    let mut graph = chain();
    assert!(!graph.set_dependencies(&p("a"), vec![p("b")]));
    assert_eq!(graph, chain());
}

#[test]
fn test_remove_file_keeps_inbound_edges() {
    let mut graph = chain();
    graph.upsert_node(
        p("b"),
        FileNode {
            modified: None,
            imports: vec!["./c".to_string()],
        },
    );

    assert!(graph.remove_file(&p("b")));
    assert!(!graph.contains_file(&p("b")));
    assert!(graph.dependencies(&p("b")).is_empty());
    assert!(graph.dependents(&p("c")).is_empty());
    assert_eq!(graph.dependents(&p("b")), set(&["a"]));
}

#[test]
fn test_edges_sorted() {
    let graph = chain();
    let edges: Vec<(PathBuf, PathBuf)> = graph
        .edges()
        .map(|(from, to)| (from.to_path_buf(), to.to_path_buf()))
        .collect();
    assert_eq!(edges, vec![(p("a"), p("b")), (p("b"), p("c"))]);
}

#[test]
fn test_serde_round_trip_rebuilds_reverse_index() {
    let mut graph = chain();
    graph.upsert_node(
        p("a"),
        FileNode {
            modified: Some(Utc::now()),
            imports: vec!["./b".to_string()],
        },
    );

    let json = serde_json::to_string(&graph).unwrap();
    assert!(!json.contains("backward"));

    let loaded: DependencyGraph = serde_json::from_str(&json).unwrap();
    assert_eq!(loaded, graph);
    assert_eq!(loaded.reverse_reachable(&p("c")), set(&["a", "b"]));
}

#[test]
fn test_stats() {
    let mut graph = chain();
    for name in ["a", "b", "c"] {
        graph.upsert_node(
            p(name),
            FileNode {
                modified: None,
                imports: Vec::new(),
            },
        );
    }
    assert_eq!(
        graph.stats(),
        GraphStats {
            files: 3,
            dependencies: 2
        }
    );
}
