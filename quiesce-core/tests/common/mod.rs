//! Shared fixtures for integration tests.

use quiesce_core::{Graph, NodeId};

/// Ten-node topology: a square 1-2-3-5-4 plus a tail 2-6-7-8-9-10.
pub const DEMO_EDGES: [(u32, u32, u64); 10] = [
    (1, 2, 10),
    (1, 4, 20),
    (2, 3, 30),
    (3, 5, 40),
    (4, 5, 50),
    (2, 6, 15),
    (6, 7, 10),
    (7, 8, 10),
    (8, 9, 10),
    (9, 10, 10),
];

pub fn demo_graph() -> Graph {
    let mut graph = Graph::new();
    for label in 1..=10 {
        graph.add_node(label);
    }
    for (from, to, weight) in DEMO_EDGES {
        graph
            .add_edge(by_label(&graph, from), by_label(&graph, to), weight)
            .expect("demo endpoints exist");
    }
    graph
}

pub fn by_label(graph: &Graph, label: u32) -> NodeId {
    graph
        .find_by_label(label)
        .unwrap_or_else(|| panic!("label {label} is part of the graph"))
}
