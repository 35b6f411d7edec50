//! Unit and property tests for spanning tree construction.

use proptest::prelude::*;
use rstest::{fixture, rstest};

use crate::graph::{Edge, Graph, NodeId};

use super::{TreeError, build_spanning_tree, select_edges, union_find::DisjointSet};

fn graph_from(node_count: usize, edges: &[(usize, usize, u64)]) -> Graph {
    let mut graph = Graph::new();
    for label in 1..=node_count {
        graph.add_node(u32::try_from(label).expect("test graphs are small"));
    }
    for &(from, to, weight) in edges {
        graph
            .add_edge(NodeId::new(from), NodeId::new(to), weight)
            .expect("test edges reference existing nodes");
    }
    graph
}

/// Five nodes labelled 1..=5 with edges (1-2,10) (1-4,20) (2-3,30) (3-5,40)
/// (4-5,50).
#[fixture]
fn five_node_graph() -> Graph {
    graph_from(
        5,
        &[(0, 1, 10), (0, 3, 20), (1, 2, 30), (2, 4, 40), (3, 4, 50)],
    )
}

fn labels(graph: &Graph, ids: &[NodeId]) -> Vec<u32> {
    ids.iter()
        .map(|id| graph.node(*id).expect("id exists").label())
        .collect()
}

#[rstest]
fn selects_minimum_weight_edges(mut five_node_graph: Graph) {
    let tree = build_spanning_tree(&mut five_node_graph).expect("graph is valid");

    assert!(tree.is_tree());
    assert_eq!(tree.total_weight(), 100);
    let selected: Vec<(u32, u32)> = tree
        .edges()
        .iter()
        .map(|edge| {
            let from = five_node_graph.node(edge.from()).expect("exists").label();
            let to = five_node_graph.node(edge.to()).expect("exists").label();
            (from, to)
        })
        .collect();
    assert_eq!(selected, vec![(1, 2), (1, 4), (2, 3), (3, 5)]);
}

#[rstest]
fn assigns_parent_and_children_links(mut five_node_graph: Graph) {
    build_spanning_tree(&mut five_node_graph).expect("graph is valid");

    let nodes = five_node_graph.nodes();
    assert_eq!(nodes[0].parent(), None);
    assert_eq!(labels(&five_node_graph, nodes[0].children()), vec![2, 4]);
    assert_eq!(labels(&five_node_graph, nodes[1].children()), vec![3]);
    assert_eq!(labels(&five_node_graph, nodes[2].children()), vec![5]);
    assert_eq!(nodes[4].parent(), Some(NodeId::new(2)));
    assert_eq!(nodes[3].parent(), Some(NodeId::new(0)));
    assert!(nodes[3].children().is_empty());
    assert_eq!(five_node_graph.tree_roots(), &[NodeId::new(0)]);
}

#[rstest]
fn bottom_up_order_lists_children_before_parents(mut five_node_graph: Graph) {
    build_spanning_tree(&mut five_node_graph).expect("graph is valid");

    let order = five_node_graph.bottom_up_order();
    assert_eq!(order.len(), 5);
    assert_eq!(order.last(), Some(&NodeId::new(0)));
    for node in five_node_graph.nodes() {
        let Some(parent) = node.parent() else {
            continue;
        };
        let child_at = order.iter().position(|id| *id == node.id());
        let parent_at = order.iter().position(|id| *id == parent);
        assert!(child_at < parent_at, "{} must precede {parent}", node.id());
    }
}

#[rstest]
fn rejects_second_build(mut five_node_graph: Graph) {
    build_spanning_tree(&mut five_node_graph).expect("first build succeeds");
    let err = build_spanning_tree(&mut five_node_graph).expect_err("second build must fail");
    assert_eq!(err, TreeError::TreeAlreadyBuilt);
    assert_eq!(err.code().as_str(), "TREE_ALREADY_BUILT");
}

#[rstest]
fn rejects_empty_graph() {
    let mut graph = Graph::new();
    let err = build_spanning_tree(&mut graph).expect_err("empty graph must fail");
    assert_eq!(err, TreeError::EmptyGraph);
    assert!(!graph.is_tree_built());
}

#[rstest]
fn rejects_edges_with_missing_endpoints() {
    let edges = [
        Edge::new(NodeId::new(0), NodeId::new(1), 1),
        Edge::new(NodeId::new(1), NodeId::new(9), 2),
    ];
    let err = select_edges(3, &edges).expect_err("node 9 does not exist");
    assert_eq!(
        err,
        TreeError::InvalidNodeId {
            edge: 1,
            node: NodeId::new(9),
            node_count: 3,
        }
    );
}

#[rstest]
fn equal_weights_keep_insertion_order() {
    let mut graph = graph_from(3, &[(0, 1, 1), (1, 2, 1), (0, 2, 1)]);
    let tree = build_spanning_tree(&mut graph).expect("graph is valid");
    let chosen: Vec<usize> = tree.edges().iter().map(|edge| edge.edge().index()).collect();
    assert_eq!(chosen, vec![0, 1]);
}

#[rstest]
fn self_loops_are_never_selected() {
    let mut graph = graph_from(2, &[(0, 0, 0), (0, 1, 5)]);
    let tree = build_spanning_tree(&mut graph).expect("graph is valid");
    assert_eq!(tree.edges().len(), 1);
    assert_eq!(tree.total_weight(), 5);
}

#[rstest]
fn disconnected_graph_yields_forest() {
    let mut graph = graph_from(5, &[(0, 1, 1), (3, 4, 2)]);
    let tree = build_spanning_tree(&mut graph).expect("graph is valid");

    assert!(!tree.is_tree());
    assert_eq!(tree.component_count(), 3);
    assert_eq!(tree.edges().len(), 2);
    assert_eq!(
        tree.roots(),
        &[NodeId::new(0), NodeId::new(2), NodeId::new(3)]
    );
    assert_eq!(graph.nodes()[4].parent(), Some(NodeId::new(3)));
    assert_eq!(graph.bottom_up_order().len(), 2);
}

#[rstest]
fn orientation_follows_designated_root(mut five_node_graph: Graph) {
    five_node_graph
        .set_root(NodeId::new(4))
        .expect("node 5 exists");
    build_spanning_tree(&mut five_node_graph).expect("graph is valid");

    let nodes = five_node_graph.nodes();
    assert_eq!(nodes[4].parent(), None);
    assert_eq!(nodes[2].parent(), Some(NodeId::new(4)));
    assert_eq!(nodes[1].parent(), Some(NodeId::new(2)));
    assert_eq!(nodes[0].parent(), Some(NodeId::new(1)));
    assert_eq!(nodes[3].parent(), Some(NodeId::new(0)));
}

#[rstest]
fn edges_sharing_a_head_still_give_one_parent_each() {
    // Both edges point at node 3; read as "from is parent of to" they would
    // give it two parents.
    let mut graph = graph_from(3, &[(0, 2, 1), (1, 2, 2)]);
    let tree = build_spanning_tree(&mut graph).expect("graph is valid");
    assert!(tree.is_tree());

    let nodes = graph.nodes();
    assert_eq!(nodes[0].parent(), None);
    assert_eq!(nodes[2].parent(), Some(NodeId::new(0)));
    assert_eq!(nodes[1].parent(), Some(NodeId::new(2)));
    assert_eq!(nodes[2].children(), &[NodeId::new(1)]);
}

// ========================================================================
// Brute-force oracle
// ========================================================================

/// Minimum total weight and edge count over every acyclic subset of maximal
/// size, found by exhaustive enumeration.
fn brute_force_forest(node_count: usize, edges: &[(usize, usize, u64)]) -> (u64, usize) {
    let mut full = DisjointSet::new(node_count);
    for &(from, to, _) in edges {
        full.union(from, to);
    }
    let target = node_count - full.components();

    let mut best = u64::MAX;
    for mask in 0_u32..(1 << edges.len()) {
        if usize::try_from(mask.count_ones()).expect("fits") != target {
            continue;
        }
        let mut sets = DisjointSet::new(node_count);
        let mut weight = 0;
        let acyclic = edges.iter().enumerate().all(|(bit, &(from, to, edge_weight))| {
            if mask & (1 << bit) == 0 {
                return true;
            }
            weight += edge_weight;
            sets.union(from, to)
        });
        if acyclic {
            best = best.min(weight);
        }
    }
    (best, target)
}

fn small_graph_strategy() -> impl Strategy<Value = (usize, Vec<(usize, usize, u64)>)> {
    (2_usize..=5).prop_flat_map(|node_count| {
        let edge = (0..node_count, 0..node_count, 0_u64..40);
        (Just(node_count), prop::collection::vec(edge, 0..=9))
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn matches_brute_force_minimum((node_count, edges) in small_graph_strategy()) {
        let mut graph = graph_from(node_count, &edges);
        let tree = build_spanning_tree(&mut graph).expect("generated graphs are valid");
        let (weight, edge_count) = brute_force_forest(node_count, &edges);

        prop_assert_eq!(tree.edges().len(), edge_count);
        prop_assert_eq!(tree.total_weight(), weight);
        prop_assert_eq!(tree.component_count(), node_count - edge_count);
    }

    #[test]
    fn tree_links_are_consistent((node_count, edges) in small_graph_strategy()) {
        let mut graph = graph_from(node_count, &edges);
        let tree = build_spanning_tree(&mut graph).expect("generated graphs are valid");

        let mut sets = DisjointSet::new(node_count);
        for edge in tree.edges() {
            prop_assert!(sets.union(edge.from().index(), edge.to().index()));
        }

        let parentless = graph.nodes().iter().filter(|node| node.parent().is_none()).count();
        prop_assert_eq!(parentless, tree.component_count());
        for node in graph.nodes() {
            for child in node.children() {
                let child = graph.node(*child).expect("child exists");
                prop_assert_eq!(child.parent(), Some(node.id()));
            }
        }
    }
}
