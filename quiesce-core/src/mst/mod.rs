//! Spanning tree construction via Kruskal's algorithm.
//!
//! Edges are stably sorted by weight, so equal weights keep insertion order
//! and the selected tree is deterministic for a fixed input. Selected edges
//! are then oriented away from the graph's designated root to produce the
//! parent/children links the detector propagates tokens along.

pub(crate) mod union_find;

use std::collections::VecDeque;

use tracing::{info, instrument, warn};

use crate::{
    error::define_error_codes,
    graph::{Edge, EdgeId, Graph, NodeId},
};

use self::union_find::DisjointSet;

/// Errors returned while building the spanning tree.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum TreeError {
    /// The graph has no nodes.
    #[error("cannot build a spanning tree for an empty graph")]
    EmptyGraph,
    /// An edge referenced a node id that is not present in the graph.
    #[error("edge {edge} references {node}, but node_count is {node_count}")]
    InvalidNodeId {
        /// Insertion index of the offending edge.
        edge: usize,
        /// The invalid endpoint.
        node: NodeId,
        /// The number of nodes in the graph.
        node_count: usize,
    },
    /// Parent/children links are assigned exactly once.
    #[error("the spanning tree has already been built for this graph")]
    TreeAlreadyBuilt,
}

define_error_codes! {
    /// Stable codes describing [`TreeError`] variants.
    enum TreeErrorCode for TreeError {
        /// The graph has no nodes.
        EmptyGraph => EmptyGraph => "TREE_EMPTY_GRAPH",
        /// An edge referenced a node id that is not present in the graph.
        InvalidNodeId => InvalidNodeId { .. } => "TREE_INVALID_NODE_ID",
        /// Parent/children links are assigned exactly once.
        TreeAlreadyBuilt => TreeAlreadyBuilt => "TREE_ALREADY_BUILT",
    }
}

/// An edge accepted into the spanning tree.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TreeEdge {
    edge: EdgeId,
    from: NodeId,
    to: NodeId,
    weight: u64,
}

impl TreeEdge {
    /// Id of the underlying graph edge.
    #[must_use]
    #[rustfmt::skip]
    pub const fn edge(&self) -> EdgeId { self.edge }

    /// Endpoint named first when the edge was added.
    #[must_use]
    #[rustfmt::skip]
    pub const fn from(&self) -> NodeId { self.from }

    /// Endpoint named second when the edge was added.
    #[must_use]
    #[rustfmt::skip]
    pub const fn to(&self) -> NodeId { self.to }

    /// Edge weight.
    #[must_use]
    #[rustfmt::skip]
    pub const fn weight(&self) -> u64 { self.weight }
}

/// The output of a spanning tree build.
///
/// When the input graph is connected the result is a minimum spanning tree;
/// otherwise it is a minimum spanning forest with one root per component.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpanningTree {
    edges: Vec<TreeEdge>,
    component_count: usize,
    roots: Vec<NodeId>,
}

impl SpanningTree {
    /// Selected edges in acceptance order.
    #[must_use]
    #[rustfmt::skip]
    pub fn edges(&self) -> &[TreeEdge] { &self.edges }

    /// Number of connected components spanned.
    #[must_use]
    #[rustfmt::skip]
    pub const fn component_count(&self) -> usize { self.component_count }

    /// Root of each component; the designated root comes first.
    #[must_use]
    #[rustfmt::skip]
    pub fn roots(&self) -> &[NodeId] { &self.roots }

    /// Sum of the selected edge weights.
    #[must_use]
    pub fn total_weight(&self) -> u64 {
        self.edges.iter().map(TreeEdge::weight).sum()
    }

    /// Returns `true` when the result spans a single component.
    #[must_use]
    pub const fn is_tree(&self) -> bool {
        self.component_count == 1
    }
}

/// Builds the spanning tree and assigns parent/children links on `graph`.
///
/// # Errors
/// Returns [`TreeError::EmptyGraph`] for a graph without nodes,
/// [`TreeError::InvalidNodeId`] when an edge endpoint is missing and
/// [`TreeError::TreeAlreadyBuilt`] when links were already assigned. The graph
/// is left untouched on error.
///
/// # Examples
/// ```
/// use quiesce_core::{Graph, build_spanning_tree};
///
/// let mut graph = Graph::new();
/// let nodes: Vec<_> = (1..=3).map(|label| graph.add_node(label)).collect();
/// graph.add_edge(nodes[0], nodes[1], 1).expect("endpoints exist");
/// graph.add_edge(nodes[1], nodes[2], 2).expect("endpoints exist");
/// graph.add_edge(nodes[0], nodes[2], 3).expect("endpoints exist");
///
/// let tree = build_spanning_tree(&mut graph).expect("graph is valid");
/// assert!(tree.is_tree());
/// assert_eq!(tree.total_weight(), 3);
/// assert_eq!(graph.nodes()[2].parent(), Some(nodes[1]));
/// ```
#[instrument(
    name = "core.build_spanning_tree",
    err,
    skip(graph),
    fields(nodes = graph.len(), edges = graph.edges().len()),
)]
pub fn build_spanning_tree(graph: &mut Graph) -> Result<SpanningTree, TreeError> {
    if graph.is_tree_built() {
        return Err(TreeError::TreeAlreadyBuilt);
    }
    let root = graph.root().ok_or(TreeError::EmptyGraph)?;
    let node_count = graph.len();

    let (edges, component_count) = select_edges(node_count, graph.edges())?;
    let (parents, children, roots) = orient(node_count, root, &edges);

    if component_count > 1 {
        warn!(
            components = component_count,
            "graph is disconnected; building a spanning forest"
        );
    }
    graph.attach_tree(parents, children, roots.clone());

    let tree = SpanningTree {
        edges,
        component_count,
        roots,
    };
    info!(
        tree_edges = tree.edges.len(),
        total_weight = tree.total_weight(),
        "spanning tree built"
    );
    Ok(tree)
}

/// Runs Kruskal's algorithm, returning accepted edges in acceptance order and
/// the number of remaining components.
pub(crate) fn select_edges(
    node_count: usize,
    edges: &[Edge],
) -> Result<(Vec<TreeEdge>, usize), TreeError> {
    if node_count == 0 {
        return Err(TreeError::EmptyGraph);
    }

    let mut ordered = Vec::with_capacity(edges.len());
    for (index, edge) in edges.iter().enumerate() {
        for node in [edge.from(), edge.to()] {
            if node.index() >= node_count {
                return Err(TreeError::InvalidNodeId {
                    edge: index,
                    node,
                    node_count,
                });
            }
        }
        ordered.push(TreeEdge {
            edge: EdgeId::from_index(index),
            from: edge.from(),
            to: edge.to(),
            weight: edge.weight(),
        });
    }
    // Stable: equal weights keep insertion order.
    ordered.sort_by_key(TreeEdge::weight);

    let mut sets = DisjointSet::new(node_count);
    let mut accepted = Vec::with_capacity(node_count.saturating_sub(1));
    for edge in ordered {
        if sets.union(edge.from.index(), edge.to.index()) {
            accepted.push(edge);
            if sets.components() == 1 {
                break;
            }
        }
    }
    Ok((accepted, sets.components()))
}

type Orientation = (Vec<Option<NodeId>>, Vec<Vec<NodeId>>, Vec<NodeId>);

/// Orients accepted edges breadth-first away from `root`. Components that do
/// not contain `root` are rooted at their lowest-index node.
fn orient(node_count: usize, root: NodeId, edges: &[TreeEdge]) -> Orientation {
    let mut adjacency: Vec<Vec<NodeId>> = vec![Vec::new(); node_count];
    for edge in edges {
        adjacency[edge.from.index()].push(edge.to);
        adjacency[edge.to.index()].push(edge.from);
    }

    let mut parents = vec![None; node_count];
    let mut children = vec![Vec::new(); node_count];
    let mut visited = vec![false; node_count];
    let mut roots = Vec::new();

    let starts = std::iter::once(root).chain((0..node_count).map(NodeId::new));
    for start in starts {
        if visited[start.index()] {
            continue;
        }
        visited[start.index()] = true;
        roots.push(start);

        let mut queue = VecDeque::from([start]);
        while let Some(node) = queue.pop_front() {
            for &next in &adjacency[node.index()] {
                if visited[next.index()] {
                    continue;
                }
                visited[next.index()] = true;
                parents[next.index()] = Some(node);
                children[node.index()].push(next);
                queue.push_back(next);
            }
        }
    }

    (parents, children, roots)
}

#[cfg(test)]
mod tests;
