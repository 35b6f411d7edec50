//! Weighted undirected graph whose nodes host worker state.
//!
//! Topology (adjacency, parent and children links) is plain data and can be
//! traversed without locking. Each node's mutable fields live in a
//! [`NodeCell`] and are only touched under that node's own lock.

use std::{collections::VecDeque, fmt};

use tracing::debug;

use crate::{
    error::{GraphError, StateError},
    signal::Progress,
    state::NodeCell,
};

/// Dense index of a node within its [`Graph`].
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NodeId(usize);

impl NodeId {
    /// Wraps a raw node index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the raw node index.
    #[must_use]
    #[rustfmt::skip]
    pub const fn index(self) -> usize { self.0 }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Position of an edge in insertion order.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct EdgeId(usize);

impl EdgeId {
    pub(crate) const fn from_index(index: usize) -> Self {
        Self(index)
    }

    /// Returns the raw edge index (its insertion sequence).
    #[must_use]
    #[rustfmt::skip]
    pub const fn index(self) -> usize { self.0 }
}

/// An immutable weighted undirected edge.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Edge {
    from: NodeId,
    to: NodeId,
    weight: u64,
}

impl Edge {
    pub(crate) const fn new(from: NodeId, to: NodeId, weight: u64) -> Self {
        Self { from, to, weight }
    }

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

    /// Returns the endpoint opposite `node`, or `None` when `node` is not an
    /// endpoint.
    #[must_use]
    pub fn opposite(&self, node: NodeId) -> Option<NodeId> {
        if node == self.from {
            Some(self.to)
        } else if node == self.to {
            Some(self.from)
        } else {
            None
        }
    }
}

/// A graph node: identity, topology and its lock-protected state.
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    label: u32,
    edges: Vec<EdgeId>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    cell: NodeCell,
}

impl Node {
    fn new(id: NodeId, label: u32) -> Self {
        Self {
            id,
            label,
            edges: Vec::new(),
            parent: None,
            children: Vec::new(),
            cell: NodeCell::default(),
        }
    }

    /// The node's index.
    #[must_use]
    #[rustfmt::skip]
    pub const fn id(&self) -> NodeId { self.id }

    /// Caller-facing label used for rendering and logs.
    #[must_use]
    #[rustfmt::skip]
    pub const fn label(&self) -> u32 { self.label }

    /// Incident edges in insertion order.
    #[must_use]
    #[rustfmt::skip]
    pub fn edges(&self) -> &[EdgeId] { &self.edges }

    /// Tree parent; `None` for a tree root or before the tree is built.
    #[must_use]
    #[rustfmt::skip]
    pub const fn parent(&self) -> Option<NodeId> { self.parent }

    /// Tree children in the order their edges were selected.
    #[must_use]
    #[rustfmt::skip]
    pub fn children(&self) -> &[NodeId] { &self.children }

    /// The node's lock-protected state and completion signal.
    #[must_use]
    #[rustfmt::skip]
    pub const fn cell(&self) -> &NodeCell { &self.cell }
}

/// Census of node state gathered one lock at a time.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Snapshot {
    /// Number of nodes inspected.
    pub nodes: usize,
    /// Nodes whose work has completed.
    pub completed: usize,
    /// Nodes with a worker still running.
    pub active: usize,
    /// Nodes currently coloured black.
    pub black: usize,
    /// Nodes holding a detection token.
    pub tokens: usize,
}

impl Snapshot {
    /// Returns `true` when every inspected node has completed.
    #[must_use]
    pub const fn all_completed(&self) -> bool {
        self.completed == self.nodes
    }

    /// Returns `true` when no node is active and none is black.
    #[must_use]
    pub const fn is_quiescent(&self) -> bool {
        self.all_completed() && self.active == 0 && self.black == 0
    }
}

/// Owner of all nodes and edges plus the designated detection root.
///
/// # Examples
/// ```
/// use quiesce_core::Graph;
///
/// let mut graph = Graph::new();
/// let a = graph.add_node(1);
/// let b = graph.add_node(2);
/// graph.add_edge(a, b, 10).expect("both endpoints exist");
/// assert_eq!(graph.root(), Some(a));
/// assert_eq!(graph.edges().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct Graph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    root: Option<NodeId>,
    tree_roots: Vec<NodeId>,
    tree_built: bool,
    progress: Progress,
}

impl Graph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node and returns its id. The first node becomes the root.
    pub fn add_node(&mut self, label: u32) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(id, label));
        if self.root.is_none() {
            self.root = Some(id);
        }
        id
    }

    /// Adds an undirected weighted edge between two existing nodes.
    ///
    /// # Errors
    /// Returns [`GraphError::UnknownNode`] when either endpoint is missing;
    /// the graph is left unchanged.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId, weight: u64) -> Result<EdgeId, GraphError> {
        let node_count = self.nodes.len();
        for node in [from, to] {
            if node.0 >= node_count {
                return Err(GraphError::UnknownNode { node, node_count });
            }
        }

        let id = EdgeId::from_index(self.edges.len());
        self.edges.push(Edge::new(from, to, weight));
        self.nodes[from.0].edges.push(id);
        if to != from {
            self.nodes[to.0].edges.push(id);
        }
        Ok(id)
    }

    /// Overrides the detection root.
    ///
    /// # Errors
    /// Returns [`GraphError::NoSuchRoot`] for unknown ids and
    /// [`GraphError::TreeFrozen`] once the spanning tree has been built.
    pub fn set_root(&mut self, node: NodeId) -> Result<(), GraphError> {
        if self.tree_built {
            return Err(GraphError::TreeFrozen);
        }
        if node.0 >= self.nodes.len() {
            return Err(GraphError::NoSuchRoot {
                node,
                node_count: self.nodes.len(),
            });
        }
        self.root = Some(node);
        Ok(())
    }

    /// The designated detection root, if any node exists.
    #[must_use]
    #[rustfmt::skip]
    pub const fn root(&self) -> Option<NodeId> { self.root }

    /// All nodes in id order.
    #[must_use]
    #[rustfmt::skip]
    pub fn nodes(&self) -> &[Node] { &self.nodes }

    /// All edges in insertion order.
    #[must_use]
    #[rustfmt::skip]
    pub fn edges(&self) -> &[Edge] { &self.edges }

    /// Looks up a node by id.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// Looks up an edge by id.
    #[must_use]
    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id.0)
    }

    /// Finds the first node carrying `label`.
    #[must_use]
    pub fn find_by_label(&self, label: u32) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|node| node.label == label)
            .map(Node::id)
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` when the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns `true` once parent/children links have been assigned.
    #[must_use]
    #[rustfmt::skip]
    pub const fn is_tree_built(&self) -> bool { self.tree_built }

    /// Roots of the spanning forest; a single entry for a connected graph.
    #[must_use]
    #[rustfmt::skip]
    pub fn tree_roots(&self) -> &[NodeId] { &self.tree_roots }

    /// Change notifier bumped by workers after every state mutation.
    #[must_use]
    #[rustfmt::skip]
    pub const fn progress(&self) -> &Progress { &self.progress }

    /// Nodes adjacent to `id` in edge insertion order, self-loops excluded.
    pub fn neighbours(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.node(id)
            .map(Node::edges)
            .unwrap_or_default()
            .iter()
            .filter_map(move |edge| self.edge(*edge).and_then(|edge| edge.opposite(id)))
            .filter(move |other| *other != id)
    }

    /// Nodes reachable from the designated root, children before parents.
    ///
    /// Empty until the spanning tree is built.
    #[must_use]
    pub fn bottom_up_order(&self) -> Vec<NodeId> {
        let Some(root) = self.root.filter(|_| self.tree_built) else {
            return Vec::new();
        };
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut queue = VecDeque::from([root]);
        while let Some(id) = queue.pop_front() {
            order.push(id);
            if let Some(node) = self.node(id) {
                queue.extend(node.children.iter().copied());
            }
        }
        order.reverse();
        order
    }

    /// Counts completed, active, black and token-holding nodes.
    ///
    /// Locks are taken strictly one node at a time.
    ///
    /// # Errors
    /// Returns [`StateError::LockPoisoned`] if any node lock is poisoned.
    pub fn snapshot(&self) -> Result<Snapshot, StateError> {
        let mut snapshot = Snapshot::default();
        for node in &self.nodes {
            let state = node.cell.read(node.id)?;
            snapshot.nodes += 1;
            snapshot.completed += usize::from(state.completed);
            snapshot.active += usize::from(state.active);
            snapshot.black += usize::from(state.color.is_black());
            snapshot.tokens += usize::from(state.token.is_some());
        }
        Ok(snapshot)
    }

    pub(crate) fn attach_tree(
        &mut self,
        parents: Vec<Option<NodeId>>,
        children: Vec<Vec<NodeId>>,
        tree_roots: Vec<NodeId>,
    ) {
        for ((node, parent), kids) in self.nodes.iter_mut().zip(parents).zip(children) {
            node.parent = parent;
            node.children = kids;
        }
        debug!(roots = tree_roots.len(), "spanning tree attached to graph");
        self.tree_roots = tree_roots;
        self.tree_built = true;
    }
}
