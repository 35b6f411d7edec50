//! Built-in graphs the CLI can run against.

use std::fmt;

use clap::ValueEnum;
use quiesce_core::{Graph, GraphError, NodeId};

/// Square 1-2-3-5-4 with a tail 2-6-7-8-9-10.
const DEMO_EDGES: &[(u32, u32, u64)] = &[
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

/// The square alone.
const SAMPLE_EDGES: &[(u32, u32, u64)] = &[
    (1, 2, 10),
    (1, 4, 20),
    (2, 3, 30),
    (3, 5, 40),
    (4, 5, 50),
];

/// Named topology selectable with `--topology`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum Topology {
    /// Ten nodes labelled 1 to 10.
    #[default]
    Demo,
    /// Five nodes labelled 1 to 5.
    Sample,
}

impl Topology {
    /// Lower-case name matching the command-line value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Demo => "demo",
            Self::Sample => "sample",
        }
    }

    /// Number of nodes, labelled `1..=node_count`.
    #[must_use]
    pub const fn node_count(self) -> u32 {
        match self {
            Self::Demo => 10,
            Self::Sample => 5,
        }
    }

    /// Weighted edges as `(from label, to label, weight)`.
    #[must_use]
    pub const fn edges(self) -> &'static [(u32, u32, u64)] {
        match self {
            Self::Demo => DEMO_EDGES,
            Self::Sample => SAMPLE_EDGES,
        }
    }

    /// Builds the graph; node 1 is the detection root.
    ///
    /// # Errors
    /// Returns [`GraphError::UnknownNode`] if an edge names a label outside
    /// the node range.
    pub fn build(self) -> Result<Graph, GraphError> {
        let mut graph = Graph::new();
        for label in 1..=self.node_count() {
            graph.add_node(label);
        }
        let node_count = graph.len();
        let resolve = |graph: &Graph, label: u32| {
            graph.find_by_label(label).ok_or(GraphError::UnknownNode {
                node: NodeId::new(usize::try_from(label.saturating_sub(1)).unwrap_or(usize::MAX)),
                node_count,
            })
        };
        for &(from, to, weight) in self.edges() {
            let from = resolve(&graph, from)?;
            let to = resolve(&graph, to)?;
            graph.add_edge(from, to, weight)?;
        }
        Ok(graph)
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::Topology;

    #[rstest]
    #[case::demo(Topology::Demo, 10, 10)]
    #[case::sample(Topology::Sample, 5, 5)]
    fn builds_every_labelled_node(
        #[case] topology: Topology,
        #[case] nodes: usize,
        #[case] edges: usize,
    ) {
        let graph = topology.build().expect("built-in topologies are valid");
        assert_eq!(graph.len(), nodes);
        assert_eq!(graph.edges().len(), edges);
        assert_eq!(graph.root().map(|root| root.index()), Some(0));
        assert_eq!(graph.node(graph.root().expect("root exists")).map(|n| n.label()), Some(1));
    }
}
