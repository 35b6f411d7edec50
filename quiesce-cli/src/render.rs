//! Text rendering of the spanning tree with each node's current colour.

use quiesce_core::{Graph, NodeId, NodeState, StateError};

/// Renders every tree in the forest, roots first, one node per line.
///
/// Nodes are shown by label followed by their colour, a `*` marker when the
/// node has not completed, and any token it still holds:
///
/// ```text
/// 1 white
/// ├── 2 white
/// │   └── 3 black* token=white
/// └── 4 white
/// ```
///
/// Node locks are taken one at a time.
///
/// # Errors
/// Returns [`StateError::LockPoisoned`] if a node lock is poisoned.
pub fn render_tree(graph: &Graph) -> Result<Vec<String>, StateError> {
    let mut lines = Vec::with_capacity(graph.len());
    for &root in graph.tree_roots() {
        let mut stack = vec![(root, String::new(), None::<bool>)];
        while let Some((id, prefix, last)) = stack.pop() {
            let Some(node) = graph.node(id) else {
                continue;
            };
            let state = node.cell().read(id)?;
            let branch = match last {
                None => "",
                Some(true) => "└── ",
                Some(false) => "├── ",
            };
            lines.push(format!("{prefix}{branch}{} {}", node.label(), describe(&state)));

            let child_prefix = match last {
                None => prefix,
                Some(true) => format!("{prefix}    "),
                Some(false) => format!("{prefix}│   "),
            };
            let children = node.children();
            // Reverse so the first child is popped first.
            for (index, &child) in children.iter().enumerate().rev() {
                let is_last = index + 1 == children.len();
                stack.push((child, child_prefix.clone(), Some(is_last)));
            }
        }
    }
    Ok(lines)
}

fn describe(state: &NodeState) -> String {
    let mut text = state.color.as_str().to_owned();
    if !state.completed {
        text.push('*');
    }
    if let Some(token) = state.token {
        text.push_str(" token=");
        text.push_str(token.as_str());
    }
    text
}

/// Label of `id`, or its raw index when the node is missing.
#[must_use]
pub fn label_of(graph: &Graph, id: NodeId) -> String {
    graph
        .node(id)
        .map_or_else(|| id.to_string(), |node| node.label().to_string())
}

#[cfg(test)]
mod tests {
    use quiesce_core::{Color, NodeId, build_spanning_tree};
    use rstest::rstest;

    use super::{label_of, render_tree};
    use crate::topology::Topology;

    #[rstest]
    fn renders_sample_tree_with_connectors() {
        let mut graph = Topology::Sample.build().expect("sample is valid");
        build_spanning_tree(&mut graph).expect("sample is connected");
        {
            let id = NodeId::new(2);
            let mut state = graph
                .node(id)
                .expect("node exists")
                .cell()
                .lock(id)
                .expect("lock is healthy");
            state.color = Color::Black;
            state.token = Some(Color::White);
        }

        let lines = render_tree(&graph).expect("locks are healthy");
        assert_eq!(
            lines,
            vec![
                "1 white*",
                "├── 2 white*",
                "│   └── 3 black* token=white",
                "│       └── 5 white*",
                "└── 4 white*",
            ]
        );
    }

    #[rstest]
    fn unbuilt_graph_renders_nothing() {
        let graph = Topology::Demo.build().expect("demo is valid");
        assert!(render_tree(&graph).expect("locks are healthy").is_empty());
        assert_eq!(label_of(&graph, NodeId::new(9)), "10");
        assert_eq!(label_of(&graph, NodeId::new(40)), "node#40");
    }
}
