//! Per-wave bookkeeping owned solely by the detector coordinator.

use std::collections::BTreeSet;

use crate::{
    error::StateError,
    graph::{Graph, NodeId},
    state::Color,
};

/// Nodes still holding this wave's token, scanned children first.
///
/// Rebuilt from scratch at the start of every wave; never shared with worker
/// tasks.
#[derive(Debug)]
pub(super) struct WaveLedger {
    order: Vec<NodeId>,
    holders: BTreeSet<NodeId>,
}

impl WaveLedger {
    /// Hands every node in `order` a fresh white token, one lock at a time.
    pub(super) fn start(graph: &Graph, order: &[NodeId]) -> Result<Self, StateError> {
        for &id in order {
            if let Some(node) = graph.node(id) {
                node.cell().lock(id)?.token = Some(Color::White);
            }
        }
        Ok(Self {
            order: order.to_vec(),
            holders: order.iter().copied().collect(),
        })
    }

    /// Token holders in scan order.
    pub(super) fn pending(&self) -> Vec<NodeId> {
        self.order
            .iter()
            .copied()
            .filter(|id| self.holders.contains(id))
            .collect()
    }

    /// Records that `id` forwarded its token.
    pub(super) fn retire(&mut self, id: NodeId) {
        self.holders.remove(&id);
    }

    pub(super) fn remaining(&self) -> usize {
        self.holders.len()
    }
}
