//! Invariant checks excluded from coverage reports.

#![cfg_attr(coverage_nightly, coverage(off))]

use crate::graph::{Graph, Node, NodeId};

impl Graph {
    pub(crate) fn ensure_node(&self, id: NodeId) -> &Node {
        self.try_get(id).unwrap_or_else(|| {
            panic!(
                "Graph: node %{} not found in an arena of {} nodes \
                 (handles must come from the same graph)",
                id.as_u32(),
                self.len()
            )
        })
    }
}
