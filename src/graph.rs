//! Per-tick neighbor graph and its assembly from discovery + link results.

use crate::collaborators::{CallError, FailureKind};
use crate::discovery::CandidateEdge;
use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Terminal outcome of evaluating one candidate edge. A failed evaluation is
/// still an edge: "no link" and "link unknown" stay distinguishable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LinkResult {
    Ok { quality: f64 },
    Failed { kind: FailureKind, attempts: u32, reason: String },
}

impl LinkResult {
    pub fn failed(error: &CallError, attempts: u32) -> Self {
        LinkResult::Failed {
            kind: error.kind(),
            attempts,
            reason: error.to_string(),
        }
    }

    pub fn quality(&self) -> Option<f64> {
        match self {
            LinkResult::Ok { quality } => Some(*quality),
            LinkResult::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, LinkResult::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub id: NodeId,
    pub link: LinkResult,
}

/// One tick's output: every node, with its neighbors in ascending id order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborGraph {
    tick: u64,
    adjacency: BTreeMap<NodeId, Vec<Neighbor>>,
}

impl NeighborGraph {
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Empty slice for nodes without neighbors as well as unknown ids.
    pub fn neighbors(&self, id: NodeId) -> &[Neighbor] {
        self.adjacency.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.adjacency.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &[Neighbor])> + '_ {
        self.adjacency.iter().map(|(id, n)| (*id, n.as_slice()))
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(Vec::len).sum()
    }

    pub fn failed_edge_count(&self) -> usize {
        self.adjacency.values().flatten().filter(|n| n.link.is_failed()).count()
    }

    /// Unordered pairs `(low, high)` with an edge in at least one direction.
    pub fn undirected_pairs(&self) -> Vec<(NodeId, NodeId)> {
        let mut pairs: Vec<_> = self
            .iter()
            .flat_map(|(id, neighbors)| neighbors.iter().map(move |n| (id.min(n.id), id.max(n.id))))
            .collect();
        pairs.sort_unstable();
        pairs.dedup();
        pairs
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum AssemblyError {
    #[error("{edges} candidate edges but {results} link results")]
    LengthMismatch { edges: usize, results: usize },
    #[error("edge source {0} is not part of the population")]
    UnknownSource(NodeId),
}

pub struct GraphAssembler;

impl GraphAssembler {
    /// `results[i]` belongs to `edges[i]`. Every node in `nodes` gets an
    /// entry, even with no neighbors.
    pub fn assemble(
        tick: u64,
        nodes: impl IntoIterator<Item = NodeId>,
        edges: &[CandidateEdge],
        results: Vec<LinkResult>,
    ) -> Result<NeighborGraph, AssemblyError> {
        if edges.len() != results.len() {
            return Err(AssemblyError::LengthMismatch {
                edges: edges.len(),
                results: results.len(),
            });
        }

        let mut adjacency: BTreeMap<NodeId, Vec<Neighbor>> = nodes.into_iter().map(|id| (id, Vec::new())).collect();

        for (edge, link) in edges.iter().zip(results) {
            adjacency
                .get_mut(&edge.source)
                .ok_or(AssemblyError::UnknownSource(edge.source))?
                .push(Neighbor { id: edge.target, link });
        }

        for neighbors in adjacency.values_mut() {
            neighbors.sort_by_key(|n| n.id);
        }

        Ok(NeighborGraph { tick, adjacency })
    }
}
