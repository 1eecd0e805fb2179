//! Neighbor discovery: turns one tick's snapshot into candidate edges.

use crate::node::{NodeId, Snapshot};
use crate::spatial::{KdTree, within_range};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Which range decides whether `target` is a neighbor of `source`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangePolicy {
    /// Target lies within the source's range. Not symmetric when ranges differ.
    #[default]
    Source,
    /// Each node lies within the other's range.
    Mutual,
}

/// Directed candidate edge `source -> target` for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CandidateEdge {
    pub source: NodeId,
    pub target: NodeId,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NeighborDiscovery {
    policy: RangePolicy,
}

impl NeighborDiscovery {
    pub fn new(policy: RangePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> RangePolicy {
        self.policy
    }

    pub fn build_index(snapshot: &Snapshot) -> KdTree {
        KdTree::build(snapshot.nodes().iter().map(|n| (n.id, n.position())))
    }

    /// Candidate edges sorted by `(source, target)`.
    pub fn discover(&self, snapshot: &Snapshot, index: &KdTree) -> Vec<CandidateEdge> {
        snapshot
            .nodes()
            .par_iter()
            .map(|node| {
                let mut targets: Vec<NodeId> = index
                    .within(&node.position(), node.range)
                    .into_iter()
                    .filter(|hit| hit.id != node.id)
                    .filter(|hit| match self.policy {
                        RangePolicy::Source => true,
                        RangePolicy::Mutual => snapshot.get(hit.id).is_some_and(|target| {
                            within_range(target.position().distance2(&node.position()), target.range)
                        }),
                    })
                    .map(|hit| hit.id)
                    .collect();
                targets.sort_unstable();
                targets
                    .into_iter()
                    .map(|target| CandidateEdge { source: node.id, target })
                    .collect::<Vec<_>>()
            })
            .flatten()
            .collect()
    }

    /// Exhaustive O(N²) scan with the same distance test. Reference for the
    /// index path and the baseline for the discovery benchmark.
    pub fn scan_all_pairs(&self, snapshot: &Snapshot) -> Vec<CandidateEdge> {
        let nodes = snapshot.nodes();
        let mut edges = Vec::new();
        for source in nodes {
            for target in nodes {
                if source.id == target.id {
                    continue;
                }
                let d2 = source.position().distance2(&target.position());
                let reachable = match self.policy {
                    RangePolicy::Source => within_range(d2, source.range),
                    RangePolicy::Mutual => {
                        within_range(d2, source.range)
                            && within_range(target.position().distance2(&source.position()), target.range)
                    }
                };
                if reachable {
                    edges.push(CandidateEdge { source: source.id, target: target.id });
                }
            }
        }
        edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeStateStore, NodeTemplate, Position};

    fn snapshot(points: &[(f64, f64, f64, f64)]) -> Snapshot {
        let template = NodeTemplate::default();
        let nodes = points.iter().enumerate().map(|(i, &(x, y, z, range))| {
            let mut node = template.instantiate(NodeId::new(i as u64), Position::new(x, y, z));
            node.range = range;
            node
        });
        NodeStateStore::new(nodes).unwrap().snapshot()
    }

    fn pairs(edges: &[CandidateEdge]) -> Vec<(u64, u64)> {
        edges.iter().map(|e| (e.source.as_u64(), e.target.as_u64())).collect()
    }

    #[test]
    fn asymmetric_ranges_under_source_policy() {
        let snap = snapshot(&[(0.0, 0.0, 0.0, 10.0), (5.0, 0.0, 0.0, 1.0)]);
        let discovery = NeighborDiscovery::new(RangePolicy::Source);
        let edges = discovery.discover(&snap, &NeighborDiscovery::build_index(&snap));
        assert_eq!(pairs(&edges), vec![(0, 1)]);
    }

    #[test]
    fn mutual_policy_needs_both_ranges() {
        let snap = snapshot(&[(0.0, 0.0, 0.0, 10.0), (5.0, 0.0, 0.0, 1.0), (8.0, 0.0, 0.0, 10.0)]);
        let discovery = NeighborDiscovery::new(RangePolicy::Mutual);
        let edges = discovery.discover(&snap, &NeighborDiscovery::build_index(&snap));
        assert_eq!(pairs(&edges), vec![(0, 2), (2, 0)]);
        assert_eq!(edges, discovery.scan_all_pairs(&snap));
    }

    #[test]
    fn edges_come_out_sorted() {
        let snap = snapshot(&[(3.0, 0.0, 0.0, 50.0), (1.0, 0.0, 0.0, 50.0), (2.0, 0.0, 0.0, 50.0)]);
        let discovery = NeighborDiscovery::default();
        let edges = discovery.discover(&snap, &NeighborDiscovery::build_index(&snap));
        let mut sorted = edges.clone();
        sorted.sort();
        assert_eq!(edges, sorted);
        assert_eq!(edges.len(), 6);
    }
}
