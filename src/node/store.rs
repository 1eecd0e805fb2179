use super::{KinematicState, Node, NodeId, NodeTemplate, Position};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("unknown node {0}")]
    UnknownNode(NodeId),
    #[error("duplicate node {0}")]
    DuplicateNode(NodeId),
}

/// Authoritative owner of every node's state. Mutation needs `&mut self`,
/// so nothing can advance a node while a tick still borrows the store;
/// ticks work off detached [`Snapshot`]s instead.
#[derive(Debug, Clone, Default)]
pub struct NodeStateStore {
    nodes: BTreeMap<NodeId, Node>,
}

impl NodeStateStore {
    pub fn new(nodes: impl IntoIterator<Item = Node>) -> Result<Self, StoreError> {
        let mut map = BTreeMap::new();
        for node in nodes {
            let id = node.id;
            if map.insert(id, node).is_some() {
                return Err(StoreError::DuplicateNode(id));
            }
        }
        Ok(Self { nodes: map })
    }

    /// Fixed population with ids `0..count`, uniformly placed inside the cube
    /// `[0, volume]³`. A negative or non-finite volume collapses to the origin.
    pub fn populate(count: u32, template: &NodeTemplate, volume: f64, seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let side = if volume.is_finite() { volume.max(0.0) } else { 0.0 };

        let nodes = (0..count)
            .map(|i| {
                let position = Position::new(
                    rng.gen_range(0.0..=side),
                    rng.gen_range(0.0..=side),
                    rng.gen_range(0.0..=side),
                );
                (NodeId::new(i as u64), template.instantiate(NodeId::new(i as u64), position))
            })
            .collect();

        debug!("Populated {} nodes in a {:.1}m cube", count, side);
        Self { nodes }
    }

    /// Replace one node's kinematic state.
    pub fn advance(&mut self, id: NodeId, state: KinematicState) -> Result<(), StoreError> {
        let node = self.nodes.get_mut(&id).ok_or(StoreError::UnknownNode(id))?;
        node.state = state;
        Ok(())
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            nodes: self.nodes.values().cloned().collect::<Vec<_>>().into(),
        }
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Read-only copy of every node, sorted by id. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Snapshot {
    nodes: Arc<[Node]>,
}

impl Snapshot {
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes
            .binary_search_by_key(&id, |n| n.id)
            .ok()
            .map(|idx| &self.nodes[idx])
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().map(|n| n.id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_at(id: u64, x: f64) -> Node {
        NodeTemplate::default().instantiate(NodeId::new(id), Position::new(x, 0.0, 0.0))
    }

    #[test]
    fn rejects_duplicate_ids() {
        let err = NodeStateStore::new(vec![node_at(1, 0.0), node_at(1, 5.0)]).unwrap_err();
        assert_eq!(err, StoreError::DuplicateNode(NodeId::new(1)));
    }

    #[test]
    fn snapshot_is_detached_from_later_advances() {
        let mut store = NodeStateStore::new(vec![node_at(0, 0.0), node_at(1, 5.0)]).unwrap();
        let before = store.snapshot();

        let mut moved = store.get(NodeId::new(1)).unwrap().state.clone();
        moved.position.x = 99.0;
        store.advance(NodeId::new(1), moved).unwrap();

        assert_eq!(before.get(NodeId::new(1)).unwrap().position().x, 5.0);
        assert_eq!(store.snapshot().get(NodeId::new(1)).unwrap().position().x, 99.0);
    }

    #[test]
    fn advance_unknown_node_fails() {
        let mut store = NodeStateStore::new(vec![node_at(0, 0.0)]).unwrap();
        let state = store.get(NodeId::new(0)).unwrap().state.clone();
        assert_eq!(store.advance(NodeId::new(7), state), Err(StoreError::UnknownNode(NodeId::new(7))));
    }

    #[test]
    fn seeded_population_is_reproducible() {
        let template = NodeTemplate::default();
        let a = NodeStateStore::populate(20, &template, 1000.0, Some(7)).snapshot();
        let b = NodeStateStore::populate(20, &template, 1000.0, Some(7)).snapshot();
        assert_eq!(a.nodes(), b.nodes());
        assert_eq!(a.len(), 20);
        assert!(a.nodes().iter().all(|n| (0.0..=1000.0).contains(&n.position().x)));
        assert_eq!(a.ids().collect::<Vec<_>>(), (0..20).map(NodeId::new).collect::<Vec<_>>());
    }

    #[test]
    fn unbounded_volume_does_not_panic() {
        let snap = NodeStateStore::populate(3, &NodeTemplate::default(), f64::INFINITY, Some(1)).snapshot();
        assert_eq!(snap.len(), 3);
        assert!(snap.nodes().iter().all(|n| n.position() == Position::default()));
    }
}
