//! Spatial index over one tick's node positions.

pub mod kdtree;

pub use kdtree::KdTree;

use crate::node::{NodeId, Position};

/// Inclusive range test shared by the index and the exhaustive scan.
///
/// A non-positive (or NaN) radius never matches, so a node with range 0 has
/// no neighbors even if another node sits on top of it. A non-finite
/// distance never matches either, even against an infinite radius.
pub fn within_range(d2: f64, radius: f64) -> bool {
    radius > 0.0 && d2.is_finite() && d2 <= radius * radius
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexedPoint {
    pub id: NodeId,
    pub position: Position,
}
