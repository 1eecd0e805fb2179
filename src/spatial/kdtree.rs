use super::{IndexedPoint, within_range};
use crate::node::{NodeId, Position};
use std::cmp::Ordering;

const DIMENSIONS: usize = 3;

/// Balanced 3-d tree stored implicitly in a flat array.
///
/// Every subtree occupies a contiguous slice whose median element is its
/// root; `axes[i]` is the split axis of the node stored at `points[i]`.
/// Everything left of the median orders before it on `(coordinate, id)`,
/// everything right orders after it.
#[derive(Debug, Clone, Default)]
pub struct KdTree {
    points: Vec<IndexedPoint>,
    axes: Vec<u8>,
}

impl KdTree {
    /// Points with a non-finite coordinate are left out: no range test can
    /// ever match them, and a NaN split value would prune both subtrees.
    pub fn build(items: impl IntoIterator<Item = (NodeId, Position)>) -> Self {
        let mut points: Vec<IndexedPoint> = items
            .into_iter()
            .filter(|(_, position)| position.is_finite())
            .map(|(id, position)| IndexedPoint { id, position })
            .collect();
        let mut axes = vec![0u8; points.len()];
        build_subtree(&mut points, &mut axes);
        Self { points, axes }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// All points with distance <= `radius` from `center`, in tree order.
    pub fn within(&self, center: &Position, radius: f64) -> Vec<IndexedPoint> {
        let mut found = Vec::new();
        if radius > 0.0 {
            self.search(0, self.points.len(), center, radius, &mut found);
        }
        found
    }

    fn search(&self, lo: usize, hi: usize, center: &Position, radius: f64, found: &mut Vec<IndexedPoint>) {
        if lo >= hi {
            return;
        }
        let mid = lo + (hi - lo) / 2;
        let point = &self.points[mid];
        let axis = self.axes[mid] as usize;

        if within_range(center.distance2(&point.position), radius) {
            found.push(*point);
        }

        // Prune on the squared axis gap: any point beyond the split plane is
        // at least that far away, so the squared comparison can never drop a
        // point the full distance test would have kept.
        let gap = center.axis(axis) - point.position.axis(axis);
        let r2 = radius * radius;
        let reaches = gap * gap <= r2;

        if gap <= 0.0 || reaches {
            self.search(lo, mid, center, radius, found);
        }
        if gap >= 0.0 || reaches {
            self.search(mid + 1, hi, center, radius, found);
        }
    }
}

fn build_subtree(points: &mut [IndexedPoint], axes: &mut [u8]) {
    if points.is_empty() {
        return;
    }
    let axis = widest_axis(points);
    let mid = points.len() / 2;
    points.select_nth_unstable_by(mid, |a, b| compare_on(axis, a, b));
    axes[mid] = axis as u8;

    let (left, rest) = points.split_at_mut(mid);
    let (left_axes, rest_axes) = axes.split_at_mut(mid);
    build_subtree(left, left_axes);
    build_subtree(&mut rest[1..], &mut rest_axes[1..]);
}

fn widest_axis(points: &[IndexedPoint]) -> usize {
    let mut best = 0;
    let mut best_spread = f64::NEG_INFINITY;
    for axis in 0..DIMENSIONS {
        let (min, max) = points.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), p| {
            let c = p.position.axis(axis);
            (min.min(c), max.max(c))
        });
        let spread = max - min;
        if spread > best_spread {
            best_spread = spread;
            best = axis;
        }
    }
    best
}

// Ties on the coordinate fall back to the id so construction is deterministic.
fn compare_on(axis: usize, a: &IndexedPoint, b: &IndexedPoint) -> Ordering {
    a.position
        .axis(axis)
        .total_cmp(&b.position.axis(axis))
        .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(points: &[(u64, f64, f64, f64)]) -> KdTree {
        KdTree::build(points.iter().map(|&(id, x, y, z)| (NodeId::new(id), Position::new(x, y, z))))
    }

    fn ids(mut found: Vec<IndexedPoint>) -> Vec<u64> {
        found.sort_by_key(|p| p.id);
        found.into_iter().map(|p| p.id.as_u64()).collect()
    }

    #[test]
    fn empty_tree_finds_nothing() {
        let t = KdTree::build(Vec::<(NodeId, Position)>::new());
        assert!(t.is_empty());
        assert!(t.within(&Position::default(), 1e9).is_empty());
    }

    #[test]
    fn radius_is_inclusive() {
        let t = tree(&[(0, 0.0, 0.0, 0.0), (1, 3.0, 4.0, 0.0), (2, 3.0, 4.1, 0.0)]);
        assert_eq!(ids(t.within(&Position::default(), 5.0)), vec![0, 1]);
    }

    #[test]
    fn zero_radius_matches_nothing() {
        let t = tree(&[(0, 1.0, 1.0, 1.0), (1, 1.0, 1.0, 1.0)]);
        assert!(t.within(&Position::new(1.0, 1.0, 1.0), 0.0).is_empty());
    }

    #[test]
    fn duplicate_coordinates_are_all_found() {
        let pts: Vec<_> = (0..50).map(|i| (i, 7.0, (i % 3) as f64, 0.0)).collect();
        let t = tree(&pts);
        assert_eq!(ids(t.within(&Position::new(7.0, 0.0, 0.0), 0.5)).len(), 17);
        assert_eq!(ids(t.within(&Position::new(7.0, 1.0, 0.0), 10.0)).len(), 50);
    }

    #[test]
    fn non_finite_points_do_not_hide_finite_ones() {
        let pts: Vec<_> = (0..9)
            .map(|i| {
                let x = if i % 2 == 0 { f64::NAN } else { i as f64 };
                (i, x, 0.0, 0.0)
            })
            .collect();
        let t = tree(&pts);
        assert_eq!(t.len(), 4);
        assert_eq!(ids(t.within(&Position::new(1.0, 0.0, 0.0), 100.0)), vec![1, 3, 5, 7]);
        assert!(t.within(&Position::new(f64::NAN, 0.0, 0.0), 100.0).is_empty());
    }

    #[test]
    fn build_is_deterministic_under_input_order() {
        let pts = [(3, 1.0, 0.0, 0.0), (1, 1.0, 0.0, 0.0), (2, 5.0, 2.0, 0.0), (0, -4.0, 9.0, 1.0)];
        let mut reversed = pts;
        reversed.reverse();
        let a = tree(&pts);
        let b = tree(&reversed);
        assert_eq!(a.points, b.points);
        assert_eq!(a.axes, b.axes);
    }
}
