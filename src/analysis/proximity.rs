//! Proximity clusters: points linked, directly or through other points, by
//! pairs closer than the threshold.

use hashbrown::HashMap;

use crate::models::{Classification, ClassificationKind, Point, PointGroup};
use crate::spatial::PointIndex;

/// Disjoint sets over `0..n`. The root of a set is always its smallest member.
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        while self.parent[x] != root {
            let next = self.parent[x];
            self.parent[x] = root;
            x = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            let (low, high) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[high] = low;
        }
    }
}

/// Cluster the unclassified located points and flag every cluster with more
/// than one member.
pub(super) fn flag_proximity(points: &mut [Point], threshold_m: f64) -> Vec<PointGroup> {
    let candidates: Vec<usize> = points
        .iter()
        .enumerate()
        .filter(|(_, p)| !p.is_classified() && p.has_location())
        .map(|(idx, _)| idx)
        .collect();

    let index = PointIndex::build(
        candidates
            .iter()
            .enumerate()
            .filter_map(|(slot, &idx)| points[idx].location.map(|l| (slot, l))),
    );

    let mut sets = UnionFind::new(candidates.len());
    for (slot, &idx) in candidates.iter().enumerate() {
        let Some(location) = points[idx].location else {
            continue;
        };
        for neighbour in index.within(&location, threshold_m) {
            if neighbour.index > slot {
                sets.union(slot, neighbour.index);
            }
        }
    }

    let mut clusters: HashMap<usize, Vec<usize>> = HashMap::new();
    let mut roots = Vec::new();
    for slot in 0..candidates.len() {
        let root = sets.find(slot);
        let members = clusters.entry(root).or_default();
        if members.is_empty() {
            roots.push(root);
        }
        members.push(candidates[slot]);
    }

    let mut groups = Vec::new();
    for root in roots {
        let Some(members) = clusters.remove(&root) else {
            continue;
        };
        if members.len() < 2 {
            continue;
        }
        for &idx in &members {
            points[idx].classify(Classification::proximity());
        }
        groups.push(PointGroup {
            key: format!("cluster-{}", groups.len() + 1),
            kind: ClassificationKind::Proximity,
            rows: members.iter().map(|&idx| points[idx].row).collect(),
        });
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GeoPoint;
    use crate::tabular::Row;

    fn located(row: usize, lat: f64, lon: f64) -> Point {
        Point::new(row, Some(GeoPoint::new(lat, lon)), Row::from_pairs([("id", row.to_string())]))
    }

    #[test]
    fn test_union_find_roots_are_smallest() {
        let mut sets = UnionFind::new(5);
        sets.union(4, 2);
        sets.union(2, 3);
        sets.union(3, 1);
        assert_eq!(sets.find(4), 1);
        assert_eq!(sets.find(0), 0);
    }

    #[test]
    fn test_chain_forms_one_cluster() {
        // ~11 m steps along a meridian; ends are ~22 m apart
        let mut points = vec![
            located(1, 0.0, 0.0),
            located(2, 0.0001, 0.0),
            located(3, 0.0002, 0.0),
            located(4, 1.0, 1.0),
        ];
        let groups = flag_proximity(&mut points, 15.0);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].key, "cluster-1");
        assert_eq!(groups[0].rows, vec![1, 2, 3]);
        assert_eq!(points[2].kind(), Some(ClassificationKind::Proximity));
        assert!(!points[3].is_classified());
    }

    #[test]
    fn test_threshold_below_distance() {
        let mut points = vec![located(1, 0.0, 0.0), located(2, 0.0001, 0.0)];
        assert!(flag_proximity(&mut points, 10.0).is_empty());
        assert_eq!(flag_proximity(&mut points, 12.0).len(), 1);
    }

    #[test]
    fn test_separate_clusters_numbered_in_row_order() {
        let mut points = vec![
            located(1, 10.0, 10.0),
            located(2, 0.0, 0.0),
            located(3, 10.00005, 10.0),
            located(4, 0.00005, 0.0),
        ];
        let groups = flag_proximity(&mut points, 10.0);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].rows, vec![1, 3]);
        assert_eq!(groups[1].rows, vec![2, 4]);
        assert_eq!(groups[1].key, "cluster-2");
    }

    #[test]
    fn test_flagged_points_are_ignored() {
        let mut dup = located(1, 0.0, 0.0);
        dup.classify(Classification::duplicate());
        let mut points = vec![dup, located(2, 0.00005, 0.0)];
        assert!(flag_proximity(&mut points, 100.0).is_empty());
        assert_eq!(points[0].kind(), Some(ClassificationKind::Duplicate));
    }
}
