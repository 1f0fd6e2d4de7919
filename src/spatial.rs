//! R-tree over point locations for radius queries.
//!
//! Locations are projected to earth-centred cartesian coordinates so that a
//! euclidean ball query returns a superset of the haversine neighbourhood.
//! Every hit is then re-checked with the exact haversine distance, so results
//! are identical to a full pairwise scan.

use rstar::{PointDistance, RTree, RTreeObject, AABB};
use tracing::debug;

use crate::distance::{haversine, to_ecef};
use crate::models::GeoPoint;

/// Extra search radius covering floating-point error in the projection
const CHORD_SLACK_M: f64 = 1e-3;

/// Wrapper for R-tree indexing of a located point
#[derive(Debug, Clone)]
struct IndexedPoint {
    /// Caller-side position (e.g. index into the dataset's points)
    index: usize,
    location: GeoPoint,
    position: [f64; 3],
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 3]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

impl PointDistance for IndexedPoint {
    fn distance_2(&self, point: &[f64; 3]) -> f64 {
        self.position
            .iter()
            .zip(point.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum()
    }
}

/// Spatial index over located points
pub struct PointIndex {
    tree: RTree<IndexedPoint>,
}

/// One radius query hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbour {
    pub index: usize,
    pub distance_m: f64,
}

impl PointIndex {
    /// Build the index from `(index, location)` pairs.
    pub fn build<I>(points: I) -> Self
    where
        I: IntoIterator<Item = (usize, GeoPoint)>,
    {
        let indexed: Vec<IndexedPoint> = points
            .into_iter()
            .map(|(index, location)| IndexedPoint {
                index,
                location,
                position: to_ecef(&location),
            })
            .collect();

        let tree = RTree::bulk_load(indexed);
        debug!("Point index built with {} entries", tree.size());
        Self { tree }
    }

    /// Every indexed point within `radius_m` (haversine, inclusive) of
    /// `center`, in ascending index order.
    pub fn within(&self, center: &GeoPoint, radius_m: f64) -> Vec<Neighbour> {
        let query = to_ecef(center);
        let search = radius_m + CHORD_SLACK_M;

        let mut hits: Vec<Neighbour> = self
            .tree
            .locate_within_distance(query, search * search)
            .filter_map(|ip| {
                let distance_m = haversine(center, &ip.location);
                (distance_m <= radius_m).then_some(Neighbour {
                    index: ip.index,
                    distance_m,
                })
            })
            .collect();

        hits.sort_by_key(|n| n.index);
        hits
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}
