//! Spatial index for fast admin boundary lookups.

use std::sync::Arc;

use geo::{Area, Contains, Point};
use rstar::{RTree, RTreeObject, AABB};
use tracing::info;

use super::{AdminBoundary, PlaceKind};
use crate::models::GeoPoint;

/// Wrapper for R-tree indexing of admin boundaries
#[derive(Clone)]
struct IndexedBoundary {
    boundary: Arc<AdminBoundary>,
    area: f64,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedBoundary {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl IndexedBoundary {
    fn new(boundary: AdminBoundary) -> Option<Self> {
        let (min_x, min_y, max_x, max_y) = boundary.bbox()?;
        Some(Self {
            area: boundary.geometry.unsigned_area(),
            envelope: AABB::from_corners([min_x, min_y], [max_x, max_y]),
            boundary: Arc::new(boundary),
        })
    }
}

/// Spatial index for admin boundaries using R-tree
pub struct AdminSpatialIndex {
    tree: RTree<IndexedBoundary>,
}

impl AdminSpatialIndex {
    pub fn build(boundaries: Vec<AdminBoundary>) -> Self {
        let indexed: Vec<IndexedBoundary> = boundaries
            .into_iter()
            .filter_map(IndexedBoundary::new)
            .collect();
        let tree = RTree::bulk_load(indexed);
        info!("Boundary index built with {} entries", tree.size());
        Self { tree }
    }

    /// Boundary of the given kind containing `location`.
    ///
    /// Overlapping boundaries of one kind resolve to the smallest, then to the
    /// lowest OSM id.
    pub fn lookup(&self, location: &GeoPoint, kind: PlaceKind) -> Option<Arc<AdminBoundary>> {
        let point = Point::new(location.lon, location.lat);
        let query = AABB::from_point([location.lon, location.lat]);

        self.tree
            .locate_in_envelope_intersecting(&query)
            .filter(|ib| ib.boundary.kind == kind)
            .filter(|ib| ib.boundary.geometry.contains(&point))
            .min_by(|a, b| {
                a.area
                    .total_cmp(&b.area)
                    .then(a.boundary.id.cmp(&b.boundary.id))
            })
            .map(|ib| Arc::clone(&ib.boundary))
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}
