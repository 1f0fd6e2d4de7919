//! Point-in-polygon reverse geocoding.
//!
//! Extracts state and city boundaries from OSM and answers lookups through
//! an R-tree spatial index, without any network access.

mod boundary;
mod geometry;
mod index;
mod service;

pub use boundary::{extract_admin_boundaries, load_boundaries, AdminBoundary, BoundaryLevels, PlaceKind};
pub use geometry::assemble_rings;
pub use index::AdminSpatialIndex;
pub use service::PipService;
