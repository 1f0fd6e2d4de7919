//! Offline reverse geocoder backed by the boundary index.

use std::path::Path;

use tracing::debug;

use super::{load_boundaries, AdminSpatialIndex, BoundaryLevels, PlaceKind};
use crate::error::{GeocodeError, Result};
use crate::geocoding::{ReverseGeocoder, ReversePlace};
use crate::models::GeoPoint;

/// Point-in-polygon lookup service
pub struct PipService {
    index: AdminSpatialIndex,
}

impl PipService {
    pub fn new(index: AdminSpatialIndex) -> Self {
        Self { index }
    }

    /// Load state and city boundaries from a PBF extract.
    pub fn from_pbf(path: &Path, levels: BoundaryLevels) -> Result<Self> {
        let boundaries = load_boundaries(path, levels)?;
        Ok(Self::new(AdminSpatialIndex::build(boundaries)))
    }

    /// State and city containing `location`; either is `None` outside
    /// every loaded boundary.
    pub fn lookup(&self, location: &GeoPoint) -> ReversePlace {
        let state = self.index.lookup(location, PlaceKind::State);
        let city = self.index.lookup(location, PlaceKind::City);
        debug!(
            "PIP lookup at ({}, {}): state={:?} city={:?}",
            location.lat,
            location.lon,
            state.as_ref().map(|b| b.name.as_str()),
            city.as_ref().map(|b| b.name.as_str())
        );
        ReversePlace {
            state: state.map(|b| b.name.clone()),
            city: city.map(|b| b.name.clone()),
        }
    }

    pub fn index(&self) -> &AdminSpatialIndex {
        &self.index
    }
}

impl ReverseGeocoder for PipService {
    async fn reverse_geocode(&self, location: GeoPoint) -> std::result::Result<ReversePlace, GeocodeError> {
        Ok(self.lookup(&location))
    }
}
