//! State and city boundary extraction from an OSM extract.

use std::fs::File;
use std::path::Path;

use geo::MultiPolygon;
use osmpbfreader::{OsmPbfReader, Tags};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::geometry::GeometryResolver;
use crate::error::{Error, Result};

/// What a boundary stands for when answering a reverse lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PlaceKind {
    State,
    City,
}

/// OSM `admin_level` values mapped to states and cities.
///
/// 4 and 8 fit most countries (Brazil included); some use 6 or 7 for
/// municipalities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundaryLevels {
    pub state: u8,
    pub city: u8,
}

impl Default for BoundaryLevels {
    fn default() -> Self {
        Self { state: 4, city: 8 }
    }
}

impl BoundaryLevels {
    pub fn kind_of(&self, admin_level: u8) -> Option<PlaceKind> {
        if admin_level == self.state {
            Some(PlaceKind::State)
        } else if admin_level == self.city {
            Some(PlaceKind::City)
        } else {
            None
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.state == self.city {
            return Err(Error::InvalidConfig(format!(
                "state and city boundaries cannot share admin_level {}",
                self.state
            )));
        }
        Ok(())
    }

    fn kind_of_tags(&self, tags: &Tags) -> Option<PlaceKind> {
        let administrative = tags
            .get("boundary")
            .map(|v| v == "administrative")
            .unwrap_or(false);
        if !administrative {
            return None;
        }
        if !matches!(
            tags.get("type").map(|v| v.as_str()),
            Some("boundary") | Some("multipolygon")
        ) {
            return None;
        }
        let level: u8 = tags.get("admin_level")?.parse().ok()?;
        self.kind_of(level)
    }
}

/// One named boundary polygon.
#[derive(Debug, Clone)]
pub struct AdminBoundary {
    pub id: i64,
    pub name: String,
    pub kind: PlaceKind,
    pub geometry: MultiPolygon<f64>,
}

impl AdminBoundary {
    /// `(min_lon, min_lat, max_lon, max_lat)`
    pub fn bbox(&self) -> Option<(f64, f64, f64, f64)> {
        use geo::BoundingRect;
        self.geometry
            .bounding_rect()
            .map(|rect| (rect.min().x, rect.min().y, rect.max().x, rect.max().y))
    }
}

/// Read every state and city boundary of a PBF file.
pub fn load_boundaries(path: &Path, levels: BoundaryLevels) -> Result<Vec<AdminBoundary>> {
    levels.validate()?;
    info!("Loading boundaries from {}", path.display());
    let file = File::open(path)?;
    let mut reader = OsmPbfReader::new(file);
    extract_admin_boundaries(&mut reader, levels)
}

/// Extract named state/city relations and resolve their outer geometry.
///
/// `name` is used as-is; relations without one are skipped.
pub fn extract_admin_boundaries<R: std::io::Read + std::io::Seek>(
    reader: &mut OsmPbfReader<R>,
    levels: BoundaryLevels,
) -> Result<Vec<AdminBoundary>> {
    let resolver = GeometryResolver::build(reader, |tags| levels.kind_of_tags(tags).is_some())?;

    info!("Extracting admin boundaries...");
    reader.rewind()?;

    let mut boundaries = Vec::new();
    for obj in reader.iter() {
        let osmpbfreader::OsmObj::Relation(rel) = obj? else {
            continue;
        };
        let Some(kind) = levels.kind_of_tags(&rel.tags) else {
            continue;
        };
        let Some(name) = rel.tags.get("name").filter(|n| !n.trim().is_empty()) else {
            continue;
        };

        match resolver.resolve_relation(rel.id) {
            Some(geometry) => boundaries.push(AdminBoundary {
                id: rel.id.0,
                name: name.to_string(),
                kind,
                geometry,
            }),
            None => debug!("Could not resolve geometry for boundary {} ({})", rel.id.0, name),
        }
    }

    boundaries.sort_by_key(|b| (b.kind, b.id));
    info!(
        "Found {} states and {} cities",
        boundaries.iter().filter(|b| b.kind == PlaceKind::State).count(),
        boundaries.iter().filter(|b| b.kind == PlaceKind::City).count()
    );
    Ok(boundaries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_mapping() {
        let levels = BoundaryLevels::default();
        assert_eq!(levels.kind_of(4), Some(PlaceKind::State));
        assert_eq!(levels.kind_of(8), Some(PlaceKind::City));
        assert_eq!(levels.kind_of(2), None);

        let custom = BoundaryLevels { state: 4, city: 7 };
        assert_eq!(custom.kind_of(7), Some(PlaceKind::City));
    }

    #[test]
    fn test_levels_must_differ() {
        assert!(BoundaryLevels { state: 6, city: 6 }.validate().is_err());
        assert!(BoundaryLevels::default().validate().is_ok());
    }
}
