//! Coordinate parsing and column mapping resolution.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::GeoPoint;

/// Parse one raw coordinate cell.
///
/// Comma decimal marks are accepted (`"-23,5505"`). Anything that does not
/// parse to a finite number yields `None`. No range check is applied.
pub fn parse_coordinate(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let normalized = trimmed.replace(',', ".");
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a latitude/longitude cell pair. The pair is usable only when both
/// cells are valid.
pub fn parse_location(raw_lat: &str, raw_lon: &str) -> Option<GeoPoint> {
    let lat = parse_coordinate(raw_lat)?;
    let lon = parse_coordinate(raw_lon)?;
    Some(GeoPoint::new(lat, lon))
}

/// Which input column plays which role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub lat: Option<String>,
    pub lon: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub name: Option<String>,
    pub address: Option<String>,
}

impl ColumnMapping {
    pub fn coordinates(lat: impl Into<String>, lon: impl Into<String>) -> Self {
        Self {
            lat: Some(lat.into()),
            lon: Some(lon.into()),
            ..Self::default()
        }
    }

    pub fn with_state(mut self, column: impl Into<String>) -> Self {
        self.state = Some(column.into());
        self
    }

    pub fn with_city(mut self, column: impl Into<String>) -> Self {
        self.city = Some(column.into());
        self
    }

    pub fn with_name(mut self, column: impl Into<String>) -> Self {
        self.name = Some(column.into());
        self
    }

    pub fn with_address(mut self, column: impl Into<String>) -> Self {
        self.address = Some(column.into());
        self
    }

    /// Same latitude/longitude columns, every other role unmapped.
    pub fn coordinates_only(&self) -> Self {
        Self {
            lat: self.lat.clone(),
            lon: self.lon.clone(),
            ..Self::default()
        }
    }

    pub fn has_coordinates(&self) -> bool {
        mapped(&self.lat).is_some() && mapped(&self.lon).is_some()
    }

    /// Resolve column names to header positions once per run.
    ///
    /// A mapped column missing from `headers` is a configuration error. An
    /// empty-string mapping counts as unmapped.
    pub fn resolve(&self, dataset: &str, headers: &[String]) -> Result<ResolvedColumns> {
        let find = |role: &'static str, column: &Option<String>| -> Result<Option<usize>> {
            let Some(column) = mapped(column) else {
                return Ok(None);
            };
            headers
                .iter()
                .position(|h| h == column)
                .map(Some)
                .ok_or_else(|| Error::UnknownColumn {
                    dataset: dataset.to_string(),
                    role,
                    column: column.to_string(),
                })
        };

        Ok(ResolvedColumns {
            lat: find("latitude", &self.lat)?,
            lon: find("longitude", &self.lon)?,
            state: find("state", &self.state)?,
            city: find("city", &self.city)?,
            name: find("name", &self.name)?,
            address: find("address", &self.address)?,
        })
    }

    /// Fail unless both coordinate columns are mapped.
    pub fn require_coordinates(&self, dataset: &str) -> Result<()> {
        if mapped(&self.lat).is_none() {
            return Err(Error::MissingColumn {
                dataset: dataset.to_string(),
                role: "latitude",
            });
        }
        if mapped(&self.lon).is_none() {
            return Err(Error::MissingColumn {
                dataset: dataset.to_string(),
                role: "longitude",
            });
        }
        Ok(())
    }
}

fn mapped(column: &Option<String>) -> Option<&str> {
    column.as_deref().map(str::trim).filter(|c| !c.is_empty())
}

/// Header positions for each mapped role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolvedColumns {
    pub lat: Option<usize>,
    pub lon: Option<usize>,
    pub state: Option<usize>,
    pub city: Option<usize>,
    pub name: Option<usize>,
    pub address: Option<usize>,
}

impl ResolvedColumns {
    pub fn coordinates(&self) -> Option<(usize, usize)> {
        Some((self.lat?, self.lon?))
    }

    /// Address columns used to build a forward-geocoding query, in query order.
    pub fn address_parts(&self) -> Vec<usize> {
        [self.name, self.address, self.city, self.state]
            .into_iter()
            .flatten()
            .collect()
    }
}
