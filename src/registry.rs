//! Point registry: wraps input rows into `Point`s.

use tracing::debug;

use crate::error::Result;
use crate::models::Point;
use crate::normalize::{parse_location, ColumnMapping, ResolvedColumns};
use crate::tabular::{Row, Table};

/// Whether the caller needs coordinate columns to be mapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coordinates {
    /// Unmapped lat/lon is a configuration error once there is a row to parse
    Required,
    /// Unmapped lat/lon leaves every point without a location
    Optional,
}

/// Points built from one dataset, plus the column positions used to build them.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub name: String,
    pub columns: ResolvedColumns,
    pub points: Vec<Point>,
}

impl Dataset {
    /// Normalize every row of `table` into a point.
    ///
    /// Rows are numbered from 1 in data order (the header row is not counted).
    pub fn from_table(
        name: &str,
        table: &Table,
        mapping: &ColumnMapping,
        coordinates: Coordinates,
    ) -> Result<Self> {
        Self::from_rows(name, table.headers(), table.rows(), mapping, coordinates)
    }

    pub fn from_rows(
        name: &str,
        headers: &[String],
        rows: &[Row],
        mapping: &ColumnMapping,
        coordinates: Coordinates,
    ) -> Result<Self> {
        if coordinates == Coordinates::Required && !rows.is_empty() {
            mapping.require_coordinates(name)?;
        }

        let columns = mapping.resolve(name, headers)?;
        let points: Vec<Point> = rows
            .iter()
            .enumerate()
            .map(|(idx, row)| build_point(idx + 1, row, &columns))
            .collect();

        debug!(
            "Dataset '{}': {} points, {} with coordinates",
            name,
            points.len(),
            points.iter().filter(|p| p.has_location()).count()
        );

        Ok(Self {
            name: name.to_string(),
            columns,
            points,
        })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Declared state cell of a point, if the state column is mapped.
    pub fn declared_state<'a>(&self, point: &'a Point) -> Option<&'a str> {
        self.columns.state.map(|idx| point.attributes.value_at(idx))
    }

    /// Declared city cell of a point, if the city column is mapped.
    pub fn declared_city<'a>(&self, point: &'a Point) -> Option<&'a str> {
        self.columns.city.map(|idx| point.attributes.value_at(idx))
    }
}

fn build_point(row_number: usize, row: &Row, columns: &ResolvedColumns) -> Point {
    let location = columns
        .coordinates()
        .and_then(|(lat, lon)| parse_location(row.value_at(lat), row.value_at(lon)));
    Point::new(row_number, location, row.clone())
}
