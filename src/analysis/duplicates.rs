//! Exact-overlap detection: points sharing the same ~1 m cell.

use hashbrown::HashMap;

use crate::models::{Classification, ClassificationKind, GeoPoint, Point, PointGroup};

/// Cells per degree. 1e-5 degree of latitude is about 1.1 m.
const CELL_SCALE: f64 = 1e5;

/// One axis of a cell key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Axis {
    Cell(i64),
    /// Scaled value does not fit in an `i64`; only bit-identical values share it.
    Exact(u64),
}

impl Axis {
    fn of(value: f64) -> Self {
        let scaled = (value * CELL_SCALE).round();
        // i64::MAX as f64 is 2^63, the first value that no longer fits
        if scaled.abs() < i64::MAX as f64 {
            Axis::Cell(scaled as i64)
        } else {
            Axis::Exact(value.to_bits())
        }
    }

    fn degrees(self) -> f64 {
        match self {
            Axis::Cell(cell) => cell as f64 / CELL_SCALE,
            Axis::Exact(bits) => f64::from_bits(bits),
        }
    }
}

type CellKey = (Axis, Axis);

/// Quantized cell of a location.
fn cell_key(location: &GeoPoint) -> CellKey {
    (Axis::of(location.lat), Axis::of(location.lon))
}

fn format_key((lat, lon): CellKey) -> String {
    format!("{:.5},{:.5}", lat.degrees(), lon.degrees())
}

/// Flag every unclassified located point whose cell holds at least one other
/// such point. Groups come out in order of their first member.
pub(super) fn flag_duplicates(points: &mut [Point]) -> Vec<PointGroup> {
    let mut cells: HashMap<CellKey, Vec<usize>> = HashMap::new();
    let mut order = Vec::new();

    for (idx, point) in points.iter().enumerate() {
        if point.is_classified() {
            continue;
        }
        let Some(location) = point.location else {
            continue;
        };
        let key = cell_key(&location);
        let members = cells.entry(key).or_default();
        if members.is_empty() {
            order.push(key);
        }
        members.push(idx);
    }

    let mut groups = Vec::new();
    for key in order {
        let Some(members) = cells.remove(&key) else {
            continue;
        };
        if members.len() < 2 {
            continue;
        }
        for &idx in &members {
            points[idx].classify(Classification::duplicate());
        }
        groups.push(PointGroup {
            key: format_key(key),
            kind: ClassificationKind::Duplicate,
            rows: members.iter().map(|&idx| points[idx].row).collect(),
        });
    }

    groups
}
