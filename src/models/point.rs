//! Point of interest structure shared by every analysis phase.

use serde::{Deserialize, Serialize};

use crate::tabular::Row;

/// Reason attached to points with unusable coordinates.
pub const REASON_INVALID_COORDINATE: &str = "invalid coordinate";
/// Reason attached to points that passed every enabled check.
pub const REASON_VALID_POINT: &str = "valid point";
/// Reason attached to points sharing the same square meter.
pub const REASON_EXACT_OVERLAP: &str = "exact overlap";
/// Reason attached to points clustered within the proximity threshold.
pub const REASON_PROXIMITY: &str = "proximity";
pub const REASON_INCORRECT_STATE: &str = "incorrect state";
pub const REASON_INCORRECT_CITY: &str = "incorrect city";
/// Reason attached when the reverse geocoder failed for the point.
pub const REASON_VERIFICATION_ERROR: &str = "verification error";
pub const REASON_BASE_POINT: &str = "base point";
pub const REASON_MATCHED_POINT: &str = "matched point";

/// Geographic point (lat/lon in degrees)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl From<GeoPoint> for geo_types::Point<f64> {
    fn from(p: GeoPoint) -> Self {
        geo_types::Point::new(p.lon, p.lat)
    }
}

/// Classification of a point after analysis or comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClassificationKind {
    Clean,
    Invalid,
    Duplicate,
    Proximity,
    LocationMismatch,
    Base,
    Match,
}

impl ClassificationKind {
    /// All kinds, in reporting order
    pub fn all() -> &'static [ClassificationKind] {
        &[
            ClassificationKind::Clean,
            ClassificationKind::Invalid,
            ClassificationKind::Duplicate,
            ClassificationKind::Proximity,
            ClassificationKind::LocationMismatch,
            ClassificationKind::Base,
            ClassificationKind::Match,
        ]
    }

    pub fn is_problem(&self) -> bool {
        matches!(
            self,
            ClassificationKind::Invalid
                | ClassificationKind::Duplicate
                | ClassificationKind::Proximity
                | ClassificationKind::LocationMismatch
        )
    }
}

impl std::fmt::Display for ClassificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassificationKind::Clean => write!(f, "clean"),
            ClassificationKind::Invalid => write!(f, "invalid"),
            ClassificationKind::Duplicate => write!(f, "duplicate"),
            ClassificationKind::Proximity => write!(f, "proximity"),
            ClassificationKind::LocationMismatch => write!(f, "location-mismatch"),
            ClassificationKind::Base => write!(f, "base"),
            ClassificationKind::Match => write!(f, "match"),
        }
    }
}

/// Tagged classification: a kind plus a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub kind: ClassificationKind,
    pub reason: String,
}

impl Classification {
    pub fn new(kind: ClassificationKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }

    pub fn clean() -> Self {
        Self::new(ClassificationKind::Clean, REASON_VALID_POINT)
    }

    pub fn invalid_coordinate() -> Self {
        Self::new(ClassificationKind::Invalid, REASON_INVALID_COORDINATE)
    }

    pub fn verification_error() -> Self {
        Self::new(ClassificationKind::Invalid, REASON_VERIFICATION_ERROR)
    }

    pub fn duplicate() -> Self {
        Self::new(ClassificationKind::Duplicate, REASON_EXACT_OVERLAP)
    }

    pub fn proximity() -> Self {
        Self::new(ClassificationKind::Proximity, REASON_PROXIMITY)
    }

    pub fn incorrect_state() -> Self {
        Self::new(ClassificationKind::LocationMismatch, REASON_INCORRECT_STATE)
    }

    pub fn incorrect_city() -> Self {
        Self::new(ClassificationKind::LocationMismatch, REASON_INCORRECT_CITY)
    }
}

/// Outcome of a geographic consistency check for one point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeographicCheck {
    pub detected_state: Option<String>,
    pub detected_city: Option<String>,
    pub state_match: bool,
    pub city_match: bool,
}

/// One row of an input dataset.
///
/// Coordinates are stored as a single optional pair, so a point can never
/// carry a latitude without a longitude.
#[derive(Debug, Clone)]
pub struct Point {
    /// 1-based data line number (header row excluded)
    pub row: usize,

    /// Parsed coordinates, `None` when either cell failed to parse
    pub location: Option<GeoPoint>,

    /// Original cells, preserved verbatim for export
    pub attributes: Row,

    /// Current classification; later phases replace it
    pub classification: Option<Classification>,

    /// Present only after a geographic consistency check ran
    pub geography: Option<GeographicCheck>,
}

impl Point {
    pub fn new(row: usize, location: Option<GeoPoint>, attributes: Row) -> Self {
        Self {
            row,
            location,
            attributes,
            classification: None,
            geography: None,
        }
    }

    pub fn latitude(&self) -> Option<f64> {
        self.location.map(|l| l.lat)
    }

    pub fn longitude(&self) -> Option<f64> {
        self.location.map(|l| l.lon)
    }

    pub fn has_location(&self) -> bool {
        self.location.is_some()
    }

    pub fn kind(&self) -> Option<ClassificationKind> {
        self.classification.as_ref().map(|c| c.kind)
    }

    pub fn is_classified(&self) -> bool {
        self.classification.is_some()
    }

    /// Replace the classification.
    pub fn classify(&mut self, classification: Classification) {
        self.classification = Some(classification);
    }

    pub fn reason(&self) -> Option<&str> {
        self.classification.as_ref().map(|c| c.reason.as_str())
    }

    pub fn detected_state(&self) -> Option<&str> {
        self.geography
            .as_ref()
            .and_then(|g| g.detected_state.as_deref())
    }

    pub fn detected_city(&self) -> Option<&str> {
        self.geography
            .as_ref()
            .and_then(|g| g.detected_city.as_deref())
    }

    pub fn state_match(&self) -> Option<bool> {
        self.geography.as_ref().map(|g| g.state_match)
    }

    pub fn city_match(&self) -> Option<bool> {
        self.geography.as_ref().map(|g| g.city_match)
    }
}
