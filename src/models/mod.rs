//! Core data models for point analysis and matching.

pub mod matching;
pub mod metrics;
pub mod point;

pub use matching::{DatasetSide, MatchPolicy, MatchRecord, SAME_SQUARE_METER};
pub use metrics::{AnalysisMetrics, PointGroup};
pub use point::{
    Classification, ClassificationKind, GeoPoint, GeographicCheck, Point,
    REASON_BASE_POINT, REASON_EXACT_OVERLAP, REASON_INCORRECT_CITY, REASON_INCORRECT_STATE,
    REASON_INVALID_COORDINATE, REASON_MATCHED_POINT, REASON_PROXIMITY, REASON_VALID_POINT,
    REASON_VERIFICATION_ERROR,
};
