//! Aggregates produced by a single-dataset analysis.

use serde::{Deserialize, Serialize};

use super::{ClassificationKind, Point};

/// Counters over one single-dataset run.
///
/// Each point contributes to exactly one bucket, so
/// `total_pois == invalid_coordinates + pois_in_exact_overlap + pois_in_proximity
///  + state_mismatches + city_mismatches + clean_points`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisMetrics {
    pub total_pois: usize,
    /// Points classified `invalid`, including verification errors
    pub invalid_coordinates: usize,
    /// Subset of `invalid_coordinates` caused by a failed reverse lookup
    pub verification_errors: usize,
    pub pois_in_exact_overlap: usize,
    pub pois_in_proximity: usize,
    pub state_mismatches: usize,
    pub city_mismatches: usize,
    #[serde(rename = "cleanPointsCount")]
    pub clean_points: usize,
}

impl AnalysisMetrics {
    /// Count classifications over every point of a run.
    pub fn from_points(points: &[Point]) -> Self {
        let mut metrics = Self {
            total_pois: points.len(),
            ..Self::default()
        };

        for point in points {
            let Some(classification) = &point.classification else {
                continue;
            };
            match classification.kind {
                ClassificationKind::Invalid => {
                    metrics.invalid_coordinates += 1;
                    if classification.reason == super::REASON_VERIFICATION_ERROR {
                        metrics.verification_errors += 1;
                    }
                }
                ClassificationKind::Duplicate => metrics.pois_in_exact_overlap += 1,
                ClassificationKind::Proximity => metrics.pois_in_proximity += 1,
                ClassificationKind::LocationMismatch => {
                    if classification.reason == super::REASON_INCORRECT_STATE {
                        metrics.state_mismatches += 1;
                    } else {
                        metrics.city_mismatches += 1;
                    }
                }
                ClassificationKind::Clean => metrics.clean_points += 1,
                ClassificationKind::Base | ClassificationKind::Match => {}
            }
        }

        metrics
    }

    /// Sum of the mutually exclusive buckets.
    pub fn bucket_total(&self) -> usize {
        self.invalid_coordinates
            + self.pois_in_exact_overlap
            + self.pois_in_proximity
            + self.state_mismatches
            + self.city_mismatches
            + self.clean_points
    }
}

/// A set of points that share a duplicate cell or a proximity cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointGroup {
    /// Cell key (`"lat,lon"` quantized) or cluster number
    pub key: String,
    pub kind: ClassificationKind,
    /// Member rows, ascending
    pub rows: Vec<usize>,
}
