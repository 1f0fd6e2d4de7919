//! Cross-dataset matching: for each base point, the candidate points that
//! correspond to it under a match policy.

use tracing::{debug, info};

use crate::distance::haversine;
use crate::error::Result;
use crate::geocoding::BatchControl;
use crate::models::{
    Classification, ClassificationKind, DatasetSide, GeoPoint, MatchPolicy, MatchRecord, Point,
    REASON_BASE_POINT, REASON_MATCHED_POINT, SAME_SQUARE_METER,
};
use crate::normalize::ColumnMapping;
use crate::registry::{Coordinates, Dataset};
use crate::spatial::{Neighbour, PointIndex};
use crate::tabular::Table;

/// Output of one comparison run.
#[derive(Debug, Clone)]
pub struct ComparisonResult {
    pub base_side: DatasetSide,
    pub policy: MatchPolicy,
    /// Base point order, then per-base match order
    pub records: Vec<MatchRecord>,
    /// Every base row, located or not
    pub total_base_points: usize,
    /// Base points with at least one record
    pub matched_base_points: usize,
    /// Base points labeled `base`, in row order
    pub base_points: Vec<Point>,
    /// Candidate points present in at least one record, labeled `match`
    pub candidate_points: Vec<Point>,
    pub interrupted: bool,
}

impl ComparisonResult {
    /// Records at most one meter apart, whatever the policy.
    pub fn same_square_matches(&self) -> Vec<&MatchRecord> {
        self.records
            .iter()
            .filter(|r| r.is_same_square_meter())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Match dataset `a` against dataset `b`, with `base` choosing which one
/// drives the search.
///
/// Policy and coordinate mappings are validated before any row is read.
pub fn compare_datasets(
    a: &Table,
    mapping_a: &ColumnMapping,
    b: &Table,
    mapping_b: &ColumnMapping,
    base: DatasetSide,
    policy: MatchPolicy,
    control: &BatchControl,
) -> Result<ComparisonResult> {
    policy.validate()?;
    mapping_a.require_coordinates("A")?;
    mapping_b.require_coordinates("B")?;

    let dataset_a = Dataset::from_table("A", a, mapping_a, Coordinates::Required)?;
    let dataset_b = Dataset::from_table("B", b, mapping_b, Coordinates::Required)?;
    let (base_set, candidate_set) = match base {
        DatasetSide::A => (dataset_a, dataset_b),
        DatasetSide::B => (dataset_b, dataset_a),
    };

    info!(
        "Comparing {} base points ({}) against {} candidates, policy: {}",
        base_set.len(),
        base,
        candidate_set.len(),
        policy
    );

    let matcher = Matcher::new(&candidate_set.points, policy);
    let mut records = Vec::new();
    let mut matched_base_points = 0;
    let mut matched_candidates = vec![false; candidate_set.len()];
    let mut base_points = Vec::with_capacity(base_set.len());

    let mut batch = control.start(base_set.len());
    for point in &base_set.points {
        if !batch.proceed() {
            break;
        }

        let mut labeled = point.clone();
        labeled.classify(Classification::new(ClassificationKind::Base, REASON_BASE_POINT));
        base_points.push(labeled);

        if let Some(location) = point.location {
            let hits = matcher.matches(&location);
            if !hits.is_empty() {
                matched_base_points += 1;
            }
            for hit in hits {
                let candidate = &candidate_set.points[hit.index];
                matched_candidates[hit.index] = true;
                records.push(MatchRecord {
                    base_row: point.row,
                    base: point.attributes.clone(),
                    candidate_row: candidate.row,
                    candidate: candidate.attributes.clone(),
                    distance_m: hit.distance_m,
                });
            }
        } else {
            debug!("Base row {} has no coordinates, skipped", point.row);
        }

        batch.complete_row();
    }
    let interrupted = batch.finish();

    let candidate_points: Vec<Point> = candidate_set
        .points
        .iter()
        .zip(&matched_candidates)
        .filter(|(_, matched)| **matched)
        .map(|(p, _)| {
            let mut labeled = p.clone();
            labeled.classify(Classification::new(ClassificationKind::Match, REASON_MATCHED_POINT));
            labeled
        })
        .collect();

    let result = ComparisonResult {
        base_side: base,
        policy,
        records,
        total_base_points: base_set.len(),
        matched_base_points,
        base_points,
        candidate_points,
        interrupted,
    };

    info!(
        "Comparison: {} records, {}/{} base points matched, {} in the same square meter",
        result.records.len(),
        result.matched_base_points,
        result.total_base_points,
        result.same_square_matches().len()
    );
    Ok(result)
}

/// Candidate pool plus the active policy.
struct Matcher<'a> {
    candidates: &'a [Point],
    index: PointIndex,
    policy: MatchPolicy,
}

impl<'a> Matcher<'a> {
    fn new(candidates: &'a [Point], policy: MatchPolicy) -> Self {
        let index = PointIndex::build(
            candidates
                .iter()
                .enumerate()
                .filter_map(|(idx, p)| p.location.map(|l| (idx, l))),
        );
        Self {
            candidates,
            index,
            policy,
        }
    }

    /// Retained candidates for one base location, in policy order.
    fn matches(&self, location: &GeoPoint) -> Vec<Neighbour> {
        match self.policy {
            // Candidate dataset order
            MatchPolicy::ExactCell => self.index.within(location, SAME_SQUARE_METER),
            MatchPolicy::Radius(radius) => {
                let mut hits = self.index.within(location, radius);
                hits.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));
                hits
            }
            MatchPolicy::Nearest(n) => {
                let mut hits: Vec<Neighbour> = self
                    .candidates
                    .iter()
                    .enumerate()
                    .filter_map(|(index, p)| {
                        p.location.map(|l| Neighbour {
                            index,
                            distance_m: haversine(location, &l),
                        })
                    })
                    .collect();
                hits.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));
                hits.truncate(n);
                hits
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::geocoding::CancelFlag;
    use crate::tabular::read_csv_str;

    fn coords() -> ColumnMapping {
        ColumnMapping::coordinates("lat", "lon")
    }

    fn run(a: &str, b: &str, base: DatasetSide, policy: MatchPolicy) -> ComparisonResult {
        compare_datasets(
            &read_csv_str(a).unwrap(),
            &coords(),
            &read_csv_str(b).unwrap(),
            &coords(),
            base,
            policy,
            &BatchControl::immediate(),
        )
        .unwrap()
    }

    #[test]
    fn test_candidates_need_only_coordinate_columns() {
        let a = read_csv_str("nome,lat,lon,uf\nLoja,0,0,SP").unwrap();
        let b = read_csv_str("y,x\n0.00001,0").unwrap();
        let mapping_a = ColumnMapping::coordinates("lat", "lon").with_state("uf").with_name("nome");
        let mapping_b = ColumnMapping {
            lat: Some("y".to_string()),
            lon: Some("x".to_string()),
            ..mapping_a.coordinates_only()
        };

        let result = compare_datasets(
            &a,
            &mapping_a,
            &b,
            &mapping_b,
            DatasetSide::A,
            MatchPolicy::Radius(5.0),
            &BatchControl::immediate(),
        )
        .unwrap();
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.matched_base_points, 1);
    }

    #[test]
    fn test_exact_cell_keeps_candidate_order() {
        let a = "lat,lon\n0,0";
        let b = "lat,lon,id\n0.000005,0,far\n0,0,same\n0.000001,0,near\n1,1,away";
        let result = run(a, b, DatasetSide::A, MatchPolicy::ExactCell);

        let rows: Vec<usize> = result.records.iter().map(|r| r.candidate_row).collect();
        assert_eq!(rows, vec![1, 2, 3]);
        assert!(result.records.iter().all(|r| r.distance_m <= 1.0));
        assert_eq!(result.same_square_matches().len(), 3);
    }

    #[test]
    fn test_radius_sorted_by_distance() {
        let a = "lat,lon\n0,0";
        let b = "lat,lon\n0.0005,0\n0.0001,0\n0.0003,0\n0.01,0";
        let result = run(a, b, DatasetSide::A, MatchPolicy::Radius(100.0));

        let rows: Vec<usize> = result.records.iter().map(|r| r.candidate_row).collect();
        assert_eq!(rows, vec![2, 3, 1]);
        assert!(result.records.iter().all(|r| r.distance_m <= 100.0));
    }

    #[test]
    fn test_nearest_ties_follow_candidate_order() {
        let a = "lat,lon\n0,0";
        // Rows 1 and 3 are equidistant
        let b = "lat,lon\n0.001,0\n0.002,0\n-0.001,0\n0.0001,0";
        let result = run(a, b, DatasetSide::A, MatchPolicy::Nearest(3));

        let rows: Vec<usize> = result.records.iter().map(|r| r.candidate_row).collect();
        assert_eq!(rows, vec![4, 1, 3]);

        let result = run(a, b, DatasetSide::A, MatchPolicy::Nearest(10));
        assert_eq!(result.records.len(), 4);
    }

    #[test]
    fn test_aggregates_and_labels() {
        let a = "lat,lon\n0,0\n,\n5,5";
        let b = "lat,lon\n0.00001,0\n9,9";
        let result = run(a, b, DatasetSide::A, MatchPolicy::Radius(50.0));

        assert_eq!(result.total_base_points, 3);
        assert_eq!(result.matched_base_points, 1);
        assert_eq!(result.base_points.len(), 3);
        assert!(result.base_points.iter().all(|p| p.kind() == Some(ClassificationKind::Base)));
        assert_eq!(result.candidate_points.len(), 1);
        assert_eq!(result.candidate_points[0].reason(), Some(REASON_MATCHED_POINT));
    }

    #[test]
    fn test_base_side_b() {
        let a = "lat,lon\n0,0\n0.00001,0";
        let b = "lat,lon\n0,0";
        let from_a = run(a, b, DatasetSide::A, MatchPolicy::Nearest(1));
        let from_b = run(a, b, DatasetSide::B, MatchPolicy::Nearest(1));
        assert_eq!(from_a.records.len(), 2);
        assert_eq!(from_b.records.len(), 1);
        assert_eq!(from_b.base_side, DatasetSide::B);
        assert_eq!(from_b.total_base_points, 1);
    }

    #[test]
    fn test_empty_datasets_are_not_errors() {
        let result = run("lat,lon", "lat,lon\n1,1", DatasetSide::A, MatchPolicy::ExactCell);
        assert!(result.is_empty());
        assert_eq!(result.total_base_points, 0);

        let result = run("lat,lon\nx,y", "lat,lon", DatasetSide::A, MatchPolicy::Nearest(1));
        assert!(result.is_empty());
        assert_eq!(result.total_base_points, 1);
        assert_eq!(result.matched_base_points, 0);
    }

    #[test]
    fn test_configuration_errors_come_first() {
        let table = read_csv_str("lat,lon\n0,0").unwrap();
        let err = compare_datasets(
            &table,
            &coords(),
            &table,
            &ColumnMapping::default(),
            DatasetSide::A,
            MatchPolicy::ExactCell,
            &BatchControl::immediate(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::MissingColumn { .. }));

        let err = compare_datasets(
            &table,
            &coords(),
            &table,
            &coords(),
            DatasetSide::A,
            MatchPolicy::Nearest(0),
            &BatchControl::immediate(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidPolicy(_)));
    }

    #[test]
    fn test_cancelled_before_start() {
        let table = read_csv_str("lat,lon\n0,0\n1,1").unwrap();
        let cancel = CancelFlag::new();
        cancel.cancel();
        let result = compare_datasets(
            &table,
            &coords(),
            &table,
            &coords(),
            DatasetSide::A,
            MatchPolicy::ExactCell,
            &BatchControl::immediate().with_cancel(cancel),
        )
        .unwrap();
        assert!(result.interrupted);
        assert!(result.records.is_empty());
        assert_eq!(result.total_base_points, 2);
    }
}
