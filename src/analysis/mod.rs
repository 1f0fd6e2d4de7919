//! Single-dataset analysis.
//!
//! Phases run in a fixed order and the first label wins: invalid coordinates,
//! exact overlap, proximity clusters, geographic consistency. Points left
//! unlabeled at the end are clean.

mod duplicates;
mod geographic;
mod proximity;

use tracing::info;

use crate::error::{Error, Result};
use crate::geocoding::{BatchControl, ReverseGeocoder};
use crate::models::{
    AnalysisMetrics, Classification, ClassificationKind, Point, PointGroup,
    REASON_INVALID_COORDINATE,
};
use crate::normalize::ColumnMapping;
use crate::registry::{Coordinates, Dataset};
use crate::tabular::Table;

/// Which checks to run. Nothing here has a hidden default value: the
/// proximity threshold must be given whenever the proximity check is on.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOptions {
    pub check_invalid: bool,
    pub check_duplicates: bool,
    pub check_proximity: bool,
    pub check_geographic: bool,
    /// Meters; required when `check_proximity` is set
    pub proximity_threshold_m: Option<f64>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            check_invalid: true,
            check_duplicates: true,
            check_proximity: false,
            check_geographic: false,
            proximity_threshold_m: None,
        }
    }
}

impl AnalysisOptions {
    /// Every check off.
    pub fn none() -> Self {
        Self {
            check_invalid: false,
            check_duplicates: false,
            ..Self::default()
        }
    }

    pub fn with_invalid(mut self, enabled: bool) -> Self {
        self.check_invalid = enabled;
        self
    }

    pub fn with_duplicates(mut self, enabled: bool) -> Self {
        self.check_duplicates = enabled;
        self
    }

    /// Enable the proximity check with the given threshold in meters.
    pub fn with_proximity(mut self, threshold_m: f64) -> Self {
        self.check_proximity = true;
        self.proximity_threshold_m = Some(threshold_m);
        self
    }

    pub fn with_geographic(mut self, enabled: bool) -> Self {
        self.check_geographic = enabled;
        self
    }

    fn proximity_threshold(&self) -> Result<Option<f64>> {
        if !self.check_proximity {
            return Ok(None);
        }
        match self.proximity_threshold_m {
            Some(t) if t.is_finite() && t >= 0.0 => Ok(Some(t)),
            Some(t) => Err(Error::InvalidConfig(format!(
                "proximity threshold must be a non-negative number of meters, got {}",
                t
            ))),
            None => Err(Error::InvalidConfig(
                "proximity check requires a threshold".to_string(),
            )),
        }
    }
}

/// Result of one analysis run.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    /// Every point in row order, each carrying exactly one classification
    pub points: Vec<Point>,
    pub metrics: AnalysisMetrics,
    /// Duplicate cells and proximity clusters
    pub groups: Vec<PointGroup>,
    /// The geographic phase was cancelled; `points` stops before the first
    /// row that was not processed
    pub interrupted: bool,
    problematic: Vec<usize>,
    clean: Vec<usize>,
}

impl AnalysisReport {
    fn new(points: Vec<Point>, groups: Vec<PointGroup>, interrupted: bool, options: &AnalysisOptions) -> Self {
        let metrics = AnalysisMetrics::from_points(&points);

        let mut problematic = Vec::new();
        let mut clean = Vec::new();
        for (idx, point) in points.iter().enumerate() {
            let Some(classification) = &point.classification else {
                continue;
            };
            match classification.kind {
                ClassificationKind::Clean => clean.push(idx),
                // Unparseable rows are reported only when that check was asked for
                ClassificationKind::Invalid
                    if classification.reason == REASON_INVALID_COORDINATE
                        && !options.check_invalid => {}
                kind if kind.is_problem() => problematic.push(idx),
                _ => {}
            }
        }

        Self {
            points,
            metrics,
            groups,
            interrupted,
            problematic,
            clean,
        }
    }

    /// Points carrying a problem label, in row order.
    pub fn problematic_points(&self) -> Vec<&Point> {
        self.problematic.iter().map(|&idx| &self.points[idx]).collect()
    }

    pub fn clean_points(&self) -> Vec<&Point> {
        self.clean.iter().map(|&idx| &self.points[idx]).collect()
    }
}

/// Analyze a dataset without the geographic phase.
///
/// Asking for the geographic check here is a configuration error; use
/// [`analyze_with_geocoder`] instead.
pub fn analyze(table: &Table, mapping: &ColumnMapping, options: &AnalysisOptions) -> Result<AnalysisReport> {
    if options.check_geographic {
        return Err(Error::InvalidConfig(
            "geographic check needs a reverse geocoder".to_string(),
        ));
    }

    let (dataset, groups) = prepare(table, mapping, options)?;
    Ok(conclude(dataset.points, groups, false, options))
}

/// Analyze a dataset, running the geographic phase (when enabled) through
/// `geocoder`, paced by `control`.
pub async fn analyze_with_geocoder<G>(
    table: &Table,
    mapping: &ColumnMapping,
    options: &AnalysisOptions,
    geocoder: &G,
    control: &BatchControl,
) -> Result<AnalysisReport>
where
    G: ReverseGeocoder,
{
    if options.check_geographic && !table.is_empty() {
        require_declared_place(mapping)?;
    }

    let (mut dataset, mut groups) = prepare(table, mapping, options)?;

    let mut interrupted = false;
    if options.check_geographic {
        if let Some(stop) = geographic::check_points(&mut dataset, geocoder, control).await {
            interrupted = true;
            dataset.points.truncate(stop);
            let last_row = dataset.points.last().map(|p| p.row).unwrap_or(0);
            for group in &mut groups {
                group.rows.retain(|&row| row <= last_row);
            }
            groups.retain(|g| !g.rows.is_empty());
        }
    }

    Ok(conclude(dataset.points, groups, interrupted, options))
}

fn require_declared_place(mapping: &ColumnMapping) -> Result<()> {
    let mapped = |c: &Option<String>| c.as_deref().is_some_and(|c| !c.trim().is_empty());
    if mapped(&mapping.state) || mapped(&mapping.city) {
        Ok(())
    } else {
        Err(Error::MissingColumn {
            dataset: "analysis".to_string(),
            role: "state/city",
        })
    }
}

/// Configuration checks, normalization and the synchronous phases.
fn prepare(
    table: &Table,
    mapping: &ColumnMapping,
    options: &AnalysisOptions,
) -> Result<(Dataset, Vec<PointGroup>)> {
    let threshold = options.proximity_threshold()?;
    let mut dataset = Dataset::from_table("analysis", table, mapping, Coordinates::Required)?;

    // Unusable coordinates are always labeled so they can never end up clean
    for point in dataset.points.iter_mut().filter(|p| !p.has_location()) {
        point.classify(Classification::invalid_coordinate());
    }

    let mut groups = Vec::new();
    if options.check_duplicates {
        groups.extend(duplicates::flag_duplicates(&mut dataset.points));
    }
    if let Some(threshold) = threshold {
        groups.extend(proximity::flag_proximity(&mut dataset.points, threshold));
    }

    Ok((dataset, groups))
}

fn conclude(
    mut points: Vec<Point>,
    groups: Vec<PointGroup>,
    interrupted: bool,
    options: &AnalysisOptions,
) -> AnalysisReport {
    for point in points.iter_mut().filter(|p| !p.is_classified()) {
        point.classify(Classification::clean());
    }

    let report = AnalysisReport::new(points, groups, interrupted, options);
    let m = &report.metrics;
    info!(
        "Analysis: {} points, {} invalid, {} overlapping, {} in proximity, {} state / {} city mismatches, {} clean",
        m.total_pois,
        m.invalid_coordinates,
        m.pois_in_exact_overlap,
        m.pois_in_proximity,
        m.state_mismatches,
        m.city_mismatches,
        m.clean_points
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GeocodeError;
    use crate::geocoding::{CancelFlag, ReversePlace};
    use crate::models::{GeoPoint, REASON_INCORRECT_STATE, REASON_VERIFICATION_ERROR};
    use crate::tabular::read_csv_str;
    use std::cell::Cell;

    /// Detects "SP"/"Campinas" everywhere and fails on a configured latitude.
    struct Detector {
        fail_lat: Option<f64>,
        cancel_after: Option<(usize, CancelFlag)>,
        calls: Cell<usize>,
    }

    impl Detector {
        fn new() -> Self {
            Self {
                fail_lat: None,
                cancel_after: None,
                calls: Cell::new(0),
            }
        }
    }

    impl ReverseGeocoder for Detector {
        async fn reverse_geocode(&self, location: GeoPoint) -> std::result::Result<ReversePlace, GeocodeError> {
            self.calls.set(self.calls.get() + 1);
            if let Some((after, flag)) = &self.cancel_after {
                if self.calls.get() >= *after {
                    flag.cancel();
                }
            }
            if self.fail_lat == Some(location.lat) {
                return Err(GeocodeError::Status(500));
            }
            Ok(ReversePlace::new(Some("SP"), Some("Campinas")))
        }
    }

    fn mapping() -> ColumnMapping {
        ColumnMapping::coordinates("lat", "lon")
            .with_state("uf")
            .with_city("cidade")
    }

    fn mapping_coords() -> ColumnMapping {
        ColumnMapping::coordinates("lat", "lon")
    }

    #[test]
    fn test_all_checks_off_defaults_to_clean() {
        let table = read_csv_str("lat,lon\n1,1\n1,1\n2,2").unwrap();
        let report = analyze(&table, &mapping_coords(), &AnalysisOptions::none()).unwrap();
        assert_eq!(report.metrics.clean_points, 3);
        assert!(report.problematic_points().is_empty());
        assert!(report.groups.is_empty());
    }

    #[test]
    fn test_invalid_never_clean() {
        let table = read_csv_str("lat,lon\n1,1\n,2\n3,3").unwrap();

        let report = analyze(&table, &mapping_coords(), &AnalysisOptions::default()).unwrap();
        assert_eq!(report.metrics.invalid_coordinates, 1);
        let problems: Vec<usize> = report.problematic_points().iter().map(|p| p.row).collect();
        assert_eq!(problems, vec![2]);

        let report = analyze(&table, &mapping_coords(), &AnalysisOptions::none()).unwrap();
        assert_eq!(report.metrics.invalid_coordinates, 1);
        assert!(report.problematic_points().is_empty());
        assert!(report.clean_points().iter().all(|p| p.row != 2));
    }

    #[test]
    fn test_duplicates_take_precedence_over_proximity() {
        let table = read_csv_str(
            "lat,lon\n0,0\n0,0\n0.00005,0\n5,5",
        )
        .unwrap();
        let options = AnalysisOptions::default().with_proximity(20.0);
        let report = analyze(&table, &mapping_coords(), &options).unwrap();

        assert_eq!(report.metrics.pois_in_exact_overlap, 2);
        // Row 3 is close to the duplicates but they are already labeled
        assert_eq!(report.metrics.pois_in_proximity, 0);
        assert_eq!(report.metrics.clean_points, 2);
        assert_eq!(report.groups.len(), 1);
        assert_eq!(report.metrics.bucket_total(), report.metrics.total_pois);
    }

    #[test]
    fn test_proximity_needs_threshold() {
        let table = read_csv_str("lat,lon\n0,0").unwrap();
        let options = AnalysisOptions {
            check_proximity: true,
            ..AnalysisOptions::default()
        };
        let err = analyze(&table, &mapping_coords(), &options).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));

        let negative = AnalysisOptions::default().with_proximity(-5.0);
        assert!(analyze(&table, &mapping_coords(), &negative).is_err());
    }

    #[test]
    fn test_unmapped_coordinates_is_config_error() {
        let table = read_csv_str("lat,lon\n0,0").unwrap();
        let err = analyze(&table, &ColumnMapping::default(), &AnalysisOptions::default()).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_sync_analyze_rejects_geographic() {
        let table = read_csv_str("lat,lon\n0,0").unwrap();
        let options = AnalysisOptions::default().with_geographic(true);
        assert!(analyze(&table, &mapping_coords(), &options).is_err());
    }

    #[tokio::test]
    async fn test_geographic_phase() {
        let table = read_csv_str(
            "lat,lon,uf,cidade\n\
             -22.1,-47.1,SP,Campinas\n\
             -22.2,-47.2,RJ,Campinas\n\
             -22.3,-47.3,sp,Santos\n\
             -22.4,-47.4,SP,campinas\n\
             -22.5,-47.5,SP,Campinas",
        )
        .unwrap();
        let mut geocoder = Detector::new();
        geocoder.fail_lat = Some(-22.5);
        let options = AnalysisOptions::default().with_geographic(true);

        let report = analyze_with_geocoder(&table, &mapping(), &options, &geocoder, &BatchControl::immediate())
            .await
            .unwrap();

        assert_eq!(report.points.len(), 5);
        assert_eq!(report.metrics.clean_points, 2);
        assert_eq!(report.metrics.state_mismatches, 1);
        assert_eq!(report.metrics.city_mismatches, 1);
        assert_eq!(report.metrics.invalid_coordinates, 1);
        assert_eq!(report.metrics.verification_errors, 1);
        assert_eq!(report.points[1].reason(), Some(REASON_INCORRECT_STATE));
        assert_eq!(report.points[4].reason(), Some(REASON_VERIFICATION_ERROR));
        assert_eq!(report.points[0].detected_city(), Some("Campinas"));
        assert_eq!(report.points[4].state_match(), None);
        assert!(!report.interrupted);
    }

    #[tokio::test]
    async fn test_geographic_skips_flagged_points() {
        let table = read_csv_str("lat,lon,uf\n1,1,SP\n1,1,SP\n,,SP\n2,2,SP").unwrap();
        let geocoder = Detector::new();
        let options = AnalysisOptions::default().with_geographic(true);
        let report = analyze_with_geocoder(
            &table,
            &ColumnMapping::coordinates("lat", "lon").with_state("uf"),
            &options,
            &geocoder,
            &BatchControl::immediate(),
        )
        .await
        .unwrap();

        assert_eq!(geocoder.calls.get(), 1);
        assert_eq!(report.metrics.clean_points, 1);
    }

    #[tokio::test]
    async fn test_geographic_requires_place_columns() {
        let table = read_csv_str("lat,lon\n1,1").unwrap();
        let options = AnalysisOptions::default().with_geographic(true);
        let err = analyze_with_geocoder(
            &table,
            &mapping_coords(),
            &options,
            &Detector::new(),
            &BatchControl::immediate(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::MissingColumn { role: "state/city", .. }));
    }

    #[tokio::test]
    async fn test_cancel_truncates_result() {
        let table = read_csv_str(
            "lat,lon,uf,cidade\n1,1,SP,Campinas\n2,2,SP,Campinas\n3,3,SP,Campinas\n4,4,SP,Campinas",
        )
        .unwrap();
        let cancel = CancelFlag::new();
        let mut geocoder = Detector::new();
        geocoder.cancel_after = Some((2, cancel.clone()));
        let control = BatchControl::immediate().with_cancel(cancel);
        let options = AnalysisOptions::default().with_geographic(true);

        let report = analyze_with_geocoder(&table, &mapping(), &options, &geocoder, &control)
            .await
            .unwrap();

        assert!(report.interrupted);
        assert_eq!(report.points.len(), 2);
        assert_eq!(report.metrics.total_pois, 2);
        assert_eq!(report.metrics.clean_points, 2);
    }
}
