//! End-to-end scenarios through the public API.

use geoinsights::analysis::{analyze, analyze_with_geocoder, AnalysisOptions};
use geoinsights::compare::compare_datasets;
use geoinsights::consistency;
use geoinsights::distance::haversine;
use geoinsights::error::GeocodeError;
use geoinsights::geocoding::{BatchControl, ReverseGeocoder, ReversePlace};
use geoinsights::models::{ClassificationKind, DatasetSide, GeoPoint, MatchPolicy};
use geoinsights::normalize::{parse_coordinate, ColumnMapping};
use geoinsights::tabular::{read_csv_str, Table};

fn coords() -> ColumnMapping {
    ColumnMapping::coordinates("lat", "lon")
}

fn table(csv: &str) -> Table {
    read_csv_str(csv).unwrap()
}

fn compare(a: &Table, b: &Table, base: DatasetSide, policy: MatchPolicy) -> geoinsights::ComparisonResult {
    compare_datasets(a, &coords(), b, &coords(), base, policy, &BatchControl::immediate()).unwrap()
}

#[test]
fn decimal_comma_and_point_agree() {
    for (comma, point) in [("-23,550520", "-23.550520"), ("46,633309", "46.633309"), ("0,5", "0.5")] {
        assert_eq!(parse_coordinate(comma), parse_coordinate(point));
    }
}

#[test]
fn distance_is_symmetric() {
    let a = GeoPoint::new(-23.5505, -46.6333);
    let b = GeoPoint::new(-22.9068, -43.1729);
    let ab = haversine(&a, &b);
    let ba = haversine(&b, &a);
    assert!((ab - ba).abs() <= ab * 1e-6);
    assert_eq!(haversine(&a, &a), 0.0);
}

#[test]
fn one_point_eleven_meters_apart() {
    let a = table("lat,lon\n0,0");
    let b = table("lat,lon\n0.0001,0");

    let exact = compare(&a, &b, DatasetSide::A, MatchPolicy::ExactCell);
    assert!(exact.records.is_empty());

    let radius = compare(&a, &b, DatasetSide::A, MatchPolicy::Radius(100.0));
    assert_eq!(radius.records.len(), 1);
    assert!((radius.records[0].distance_m - 11.12).abs() < 0.1);

    let nearest = compare(&a, &b, DatasetSide::A, MatchPolicy::Nearest(1));
    assert_eq!(nearest.records.len(), 1);
}

#[test]
fn empty_latitude_on_row_two() {
    let data = table("nome,lat,lon\nA,-23.5,-46.6\nB,,-46.7\nC,-23.7,-46.8");
    let report = analyze(&data, &coords(), &AnalysisOptions::default()).unwrap();

    assert_eq!(report.metrics.total_pois, 3);
    assert_eq!(report.metrics.invalid_coordinates, 1);
    assert!(report.problematic_points().iter().any(|p| p.row == 2));
    assert!(report.clean_points().iter().all(|p| p.row != 2));
}

struct Fixed(ReversePlace);

impl ReverseGeocoder for Fixed {
    async fn reverse_geocode(&self, _location: GeoPoint) -> Result<ReversePlace, GeocodeError> {
        Ok(self.0.clone())
    }
}

#[tokio::test]
async fn empty_declared_state_never_matches() {
    let geocoder = Fixed(ReversePlace::new(Some("SP"), None));
    let check = consistency::check(&geocoder, GeoPoint::new(-23.5, -46.6), Some(""), None)
        .await
        .unwrap();
    assert!(!check.state_match);
}

/// Fails for one known latitude.
struct FlakyOnce {
    fail_lat: f64,
}

impl ReverseGeocoder for FlakyOnce {
    async fn reverse_geocode(&self, location: GeoPoint) -> Result<ReversePlace, GeocodeError> {
        if location.lat == self.fail_lat {
            return Err(GeocodeError::InvalidResponse("boom".to_string()));
        }
        Ok(ReversePlace::new(Some("SP"), Some("São Paulo")))
    }
}

#[tokio::test]
async fn one_failing_reverse_lookup_among_five() {
    let data = table(
        "lat,lon,uf,cidade\n\
         -23.1,-46.1,SP,São Paulo\n\
         -23.2,-46.2,SP,São Paulo\n\
         -23.3,-46.3,SP,São Paulo\n\
         -23.4,-46.4,SP,São Paulo\n\
         -23.5,-46.5,SP,São Paulo",
    );
    let mapping = coords().with_state("uf").with_city("cidade");
    let options = AnalysisOptions::default().with_geographic(true);
    let geocoder = FlakyOnce { fail_lat: -23.3 };

    let report = analyze_with_geocoder(&data, &mapping, &options, &geocoder, &BatchControl::immediate())
        .await
        .unwrap();

    assert_eq!(report.points.len(), 5);
    assert_eq!(report.points[2].kind(), Some(ClassificationKind::Invalid));
    assert_eq!(report.points[2].reason(), Some("verification error"));
    assert_eq!(report.metrics.clean_points, 4);
    assert_eq!(report.metrics.bucket_total(), report.metrics.total_pois);
}

fn sample_sets() -> (Table, Table) {
    let a = table(
        "lat,lon\n-23.55,-46.63\n-23.5501,-46.6301\n-23.56,-46.64\n,\n-23.5500001,-46.63",
    );
    let b = table("lat,lon\n-23.55,-46.63\n-23.5502,-46.6302\n-23.58,-46.60\n-23.55005,-46.63");
    (a, b)
}

#[test]
fn policy_bounds_hold() {
    let (a, b) = sample_sets();

    for n in 1..=3 {
        let result = compare(&a, &b, DatasetSide::A, MatchPolicy::Nearest(n));
        for row in 1..=5 {
            assert!(result.records.iter().filter(|r| r.base_row == row).count() <= n);
        }
    }

    for r in [0.5, 5.0, 50.0, 5000.0] {
        let result = compare(&a, &b, DatasetSide::A, MatchPolicy::Radius(r));
        assert!(result.records.iter().all(|rec| rec.distance_m <= r));
    }

    let exact = compare(&a, &b, DatasetSide::A, MatchPolicy::ExactCell);
    assert!(exact.records.iter().all(|rec| rec.distance_m <= 1.0));
    assert!(!exact.records.is_empty());
}

#[test]
fn comparison_is_deterministic() {
    let (a, b) = sample_sets();
    for base in [DatasetSide::A, DatasetSide::B] {
        let first = compare(&a, &b, base, MatchPolicy::Radius(100.0));
        let second = compare(&a, &b, base, MatchPolicy::Radius(100.0));
        assert_eq!(first.records, second.records);
        assert_eq!(first.matched_base_points, second.matched_base_points);
    }
}

#[test]
fn every_point_has_exactly_one_kind() {
    let data = table("lat,lon\n1,1\n1,1\n1.00005,1\nx,1\n3,3");
    let options = AnalysisOptions::default().with_proximity(10.0);
    let report = analyze(&data, &coords(), &options).unwrap();

    assert!(report.points.iter().all(|p| p.kind().is_some()));
    let m = report.metrics;
    assert_eq!(m.total_pois, 5);
    assert_eq!(
        m.total_pois,
        m.invalid_coordinates
            + m.pois_in_exact_overlap
            + m.pois_in_proximity
            + m.state_mismatches
            + m.city_mismatches
            + m.clean_points
    );
}
