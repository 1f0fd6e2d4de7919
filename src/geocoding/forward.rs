//! Forward-geocoding batch: address columns → coordinates, one row at a time.

use tracing::{info, warn};

use super::{BatchControl, ForwardGeocoder, ReverseGeocoder, ReversePlace};
use crate::consistency;
use crate::error::{GeocodeError, Result};
use crate::models::{GeoPoint, GeographicCheck};
use crate::normalize::{ColumnMapping, ResolvedColumns};
use crate::registry::{Coordinates, Dataset};
use crate::tabular::{Row, Table};

pub const ERROR_ADDRESS_NOT_FOUND: &str = "address not found";
pub const ERROR_NO_ADDRESS_COLUMNS: &str = "no address columns mapped";

/// Outcome for one input row.
#[derive(Debug, Clone)]
pub struct GeocodedRow {
    pub row: usize,
    pub attributes: Row,
    pub location: Option<GeoPoint>,
    /// Row-level failure, exported as `ERRO_VERIFICACAO`
    pub error: Option<String>,
    /// Present when verification mode ran for a found location
    pub verification: Option<GeographicCheck>,
}

#[derive(Debug, Clone, Default)]
pub struct GeocodeReport {
    pub rows: Vec<GeocodedRow>,
    pub interrupted: bool,
}

impl GeocodeReport {
    pub fn found(&self) -> usize {
        self.rows.iter().filter(|r| r.location.is_some()).count()
    }

    pub fn failed(&self) -> usize {
        self.rows.iter().filter(|r| r.error.is_some()).count()
    }
}

/// Reverse geocoder used when verification is off. Never called.
struct NoVerification;

impl ReverseGeocoder for NoVerification {
    async fn reverse_geocode(&self, _location: GeoPoint) -> std::result::Result<ReversePlace, GeocodeError> {
        Ok(ReversePlace::default())
    }
}

/// Geocode every row of `table` from its mapped name/address/city/state cells.
pub async fn geocode_rows<F>(
    table: &Table,
    mapping: &ColumnMapping,
    geocoder: &F,
    control: &BatchControl,
) -> Result<GeocodeReport>
where
    F: ForwardGeocoder,
{
    run(table, mapping, geocoder, None::<&NoVerification>, control).await
}

/// Like [`geocode_rows`], then reverse-geocode each found location and
/// compare it with the row's declared state and city.
pub async fn geocode_rows_verified<F, R>(
    table: &Table,
    mapping: &ColumnMapping,
    geocoder: &F,
    reverse: &R,
    control: &BatchControl,
) -> Result<GeocodeReport>
where
    F: ForwardGeocoder,
    R: ReverseGeocoder,
{
    run(table, mapping, geocoder, Some(reverse), control).await
}

async fn run<F, R>(
    table: &Table,
    mapping: &ColumnMapping,
    geocoder: &F,
    reverse: Option<&R>,
    control: &BatchControl,
) -> Result<GeocodeReport>
where
    F: ForwardGeocoder,
    R: ReverseGeocoder,
{
    let dataset = Dataset::from_table("geocoding", table, mapping, Coordinates::Optional)?;
    let mut rows = Vec::with_capacity(dataset.len());

    let mut batch = control.start(dataset.len());
    for point in &dataset.points {
        if !batch.proceed() {
            break;
        }

        let mut outcome = GeocodedRow {
            row: point.row,
            attributes: point.attributes.clone(),
            location: None,
            error: None,
            verification: None,
        };

        match build_query(&point.attributes, &dataset.columns) {
            None => outcome.error = Some(ERROR_NO_ADDRESS_COLUMNS.to_string()),
            Some(query) => match batch.call(geocoder.geocode(&query)).await {
                Ok(Some(location)) => outcome.location = Some(location),
                Ok(None) => outcome.error = Some(ERROR_ADDRESS_NOT_FOUND.to_string()),
                Err(e) => {
                    warn!("Row {}: geocoding '{}' failed: {}", point.row, query, e);
                    outcome.error = Some(e.to_string());
                }
            },
        }

        if let (Some(reverse), Some(location)) = (reverse, outcome.location) {
            let declared_state = dataset.declared_state(point);
            let declared_city = dataset.declared_city(point);
            let check = batch
                .call(consistency::check(reverse, location, declared_state, declared_city))
                .await;
            match check {
                Ok(check) => outcome.verification = Some(check),
                Err(e) => {
                    warn!("Row {}: verification failed: {}", point.row, e);
                    outcome.error = Some(e.to_string());
                }
            }
        }

        rows.push(outcome);
        batch.complete_row();
    }
    let interrupted = batch.finish();

    let report = GeocodeReport { rows, interrupted };
    info!(
        "Geocoded {} rows: {} found, {} with errors{}",
        report.rows.len(),
        report.found(),
        report.failed(),
        if interrupted { " (interrupted)" } else { "" }
    );
    Ok(report)
}

/// Join the non-empty address cells with ", ". `None` when nothing is left.
fn build_query(row: &Row, columns: &ResolvedColumns) -> Option<String> {
    let parts: Vec<&str> = columns
        .address_parts()
        .into_iter()
        .map(|idx| row.value_at(idx))
        .filter(|v| !v.is_empty())
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tabular::read_csv_str;
    use std::cell::RefCell;

    /// Answers from a fixed table of queries and records what it was asked.
    struct Lookup {
        known: Vec<(&'static str, GeoPoint)>,
        fail_on: Option<&'static str>,
        queries: RefCell<Vec<String>>,
    }

    impl Lookup {
        fn new(known: Vec<(&'static str, GeoPoint)>) -> Self {
            Self {
                known,
                fail_on: None,
                queries: RefCell::new(Vec::new()),
            }
        }
    }

    impl ForwardGeocoder for Lookup {
        async fn geocode(&self, address: &str) -> std::result::Result<Option<GeoPoint>, GeocodeError> {
            self.queries.borrow_mut().push(address.to_string());
            if self.fail_on == Some(address) {
                return Err(GeocodeError::Status(503));
            }
            Ok(self
                .known
                .iter()
                .find(|(q, _)| *q == address)
                .map(|(_, p)| *p))
        }
    }

    struct Campinas;

    impl ReverseGeocoder for Campinas {
        async fn reverse_geocode(&self, _location: GeoPoint) -> std::result::Result<ReversePlace, GeocodeError> {
            Ok(ReversePlace::new(Some("São Paulo"), Some("Campinas")))
        }
    }

    fn table() -> Table {
        read_csv_str(
            "nome;endereco;cidade;uf\n\
             Loja 1;Rua A, 10;Campinas;São Paulo\n\
             Loja 2;Rua B;;\n\
             ;;;\n\
             Loja 4;Rua D;Santos;SP",
        )
        .unwrap()
    }

    fn mapping() -> ColumnMapping {
        ColumnMapping::default()
            .with_name("nome")
            .with_address("endereco")
            .with_city("cidade")
            .with_state("uf")
    }

    #[test]
    fn test_build_query_skips_empty_cells() {
        let table = table();
        let columns = mapping().resolve("t", table.headers()).unwrap();
        assert_eq!(
            build_query(&table.rows()[0], &columns).as_deref(),
            Some("Loja 1, Rua A, 10, Campinas, São Paulo")
        );
        assert_eq!(build_query(&table.rows()[1], &columns).as_deref(), Some("Loja 2, Rua B"));
        assert_eq!(build_query(&table.rows()[2], &columns), None);
    }

    #[tokio::test]
    async fn test_geocode_rows_outcomes() {
        let mut geocoder = Lookup::new(vec![(
            "Loja 1, Rua A, 10, Campinas, São Paulo",
            GeoPoint::new(-22.9, -47.06),
        )]);
        geocoder.fail_on = Some("Loja 4, Rua D, Santos, SP");

        let report = geocode_rows(&table(), &mapping(), &geocoder, &BatchControl::immediate())
            .await
            .unwrap();

        assert!(!report.interrupted);
        assert_eq!(report.rows.len(), 4);
        assert_eq!(report.rows[0].location, Some(GeoPoint::new(-22.9, -47.06)));
        assert_eq!(report.rows[0].error, None);
        assert_eq!(report.rows[1].error.as_deref(), Some(ERROR_ADDRESS_NOT_FOUND));
        assert_eq!(report.rows[2].error.as_deref(), Some(ERROR_NO_ADDRESS_COLUMNS));
        assert!(report.rows[3].error.as_deref().unwrap().contains("503"));
        assert!(report.rows.iter().all(|r| r.verification.is_none()));

        // The empty row never reaches the service
        assert_eq!(geocoder.queries.borrow().len(), 3);
        assert_eq!(report.found(), 1);
        assert_eq!(report.failed(), 3);
    }

    #[tokio::test]
    async fn test_no_address_columns() {
        let table = read_csv_str("lat,lon\n1,2").unwrap();
        let geocoder = Lookup::new(vec![]);
        let report = geocode_rows(&table, &ColumnMapping::default(), &geocoder, &BatchControl::immediate())
            .await
            .unwrap();
        assert_eq!(report.rows[0].error.as_deref(), Some(ERROR_NO_ADDRESS_COLUMNS));
        assert!(geocoder.queries.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_verified_mode() {
        let geocoder = Lookup::new(vec![
            ("Loja 1, Rua A, 10, Campinas, São Paulo", GeoPoint::new(-22.9, -47.06)),
            ("Loja 4, Rua D, Santos, SP", GeoPoint::new(-23.96, -46.33)),
        ]);
        let report = geocode_rows_verified(
            &table(),
            &mapping(),
            &geocoder,
            &Campinas,
            &BatchControl::immediate(),
        )
        .await
        .unwrap();

        let first = report.rows[0].verification.as_ref().unwrap();
        assert!(first.state_match && first.city_match);

        let last = report.rows[3].verification.as_ref().unwrap();
        assert!(!last.state_match);
        assert!(!last.city_match);
        assert_eq!(last.detected_city.as_deref(), Some("Campinas"));

        assert!(report.rows[1].verification.is_none());
    }

    #[tokio::test]
    async fn test_cancel_keeps_completed_rows() {
        let geocoder = Lookup::new(vec![]);
        let control = BatchControl::immediate();
        control.cancel.cancel();
        let report = geocode_rows(&table(), &mapping(), &geocoder, &control)
            .await
            .unwrap();
        assert!(report.interrupted);
        assert!(report.rows.is_empty());
    }
}
