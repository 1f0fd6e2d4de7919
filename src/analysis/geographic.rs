//! Geographic phase: reverse-geocode each remaining point and compare with
//! its declared state and city.

use tracing::{debug, warn};

use crate::consistency;
use crate::geocoding::{BatchControl, ReverseGeocoder};
use crate::models::{Classification, GeographicCheck};
use crate::normalize::ResolvedColumns;
use crate::registry::Dataset;

/// Label derived from a completed check. State is looked at before city, and
/// only fields whose column is mapped can fail.
pub(super) fn classify_check(check: &GeographicCheck, columns: &ResolvedColumns) -> Classification {
    if columns.state.is_some() && !check.state_match {
        Classification::incorrect_state()
    } else if columns.city.is_some() && !check.city_match {
        Classification::incorrect_city()
    } else {
        Classification::clean()
    }
}

/// Run the check over every unclassified located point, one call at a time.
///
/// Returns the position of the first point left unprocessed when the batch
/// was cancelled.
pub(super) async fn check_points<G>(
    dataset: &mut Dataset,
    geocoder: &G,
    control: &BatchControl,
) -> Option<usize>
where
    G: ReverseGeocoder,
{
    let pending: Vec<usize> = dataset
        .points
        .iter()
        .enumerate()
        .filter(|(_, p)| !p.is_classified() && p.has_location())
        .map(|(idx, _)| idx)
        .collect();
    debug!("Geographic check on {} points", pending.len());

    let columns = dataset.columns;
    let mut batch = control.start(pending.len());
    let mut stopped_at = None;

    for &idx in &pending {
        if !batch.proceed() {
            stopped_at = Some(idx);
            break;
        }

        let point = &dataset.points[idx];
        let Some(location) = point.location else {
            continue;
        };
        let declared_state = dataset.declared_state(point);
        let declared_city = dataset.declared_city(point);
        let outcome = batch
            .call(consistency::check(geocoder, location, declared_state, declared_city))
            .await;

        let point = &mut dataset.points[idx];
        match outcome {
            Ok(check) => {
                point.classify(classify_check(&check, &columns));
                point.geography = Some(check);
            }
            Err(e) => {
                warn!("Row {}: reverse geocoding failed: {}", point.row, e);
                point.classify(Classification::verification_error());
            }
        }
        batch.complete_row();
    }

    batch.finish();
    stopped_at
}
