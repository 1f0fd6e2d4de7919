//! Geographic consistency: does the declared city/state agree with the place
//! found at the point's coordinates?

use crate::error::GeocodeError;
use crate::geocoding::{ReverseGeocoder, ReversePlace};
use crate::models::{GeoPoint, GeographicCheck};

/// Compare a declared name with a detected one.
///
/// Trimmed, case-insensitive equality. A missing or blank declared value
/// never matches, whatever was detected.
pub fn names_match(declared: Option<&str>, detected: Option<&str>) -> bool {
    let declared = match declared.map(str::trim) {
        Some(d) if !d.is_empty() => d,
        _ => return false,
    };
    let Some(detected) = detected.map(str::trim) else {
        return false;
    };
    declared.to_lowercase() == detected.to_lowercase()
}

/// Build the check outcome from a resolved place.
pub fn compare_place(
    place: ReversePlace,
    declared_state: Option<&str>,
    declared_city: Option<&str>,
) -> GeographicCheck {
    let state_match = names_match(declared_state, place.state.as_deref());
    let city_match = names_match(declared_city, place.city.as_deref());

    GeographicCheck {
        detected_state: place.state,
        detected_city: place.city,
        state_match,
        city_match,
    }
}

/// Resolve `location` through the reverse geocoder and compare.
///
/// No retries here; the collaborator's own failure policy applies.
pub async fn check<G>(
    geocoder: &G,
    location: GeoPoint,
    declared_state: Option<&str>,
    declared_city: Option<&str>,
) -> Result<GeographicCheck, GeocodeError>
where
    G: ReverseGeocoder + ?Sized,
{
    let place = geocoder.reverse_geocode(location).await?;
    Ok(compare_place(place, declared_state, declared_city))
}
