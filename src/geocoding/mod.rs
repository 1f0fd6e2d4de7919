//! Geocoding collaborators and the sequential batch loop that calls them.
//!
//! The analysis core only sees the two traits below. Implementations are the
//! Nominatim HTTP client and the offline boundary lookup in [`crate::pip`].

mod batch;
mod forward;
mod nominatim;

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::GeocodeError;
use crate::models::GeoPoint;

pub use batch::{BatchControl, BatchRun, CancelFlag, Progress};
pub use forward::{
    geocode_rows, geocode_rows_verified, GeocodeReport, GeocodedRow, ERROR_ADDRESS_NOT_FOUND,
    ERROR_NO_ADDRESS_COLUMNS,
};
pub use nominatim::NominatimClient;

/// Place names resolved from a coordinate pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReversePlace {
    pub city: Option<String>,
    pub state: Option<String>,
}

impl ReversePlace {
    pub fn new(state: Option<&str>, city: Option<&str>) -> Self {
        Self {
            state: state.map(String::from),
            city: city.map(String::from),
        }
    }
}

/// Coordinates → city/state.
pub trait ReverseGeocoder {
    fn reverse_geocode(
        &self,
        location: GeoPoint,
    ) -> impl Future<Output = Result<ReversePlace, GeocodeError>>;
}

/// Address → coordinates. `Ok(None)` means the service found nothing.
pub trait ForwardGeocoder {
    fn geocode(&self, address: &str) -> impl Future<Output = Result<Option<GeoPoint>, GeocodeError>>;
}
