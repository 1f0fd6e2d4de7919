//! Nominatim client for forward and reverse geocoding.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use super::{ForwardGeocoder, ReverseGeocoder, ReversePlace};
use crate::config::GeocoderConfig;
use crate::error::{Error, GeocodeError, Result};
use crate::models::GeoPoint;

/// HTTP client for a Nominatim instance.
///
/// Makes one request per call. Pacing between calls is the batch loop's job.
#[derive(Clone)]
pub struct NominatimClient {
    client: Client,
    base_url: Url,
    language: String,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    address: Option<ReverseAddress>,
}

#[derive(Debug, Deserialize)]
struct ReverseAddress {
    state: Option<String>,
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
}

impl NominatimClient {
    pub fn new(config: &GeocoderConfig) -> Result<Self> {
        let mut base_url = Url::parse(&config.nominatim_url).map_err(|e| {
            Error::InvalidConfig(format!(
                "invalid Nominatim URL '{}': {}",
                config.nominatim_url, e
            ))
        })?;
        // Url::join replaces the last path segment unless the path ends with '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::InvalidConfig(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            language: config.language.clone(),
        })
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> std::result::Result<Url, GeocodeError> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| GeocodeError::InvalidResponse(format!("bad endpoint '{}': {}", path, e)))?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        Ok(url)
    }

    fn search_url(&self, address: &str) -> std::result::Result<Url, GeocodeError> {
        self.endpoint("search", &[("format", "json"), ("q", address), ("limit", "1")])
    }

    fn reverse_url(&self, location: GeoPoint) -> std::result::Result<Url, GeocodeError> {
        let lat = location.lat.to_string();
        let lon = location.lon.to_string();
        self.endpoint(
            "reverse",
            &[
                ("format", "jsonv2"),
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("accept-language", self.language.as_str()),
            ],
        )
    }

    /// `GET /search?format=json&q=...&limit=1`
    pub async fn search(&self, address: &str) -> std::result::Result<Option<GeoPoint>, GeocodeError> {
        let url = self.search_url(address)?;
        debug!("Nominatim search: {}", address);

        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        parse_search(&body)
    }

    /// `GET /reverse?format=jsonv2&lat=..&lon=..&accept-language=..`
    ///
    /// A non-success status yields an empty place instead of an error.
    /// Transport failures, timeouts and unparseable bodies are still returned
    /// as `Err`; the analysis records those points as verification errors
    /// rather than treating them as an unknown place.
    pub async fn reverse(&self, location: GeoPoint) -> std::result::Result<ReversePlace, GeocodeError> {
        let url = self.reverse_url(location)?;
        debug!("Nominatim reverse: ({}, {})", location.lat, location.lon);

        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                "Reverse geocoding failed with status {} for ({}, {})",
                status, location.lat, location.lon
            );
            return Ok(ReversePlace::default());
        }

        let body = response.text().await?;
        parse_reverse(&body)
    }
}

impl ForwardGeocoder for NominatimClient {
    async fn geocode(&self, address: &str) -> std::result::Result<Option<GeoPoint>, GeocodeError> {
        self.search(address).await
    }
}

impl ReverseGeocoder for NominatimClient {
    async fn reverse_geocode(
        &self,
        location: GeoPoint,
    ) -> std::result::Result<ReversePlace, GeocodeError> {
        self.reverse(location).await
    }
}

fn parse_search(body: &str) -> std::result::Result<Option<GeoPoint>, GeocodeError> {
    let hits: Vec<SearchHit> = serde_json::from_str(body)
        .map_err(|e| GeocodeError::InvalidResponse(format!("search response: {}", e)))?;

    let Some(hit) = hits.into_iter().next() else {
        return Ok(None);
    };

    let lat = hit.lat.trim().parse::<f64>();
    let lon = hit.lon.trim().parse::<f64>();
    match (lat, lon) {
        (Ok(lat), Ok(lon)) if lat.is_finite() && lon.is_finite() => Ok(Some(GeoPoint::new(lat, lon))),
        _ => Err(GeocodeError::InvalidResponse(format!(
            "unparseable coordinates '{}', '{}'",
            hit.lat, hit.lon
        ))),
    }
}

fn parse_reverse(body: &str) -> std::result::Result<ReversePlace, GeocodeError> {
    let response: ReverseResponse = serde_json::from_str(body)
        .map_err(|e| GeocodeError::InvalidResponse(format!("reverse response: {}", e)))?;

    let Some(address) = response.address else {
        return Ok(ReversePlace::default());
    };

    Ok(ReversePlace {
        state: address.state,
        city: address.city.or(address.town).or(address.village),
    })
}
