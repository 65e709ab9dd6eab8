use std::time::Duration;

use reqwest::Client;
use sdgtool_shared::{GeocodingConfig, Result, SdgError};
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use crate::{GeocodeError, Geocoder, Location};

/// Maximum number of redirects to follow for a search request.
const MAX_REDIRECTS: usize = 3;

/// One entry of a Nominatim `format=jsonv2` search response.
#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
}

/// HTTP client for a Nominatim-compatible search API.
#[derive(Debug, Clone)]
pub struct NominatimClient {
    client: Client,
    search_url: Url,
}

impl NominatimClient {
    /// Build a client from the `[geocoding]` config section.
    pub fn new(config: &GeocodingConfig) -> Result<Self> {
        Self::with_base_url(&config.base_url, &config.user_agent)
    }

    /// Build a client for `base_url`, sending `user_agent` with every request.
    pub fn with_base_url(base_url: &str, user_agent: &str) -> Result<Self> {
        let base = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))
            .map_err(|e| SdgError::config(format!("invalid geocoding base_url '{base_url}': {e}")))?;
        let search_url = base
            .join("search")
            .map_err(|e| SdgError::config(format!("invalid geocoding base_url '{base_url}': {e}")))?;

        let client = Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| SdgError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, search_url })
    }

    pub fn search_url(&self) -> &Url {
        &self.search_url
    }
}

impl Geocoder for NominatimClient {
    #[instrument(skip(self, timeout), fields(url = %self.search_url))]
    async fn geocode(
        &self,
        address: &str,
        timeout: Duration,
    ) -> std::result::Result<Option<Location>, GeocodeError> {
        let response = self
            .client
            .get(self.search_url.clone())
            .query(&[("q", address), ("format", "jsonv2"), ("limit", "1")])
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SdgError::Network(format!("{}: HTTP {status}", self.search_url)).into());
        }

        let places: Vec<Place> = response.json().await.map_err(|e| {
            if e.is_timeout() {
                GeocodeError::Timeout(timeout)
            } else {
                SdgError::parse(format!("unexpected geocoding response: {e}")).into()
            }
        })?;

        let Some(place) = places.into_iter().next() else {
            debug!("no match");
            return Ok(None);
        };

        let location = Location {
            latitude: parse_coordinate(&place.lat, "lat")?,
            longitude: parse_coordinate(&place.lon, "lon")?,
        };
        debug!(latitude = location.latitude, longitude = location.longitude, "resolved");
        Ok(Some(location))
    }
}

fn classify(err: reqwest::Error, timeout: Duration) -> GeocodeError {
    if err.is_timeout() {
        GeocodeError::Timeout(timeout)
    } else {
        SdgError::Network(format!("geocoding request failed: {err}")).into()
    }
}

fn parse_coordinate(raw: &str, field: &str) -> std::result::Result<f64, SdgError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|e| SdgError::parse(format!("invalid {field} '{raw}' in geocoding response: {e}")))
}
