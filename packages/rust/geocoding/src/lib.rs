//! Geocoding provider contract and the Nominatim HTTP client.
//!
//! The enrichment stage only depends on the [`Geocoder`] trait.
//! [`NominatimClient`] talks to any Nominatim-compatible `/search` endpoint.

mod nominatim;

use std::future::Future;
use std::time::Duration;

use sdgtool_shared::SdgError;

pub use nominatim::NominatimClient;

/// Coordinates returned by a successful lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// Failure of a single geocoding request.
#[derive(Debug, thiserror::Error)]
pub enum GeocodeError {
    /// The provider did not answer within the request timeout.
    #[error("geocoding request timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    /// Transport, HTTP status, or response decoding failure.
    #[error(transparent)]
    Provider(#[from] SdgError),
}

/// An external geocoding service.
pub trait Geocoder {
    /// Resolve a free-form address. `Ok(None)` means the provider found no match.
    fn geocode(
        &self,
        address: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<Option<Location>, GeocodeError>>;
}
