//! OSM Nominatim provider (fallback tier).
//!
//! Nominatim is the catch-all: it covers everything but is a shared
//! public service with strict usage requirements — an identifying
//! `User-Agent` header on every request and at most one request per
//! second. The header is the adapter's job; the request spacing is
//! enforced by the engine's rate limiter through the provider's
//! configured interval.
//!
//! # Wire format
//!
//! `GET {base}/search?q=...&format=json&addressdetails=1&countrycodes=de&accept-language=de&limit=10`
//! returns a JSON array of places:
//!
//! ```json
//! [ {
//!   "display_name": "Marienplatz 1, München, 80331, Deutschland",
//!   "lat": "48.137", "lon": "11.575",
//!   "address": { "road": "Marienplatz", "house_number": "1",
//!                "postcode": "80331", "city": "München" }
//! } ]
//! ```
//!
//! The address object names its parts differently depending on the OSM
//! geometry (`road`/`street`/`pedestrian`/`path`, `city`/`town`/
//! `village`/`municipality`); extraction takes the first non-empty
//! alternative and defaults to empty, never failing on an exotic shape.

use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::abbreviator::StreetAbbreviator;
use crate::classifier::Classification;
use crate::error::{GeocodeError, Result};
use crate::retry::RetryExecutor;
use crate::traits::{AddressCandidate, AddressProvider};

/// Default Nominatim base URL.
pub const DEFAULT_NOMINATIM_BASE_URL: &str = "https://nominatim.openstreetmap.org";

/// Default identifying User-Agent, overridden per deployment.
pub const DEFAULT_USER_AGENT: &str = concat!("anschrift/", env!("CARGO_PKG_VERSION"));

/// Request timeout for Nominatim calls.
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Maximum number of places requested per search.
const RESULT_LIMIT: usize = 10;

/// OSM Nominatim address provider.
#[derive(Debug, Clone)]
pub struct NominatimProvider {
    client: Client,
    base_url: String,
    user_agent: String,
    country_code: String,
    language: String,
    abbreviator: Option<StreetAbbreviator>,
    retry: RetryExecutor,
}

/// Builder for [`NominatimProvider`].
#[derive(Debug, Clone)]
pub struct NominatimProviderBuilder {
    base_url: String,
    user_agent: String,
    country_code: String,
    language: String,
    apply_abbreviation: bool,
}

impl Default for NominatimProviderBuilder {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_NOMINATIM_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            country_code: "de".to_string(),
            language: "de".to_string(),
            apply_abbreviation: false,
        }
    }
}

impl NominatimProviderBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the identifying User-Agent.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the country filter (ISO 3166-1 alpha-2).
    pub fn country_code(mut self, country_code: impl Into<String>) -> Self {
        self.country_code = country_code.into();
        self
    }

    /// Set the response language.
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Enable or disable street-name abbreviation.
    pub fn apply_abbreviation(mut self, apply: bool) -> Self {
        self.apply_abbreviation = apply;
        self
    }

    /// Build the provider.
    pub fn build(self) -> Result<NominatimProvider> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GeocodeError::NetworkError(e.to_string()))?;

        Ok(NominatimProvider {
            client,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            user_agent: self.user_agent,
            country_code: self.country_code,
            language: self.language,
            abbreviator: self.apply_abbreviation.then(StreetAbbreviator::new),
            retry: RetryExecutor::new(),
        })
    }
}

// Nominatim response structures, parsed defensively.

#[derive(Debug, Clone, Deserialize)]
struct Place {
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    lat: String,
    #[serde(default)]
    lon: String,
    #[serde(default)]
    address: PlaceAddress,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PlaceAddress {
    #[serde(default)]
    road: String,
    #[serde(default)]
    street: String,
    #[serde(default)]
    pedestrian: String,
    #[serde(default)]
    path: String,
    #[serde(default)]
    house_number: String,
    #[serde(default)]
    postcode: String,
    #[serde(default)]
    city: String,
    #[serde(default)]
    town: String,
    #[serde(default)]
    village: String,
    #[serde(default)]
    municipality: String,
}

impl PlaceAddress {
    /// Street name, whatever the OSM geometry calls it.
    fn street_name(&self) -> &str {
        [&self.road, &self.street, &self.pedestrian, &self.path]
            .into_iter()
            .find(|s| !s.is_empty())
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Locality, whatever the OSM hierarchy calls it.
    fn locality(&self) -> &str {
        [&self.city, &self.town, &self.village, &self.municipality]
            .into_iter()
            .find(|s| !s.is_empty())
            .map(String::as_str)
            .unwrap_or_default()
    }
}

impl NominatimProvider {
    /// Create a new builder.
    pub fn builder() -> NominatimProviderBuilder {
        NominatimProviderBuilder::new()
    }

    /// Fetch raw places for a query.
    async fn fetch(&self, query: &str) -> Result<Vec<Place>> {
        let url = format!("{}/search", self.base_url);
        let limit = RESULT_LIMIT.to_string();

        let response = self
            .client
            .get(&url)
            .header(USER_AGENT, &self.user_agent)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("addressdetails", "1"),
                ("countrycodes", self.country_code.as_str()),
                ("accept-language", self.language.as_str()),
                ("limit", limit.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(GeocodeError::RateLimited(
                "Nominatim returned HTTP 429".to_string(),
            ));
        }
        if !status.is_success() {
            return Err(GeocodeError::ApiError(format!(
                "Nominatim returned HTTP {}",
                status
            )));
        }

        Ok(response.json::<Vec<Place>>().await?)
    }

    /// Normalize raw places into candidates.
    fn normalize(&self, places: Vec<Place>) -> Vec<AddressCandidate> {
        places
            .into_iter()
            .filter_map(|place| self.candidate_from_place(place))
            .filter(|candidate| !candidate.is_empty())
            .collect()
    }

    fn candidate_from_place(&self, place: Place) -> Option<AddressCandidate> {
        let mut street = place.address.street_name().to_string();
        if !street.is_empty() && !place.address.house_number.is_empty() {
            street = format!("{} {}", street, place.address.house_number);
        }
        if let Some(abbr) = &self.abbreviator {
            street = abbr.apply(&street);
        }

        let mut candidate = AddressCandidate::new(
            street,
            place.address.postcode.clone(),
            place.address.locality(),
            "nominatim",
        )
        .with_display(place.display_name.clone());

        if let (Ok(lat), Ok(lon)) = (place.lat.parse::<f64>(), place.lon.parse::<f64>()) {
            candidate = candidate.with_coordinates(lat, lon);
        }

        Some(candidate)
    }
}

#[async_trait]
impl AddressProvider for NominatimProvider {
    fn id(&self) -> &str {
        "nominatim"
    }

    async fn search(
        &self,
        query: &str,
        _classification: &Classification,
    ) -> Result<Vec<AddressCandidate>> {
        debug!(query, "searching Nominatim");

        let raw = self.retry.execute_auto(|| self.fetch(query)).await?;
        let candidates = self.normalize(raw);

        debug!(count = candidates.len(), "Nominatim results");
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> NominatimProvider {
        NominatimProvider::builder().build().unwrap()
    }

    fn place_json(json: &str) -> Place {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_place_parses_defensively() {
        let place = place_json("{}");
        assert_eq!(place.display_name, "");
        assert_eq!(place.address.street_name(), "");
        assert_eq!(place.address.locality(), "");
    }

    #[test]
    fn test_street_name_alternatives() {
        let place = place_json(r#"{"address": {"pedestrian": "Kaufingerstraße"}}"#);
        assert_eq!(place.address.street_name(), "Kaufingerstraße");

        let place = place_json(r#"{"address": {"road": "A", "street": "B"}}"#);
        assert_eq!(place.address.street_name(), "A");
    }

    #[test]
    fn test_locality_alternatives() {
        let place = place_json(r#"{"address": {"village": "Oberammergau"}}"#);
        assert_eq!(place.address.locality(), "Oberammergau");

        let place = place_json(r#"{"address": {"town": "Dachau", "municipality": "X"}}"#);
        assert_eq!(place.address.locality(), "Dachau");
    }

    #[test]
    fn test_normalize_builds_candidate_with_coordinates() {
        let place = place_json(
            r#"{
                "display_name": "Marienplatz 1, München, 80331, Deutschland",
                "lat": "48.137", "lon": "11.575",
                "address": {
                    "road": "Marienplatz", "house_number": "1",
                    "postcode": "80331", "city": "München"
                }
            }"#,
        );

        let candidates = provider().normalize(vec![place]);
        assert_eq!(candidates.len(), 1);

        let c = &candidates[0];
        assert_eq!(c.street, "Marienplatz 1");
        assert_eq!(c.postal_code, "80331");
        assert_eq!(c.locality, "München");
        assert_eq!(c.display, "Marienplatz 1, München, 80331, Deutschland");
        assert_eq!(c.source, "nominatim");

        let coords = c.coordinates.unwrap();
        assert!((coords.lat - 48.137).abs() < 1e-9);
        assert!((coords.lon - 11.575).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_skips_unparsable_coordinates() {
        let place = place_json(
            r#"{"lat": "not-a-number", "lon": "11.5",
                "address": {"road": "Marienplatz"}}"#,
        );

        let candidates = provider().normalize(vec![place]);
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].coordinates.is_none());
    }

    #[test]
    fn test_normalize_drops_contentless_places() {
        let candidates = provider().normalize(vec![place_json("{}")]);
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_normalize_applies_abbreviation_when_enabled() {
        let provider = NominatimProvider::builder()
            .apply_abbreviation(true)
            .build()
            .unwrap();

        let place = place_json(r#"{"address": {"road": "Herrenstraße", "house_number": "12"}}"#);
        let candidates = provider.normalize(vec![place]);
        assert_eq!(candidates[0].street, "Herrenstr. 12");
    }

    #[test]
    fn test_house_number_without_street_is_ignored() {
        let place = place_json(r#"{"address": {"house_number": "12", "postcode": "80331"}}"#);
        let candidates = provider().normalize(vec![place]);
        assert_eq!(candidates[0].street, "");
        assert_eq!(candidates[0].postal_code, "80331");
    }
}
