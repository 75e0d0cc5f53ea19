//! Provider trait and canonical candidate types.
//!
//! # Trait-Based Provider Abstraction
//!
//! Every backend sits behind [`AddressProvider`], so the engine can:
//! - **Test**: drive the fan-out with in-process mock providers
//! - **Swap**: add or remove backends through configuration alone
//! - **Degrade**: treat any provider failure as an empty partial result
//!
//! Each adapter owns two concerns internally: fetching the raw,
//! provider-shaped payload, and normalizing it into
//! [`AddressCandidate`] values. Raw payloads differ wildly between
//! backends (HTML-ish labels, flat street records, nested OSM address
//! objects); the candidate type is the one shape everything converges
//! to.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::classifier::Classification;
use crate::error::Result;

/// Geographic coordinates of a candidate, when the backend provides them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lon: f64,
}

/// One structured, normalized address result from any provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressCandidate {
    /// Street, usually including the house number when known.
    pub street: String,

    /// 5-digit postal code, possibly empty when the backend omits it.
    pub postal_code: String,

    /// Locality (city, town, village).
    pub locality: String,

    /// Full display string as delivered by the backend.
    pub display: String,

    /// Id of the provider that produced this candidate.
    pub source: String,

    /// Geographic coordinates, when the backend provides them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
}

impl AddressCandidate {
    /// Create a new candidate. `display` defaults to
    /// "street postal_code locality".
    pub fn new(
        street: impl Into<String>,
        postal_code: impl Into<String>,
        locality: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        let street = street.into();
        let postal_code = postal_code.into();
        let locality = locality.into();
        let display = format!("{} {} {}", street, postal_code, locality)
            .trim()
            .to_string();
        Self {
            street,
            postal_code,
            locality,
            display,
            source: source.into(),
            coordinates: None,
        }
    }

    /// Override the display string.
    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = display.into();
        self
    }

    /// Attach coordinates.
    pub fn with_coordinates(mut self, lat: f64, lon: f64) -> Self {
        self.coordinates = Some(Coordinates { lat, lon });
        self
    }

    /// Identity of a candidate for deduplication: the lowercased
    /// concatenation of street, postal code and locality. Two candidates
    /// from different providers with the same key describe the same
    /// address.
    pub fn dedup_key(&self) -> String {
        format!("{}{}{}", self.street, self.postal_code, self.locality).to_lowercase()
    }

    /// Whether the candidate carries any address content at all.
    /// Adapters filter out candidates where every field came back empty.
    pub fn is_empty(&self) -> bool {
        self.street.is_empty() && self.postal_code.is_empty() && self.locality.is_empty()
    }
}

/// A geocoding backend behind one async interface.
///
/// `search` runs the full fetch-and-normalize pipeline for a single
/// query and returns canonical candidates. Implementations must parse
/// defensively: a missing field in the upstream payload defaults to
/// empty, it never fails the call.
#[async_trait]
pub trait AddressProvider: Send + Sync {
    /// Stable provider identifier, matching its configuration entry.
    fn id(&self) -> &str;

    /// Fetch and normalize candidates for a query.
    ///
    /// The classification is the engine's analysis of the same query;
    /// adapters use it for the extracted postal code (pagination by
    /// postal code) and for query-kind-specific filtering.
    async fn search(
        &self,
        query: &str,
        classification: &Classification,
    ) -> Result<Vec<AddressCandidate>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_new_builds_display() {
        let c = AddressCandidate::new("Marienplatz 1", "80331", "München", "bayern");
        assert_eq!(c.display, "Marienplatz 1 80331 München");
        assert_eq!(c.source, "bayern");
        assert!(c.coordinates.is_none());
    }

    #[test]
    fn test_candidate_display_trims_empty_fields() {
        let c = AddressCandidate::new("", "80331", "München", "bayern");
        assert_eq!(c.display, "80331 München");
    }

    #[test]
    fn test_dedup_key_is_case_insensitive() {
        let a = AddressCandidate::new("Marienplatz 1", "80331", "München", "bayern");
        let b = AddressCandidate::new("marienplatz 1", "80331", "MÜNCHEN", "openplz");
        assert_eq!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn test_dedup_key_distinguishes_localities() {
        let a = AddressCandidate::new("Hauptstraße 1", "12345", "Berlin", "openplz");
        let b = AddressCandidate::new("Hauptstraße 1", "12345", "Potsdam", "openplz");
        assert_ne!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn test_with_coordinates() {
        let c = AddressCandidate::new("Marienplatz 1", "80331", "München", "nominatim")
            .with_coordinates(48.137, 11.575);
        let coords = c.coordinates.unwrap();
        assert!((coords.lat - 48.137).abs() < f64::EPSILON);
        assert!((coords.lon - 11.575).abs() < f64::EPSILON);
    }

    #[test]
    fn test_is_empty() {
        let c = AddressCandidate::new("", "", "", "bayern");
        assert!(c.is_empty());

        let c = AddressCandidate::new("Marienplatz 1", "", "", "bayern");
        assert!(!c.is_empty());
    }

    #[test]
    fn test_candidate_serde_round_trip() {
        let c = AddressCandidate::new("Marienplatz 1", "80331", "München", "nominatim")
            .with_coordinates(48.137, 11.575);
        let json = serde_json::to_string(&c).unwrap();
        let back: AddressCandidate = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }
}
