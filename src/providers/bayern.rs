//! Bayerischer Ortssuchdienst provider (regional tier).
//!
//! The Ortssuchdienst is authoritative for Bavarian addresses and is the
//! preferred backend whenever a query's postal code falls into the
//! configured Bavarian ranges, or no postal code is present at all.
//!
//! # Wire format
//!
//! `GET {base}/adressen/{query}` with `filter=address`, `srid=31468`,
//! `fuzzy=false` and an `api_key` parameter. The response is a single
//! object:
//!
//! ```json
//! { "results": [ { "attrs": { "label": "Marienplatz <b>1</b>, 80331 München" } } ] }
//! ```
//!
//! The label is the only address payload and embeds `<b>` highlight
//! markup around the matched parts. Normalization strips the markup,
//! takes the first 5-digit run as the postal code, and splits the plain
//! text around it: street before, locality after.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::abbreviator::StreetAbbreviator;
use crate::classifier::{extract_postal_code, Classification};
use crate::error::{GeocodeError, Result};
use crate::retry::RetryExecutor;
use crate::traits::{AddressCandidate, AddressProvider};

/// Default Ortssuchdienst base URL.
pub const DEFAULT_BAYERN_BASE_URL: &str = "https://geoservices.bayern.de/services/ortssuche/v1";

/// Request timeout for Ortssuchdienst calls.
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

/// Bayerischer Ortssuchdienst address provider.
#[derive(Debug, Clone)]
pub struct BayernProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    abbreviator: Option<StreetAbbreviator>,
    retry: RetryExecutor,
}

/// Builder for [`BayernProvider`].
#[derive(Debug, Clone)]
pub struct BayernProviderBuilder {
    base_url: String,
    api_key: Option<String>,
    apply_abbreviation: bool,
}

impl Default for BayernProviderBuilder {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BAYERN_BASE_URL.to_string(),
            api_key: None,
            apply_abbreviation: true,
        }
    }
}

impl BayernProviderBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the API key.
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Enable or disable street-name abbreviation.
    pub fn apply_abbreviation(mut self, apply: bool) -> Self {
        self.apply_abbreviation = apply;
        self
    }

    /// Build the provider.
    pub fn build(self) -> Result<BayernProvider> {
        if self.api_key.is_none() {
            tracing::warn!("bayern provider built without an api key");
        }

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GeocodeError::NetworkError(e.to_string()))?;

        Ok(BayernProvider {
            client,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            api_key: self.api_key,
            abbreviator: self.apply_abbreviation.then(StreetAbbreviator::new),
            retry: RetryExecutor::new(),
        })
    }
}

// Ortssuchdienst response structures. Everything defaults: a partial
// payload degrades to empty fields, never to a parse failure.

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    attrs: ResultAttrs,
}

#[derive(Debug, Default, Deserialize)]
struct ResultAttrs {
    #[serde(default)]
    label: String,
}

/// A label split into its address parts.
#[derive(Debug, PartialEq, Eq)]
struct ParsedLabel {
    plain: String,
    street: String,
    postal_code: String,
    locality: String,
}

impl BayernProvider {
    /// Create a new builder.
    pub fn builder() -> BayernProviderBuilder {
        BayernProviderBuilder::new()
    }

    /// Fetch the raw search response for a query.
    async fn fetch(&self, query: &str) -> Result<SearchResponse> {
        let url = format!(
            "{}/adressen/{}",
            self.base_url,
            urlencoding::encode(query)
        );

        let mut params: Vec<(&str, &str)> = vec![
            ("filter", "address"),
            ("srid", "31468"),
            ("fuzzy", "false"),
        ];
        if let Some(key) = &self.api_key {
            params.push(("api_key", key));
        }

        let response = self.client.get(&url).query(&params).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::ApiError(format!(
                "Ortssuchdienst returned HTTP {}",
                status
            )));
        }

        Ok(response.json::<SearchResponse>().await?)
    }

    /// Normalize a raw response into candidates.
    fn normalize(&self, raw: SearchResponse) -> Vec<AddressCandidate> {
        raw.results
            .iter()
            .filter_map(|result| self.candidate_from_label(&result.attrs.label))
            .filter(|candidate| !candidate.is_empty())
            .collect()
    }

    fn candidate_from_label(&self, label: &str) -> Option<AddressCandidate> {
        if label.trim().is_empty() {
            return None;
        }

        let parsed = parse_label(label);

        let (street, display) = match &self.abbreviator {
            Some(abbr) => (abbr.apply(&parsed.street), abbr.apply(&parsed.plain)),
            None => (parsed.street.clone(), parsed.plain.clone()),
        };

        Some(
            AddressCandidate::new(street, parsed.postal_code, parsed.locality, "bayern")
                .with_display(display),
        )
    }
}

/// Strip markup and split a label into street / postal code / locality.
///
/// A label without a recognizable postal code keeps all of its text in
/// the display string and leaves the split fields empty.
fn parse_label(label: &str) -> ParsedLabel {
    let plain = HTML_TAG.replace_all(label, "").to_string();

    let Some(postal_code) = extract_postal_code(&plain) else {
        return ParsedLabel {
            plain,
            street: String::new(),
            postal_code: String::new(),
            locality: String::new(),
        };
    };

    let (street, locality) = match plain.find(&postal_code) {
        Some(index) if index > 0 => {
            let street = plain[..index].trim().trim_end_matches(',').trim();
            let after = plain[index + postal_code.len()..].trim();
            let locality = after.trim_start_matches([',', ' ']).trim();
            (street.to_string(), locality.to_string())
        }
        _ => (String::new(), String::new()),
    };

    ParsedLabel {
        plain,
        street,
        postal_code,
        locality,
    }
}

#[async_trait]
impl AddressProvider for BayernProvider {
    fn id(&self) -> &str {
        "bayern"
    }

    async fn search(
        &self,
        query: &str,
        _classification: &Classification,
    ) -> Result<Vec<AddressCandidate>> {
        debug!(query, "searching Ortssuchdienst");

        let raw = self.retry.execute_auto(|| self.fetch(query)).await?;
        let candidates = self.normalize(raw);

        debug!(count = candidates.len(), "Ortssuchdienst results");
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_label_splits_address() {
        let parsed = parse_label("Marienplatz 1, 80331 München");
        assert_eq!(parsed.street, "Marienplatz 1");
        assert_eq!(parsed.postal_code, "80331");
        assert_eq!(parsed.locality, "München");
        assert_eq!(parsed.plain, "Marienplatz 1, 80331 München");
    }

    #[test]
    fn test_parse_label_strips_markup() {
        let parsed = parse_label("<b>Marienplatz</b> 1, 80331 <b>München</b>");
        assert_eq!(parsed.plain, "Marienplatz 1, 80331 München");
        assert_eq!(parsed.street, "Marienplatz 1");
        assert_eq!(parsed.locality, "München");
    }

    #[test]
    fn test_parse_label_without_postal_code() {
        let parsed = parse_label("Marienplatz, München");
        assert_eq!(parsed.street, "");
        assert_eq!(parsed.postal_code, "");
        assert_eq!(parsed.locality, "");
        assert_eq!(parsed.plain, "Marienplatz, München");
    }

    #[test]
    fn test_parse_label_postal_code_first() {
        // A leading postal code leaves no street part to split off.
        let parsed = parse_label("80331 München");
        assert_eq!(parsed.street, "");
        assert_eq!(parsed.postal_code, "80331");
    }

    fn provider(abbreviate: bool) -> BayernProvider {
        BayernProvider::builder()
            .api_key("test-key")
            .apply_abbreviation(abbreviate)
            .build()
            .unwrap()
    }

    fn raw(labels: &[&str]) -> SearchResponse {
        SearchResponse {
            results: labels
                .iter()
                .map(|label| SearchResult {
                    attrs: ResultAttrs {
                        label: label.to_string(),
                    },
                })
                .collect(),
        }
    }

    #[test]
    fn test_normalize_builds_candidates() {
        let candidates = provider(false).normalize(raw(&[
            "Marienplatz 1, 80331 München",
            "Sendlinger Str. 5, 80331 München",
        ]));

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].street, "Marienplatz 1");
        assert_eq!(candidates[0].postal_code, "80331");
        assert_eq!(candidates[0].locality, "München");
        assert_eq!(candidates[0].source, "bayern");
    }

    #[test]
    fn test_normalize_applies_abbreviation() {
        let candidates = provider(true).normalize(raw(&["Herrenstraße 12, 80331 München"]));
        assert_eq!(candidates[0].street, "Herrenstr. 12");
        assert_eq!(candidates[0].display, "Herrenstr. 12, 80331 München");
    }

    #[test]
    fn test_normalize_without_abbreviation() {
        let candidates = provider(false).normalize(raw(&["Herrenstraße 12, 80331 München"]));
        assert_eq!(candidates[0].street, "Herrenstraße 12");
    }

    #[test]
    fn test_normalize_drops_empty_labels() {
        let candidates = provider(false).normalize(raw(&["", "   "]));
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_normalize_keeps_label_without_postal_code_out() {
        // No postal code means no street/locality split; the candidate
        // carries no address fields and is filtered out.
        let candidates = provider(false).normalize(raw(&["Marienplatz, München"]));
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_response_parses_defensively() {
        let response: SearchResponse = serde_json::from_str("{}").unwrap();
        assert!(response.results.is_empty());

        let response: SearchResponse =
            serde_json::from_str(r#"{"results": [{}, {"attrs": {}}]}"#).unwrap();
        assert_eq!(response.results.len(), 2);
        assert_eq!(response.results[0].attrs.label, "");
    }
}
