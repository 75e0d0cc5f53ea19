//! OpenPLZ provider (country tier).
//!
//! OpenPLZ covers the national street directory but can only be queried
//! by postal code, one page of street records at a time. The adapter
//! pages through results while pages come back full and a configured
//! page allowance is left, then returns the accumulated set; a short page
//! ends the walk early. This bounds a pathological postal code to
//! `max_pages * page_size` records.
//!
//! # Wire format
//!
//! `GET {base}/Streets?postalCode=80331&page=1&pageSize=50` returns a
//! JSON array of street records:
//!
//! ```json
//! [ { "name": "Marienplatz", "postalCode": "80331", "locality": "München" } ]
//! ```
//!
//! For a query that carries more than just the postal code (street
//! fragment plus out-of-region code), the street list is additionally
//! filtered against the fragment, with a pass-through for fragments too
//! short to mean anything. When the filter would discard everything,
//! the unfiltered list is returned instead; a fuzzy mismatch must not
//! hide an entire postal code's streets.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::abbreviator::StreetAbbreviator;
use crate::classifier::{Classification, QueryKind};
use crate::error::{GeocodeError, Result};
use crate::retry::RetryExecutor;
use crate::traits::{AddressCandidate, AddressProvider};

/// Default OpenPLZ base URL (German dataset).
pub const DEFAULT_OPENPLZ_BASE_URL: &str = "https://openplzapi.org/de";

/// Request timeout for OpenPLZ calls.
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{5}").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// OpenPLZ street-directory provider.
#[derive(Debug, Clone)]
pub struct OpenPlzProvider {
    client: Client,
    base_url: String,
    page_size: usize,
    max_pages: usize,
    abbreviator: Option<StreetAbbreviator>,
    retry: RetryExecutor,
}

/// Builder for [`OpenPlzProvider`].
#[derive(Debug, Clone)]
pub struct OpenPlzProviderBuilder {
    base_url: String,
    page_size: usize,
    max_pages: usize,
    apply_abbreviation: bool,
}

impl Default for OpenPlzProviderBuilder {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OPENPLZ_BASE_URL.to_string(),
            page_size: 50,
            max_pages: 20,
            apply_abbreviation: false,
        }
    }
}

impl OpenPlzProviderBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the page size requested per call.
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set the maximum number of pages fetched per query.
    pub fn max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Enable or disable street-name abbreviation.
    pub fn apply_abbreviation(mut self, apply: bool) -> Self {
        self.apply_abbreviation = apply;
        self
    }

    /// Build the provider.
    pub fn build(self) -> Result<OpenPlzProvider> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GeocodeError::NetworkError(e.to_string()))?;

        Ok(OpenPlzProvider {
            client,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            page_size: self.page_size.max(1),
            max_pages: self.max_pages.max(1),
            abbreviator: self.apply_abbreviation.then(StreetAbbreviator::new),
            retry: RetryExecutor::new(),
        })
    }
}

/// One street record as delivered by OpenPLZ.
#[derive(Debug, Clone, Deserialize)]
struct StreetRecord {
    #[serde(default)]
    name: String,
    #[serde(default, rename = "postalCode")]
    postal_code: String,
    #[serde(default)]
    locality: String,
}

impl OpenPlzProvider {
    /// Create a new builder.
    pub fn builder() -> OpenPlzProviderBuilder {
        OpenPlzProviderBuilder::new()
    }

    /// Fetch one page of street records for a postal code.
    async fn fetch_page(&self, postal_code: &str, page: usize) -> Result<Vec<StreetRecord>> {
        let url = format!("{}/Streets", self.base_url);
        let page_size = self.page_size.to_string();
        let page_str = page.to_string();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("postalCode", postal_code),
                ("page", page_str.as_str()),
                ("pageSize", page_size.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::ApiError(format!(
                "OpenPLZ returned HTTP {}",
                status
            )));
        }

        Ok(response.json::<Vec<StreetRecord>>().await?)
    }

    /// Fetch all pages for a postal code, bounded by `max_pages`.
    ///
    /// Requests the next page only while the previous one came back
    /// full; a short or empty page ends the walk.
    async fn fetch_all(&self, postal_code: &str) -> Result<Vec<StreetRecord>> {
        let mut streets = Vec::new();

        for page in 1..=self.max_pages {
            let batch = self
                .retry
                .execute_auto(|| self.fetch_page(postal_code, page))
                .await?;
            let full_page = batch.len() == self.page_size;

            debug!(postal_code, page, count = batch.len(), "OpenPLZ page");
            streets.extend(batch);

            if !full_page {
                break;
            }
        }

        Ok(streets)
    }

    /// Normalize street records into candidates. Records without a
    /// street name carry no information beyond the query itself and are
    /// dropped.
    fn normalize(&self, records: Vec<StreetRecord>) -> Vec<AddressCandidate> {
        records
            .into_iter()
            .filter(|record| !record.name.is_empty())
            .map(|record| {
                let street = match &self.abbreviator {
                    Some(abbr) => abbr.apply(&record.name),
                    None => record.name,
                };
                AddressCandidate::new(street, record.postal_code, record.locality, "openplz")
            })
            .collect()
    }
}

/// The leading street fragment of a query once the postal code and
/// punctuation are removed; lowercased. Empty when the query was only a
/// postal code.
fn street_fragment(query: &str) -> String {
    let without_code = DIGIT_RUN.replace_all(query, "");
    let cleaned = without_code.replace(',', " ");
    let collapsed = WHITESPACE.replace_all(cleaned.trim(), " ").to_lowercase();
    collapsed
        .split(' ')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Filter street records against a query fragment.
///
/// A record matches when its name contains the fragment, or the fragment
/// contains the name's first five characters, or the fragment is too
/// short to filter on. An empty match set falls back to all records.
fn filter_streets(records: Vec<StreetRecord>, fragment: &str) -> Vec<StreetRecord> {
    if fragment.is_empty() {
        return records;
    }

    let matching: Vec<StreetRecord> = records
        .iter()
        .filter(|record| {
            let name = record.name.to_lowercase();
            let name_head: String = name.chars().take(5).collect();
            name.contains(fragment) || fragment.contains(&name_head) || fragment.chars().count() < 3
        })
        .cloned()
        .collect();

    if matching.is_empty() {
        records
    } else {
        matching
    }
}

#[async_trait]
impl AddressProvider for OpenPlzProvider {
    fn id(&self) -> &str {
        "openplz"
    }

    async fn search(
        &self,
        query: &str,
        classification: &Classification,
    ) -> Result<Vec<AddressCandidate>> {
        // Paging requires a postal code; without one this backend has
        // nothing to offer.
        let Some(postal_code) = classification.postal_code.as_deref() else {
            return Ok(Vec::new());
        };

        debug!(postal_code, "loading streets from OpenPLZ");
        let mut records = self.fetch_all(postal_code).await?;

        // A free-text query alongside the postal code narrows the list.
        if classification.kind == QueryKind::WithPostalCode {
            records = filter_streets(records, &street_fragment(query));
        }

        let candidates = self.normalize(records);
        debug!(count = candidates.len(), "OpenPLZ results");
        Ok(candidates)
    }
}
