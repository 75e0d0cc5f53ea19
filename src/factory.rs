//! Config-driven provider construction.
//!
//! Maps provider ids from [`EngineConfig`] to adapter instances. Ids are
//! stable strings (`bayern`, `openplz`, `nominatim`, `mock`); anything
//! else is a configuration error, surfaced at engine construction rather
//! than at the first query.
//!
//! # Example
//!
//! ```ignore
//! use anschrift::{EngineConfig, HybridEngine};
//!
//! let config = EngineConfig::from_path("anschrift.toml")?;
//! let engine = HybridEngine::from_config(config)?;
//! ```

use std::sync::Arc;

use crate::config::{ConfigError, EngineConfig, ProviderConfig};
use crate::providers::bayern::BayernProvider;
use crate::providers::mock::MockProvider;
use crate::providers::nominatim::NominatimProvider;
use crate::providers::openplz::OpenPlzProvider;
use crate::traits::AddressProvider;

/// Supported provider kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// Bayerischer Ortssuchdienst (regional tier).
    Bayern,
    /// OpenPLZ street directory (country tier).
    OpenPlz,
    /// OSM Nominatim (fallback tier).
    Nominatim,
    /// Mock provider (testing only).
    Mock,
}

impl ProviderKind {
    /// Parse a provider kind from its id (case-insensitive).
    ///
    /// # Examples
    ///
    /// ```
    /// use anschrift::ProviderKind;
    ///
    /// assert_eq!(ProviderKind::from_str("bayern"), Some(ProviderKind::Bayern));
    /// assert_eq!(ProviderKind::from_str("OpenPLZ"), Some(ProviderKind::OpenPlz));
    /// assert_eq!(ProviderKind::from_str("osm"), Some(ProviderKind::Nominatim));
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "bayern" | "ortssuche" => Some(Self::Bayern),
            "openplz" | "open-plz" | "open_plz" => Some(Self::OpenPlz),
            "nominatim" | "osm" => Some(Self::Nominatim),
            "mock" => Some(Self::Mock),
            _ => None,
        }
    }
}

/// Provider factory for creating adapters from configuration.
pub struct ProviderFactory;

impl ProviderFactory {
    /// Create one adapter for a provider config entry.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownProvider`] for an id no adapter
    /// exists for, and [`ConfigError::ValidationError`] when an adapter
    /// cannot be constructed.
    pub fn create(
        config: &ProviderConfig,
        global: &EngineConfig,
    ) -> Result<Arc<dyn AddressProvider>, ConfigError> {
        let kind = ProviderKind::from_str(&config.id)
            .ok_or_else(|| ConfigError::UnknownProvider(config.id.clone()))?;

        let build_error =
            |e: crate::error::GeocodeError| ConfigError::ValidationError(e.to_string());

        match kind {
            ProviderKind::Bayern => {
                let mut builder =
                    BayernProvider::builder().apply_abbreviation(config.apply_abbreviation);
                if let Some(base_url) = &config.base_url {
                    builder = builder.base_url(base_url);
                }
                if let Some(api_key) = &config.api_key {
                    builder = builder.api_key(api_key);
                }
                Ok(Arc::new(builder.build().map_err(build_error)?))
            }

            ProviderKind::OpenPlz => {
                let mut builder = OpenPlzProvider::builder()
                    .page_size(global.page_size)
                    .max_pages(global.max_pages)
                    .apply_abbreviation(config.apply_abbreviation);
                if let Some(base_url) = &config.base_url {
                    builder = builder.base_url(base_url);
                }
                Ok(Arc::new(builder.build().map_err(build_error)?))
            }

            ProviderKind::Nominatim => {
                let mut builder = NominatimProvider::builder()
                    .apply_abbreviation(config.apply_abbreviation);
                if let Some(base_url) = &config.base_url {
                    builder = builder.base_url(base_url);
                }
                if let Some(user_agent) = &config.user_agent {
                    builder = builder.user_agent(user_agent);
                }
                Ok(Arc::new(builder.build().map_err(build_error)?))
            }

            ProviderKind::Mock => Ok(Arc::new(MockProvider::new(config.id.clone()))),
        }
    }

    /// Create adapters for every enabled provider in the configuration.
    pub fn build_all(config: &EngineConfig) -> Result<Vec<Arc<dyn AddressProvider>>, ConfigError> {
        config
            .enabled_providers()
            .map(|provider| Self::create(provider, config))
            .collect()
    }
}
