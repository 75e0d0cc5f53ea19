//! Engine configuration: providers, tiers, usage policies, region ranges.
//!
//! Configuration is loaded once at startup and is immutable for the
//! lifetime of the engine. It can be built programmatically, deserialized
//! from TOML, or taken from [`EngineConfig::default`], which mirrors the
//! stock three-backend deployment (regional Ortssuchdienst, country-wide
//! OpenPLZ, opt-in Nominatim catch-all).
//!
//! # Example Configuration
//!
//! ```toml
//! page_size = 50
//! max_pages = 20
//! cache_enabled = true
//! region_ranges = [{ min = 80000, max = 87999 }, { min = 90000, max = 97999 }]
//!
//! [[providers]]
//! id = "bayern"
//! tier = "regional"
//! priority = 1
//! apply_abbreviation = true
//! use_for_region = true
//! api_key = "..."
//!
//! [[providers]]
//! id = "openplz"
//! tier = "country"
//! priority = 2
//! use_for_country_wide = true
//!
//! [[providers]]
//! id = "nominatim"
//! tier = "fallback"
//! priority = 3
//! rate_limit_ms = 1000
//! use_as_fallback = true
//! user_agent = "my-app/1.0"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a configuration file.
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML configuration.
    #[error("Failed to parse TOML config: {0}")]
    ParseError(String),

    /// Invalid configuration (missing required fields, invalid values).
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// Provider id present in config but not known to the factory.
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),
}

// ============================================================================
// Provider Configuration
// ============================================================================

/// Coverage tier of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderTier {
    /// Authoritative for a configured postal-code range.
    #[default]
    Regional,
    /// Covers the national address dataset; needs a postal code to page.
    Country,
    /// Catch-all, invoked only when explicitly configured.
    Fallback,
}

impl std::fmt::Display for ProviderTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderTier::Regional => write!(f, "regional"),
            ProviderTier::Country => write!(f, "country"),
            ProviderTier::Fallback => write!(f, "fallback"),
        }
    }
}

/// Per-provider configuration: identity, tier, limits and usage policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider identifier (`bayern`, `openplz`, `nominatim`, `mock`).
    pub id: String,

    /// Whether the provider participates in selection at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Coverage tier.
    #[serde(default)]
    pub tier: ProviderTier,

    /// Ordering within a tier; lower wins.
    #[serde(default)]
    pub priority: u8,

    /// Minimum milliseconds between two requests to this provider.
    /// Zero means unthrottled.
    #[serde(default)]
    pub rate_limit_ms: u64,

    /// Whether street names from this provider go through the abbreviator.
    #[serde(default)]
    pub apply_abbreviation: bool,

    /// Usage policy: invoked for in-region postal codes.
    #[serde(default)]
    pub use_for_region: bool,

    /// Usage policy: invoked for out-of-region postal codes.
    #[serde(default)]
    pub use_for_country_wide: bool,

    /// Usage policy: invoked as an explicit catch-all.
    #[serde(default)]
    pub use_as_fallback: bool,

    /// Base URL override; adapters fall back to their built-in default.
    #[serde(default)]
    pub base_url: Option<String>,

    /// API key, for backends that require one.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Identifying User-Agent, for backends that require one.
    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_true() -> bool {
    true
}

impl ProviderConfig {
    /// Minimal config for a provider id with everything else defaulted.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            tier: ProviderTier::Regional,
            priority: 0,
            rate_limit_ms: 0,
            apply_abbreviation: false,
            use_for_region: false,
            use_for_country_wide: false,
            use_as_fallback: false,
            base_url: None,
            api_key: None,
            user_agent: None,
        }
    }

    /// Set the coverage tier.
    pub fn with_tier(mut self, tier: ProviderTier) -> Self {
        self.tier = tier;
        self
    }

    /// Set the in-tier priority.
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Set the minimum inter-request interval in milliseconds.
    pub fn with_rate_limit_ms(mut self, ms: u64) -> Self {
        self.rate_limit_ms = ms;
        self
    }

    /// Enable or disable the provider.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Enable or disable street-name abbreviation for this provider.
    pub fn with_abbreviation(mut self, apply: bool) -> Self {
        self.apply_abbreviation = apply;
        self
    }

    /// Set the usage policy flags.
    pub fn with_usage(mut self, region: bool, country_wide: bool, fallback: bool) -> Self {
        self.use_for_region = region;
        self.use_for_country_wide = country_wide;
        self.use_as_fallback = fallback;
        self
    }
}

// ============================================================================
// Region Ranges
// ============================================================================

/// An inclusive numeric postal-code range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionRange {
    /// Lower bound, inclusive.
    pub min: u32,
    /// Upper bound, inclusive.
    pub max: u32,
}

impl RegionRange {
    /// Create a new inclusive range.
    pub fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    /// Check whether a numeric postal code falls inside the range.
    pub fn contains(&self, code: u32) -> bool {
        code >= self.min && code <= self.max
    }
}

// ============================================================================
// Engine Configuration
// ============================================================================

/// Process-wide engine configuration, loaded once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Configured providers, any order; selection sorts by (tier, priority).
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,

    /// Postal-code ranges counting as "in region".
    #[serde(default = "default_region_ranges")]
    pub region_ranges: Vec<RegionRange>,

    /// Page size for paginating providers.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Maximum number of pages a paginating provider may request.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Whether the response cache is consulted and populated.
    #[serde(default = "default_true")]
    pub cache_enabled: bool,
}

fn default_region_ranges() -> Vec<RegionRange> {
    vec![RegionRange::new(80000, 87999), RegionRange::new(90000, 97999)]
}

fn default_page_size() -> usize {
    50
}

fn default_max_pages() -> usize {
    20
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            providers: vec![
                ProviderConfig::new("bayern")
                    .with_tier(ProviderTier::Regional)
                    .with_priority(1)
                    .with_abbreviation(true)
                    .with_usage(true, false, false),
                ProviderConfig::new("openplz")
                    .with_tier(ProviderTier::Country)
                    .with_priority(2)
                    .with_usage(false, true, false),
                // The catch-all ships disabled-as-fallback: enabling it is an
                // explicit opt-in because the public endpoint has strict usage
                // requirements.
                ProviderConfig::new("nominatim")
                    .with_tier(ProviderTier::Fallback)
                    .with_priority(3)
                    .with_rate_limit_ms(1000)
                    .with_usage(false, false, false),
            ],
            region_ranges: default_region_ranges(),
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            cache_enabled: true,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from a TOML string.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a TOML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Validate invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for provider in &self.providers {
            if provider.id.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "provider id must not be empty".to_string(),
                ));
            }
            if !seen.insert(provider.id.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate provider id: {}",
                    provider.id
                )));
            }
        }
        for range in &self.region_ranges {
            if range.min > range.max {
                return Err(ConfigError::ValidationError(format!(
                    "region range {}..{} is inverted",
                    range.min, range.max
                )));
            }
        }
        if self.page_size == 0 {
            return Err(ConfigError::ValidationError(
                "page_size must be at least 1".to_string(),
            ));
        }
        if self.max_pages == 0 {
            return Err(ConfigError::ValidationError(
                "max_pages must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Look up a provider config by id.
    pub fn provider(&self, id: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.id == id)
    }

    /// All enabled provider configs.
    pub fn enabled_providers(&self) -> impl Iterator<Item = &ProviderConfig> {
        self.providers.iter().filter(|p| p.enabled)
    }
}
